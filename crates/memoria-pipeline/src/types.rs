use memoria_profile::{Profile, ProfileAttributes};

/// A memo queued for insertion, not yet assigned an id.
#[derive(Debug, Clone)]
pub struct AddProfile {
    pub content: String,
    pub attributes: ProfileAttributes,
}

/// A memo queued to overwrite an existing profile row.
#[derive(Debug, Clone)]
pub struct UpdateProfile {
    pub profile_id: String,
    pub content: String,
    pub attributes: ProfileAttributes,
}

/// Accumulator threaded through Stage 3 → Stage 7. `update_delta` carries
/// the *new* memo content of each UPDATE (not the merged result) — these,
/// together with `add`, feed the event's `profile_delta` at Stage 4.
#[derive(Debug, Clone, Default)]
pub struct MergeResult {
    pub add: Vec<AddProfile>,
    pub update: Vec<UpdateProfile>,
    pub delete: Vec<String>,
    pub update_delta: Vec<AddProfile>,
    pub before_profiles: Vec<Profile>,
}

/// One `(topic, sub_topic, memo)` triple surviving Stage 2's parsing,
/// dedup, and stop-list filtering.
#[derive(Debug, Clone)]
pub struct ExtractedFact {
    pub topic: String,
    pub sub_topic: String,
    pub memo: String,
}
