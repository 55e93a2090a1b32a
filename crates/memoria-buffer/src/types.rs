use serde::{Deserialize, Serialize};

/// One pending blob awaiting a flush.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferEntry {
    pub blob_id: String,
    pub blob_type: String,
    pub token_size: i64,
    pub created_at: String,
}

/// What a flush changed, returned up through `Buffer::append`/`flush` and,
/// eventually, the HTTP response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatModalResponse {
    pub event_id: Option<String>,
    pub add_profiles: Vec<String>,
    pub update_profiles: Vec<String>,
    pub delete_profiles: Vec<String>,
}
