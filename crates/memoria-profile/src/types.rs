use serde::{Deserialize, Serialize};

use memoria_core::types::normalize_attr;

/// `{topic, sub_topic}` after normalization forms the profile's unique key
/// per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileAttributes {
    pub topic: String,
    pub sub_topic: String,
    #[serde(default)]
    pub update_hits: Option<i64>,
}

impl ProfileAttributes {
    pub fn new(topic: impl Into<String>, sub_topic: impl Into<String>) -> Self {
        Self {
            topic: normalize_attr(&topic.into()),
            sub_topic: normalize_attr(&sub_topic.into()),
            update_hits: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub content: String,
    pub attributes: ProfileAttributes,
    pub created_at: String,
    pub updated_at: String,
}

/// Options accepted by [`crate::truncate::truncate_profiles`].
#[derive(Debug, Clone, Default)]
pub struct TruncateOptions {
    pub prefer_topics: Option<Vec<String>>,
    pub topk: Option<usize>,
    pub max_token_size: Option<usize>,
    pub only_topics: Option<Vec<String>>,
    pub max_subtopic_size: Option<i64>,
    pub topic_limits: Option<std::collections::HashMap<String, i64>>,
}
