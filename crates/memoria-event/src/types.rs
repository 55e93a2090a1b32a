use serde::{Deserialize, Serialize};

/// One memo produced by a pipeline run, cited by `(topic, sub_topic)` key
/// rather than profile id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDelta {
    pub content: String,
    pub topic: String,
    pub sub_topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTag {
    pub tag: String,
    pub value: String,
}

/// The free-form payload of an event.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventData {
    #[serde(default)]
    pub profile_delta: Vec<ProfileDelta>,
    pub event_tip: Option<String>,
    #[serde(default)]
    pub event_tags: Option<Vec<EventTag>>,
}

/// A non-null field in a patch overwrites the corresponding field on the
/// stored event; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    pub profile_delta: Option<Vec<ProfileDelta>>,
    pub event_tip: Option<String>,
    pub event_tags: Option<Vec<EventTag>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub event_data: EventData,
    pub embedding: Option<Vec<f32>>,
    pub created_at: String,
    pub updated_at: String,
    /// Only populated by `search`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

/// Canonical textual rendering of an event, used both as the embedding
/// input and for token-budget truncation.
pub fn event_embedding_str(data: &EventData) -> String {
    let profile_delta_str = render_profile_delta(&data.profile_delta);
    let event_tags = render_tags(data.event_tags.as_deref());
    match &data.event_tip {
        Some(tip) => format!("{tip}\n{profile_delta_str}\n{event_tags}"),
        None => format!("{profile_delta_str}\n{event_tags}"),
    }
}

fn render_profile_delta(deltas: &[ProfileDelta]) -> String {
    deltas
        .iter()
        .map(|d| format!("- {}::{}: {}", d.topic, d.sub_topic, d.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_tags(tags: Option<&[EventTag]>) -> String {
    tags.unwrap_or_default()
        .iter()
        .map(|t| format!("- {}: {}", t.tag, t.value))
        .collect::<Vec<_>>()
        .join("\n")
}
