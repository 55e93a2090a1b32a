use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque scope identifier: every per-user entity carries `(user_id, project_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub user_id: String,
    pub project_id: String,
}

impl Scope {
    pub fn new(user_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            project_id: project_id.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.project_id, self.user_id)
    }
}

/// The project every deployment always has; cannot be deleted.
pub const ROOT_PROJECT_ID: &str = "__root__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Pro,
    Ultra,
    Suspended,
}

impl ProjectStatus {
    pub fn is_suspended(&self) -> bool {
        matches!(self, ProjectStatus::Suspended)
    }
}

/// Blob variant discriminator. Only `Chat` and `Doc` are fully supported —
/// the rest are typed so callers get a `NotImplemented` at the boundary
/// instead of silent misrouting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobType {
    Chat,
    Doc,
    Code,
    Image,
    Transcript,
}

impl BlobType {
    pub fn is_supported(&self) -> bool {
        matches!(self, BlobType::Chat | BlobType::Doc)
    }
}

impl fmt::Display for BlobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlobType::Chat => "chat",
            BlobType::Doc => "doc",
            BlobType::Code => "code",
            BlobType::Image => "image",
            BlobType::Transcript => "transcript",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BlobType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "chat" => Ok(BlobType::Chat),
            "doc" => Ok(BlobType::Doc),
            "code" => Ok(BlobType::Code),
            "image" => Ok(BlobType::Image),
            "transcript" => Ok(BlobType::Transcript),
            other => Err(format!("unknown blob type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub alias: Option<String>,
    pub created_at: Option<String>,
}

/// Untyped document content, used by `Blob::Doc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocContent {
    pub content: String,
}

/// A blob is an opaque, typed unit of ingested content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blob {
    pub blob_type: BlobType,
    pub messages: Option<Vec<ChatMessage>>,
    pub doc: Option<DocContent>,
    pub created_at: Option<String>,
    /// Free-form fields the caller attached; not interpreted by the core.
    #[serde(default)]
    pub fields: serde_json::Value,
}

impl Blob {
    pub fn chat(messages: Vec<ChatMessage>) -> Self {
        Self {
            blob_type: BlobType::Chat,
            messages: Some(messages),
            doc: None,
            created_at: None,
            fields: serde_json::Value::Null,
        }
    }

    /// Canonical textual rendering of a blob, used for token counting and as
    /// the raw material every prompt builder folds into its context.
    pub fn as_text(&self) -> String {
        match self.blob_type {
            BlobType::Chat => self
                .messages
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|m| {
                    let who = m.alias.clone().unwrap_or_else(|| m.role.to_string());
                    let ts = m
                        .created_at
                        .clone()
                        .or_else(|| self.created_at.clone())
                        .unwrap_or_default();
                    format!("[{ts}] {who}: {}", m.content)
                })
                .collect::<Vec<_>>()
                .join("\n"),
            BlobType::Doc => self
                .doc
                .as_ref()
                .map(|d| d.content.clone())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }
}

/// Lower-case, space-to-underscore, trimmed — the one normalization rule
/// applied to every topic/sub_topic before comparison or insertion.
pub fn normalize_attr(s: &str) -> String {
    s.trim().to_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_attr_trims_lowers_and_underscores() {
        assert_eq!(normalize_attr("  Basic Info "), "basic_info");
        assert_eq!(normalize_attr("Name"), "name");
    }

    #[test]
    fn blob_type_parses_and_reports_support() {
        assert!("chat".parse::<BlobType>().unwrap().is_supported());
        assert!(!"image".parse::<BlobType>().unwrap().is_supported());
        assert!("nope".parse::<BlobType>().is_err());
    }
}
