use memoria_profile::TruncateOptions;

/// One message of the caller-supplied chat tail used to pick related
/// profiles and to drive the event similarity search. Only the last user message is used as the search query.
#[derive(Debug, Clone)]
pub struct ChatTailMessage {
    pub role: String,
    pub content: String,
}

/// Input to [`crate::assembler::ContextAssembler::assemble`].
#[derive(Debug, Clone)]
pub struct ContextRequest {
    pub max_token_size: usize,
    pub profile_event_ratio: f64,
    pub chat_tail: Option<Vec<ChatTailMessage>>,
    /// Extra truncation knobs forwarded to `ProfileStore`'s six-step
    /// truncation (prefer_topics, only_topics, topic caps) — independent
    /// of the token budget this request computes.
    pub truncate: TruncateOptions,
}

impl Default for ContextRequest {
    fn default() -> Self {
        Self {
            max_token_size: 2000,
            profile_event_ratio: 0.6,
            chat_tail: None,
            truncate: TruncateOptions::default(),
        }
    }
}

/// Output of context assembly: the final wrapped string plus the raw
/// sections, so callers (e.g. the HTTP handler) can report token usage.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub text: String,
    pub profile_token_count: usize,
    pub event_token_count: usize,
}
