//! Deterministic BPE token counting, shared by Buffer size triggers,
//! ProfileStore/EventStore truncation, and LLMGateway billing counts — the
//! same encoder everywhere ("must be consistent across size
//! accounting and budget enforcement").

use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;

static ENCODER: OnceLock<CoreBPE> = OnceLock::new();

fn encoder() -> &'static CoreBPE {
    ENCODER.get_or_init(|| tiktoken_rs::cl100k_base().expect("cl100k_base ranks are bundled"))
}

/// Number of BPE tokens `text` encodes to.
pub fn count_tokens(text: &str) -> usize {
    encoder().encode_with_special_tokens(text).len()
}

/// Truncates `text` to at most `max_tokens` BPE tokens, appending `"..."`
/// when anything was cut.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    let tokens = encoder().encode_with_special_tokens(text);
    if tokens.len() <= max_tokens {
        return text.to_string();
    }
    let decoded = encoder()
        .decode(tokens[..max_tokens].to_vec())
        .unwrap_or_default();
    format!("{decoded}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero_tokens() {
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn longer_text_has_more_tokens() {
        assert!(count_tokens("hello world, this is a longer sentence") > count_tokens("hello"));
    }

    #[test]
    fn truncate_to_tokens_is_noop_under_budget() {
        let s = "hello";
        assert_eq!(truncate_to_tokens(s, 100), s);
    }

    #[test]
    fn truncate_to_tokens_appends_ellipsis_when_cut() {
        let long = "one two three four five six seven eight nine ten".repeat(5);
        let truncated = truncate_to_tokens(&long, 3);
        assert!(truncated.ends_with("..."));
        assert!(count_tokens(&truncated) <= 6);
    }
}
