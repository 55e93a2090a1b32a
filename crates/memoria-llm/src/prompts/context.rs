use super::language::Language;

/// Final context wrapper: wraps the assembled profile and event
/// sections in a `<memory>` block, in the caller's language. This builder
/// produces plain text directly — it is not an LLM prompt, just the
/// language-aware formatting step ContextAssembler applies after truncation.
///py`.
pub fn wrap(lang: Language, profile_section: &str, event_section: &str) -> String {
    match lang {
        Language::En => format!(
            "<memory>\n\
             ## What I know about the user\n{profile_section}\n\n\
             ## Relevant past events\n{event_section}\n\
             </memory>"
        ),
        Language::Zh => format!(
            "<memory>\n\
             ## 关于用户的已知信息\n{profile_section}\n\n\
             ## 相关历史事件\n{event_section}\n\
             </memory>"
        ),
    }
}
