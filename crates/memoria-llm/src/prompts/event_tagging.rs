use super::language::Language;

/// Stage 4 builder: extracts `[{tag, value}]` pairs from the
/// entry summary, restricted to the project's configured event tags.
/// Output lines are `"- TAG{sep}VALUE"`, parsed with
/// `parse::parse_lines(..., sep, 2)` then filtered to the allowed tag set.
///py`.
pub fn build(lang: Language, event_tags_str: &str, event_tip: &str, sep: &str) -> (String, String) {
    let system = match lang {
        Language::En => format!(
            "Given the summary below, extract values for any of these event \
             tags that apply. Reply with one line per applicable tag:\n\
             - TAG{sep}VALUE\n\
             Skip tags that don't apply; never invent a tag not in this list.\n\n\
             Available tags:\n{event_tags_str}"
        ),
        Language::Zh => format!(
            "根据下方摘要，提取适用的事件标签取值。每个适用的标签输出一行：\n\
             - TAG{sep}VALUE\n\
             不适用的标签请跳过，不要使用列表之外的标签。\n\n\
             可用标签：\n{event_tags_str}"
        ),
    };
    (system, event_tip.to_string())
}
