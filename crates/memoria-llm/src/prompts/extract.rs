use super::language::Language;

/// Stage 2 builder: allowed topics/sub-topics, the user's
/// already-used pairs, and the entry summary go into the prompt; output is
/// parsed with `parse::parse_lines(..., sep, 3)` into `(topic, sub_topic,
/// memo)` triples.
pub fn build(
    lang: Language,
    allowed_topics_str: &str,
    already_used_str: &str,
    entry_summary: &str,
    strict_mode: bool,
    sep: &str,
) -> (String, String) {
    let strict_note = match (lang, strict_mode) {
        (Language::En, true) => {
            "Only use topic/sub_topic pairs from the allowed list below — do not invent new ones.\n"
        }
        (Language::Zh, true) => "只能使用下方允许列表中的 topic/sub_topic 组合，不要自创新的。\n",
        _ => "",
    };
    let system = match lang {
        Language::En => format!(
            "Extract durable facts about the user from the note below as a \
             markdown bullet list. Each line must be exactly:\n\
             - TOPIC{sep}SUB_TOPIC{sep}MEMO\n\
             {strict_note}\
             Skip facts that are already covered by an existing sub_topic \
             unless the new information changes it. If nothing new is \
             extractable, return no bullets.\n\n\
             Allowed topics:\n{allowed_topics_str}\n\n\
             Already-recorded topic/sub_topic pairs for this user:\n{already_used_str}"
        ),
        Language::Zh => format!(
            "从下方笔记中提取关于用户的持久事实，以 markdown 要点列出。每行格式必须为：\n\
             - TOPIC{sep}SUB_TOPIC{sep}MEMO\n\
             {strict_note}\
             如果某个事实已经被已有的 sub_topic 覆盖且没有新信息，则跳过。\
             如果没有可提取的新信息，返回空列表。\n\n\
             允许的主题：\n{allowed_topics_str}\n\n\
             该用户已记录的 topic/sub_topic：\n{already_used_str}"
        ),
    };
    (system, entry_summary.to_string())
}
