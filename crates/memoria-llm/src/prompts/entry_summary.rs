use super::language::Language;

/// Stage 1 builder: renders the allowed topic/event-tag
/// vocabulary into the system prompt, the blob transcript into the user
/// prompt.
pub fn build(lang: Language, profile_topics_str: &str, event_tags_str: &str, transcript: &str) -> (String, String) {
    let system = match lang {
        Language::En => format!(
            "You are a careful note-taker. Read the conversation and write a \
             bullet list summarizing the user's stated facts, schedule items, \
             and events. Every bullet should be a single atomic statement. \
             Where a timestamp is implied, annotate it like \
             `[mention YYYY/MM/DD, happen at YYYY/MM/DD]`.\n\n\
             Topics you may care about:\n{profile_topics_str}\n\n\
             Event tags you may care about:\n{event_tags_str}\n\n\
             Only summarize what's actually said; never invent details."
        ),
        Language::Zh => format!(
            "你是一名细心的记录者。阅读对话并用要点列出用户陈述的事实、日程和事件。\
             每条要点只表达一个原子事实。涉及时间时请标注为\
             `[mention YYYY/MM/DD, happen at YYYY/MM/DD]`。\n\n\
             可能相关的主题：\n{profile_topics_str}\n\n\
             可能相关的事件标签：\n{event_tags_str}\n\n\
             只总结对话中真实出现的信息，不要编造。"
        ),
    };
    (system, transcript.to_string())
}
