use super::language::Language;

/// Stage 5 builder: condenses an overgrown topic's sub_topics down to `cap`
/// entries. Output lines are `"- SUB_TOPIC{sep}MEMO"`, parsed with
/// `parse::parse_lines(..., sep, 2)`. Takes no language branch on its
/// instructions — only a short steering note asking the model to respond
/// in the same language as the input memos.
pub fn build(topic: &str, entries: &[(String, String)], suggested_subtopics: &[String], cap: usize, sep: &str) -> (String, String) {
    let suggestions = if suggested_subtopics.is_empty() {
        "(none)".to_string()
    } else {
        suggested_subtopics.join(", ")
    };
    let system = format!(
        "You reorganize a user's profile memos that are all under one topic. \
         You are given their current sub_topics and memos; condense them into \
         at most {cap} sub_topics: merge related memos, discard irrelevant \
         ones, and create new sub_topics only if necessary. Prefer the \
         suggested sub_topics below when they fit: {suggestions}.\n\n\
         Reply with at most {cap} lines, each exactly:\n- SUB_TOPIC{sep}MEMO\n\
         Respond in the same language as the input memos."
    );
    let mut user = format!("topic: {topic}\n");
    for (sub_topic, memo) in entries {
        user.push_str(&format!("- {sub_topic}{sep}{memo}\n"));
    }
    (system, user)
}
