use super::language::Language;

/// ContextAssembler LLM filter: given a query and the
/// candidate profile entries that survived the token budget, asks the
/// model which `(topic, sub_topic)` pairs are actually relevant. Output
/// lines are `"- TOPIC{sep}SUB_TOPIC"`, parsed with
/// `parse::parse_lines(..., sep, 2)`. Entries the model doesn't name are
/// dropped from the assembled context.
pub fn build(lang: Language, query: &str, candidates: &[(String, String, String)], sep: &str) -> (String, String) {
    let system = match lang {
        Language::En => format!(
            "Given the query below, pick only the profile entries that are \
             relevant to it. Reply with one line per relevant entry:\n\
             - TOPIC{sep}SUB_TOPIC\n\
             Omit entries that don't help answer the query. If none are \
             relevant, return no lines."
        ),
        Language::Zh => format!(
            "根据下方查询，只挑选与其相关的资料条目。每个相关条目输出一行：\n\
             - TOPIC{sep}SUB_TOPIC\n\
             与查询无关的条目请省略。如果都不相关，返回空。"
        ),
    };

    let mut user = format!("## Query\n{query}\n\n## Candidate Entries\n");
    for (topic, sub_topic, memo) in candidates {
        user.push_str(&format!("- {topic}{sep}{sub_topic}{sep}{memo}\n"));
    }
    (system, user)
}
