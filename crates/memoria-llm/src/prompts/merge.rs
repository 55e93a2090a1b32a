use super::language::Language;

/// Stage 3 builder: asks the model to accept (`UPDATE`) or
/// reject (`ABORT`) a new memo against the (possibly absent) old one for a
/// `(topic, sub_topic)` key. Output is a single line, parsed after the
/// model's free-form reasoning via `parse::parse_single_line(..., sep, 2)`.
pub fn build(
    lang: Language,
    topic: &str,
    sub_topic: &str,
    old_memo: Option<&str>,
    new_memo: &str,
    update_instruction: Option<&str>,
    topic_description: Option<&str>,
    sep: &str,
) -> (String, String) {
    let system = match lang {
        Language::En => format!(
            "You reconcile a user's profile memo. Decide whether to accept \
             the new memo (action UPDATE, possibly merging it with the old \
             one) or reject it as not worth recording (action ABORT). Think \
             briefly, then end your answer with `---` followed by exactly one \
             line:\n- ACTION{sep}MEMO\n\
             where ACTION is UPDATE or ABORT and MEMO is the memo to keep \
             (omit MEMO when ABORT)."
        ),
        Language::Zh => format!(
            "你负责合并用户资料中的一条记忆。判断是否接受新记忆（动作 UPDATE，\
             可与旧记忆合并），或认为其不值得记录而拒绝（动作 ABORT）。先简要思考，\
             然后以 `---` 结尾，紧跟恰好一行：\n- ACTION{sep}MEMO\n\
             ACTION 为 UPDATE 或 ABORT，MEMO 为要保留的内容（ABORT 时可省略）。"
        ),
    };

    let mut user = format!("## User Topic\n{topic}, {sub_topic}\n");
    if let Some(desc) = topic_description {
        user.push_str(&format!("## Topic Description\n{desc}\n"));
    }
    if let Some(instr) = update_instruction {
        user.push_str(&format!("## Update Instruction\n{instr}\n"));
    }
    user.push_str(&format!(
        "## Old Memo\n{}\n## New Memo\n{new_memo}\n",
        old_memo.unwrap_or("(none)")
    ));
    (system, user)
}
