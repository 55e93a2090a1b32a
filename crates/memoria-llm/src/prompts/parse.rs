/// Stop-list of memos that carry no information — dropped during Stage 2
/// extraction when a memo fuzzy-matches one of these entries.
const MEANINGLESS_MEMOS: &[&str] = &[
    "none",
    "unknown",
    "not mentioned",
    "not mentioned by user",
    "not mentioned in the conversation",
    "unclear",
    "unspecified",
    "not specified",
    "not determined",
    "no information",
    "n/a",
    "no related content",
    "no related information",
    "no matched information",
    "未提及",
    "不清楚",
    "用户未提及",
    "对话未提及",
    "未知",
    "不详",
    "没有提到",
    "没有说明",
    "无法确定",
    "无相关内容",
    "未明确提及",
    "无明确信息",
    "无符合信息",
    "无",
];

/// `difflib.get_close_matches`' default cutoff, carried over for the same
/// fuzzy-match feel (ported in shape, not text — `strsim`'s normalized
/// Levenshtein stands in for Python's `SequenceMatcher` ratio).
const FUZZY_CUTOFF: f64 = 0.6;

/// True if `memo` fuzzy-matches one of the stop-list phrases closely enough
/// that it should be dropped rather than stored as a profile memo.
pub fn is_meaningless_memo(memo: &str) -> bool {
    let candidate = memo.trim().to_lowercase();
    if candidate.is_empty() {
        return true;
    }
    MEANINGLESS_MEMOS
        .iter()
        .any(|stop| strsim::normalized_levenshtein(&candidate, stop) >= FUZZY_CUTOFF)
}

/// Splits LLM output into parsed bullet lines, applying the shared
/// whitespace/line-sensitive convention: every atomic
/// result line starts with `"- "`; when the model emits extraneous thought
/// text ahead of its answer, only the lines after the *last* `"---"`
/// separator are considered. A line only contributes a result if it splits
/// into exactly `fields` parts on `sep`.
pub fn parse_lines(text: &str, sep: &str, fields: usize) -> Vec<Vec<String>> {
    let body = match text.rfind("---") {
        Some(idx) => &text[idx + 3..],
        None => text,
    };
    body.lines()
        .filter_map(|line| {
            let line = line.trim();
            let rest = line.strip_prefix("- ")?;
            let parts: Vec<String> = rest.split(sep).map(|p| p.trim().to_string()).collect();
            if parts.len() == fields {
                Some(parts)
            } else {
                None
            }
        })
        .collect()
}

/// Parses a single-line result, e.g. the merge stage's `"- {ACTION}{sep}memo"`
///. Returns the first matching line only.
pub fn parse_single_line(text: &str, sep: &str, fields: usize) -> Option<Vec<String>> {
    parse_lines(text, sep, fields).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meaningless_memo_matches_stop_list_fuzzily() {
        assert!(is_meaningless_memo("None"));
        assert!(is_meaningless_memo("not mentioned"));
        assert!(is_meaningless_memo("未提及"));
        assert!(!is_meaningless_memo("Gus"));
    }

    #[test]
    fn parse_lines_skips_non_bullet_text() {
        let text = "thinking about it...\n- basic_info::name::Gus\nrandom aside\n- bad::line";
        let parsed = parse_lines(text, "::", 3);
        assert_eq!(parsed, vec![vec!["basic_info".to_string(), "name".to_string(), "Gus".to_string()]]);
    }

    #[test]
    fn parse_lines_only_considers_text_after_last_separator() {
        let text = "- topic::sub::should be ignored\n---\n- basic_info::name::Gus";
        let parsed = parse_lines(text, "::", 3);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0][2], "Gus");
    }

    #[test]
    fn parse_single_line_merge_action() {
        let text = "some reasoning\n---\n- UPDATE::Augustus";
        let parsed = parse_single_line(text, "::", 2).unwrap();
        assert_eq!(parsed[0], "UPDATE");
        assert_eq!(parsed[1], "Augustus");
    }
}
