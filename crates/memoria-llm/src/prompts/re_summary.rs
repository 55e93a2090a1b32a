use super::language::Language;

/// Stage 6 builder: shrinks an oversized memo. Returns free-form
/// text, no bullet parsing — the caller truncates the result itself to half
/// the token budget.
pub fn build(lang: Language, content: &str) -> (String, String) {
    let system = match lang {
        Language::En => {
            "Rewrite the memo below more concisely, keeping every concrete \
             fact (names, dates, numbers) and dropping only redundant \
             phrasing. Respond with the rewritten memo only, no preamble."
                .to_string()
        }
        Language::Zh => {
            "将下面的记忆改写得更简洁，保留所有具体事实（人名、日期、数字），\
             只删除多余的措辞。只回复改写后的内容，不要加任何前言。"
                .to_string()
        }
    };
    (system, content.to_string())
}
