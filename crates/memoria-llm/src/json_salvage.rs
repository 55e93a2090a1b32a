/// Best-effort extraction of the first complete `{...}` object out of a
/// response that may carry leading/trailing thought text around the JSON:
/// track brace depth, parse the first balanced span found.
pub fn extract_first_json_object(s: &str) -> Option<serde_json::Value> {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    let mut start: Option<usize> = None;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s0) = start {
                            let candidate = &s[s0..=i];
                            if let Ok(v) = serde_json::from_str::<serde_json::Value>(candidate) {
                                return Some(v);
                            }
                        }
                        start = None;
                    }
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_surrounded_by_prose() {
        let s = "Sure, here you go:\n{\"a\": 1, \"b\": [1,2]}\nHope that helps.";
        let v = extract_first_json_object(s).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn returns_none_for_no_braces() {
        assert!(extract_first_json_object("no json here").is_none());
    }

    #[test]
    fn picks_first_balanced_object_with_nesting() {
        let s = "{\"outer\": {\"inner\": true}} trailing {\"second\": 1}";
        let v = extract_first_json_object(s).unwrap();
        assert!(v["outer"]["inner"].as_bool().unwrap());
    }
}
