use std::collections::HashMap;

use crate::types::{Profile, TruncateOptions};

/// Applies the six-step truncation pipeline used when profiles are read for
/// prompting. Never mutates the store — operates on an owned copy of the
/// profile list.
pub fn truncate_profiles(mut profiles: Vec<Profile>, opts: &TruncateOptions) -> Vec<Profile> {
    if profiles.is_empty() {
        return profiles;
    }

    // 1. sort by updated_at desc
    profiles.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    // 2. prefer_topics reorder
    if let Some(prefer) = &opts.prefer_topics {
        let prefer: Vec<String> = prefer.iter().map(|t| t.trim().to_string()).collect();
        let weights: HashMap<&str, usize> = prefer
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i))
            .collect();
        let (mut priority, mut rest): (Vec<Profile>, Vec<Profile>) = profiles
            .into_iter()
            .partition(|p| weights.contains_key(p.attributes.topic.as_str()));
        priority.sort_by_key(|p| weights[p.attributes.topic.as_str()]);
        priority.append(&mut rest);
        profiles = priority;
    }

    // 3. only_topics filter
    if let Some(only) = &opts.only_topics {
        let only: std::collections::HashSet<String> =
            only.iter().map(|t| t.trim().to_string()).collect();
        profiles.retain(|p| only.contains(p.attributes.topic.trim()));
    }

    // 4. per-topic caps
    if opts.max_subtopic_size.is_some() || opts.topic_limits.is_some() {
        let default_limit = opts.max_subtopic_size.unwrap_or(-1);
        let empty = HashMap::new();
        let topic_limits = opts.topic_limits.as_ref().unwrap_or(&empty);
        let mut counts: HashMap<String, i64> = HashMap::new();
        profiles.retain(|p| {
            let limit = topic_limits
                .get(&p.attributes.topic)
                .copied()
                .unwrap_or(default_limit);
            let count = counts.entry(p.attributes.topic.clone()).or_insert(0);
            *count += 1;
            limit < 0 || *count <= limit
        });
    }

    // 5. topk
    if let Some(k) = opts.topk {
        profiles.truncate(k);
    }

    // 6. token budget
    if let Some(max_tokens) = opts.max_token_size {
        let mut current = 0usize;
        let mut keep = 0usize;
        for (i, p) in profiles.iter().enumerate() {
            let line = format!("{}::{}: {}", p.attributes.topic, p.attributes.sub_topic, p.content);
            current += memoria_tokenizer::count_tokens(&line);
            if current > max_tokens {
                break;
            }
            keep = i + 1;
        }
        profiles.truncate(keep);
    }

    profiles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(topic: &str, sub_topic: &str, content: &str, updated_at: &str) -> Profile {
        Profile {
            id: format!("{topic}-{sub_topic}"),
            content: content.to_string(),
            attributes: crate::types::ProfileAttributes::new(topic, sub_topic),
            created_at: updated_at.to_string(),
            updated_at: updated_at.to_string(),
        }
    }

    #[test]
    fn sorts_by_updated_at_descending() {
        let profiles = vec![
            profile("a", "x", "old", "2024-01-01T00:00:00Z"),
            profile("b", "x", "new", "2024-02-01T00:00:00Z"),
        ];
        let out = truncate_profiles(profiles, &TruncateOptions::default());
        assert_eq!(out[0].content, "new");
    }

    #[test]
    fn prefer_topics_reorders_without_dropping() {
        let profiles = vec![
            profile("a", "x", "a1", "2024-01-01T00:00:00Z"),
            profile("b", "x", "b1", "2024-01-02T00:00:00Z"),
        ];
        let opts = TruncateOptions {
            prefer_topics: Some(vec!["a".into()]),
            ..Default::default()
        };
        let out = truncate_profiles(profiles, &opts);
        assert_eq!(out[0].attributes.topic, "a");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn only_topics_drops_others() {
        let profiles = vec![
            profile("a", "x", "a1", "2024-01-01T00:00:00Z"),
            profile("b", "x", "b1", "2024-01-02T00:00:00Z"),
        ];
        let opts = TruncateOptions {
            only_topics: Some(vec!["b".into()]),
            ..Default::default()
        };
        let out = truncate_profiles(profiles, &opts);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].attributes.topic, "b");
    }

    #[test]
    fn topic_limit_caps_subtopics_per_topic() {
        let profiles = vec![
            profile("a", "x1", "1", "2024-01-03T00:00:00Z"),
            profile("a", "x2", "2", "2024-01-02T00:00:00Z"),
            profile("a", "x3", "3", "2024-01-01T00:00:00Z"),
        ];
        let opts = TruncateOptions {
            max_subtopic_size: Some(2),
            ..Default::default()
        };
        let out = truncate_profiles(profiles, &opts);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn topk_keeps_only_first_k() {
        let profiles = vec![
            profile("a", "x", "1", "2024-01-03T00:00:00Z"),
            profile("b", "x", "2", "2024-01-02T00:00:00Z"),
            profile("c", "x", "3", "2024-01-01T00:00:00Z"),
        ];
        let opts = TruncateOptions {
            topk: Some(1),
            ..Default::default()
        };
        let out = truncate_profiles(profiles, &opts);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].attributes.topic, "a");
    }

    #[test]
    fn token_budget_stops_at_last_fitting_entry() {
        let profiles = vec![
            profile("a", "x", "short", "2024-01-02T00:00:00Z"),
            profile("b", "x", "also a short one", "2024-01-01T00:00:00Z"),
        ];
        let opts = TruncateOptions {
            max_token_size: Some(3),
            ..Default::default()
        };
        let out = truncate_profiles(profiles, &opts);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn empty_input_is_unchanged() {
        let out = truncate_profiles(vec![], &TruncateOptions::default());
        assert!(out.is_empty());
    }
}
