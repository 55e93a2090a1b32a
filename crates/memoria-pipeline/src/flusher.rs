use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{error, info, warn};

use memoria_core::config::{EffectiveConfig, EventTagSpec, SubTopicSpec, TopicSpec};
use memoria_core::types::{normalize_attr, Blob, BlobType, Scope};
use memoria_event::{EventData, EventStore, EventTag, ProfileDelta};
use memoria_llm::prompts::{entry_summary, event_tagging, extract, merge, organize, parse, re_summary, Language};
use memoria_llm::{CompletionRequest, LlmGateway};
use memoria_profile::{Profile, ProfileAttributes, ProfileStore};

use crate::config::ProjectConfigProvider;
use crate::error::{PipelineError, Result};
use crate::types::{AddProfile, ExtractedFact, MergeResult, UpdateProfile};

const MERGE_TEMPERATURE: f32 = 0.2;

/// The 7-stage pipeline a flushed batch of chat blobs is run through.
/// Implements `memoria_buffer::BlobProcessor` so `Buffer` can invoke
/// it without depending on it.
pub struct ChatFlusher {
    profiles: Arc<ProfileStore>,
    events: Arc<EventStore>,
    llm: Arc<dyn LlmGateway>,
    config_provider: Arc<dyn ProjectConfigProvider>,
    sep: String,
    max_profile_subtopics: usize,
    max_pre_profile_token_size: usize,
    best_llm_model: String,
    summary_llm_model: String,
}

impl ChatFlusher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        profiles: Arc<ProfileStore>,
        events: Arc<EventStore>,
        llm: Arc<dyn LlmGateway>,
        config_provider: Arc<dyn ProjectConfigProvider>,
        sep: impl Into<String>,
        max_profile_subtopics: usize,
        max_pre_profile_token_size: usize,
        best_llm_model: impl Into<String>,
        summary_llm_model: impl Into<String>,
    ) -> Self {
        Self {
            profiles,
            events,
            llm,
            config_provider,
            sep: sep.into(),
            max_profile_subtopics,
            max_pre_profile_token_size,
            best_llm_model: best_llm_model.into(),
            summary_llm_model: summary_llm_model.into(),
        }
    }

    /// Entry point, equivalent to `process_blobs`. Returns the same report
    /// shape `Buffer` threads back up through `flush`/`append`.
    pub async fn flush_captured(
        &self,
        scope: &Scope,
        blobs: &[Blob],
    ) -> Result<memoria_buffer::ChatModalResponse> {
        for b in blobs {
            if b.blob_type != BlobType::Chat {
                return Err(PipelineError::UnsupportedBlobType(b.blob_type.to_string()));
            }
        }

        let effective = self.config_provider.resolve(&scope.project_id).await?;
        let lang = Language::parse(&effective.language);

        // Stage 1
        let entry_summary_text = self.stage1_entry_summary(scope, &effective, lang, blobs).await?;

        // Stage 2
        let existing_profiles = self.profiles.list(scope)?;
        let facts = self
            .stage2_extract(scope, &effective, lang, &entry_summary_text, &existing_profiles)
            .await?;

        if facts.is_empty() {
            info!(%scope, "no new facts extracted, nothing to merge");
        }

        // Stage 3
        let mut merge_result = self
            .stage3_merge(scope, &effective, lang, &facts, &existing_profiles)
            .await?;
        merge_result.before_profiles = existing_profiles;

        // Stage 4 — happens strictly before Stage 5's profile rewrites, so
        // it records the pre-organize deltas.
        let event_id = self
            .stage4_emit_event(scope, &effective, lang, &entry_summary_text, &merge_result)
            .await;

        // Stage 5 (soft-fail: log and continue with Stage 3's results).
        if let Err(e) = self.stage5_organize(scope, &effective, &mut merge_result).await {
            error!(%scope, error = %e, "failed to organize profiles");
        }

        // Stage 6 (soft-fail per memo: keep the oversized one).
        self.stage6_re_summarize(scope, lang, &mut merge_result).await;

        // Stage 7
        let response = self.stage7_persist(scope, event_id, merge_result).await?;
        Ok(response)
    }

    async fn stage1_entry_summary(
        &self,
        scope: &Scope,
        effective: &EffectiveConfig,
        lang: Language,
        blobs: &[Blob],
    ) -> Result<String> {
        let transcript = blobs.iter().map(|b| b.as_text()).collect::<Vec<_>>().join("\n");
        let profile_topics_str = render_topics(&effective.topics);
        let event_tags_str = render_event_tags(&effective.event_tags);
        let (system, user) = entry_summary::build(lang, &profile_topics_str, &event_tags_str, &transcript);
        let req = CompletionRequest::new(scope.project_id.clone(), user)
            .with_system(system)
            .with_model(self.summary_llm_model.clone())
            .with_temperature(MERGE_TEMPERATURE);
        let outcome = self.llm.complete(req).await.map_err(PipelineError::Llm)?;
        Ok(outcome.text)
    }

    async fn stage2_extract(
        &self,
        scope: &Scope,
        effective: &EffectiveConfig,
        lang: Language,
        entry_summary_text: &str,
        existing_profiles: &[Profile],
    ) -> Result<Vec<ExtractedFact>> {
        let allowed_set = allowed_topic_pairs(&effective.topics);
        let allowed_topics_str = render_topics(&effective.topics);

        let mut already: HashSet<(String, String)> = existing_profiles
            .iter()
            .map(|p| (p.attributes.topic.clone(), p.attributes.sub_topic.clone()))
            .collect();
        if effective.strict_mode {
            already.retain(|k| allowed_set.contains(k));
        }
        let mut already_sorted: Vec<_> = already.into_iter().collect();
        already_sorted.sort();
        let already_used_str = already_sorted
            .iter()
            .map(|(t, s)| format!("- {t}{}{s}", self.sep))
            .collect::<Vec<_>>()
            .join("\n");

        let (system, user) = extract::build(
            lang,
            &allowed_topics_str,
            &already_used_str,
            entry_summary_text,
            effective.strict_mode,
            &self.sep,
        );
        let req = CompletionRequest::new(scope.project_id.clone(), user)
            .with_system(system)
            .with_temperature(MERGE_TEMPERATURE);
        let outcome = self.llm.complete(req).await.map_err(PipelineError::Llm)?;

        let raw = parse::parse_lines(&outcome.text, &self.sep, 3);
        if raw.is_empty() {
            info!(%scope, "no new facts extracted");
            return Ok(Vec::new());
        }

        // Drop meaningless lines first, then dedup by (topic, sub_topic),
        // appending surviving memos with "; " — insertion order preserved.
        let mut order: Vec<(String, String)> = Vec::new();
        let mut merged: HashMap<(String, String), String> = HashMap::new();
        for parts in raw {
            if parse::is_meaningless_memo(&parts[2]) {
                continue;
            }
            let topic = normalize_attr(&parts[0]);
            let sub_topic = normalize_attr(&parts[1]);
            let memo = parts[2].clone();
            let key = (topic, sub_topic);
            match merged.get_mut(&key) {
                Some(existing) => existing.push_str(&format!("; {memo}")),
                None => {
                    merged.insert(key.clone(), memo);
                    order.push(key);
                }
            }
        }

        let mut facts = Vec::new();
        for key in order {
            if effective.strict_mode && !allowed_set.contains(&key) {
                continue;
            }
            let memo = &merged[&key];
            facts.push(ExtractedFact {
                topic: key.0,
                sub_topic: key.1,
                memo: memo.clone(),
            });
        }
        Ok(facts)
    }

    async fn stage3_merge(
        &self,
        scope: &Scope,
        effective: &EffectiveConfig,
        lang: Language,
        facts: &[ExtractedFact],
        existing_profiles: &[Profile],
    ) -> Result<MergeResult> {
        let runtime_map: HashMap<(String, String), &Profile> = existing_profiles
            .iter()
            .map(|p| ((p.attributes.topic.clone(), p.attributes.sub_topic.clone()), p))
            .collect();

        let tasks = facts.iter().map(|fact| {
            self.merge_one(scope, effective, lang, fact, runtime_map.get(&(fact.topic.clone(), fact.sub_topic.clone())).copied())
        });
        let outcomes: Vec<Result<MergeOutcome>> = futures_util::future::join_all(tasks).await;

        let mut result = MergeResult::default();
        for outcome in outcomes {
            match outcome? {
                MergeOutcome::Add(add) => result.add.push(add),
                MergeOutcome::UpdateWithDelta(update, delta) => {
                    result.update.push(update);
                    result.update_delta.push(delta);
                }
                MergeOutcome::Delete(id) => result.delete.push(id),
                MergeOutcome::Noop => {}
            }
        }
        Ok(result)
    }

    async fn merge_one(
        &self,
        scope: &Scope,
        effective: &EffectiveConfig,
        lang: Language,
        fact: &ExtractedFact,
        runtime_profile: Option<&Profile>,
    ) -> Result<MergeOutcome> {
        let define = find_subtopic_spec(&effective.topics, &fact.topic, &fact.sub_topic);
        let needs_validation = effective.validate_mode
            || define.and_then(|d| d.validate_value).unwrap_or(false)
            || runtime_profile.is_some();

        if !needs_validation {
            return Ok(MergeOutcome::Add(AddProfile {
                content: fact.memo.clone(),
                attributes: ProfileAttributes::new(&fact.topic, &fact.sub_topic),
            }));
        }

        let (system, user) = merge::build(
            lang,
            &fact.topic,
            &fact.sub_topic,
            runtime_profile.map(|p| p.content.as_str()),
            &fact.memo,
            define.and_then(|d| d.update_description.as_deref()),
            define.and_then(|d| d.description.as_deref()),
            &self.sep,
        );
        let req = CompletionRequest::new(scope.project_id.clone(), user)
            .with_system(system)
            .with_temperature(MERGE_TEMPERATURE);
        let outcome = self.llm.complete(req).await.map_err(PipelineError::Llm)?;

        let Some(parsed) = parse::parse_single_line(&outcome.text, &self.sep, 2) else {
            warn!(%scope, raw = %outcome.text, "failed to parse merge action");
            return Err(PipelineError::MergeParseFailed(outcome.text));
        };
        let action = parsed[0].to_uppercase();
        let memo = parsed[1].clone();

        match (action.as_str(), runtime_profile) {
            ("UPDATE", None) => Ok(MergeOutcome::Add(AddProfile {
                content: memo,
                attributes: ProfileAttributes::new(&fact.topic, &fact.sub_topic),
            })),
            ("UPDATE", Some(existing)) => {
                let update_hits = existing.attributes.update_hits.unwrap_or(0) + 1;
                Ok(MergeOutcome::UpdateWithDelta(
                    UpdateProfile {
                        profile_id: existing.id.clone(),
                        content: memo,
                        attributes: ProfileAttributes {
                            topic: existing.attributes.topic.clone(),
                            sub_topic: existing.attributes.sub_topic.clone(),
                            update_hits: Some(update_hits),
                        },
                    },
                    AddProfile {
                        content: fact.memo.clone(),
                        attributes: ProfileAttributes::new(&fact.topic, &fact.sub_topic),
                    },
                ))
            }
            ("ABORT", Some(existing)) => {
                info!(%scope, topic = %fact.topic, sub_topic = %fact.sub_topic, "merge aborted, deleting existing profile");
                Ok(MergeOutcome::Delete(existing.id.clone()))
            }
            ("ABORT", None) => Ok(MergeOutcome::Noop),
            (other, _) => Err(PipelineError::MergeParseFailed(format!("unknown action {other}"))),
        }
    }

    async fn stage4_emit_event(
        &self,
        scope: &Scope,
        effective: &EffectiveConfig,
        lang: Language,
        entry_summary_text: &str,
        merge_result: &MergeResult,
    ) -> Option<String> {
        let deltas: Vec<&AddProfile> = merge_result.add.iter().chain(merge_result.update_delta.iter()).collect();
        if deltas.is_empty() {
            return None;
        }

        let event_tags = self.tag_event(scope, effective, lang, entry_summary_text).await;
        let profile_delta: Vec<ProfileDelta> = deltas
            .into_iter()
            .map(|a| ProfileDelta {
                content: a.content.clone(),
                topic: a.attributes.topic.clone(),
                sub_topic: a.attributes.sub_topic.clone(),
            })
            .collect();

        let event_data = EventData {
            profile_delta,
            event_tip: Some(entry_summary_text.to_string()),
            event_tags,
        };
        match self.events.append(scope, event_data).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!(%scope, error = %e, "failed to append event");
                None
            }
        }
    }

    async fn tag_event(
        &self,
        scope: &Scope,
        effective: &EffectiveConfig,
        lang: Language,
        event_tip: &str,
    ) -> Option<Vec<EventTag>> {
        if effective.event_tags.is_empty() {
            return None;
        }
        let event_tags_str = render_event_tags(&effective.event_tags);
        let (system, user) = event_tagging::build(lang, &event_tags_str, event_tip, &self.sep);
        let req = CompletionRequest::new(scope.project_id.clone(), user)
            .with_system(system)
            .with_model(self.best_llm_model.clone())
            .with_temperature(MERGE_TEMPERATURE);
        let outcome = match self.llm.complete(req).await {
            Ok(o) => o,
            Err(e) => {
                warn!(%scope, error = %e, "failed to tag event");
                return None;
            }
        };
        let allowed: HashSet<String> = effective.event_tags.iter().map(|t| normalize_attr(&t.name)).collect();
        let tags: Vec<EventTag> = parse::parse_lines(&outcome.text, &self.sep, 2)
            .into_iter()
            .filter_map(|parts| {
                let tag = normalize_attr(&parts[0]);
                if allowed.contains(&tag) {
                    Some(EventTag { tag, value: parts[1].clone() })
                } else {
                    None
                }
            })
            .collect();
        Some(tags)
    }

    async fn stage5_organize(
        &self,
        scope: &Scope,
        effective: &EffectiveConfig,
        merge_result: &mut MergeResult,
    ) -> Result<()> {
        let mut topic_groups: HashMap<String, Vec<&Profile>> = HashMap::new();
        for p in &merge_result.before_profiles {
            topic_groups.entry(p.attributes.topic.clone()).or_default().push(p);
        }
        let overgrown: Vec<(String, Vec<&Profile>)> = topic_groups
            .into_iter()
            .filter(|(_, group)| group.len() > self.max_profile_subtopics)
            .collect();
        if overgrown.is_empty() {
            return Ok(());
        }

        let tasks = overgrown
            .iter()
            .map(|(topic, group)| self.organize_one_topic(scope, effective, topic, group));
        let results: Vec<Result<Vec<AddProfile>>> = futures_util::future::join_all(tasks).await;

        let mut new_profiles = Vec::new();
        let mut delete_ids = Vec::new();
        for (outcome, (_, group)) in results.into_iter().zip(overgrown.iter()) {
            let reorganized = outcome?;
            delete_ids.extend(group.iter().map(|p| p.id.clone()));
            new_profiles.extend(reorganized);
        }

        merge_result.add.extend(new_profiles);
        dedupe_adds(&mut merge_result.add);
        merge_result.delete.extend(delete_ids);
        Ok(())
    }

    async fn organize_one_topic(
        &self,
        scope: &Scope,
        effective: &EffectiveConfig,
        topic: &str,
        group: &[&Profile],
    ) -> Result<Vec<AddProfile>> {
        let suggested: Vec<String> = find_topic_spec(&effective.topics, topic)
            .map(|t| t.sub_topics.iter().map(|st| st.name.clone()).collect())
            .unwrap_or_default();
        let entries: Vec<(String, String)> = group
            .iter()
            .map(|p| (p.attributes.sub_topic.clone(), p.content.clone()))
            .collect();
        let cap = self.max_profile_subtopics / 2 + 1;

        let (system, user) = organize::build(topic, &entries, &suggested, cap, &self.sep);
        let req = CompletionRequest::new(scope.project_id.clone(), user)
            .with_system(system)
            .with_temperature(MERGE_TEMPERATURE);
        let outcome = self.llm.complete(req).await.map_err(PipelineError::Llm)?;

        let mut reorganized: Vec<AddProfile> = parse::parse_lines(&outcome.text, &self.sep, 2)
            .into_iter()
            .map(|parts| AddProfile {
                content: parts[1].clone(),
                attributes: ProfileAttributes::new(topic, &parts[0]),
            })
            .collect();
        if reorganized.is_empty() {
            return Err(PipelineError::MergeParseFailed(format!(
                "organize returned zero profiles for topic {topic}"
            )));
        }
        reorganized.truncate(cap);
        Ok(reorganized)
    }

    async fn stage6_re_summarize(&self, scope: &Scope, lang: Language, merge_result: &mut MergeResult) {
        for add in &mut merge_result.add {
            self.re_summarize_one(scope, lang, &mut add.content).await;
        }
        for update in &mut merge_result.update {
            self.re_summarize_one(scope, lang, &mut update.content).await;
        }
    }

    async fn re_summarize_one(&self, scope: &Scope, lang: Language, content: &mut String) {
        if memoria_tokenizer::count_tokens(content) <= self.max_pre_profile_token_size {
            return;
        }
        let (system, user) = re_summary::build(lang, content);
        let req = CompletionRequest::new(scope.project_id.clone(), user)
            .with_system(system)
            .with_model(self.summary_llm_model.clone())
            .with_temperature(MERGE_TEMPERATURE);
        match self.llm.complete(req).await {
            Ok(outcome) => {
                *content = memoria_tokenizer::truncate_to_tokens(&outcome.text, self.max_pre_profile_token_size / 2);
            }
            Err(e) => {
                warn!(%scope, error = %e, "failed to re-summarize oversized memo, keeping it as-is");
            }
        }
    }

    async fn stage7_persist(
        &self,
        scope: &Scope,
        event_id: Option<String>,
        merge_result: MergeResult,
    ) -> Result<memoria_buffer::ChatModalResponse> {
        let add_ids = if merge_result.add.is_empty() {
            Vec::new()
        } else {
            let entries = merge_result.add.into_iter().map(|a| (a.content, a.attributes)).collect();
            self.profiles.add_many(scope, entries)?
        };

        let update_ids = if merge_result.update.is_empty() {
            Vec::new()
        } else {
            let entries = merge_result
                .update
                .into_iter()
                .map(|u| (u.profile_id, u.content, Some(u.attributes)))
                .collect();
            self.profiles.update_many(scope, entries)?
        };

        let delete_ids = if merge_result.delete.is_empty() {
            Vec::new()
        } else {
            self.profiles.delete_many(scope, &merge_result.delete)?
        };

        Ok(memoria_buffer::ChatModalResponse {
            event_id,
            add_profiles: add_ids,
            update_profiles: update_ids,
            delete_profiles: delete_ids,
        })
    }
}

enum MergeOutcome {
    Add(AddProfile),
    UpdateWithDelta(UpdateProfile, AddProfile),
    Delete(String),
    Noop,
}

fn allowed_topic_pairs(topics: &[TopicSpec]) -> HashSet<(String, String)> {
    topics
        .iter()
        .flat_map(|t| {
            let topic = normalize_attr(&t.topic);
            t.sub_topics.iter().map(move |st| (topic.clone(), normalize_attr(&st.name)))
        })
        .collect()
}

fn find_topic_spec<'a>(topics: &'a [TopicSpec], topic: &str) -> Option<&'a TopicSpec> {
    topics.iter().find(|t| normalize_attr(&t.topic) == topic)
}

fn find_subtopic_spec<'a>(topics: &'a [TopicSpec], topic: &str, sub_topic: &str) -> Option<&'a SubTopicSpec> {
    find_topic_spec(topics, topic)?.sub_topics.iter().find(|st| normalize_attr(&st.name) == sub_topic)
}

fn render_topics(topics: &[TopicSpec]) -> String {
    topics
        .iter()
        .flat_map(|t| {
            t.sub_topics.iter().map(move |st| {
                let desc = st.description.as_deref().unwrap_or("");
                if desc.is_empty() {
                    format!("- {}::{}", t.topic, st.name)
                } else {
                    format!("- {}::{}: {desc}", t.topic, st.name)
                }
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_event_tags(tags: &[EventTagSpec]) -> String {
    tags.iter()
        .map(|t| format!("- {}({})", t.name, t.description.clone().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Merges adds by `(topic, sub_topic)`, appending content with `"; "` on
/// collision — applied after Stage 5 extends the add list with reorganized
/// profiles.
fn dedupe_adds(adds: &mut Vec<AddProfile>) {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut merged: HashMap<(String, String), AddProfile> = HashMap::new();
    for add in adds.drain(..) {
        let key = (add.attributes.topic.clone(), add.attributes.sub_topic.clone());
        match merged.get_mut(&key) {
            Some(existing) => existing.content.push_str(&format!("; {}", add.content)),
            None => {
                order.push(key.clone());
                merged.insert(key, add);
            }
        }
    }
    for key in order {
        adds.push(merged.remove(&key).expect("key was just inserted"));
    }
}

#[async_trait::async_trait]
impl memoria_buffer::BlobProcessor for ChatFlusher {
    async fn process(
        &self,
        scope: &Scope,
        _blob_type: &str,
        _blob_ids: &[String],
        blobs: &[Blob],
    ) -> memoria_buffer::Result<memoria_buffer::ChatModalResponse> {
        self.flush_captured(scope, blobs)
            .await
            .map_err(|e| memoria_buffer::BufferError::Core(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_core::config::SubTopicSpec;
    use memoria_core::types::{ChatMessage, ChatRole};
    use memoria_kv::InProcessCache;
    use memoria_llm::StubLlmGateway;
    use rusqlite::Connection;
    use std::time::Duration;

    fn scope() -> Scope {
        Scope::new("u1", "p1")
    }

    fn chat_blobs(text: &str) -> Vec<Blob> {
        vec![Blob::chat(vec![ChatMessage {
            role: ChatRole::User,
            content: text.into(),
            alias: None,
            created_at: None,
        }])]
    }

    fn basic_info_topics() -> Vec<TopicSpec> {
        vec![TopicSpec {
            topic: "basic_info".into(),
            description: None,
            sub_topics: vec![SubTopicSpec::new("name")],
        }]
    }

    fn effective(topics: Vec<TopicSpec>, event_tags: Vec<EventTagSpec>) -> EffectiveConfig {
        EffectiveConfig {
            language: "en".into(),
            strict_mode: false,
            validate_mode: false,
            topics,
            event_tags,
            enable_event_summary: false,
        }
    }

    fn flusher(llm: Arc<StubLlmGateway>, config: EffectiveConfig) -> (ChatFlusher, Arc<ProfileStore>, Arc<EventStore>) {
        let profiles = Arc::new(
            ProfileStore::new(Connection::open_in_memory().unwrap(), Arc::new(InProcessCache::new()), Duration::from_secs(1200))
                .unwrap(),
        );
        let events = Arc::new(EventStore::new(Connection::open_in_memory().unwrap(), None, 8).unwrap());
        let provider = Arc::new(StaticConfigProvider(config));
        let chat_flusher = ChatFlusher::new(
            profiles.clone(),
            events.clone(),
            llm,
            provider,
            "::",
            15,
            128,
            "gpt-4o-mini",
            "gpt-4o-mini",
        );
        (chat_flusher, profiles, events)
    }

    #[tokio::test]
    async fn s1_first_time_ingest_adds_profile_and_event() {
        let llm = Arc::new(StubLlmGateway::new());
        llm.push_completion("[now] user: Hello, I'm Gus");
        llm.push_completion("- basic_info::name::Gus");
        llm.push_completion("- emotion::happy");

        let config = effective(
            basic_info_topics(),
            vec![EventTagSpec { name: "emotion".into(), description: None }],
        );
        let (flusher, profiles, events) = flusher(llm, config);

        let response = flusher.flush_captured(&scope(), &chat_blobs("Hello, I'm Gus")).await.unwrap();
        assert_eq!(response.add_profiles.len(), 1);
        assert!(response.event_id.is_some());

        let stored = profiles.list(&scope()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "Gus");
        assert_eq!(stored[0].attributes.topic, "basic_info");
        assert_eq!(stored[0].attributes.sub_topic, "name");

        let event = events.get(&scope(), response.event_id.as_ref().unwrap()).unwrap();
        assert_eq!(event.event_data.event_tags.as_ref().unwrap()[0].tag, "emotion");
        assert_eq!(event.event_data.profile_delta.len(), 1);
    }

    #[tokio::test]
    async fn s2_idempotent_flush_with_no_new_facts_is_a_noop() {
        let llm = Arc::new(StubLlmGateway::new());
        llm.push_completion("nothing new happened");
        llm.push_completion(""); // extract returns no bullet lines

        let config = effective(basic_info_topics(), vec![]);
        let (flusher, profiles, events) = flusher(llm, config);

        let response = flusher.flush_captured(&scope(), &chat_blobs("...")).await.unwrap();
        assert!(response.add_profiles.is_empty());
        assert!(response.event_id.is_none());
        assert!(profiles.list(&scope()).unwrap().is_empty());
        assert!(events.list(&scope(), 10, false).unwrap().is_empty());
    }

    #[tokio::test]
    async fn s3_merge_update_keeps_same_profile_id_and_bumps_update_hits() {
        let llm = Arc::new(StubLlmGateway::new());
        llm.push_completion("Gus said he's Gus");
        llm.push_completion("- basic_info::name::Gus");
        let config = effective(basic_info_topics(), vec![]);
        let (flusher, profiles, events) = flusher(llm, config.clone());
        flusher.flush_captured(&scope(), &chat_blobs("Hello, I'm Gus")).await.unwrap();
        let first_id = profiles.list(&scope()).unwrap()[0].id.clone();

        let llm2 = Arc::new(StubLlmGateway::new());
        llm2.push_completion("Actually I'm Augustus");
        llm2.push_completion("- basic_info::name::Augustus");
        llm2.push_completion("- UPDATE::Augustus");
        let flusher2 = ChatFlusher::new(
            profiles.clone(),
            events.clone(),
            llm2,
            Arc::new(StaticConfigProvider(config)),
            "::",
            15,
            128,
            "gpt-4o-mini",
            "gpt-4o-mini",
        );
        let response = flusher2.flush_captured(&scope(), &chat_blobs("Actually I'm Augustus")).await.unwrap();
        assert_eq!(response.update_profiles, vec![first_id.clone()]);

        let stored = profiles.list(&scope()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, first_id);
        assert_eq!(stored[0].content, "Augustus");
        assert_eq!(stored[0].attributes.update_hits, Some(1));
    }

    #[tokio::test]
    async fn s4_validate_mode_abort_adds_nothing_and_emits_no_event() {
        let llm = Arc::new(StubLlmGateway::new());
        llm.push_completion("I'll play games next weekend");
        llm.push_completion("- study::goal::play games");
        llm.push_completion("- ABORT::invalid");

        let topics = vec![TopicSpec {
            topic: "study".into(),
            description: None,
            sub_topics: vec![SubTopicSpec::new("goal")],
        }];
        let mut config = effective(topics, vec![]);
        config.validate_mode = true;
        let (flusher, profiles, events) = flusher(llm, config);

        let response = flusher
            .flush_captured(&scope(), &chat_blobs("I'll play games next weekend"))
            .await
            .unwrap();
        assert!(response.add_profiles.is_empty());
        assert!(response.event_id.is_none());
        assert!(profiles.list(&scope()).unwrap().is_empty());
        assert!(events.list(&scope(), 10, false).unwrap().is_empty());
    }

    #[tokio::test]
    async fn s5_organize_overflow_replaces_overgrown_topic() {
        let llm = Arc::new(StubLlmGateway::new());
        llm.push_completion("trivial chat, nothing notable");
        llm.push_completion(""); // extract: no new facts
        llm.push_completion(
            "- one::memo one\n- two::memo two\n- three::memo three\n- four::memo four\n\
             - five::memo five\n- six::memo six\n- seven::memo seven\n- eight::memo eight",
        );

        let config = effective(vec![], vec![]);
        let (flusher, profiles, _events) = flusher(llm, config);

        let seed: Vec<(String, ProfileAttributes)> = (0..16)
            .map(|i| (format!("memo {i}"), ProfileAttributes::new("interest", format!("sub_{i}"))))
            .collect();
        profiles.add_many(&scope(), seed).unwrap();
        assert_eq!(profiles.list(&scope()).unwrap().len(), 16);

        let response = flusher.flush_captured(&scope(), &chat_blobs("hi")).await.unwrap();
        assert_eq!(response.delete_profiles.len(), 16);
        assert_eq!(response.add_profiles.len(), 8);

        let stored = profiles.list(&scope()).unwrap();
        assert_eq!(stored.len(), 8);
        let mut keys: Vec<(String, String)> =
            stored.iter().map(|p| (p.attributes.topic.clone(), p.attributes.sub_topic.clone())).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 8);
    }
}
