use std::sync::Arc;

use memoria_core::types::Scope;
use memoria_event::{truncate_events, EventStore};
use memoria_llm::prompts::{parse, pick_related_profiles, Language};
use memoria_llm::{CompletionRequest, LlmGateway};
use memoria_profile::{truncate_profiles, Profile, ProfileStore};

use crate::error::{ContextError, Result};
use crate::types::{AssembledContext, ChatTailMessage, ContextRequest};

/// Default similarity threshold for the event search step.
const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.3;
/// Fixed topk for both the event search and event listing fallback.
const EVENT_TOPK: u32 = 20;
/// Fixed search window, matching the rest of the spec's day-scoped search defaults.
const EVENT_SEARCH_DAYS: i64 = 3650;
/// Cap on how many profiles `pick_related_profiles` may select.
const MAX_FILTER_NUM: usize = 30;

/// Assembles a prompt-ready context string from profiles + events under a
/// token budget.
pub struct ContextAssembler {
    profiles: Arc<ProfileStore>,
    events: Arc<EventStore>,
    llm: Arc<dyn LlmGateway>,
    embeddings_enabled: bool,
}

impl ContextAssembler {
    pub fn new(
        profiles: Arc<ProfileStore>,
        events: Arc<EventStore>,
        llm: Arc<dyn LlmGateway>,
        embeddings_enabled: bool,
    ) -> Self {
        Self {
            profiles,
            events,
            llm,
            embeddings_enabled,
        }
    }

    pub async fn assemble(&self, scope: &Scope, lang: Language, req: &ContextRequest) -> Result<AssembledContext> {
        if !(0.0..=1.0).contains(&req.profile_event_ratio) || req.profile_event_ratio <= 0.0 {
            return Err(ContextError::InvalidRatio(req.profile_event_ratio));
        }

        // 1. profile token budget.
        let t_profile = (req.max_token_size as f64 * req.profile_event_ratio).floor() as usize;

        // 2. read profiles, optionally filtered by an LLM pick step.
        let all_profiles = self.profiles.list(scope)?;
        let candidates = match &req.chat_tail {
            Some(tail) if !tail.is_empty() => {
                self.pick_related(scope, lang, tail, &all_profiles).await?
            }
            _ => all_profiles,
        };

        // 3. truncate profiles to the profile budget and render.
        let mut truncate_opts = req.truncate.clone();
        truncate_opts.max_token_size = Some(t_profile);
        let kept_profiles = truncate_profiles(candidates, &truncate_opts);
        let profile_section = render_profiles(&kept_profiles);
        let profile_token_count = memoria_tokenizer::count_tokens(&profile_section);

        // 4. remaining budget for events.
        if req.max_token_size <= profile_token_count {
            let text = memoria_llm::prompts::context::wrap(lang, &profile_section, "");
            return Ok(AssembledContext {
                text,
                profile_token_count,
                event_token_count: 0,
            });
        }
        let t_event = req.max_token_size - profile_token_count;

        // 5. search-or-list events, then truncate to the event budget.
        let last_user_message = req
            .chat_tail
            .as_deref()
            .unwrap_or_default()
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str());

        let events = match (self.embeddings_enabled, last_user_message) {
            (true, Some(query)) => self
                .events
                .search(scope, query, EVENT_TOPK, DEFAULT_SIMILARITY_THRESHOLD, EVENT_SEARCH_DAYS)
                .await?,
            _ => self.events.list(scope, EVENT_TOPK, false)?,
        };
        let kept_events = truncate_events(events, Some(t_event));
        let event_section = render_events(&kept_events);
        let event_token_count = memoria_tokenizer::count_tokens(&event_section);

        // 6. assemble final string.
        let text = memoria_llm::prompts::context::wrap(lang, &profile_section, &event_section);
        Ok(AssembledContext {
            text,
            profile_token_count,
            event_token_count,
        })
    }

    async fn pick_related(
        &self,
        scope: &Scope,
        lang: Language,
        tail: &[ChatTailMessage],
        profiles: &[Profile],
    ) -> Result<Vec<Profile>> {
        if profiles.is_empty() {
            return Ok(Vec::new());
        }
        let query = tail
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let candidates: Vec<(String, String, String)> = profiles
            .iter()
            .map(|p| (p.attributes.topic.clone(), p.attributes.sub_topic.clone(), p.content.clone()))
            .collect();

        let sep = "::";
        let (system, user) = pick_related_profiles::build(lang, &query, &candidates, sep);
        let req = CompletionRequest::new(scope.project_id.clone(), user).with_system(system);
        let outcome = match self.llm.complete(req).await {
            Ok(o) => o,
            Err(_) => return Ok(profiles.to_vec()),
        };

        let picked: std::collections::HashSet<(String, String)> = parse::parse_lines(&outcome.text, sep, 2)
            .into_iter()
            .map(|parts| (memoria_core::types::normalize_attr(&parts[0]), memoria_core::types::normalize_attr(&parts[1])))
            .collect();
        if picked.is_empty() {
            return Ok(profiles.to_vec());
        }
        let mut selected: Vec<Profile> = profiles
            .iter()
            .filter(|p| picked.contains(&(p.attributes.topic.clone(), p.attributes.sub_topic.clone())))
            .cloned()
            .collect();
        selected.truncate(MAX_FILTER_NUM);
        Ok(selected)
    }
}

fn render_profiles(profiles: &[Profile]) -> String {
    profiles
        .iter()
        .map(|p| format!("- {}::{}: {}", p.attributes.topic, p.attributes.sub_topic, p.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_events(events: &[memoria_event::Event]) -> String {
    events.iter().map(|e| event_str_repr(&e.event_data)).collect::<Vec<_>>().join("\n---\n")
}

/// Mirrors the event_tip-led rendering used by the original context
/// builder: tip + tags when a tip was recorded, else the profile delta
/// lines. Distinct from `event_embedding_str`, which always folds in both.
fn event_str_repr(data: &memoria_event::EventData) -> String {
    match &data.event_tip {
        Some(tip) => {
            let tags = data
                .event_tags
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|t| format!("- {}: {}", t.tag, t.value))
                .collect::<Vec<_>>()
                .join("\n");
            format!("{tip}\n{tags}")
        }
        None => data
            .profile_delta
            .iter()
            .map(|d| format!("- {}::{}: {}", d.topic, d.sub_topic, d.content))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_event::EventData;
    use memoria_kv::InProcessCache;
    use memoria_llm::StubLlmGateway;
    use memoria_profile::ProfileAttributes;
    use rusqlite::Connection;
    use std::time::Duration;

    fn scope() -> Scope {
        Scope::new("u1", "p1")
    }

    fn assembler(llm: Arc<StubLlmGateway>, embeddings_enabled: bool) -> (ContextAssembler, Arc<ProfileStore>, Arc<EventStore>) {
        let profiles = Arc::new(
            ProfileStore::new(Connection::open_in_memory().unwrap(), Arc::new(InProcessCache::new()), Duration::from_secs(1200))
                .unwrap(),
        );
        let events = Arc::new(EventStore::new(Connection::open_in_memory().unwrap(), None, 8).unwrap());
        let assembler = ContextAssembler::new(profiles.clone(), events.clone(), llm, embeddings_enabled);
        (assembler, profiles, events)
    }

    #[tokio::test]
    async fn assembles_profiles_and_events_under_budget() {
        let llm = Arc::new(StubLlmGateway::new());
        let (assembler, profiles, events) = assembler(llm, false);
        profiles.add(&scope(), "likes tea", "preferences", "drinks").unwrap();
        profiles.add(&scope(), "Gus", "basic_info", "name").unwrap();
        events
            .append(
                &scope(),
                EventData {
                    profile_delta: vec![],
                    event_tip: Some("met for coffee".into()),
                    event_tags: None,
                },
            )
            .await
            .unwrap();

        let req = ContextRequest {
            max_token_size: 200,
            profile_event_ratio: 0.6,
            ..Default::default()
        };
        let out = assembler.assemble(&scope(), Language::En, &req).await.unwrap();
        assert!(out.text.starts_with("<memory>"));
        assert!(out.text.contains("basic_info::name: Gus"));
        assert!(out.text.contains("met for coffee"));
    }

    #[tokio::test]
    async fn zero_budget_after_profiles_returns_profile_only_context() {
        let llm = Arc::new(StubLlmGateway::new());
        let (assembler, profiles, _events) = assembler(llm, false);
        profiles.add(&scope(), "Gus", "basic_info", "name").unwrap();

        let req = ContextRequest {
            max_token_size: 1,
            profile_event_ratio: 1.0,
            ..Default::default()
        };
        let out = assembler.assemble(&scope(), Language::En, &req).await.unwrap();
        assert_eq!(out.event_token_count, 0);
    }

    #[tokio::test]
    async fn invalid_ratio_is_rejected() {
        let llm = Arc::new(StubLlmGateway::new());
        let (assembler, _profiles, _events) = assembler(llm, false);
        let req = ContextRequest {
            profile_event_ratio: 0.0,
            ..Default::default()
        };
        let err = assembler.assemble(&scope(), Language::En, &req).await.unwrap_err();
        assert!(matches!(err, ContextError::InvalidRatio(_)));
    }
}
