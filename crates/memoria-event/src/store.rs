use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::error;

use memoria_core::types::Scope;
use memoria_core::{ids, time};

use crate::db;
use crate::embed::{cosine_similarity, EmbedPhase, EventEmbedder};
use crate::error::{EventError, Result};
use crate::types::{event_embedding_str, Event, EventData, EventPatch};

/// Append-only log of summarized events per user, with vector search.
pub struct EventStore {
    db: Mutex<Connection>,
    embedder: Option<Arc<dyn EventEmbedder>>,
    embedding_dim: usize,
}

impl EventStore {
    pub fn new(conn: Connection, embedder: Option<Arc<dyn EventEmbedder>>, embedding_dim: usize) -> Result<Self> {
        db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            embedder,
            embedding_dim,
        })
    }

    /// On embedding failure or a dimension mismatch, stores a null
    /// embedding and continues rather than failing the append.
    pub async fn append(&self, scope: &Scope, event_data: EventData) -> Result<String> {
        let embedding = match &self.embedder {
            Some(embedder) => {
                let text = event_embedding_str(&event_data);
                match embedder.embed(&text, EmbedPhase::Document).await {
                    Ok(vec) if vec.len() == self.embedding_dim => Some(vec),
                    Ok(vec) => {
                        error!(expected = self.embedding_dim, actual = vec.len(), "embedding dimension mismatch, storing null");
                        None
                    }
                    Err(msg) => {
                        error!(error = %msg, "embedding provider failed, storing null");
                        None
                    }
                }
            }
            None => None,
        };

        let id = ids::new_id();
        let now = time::now_rfc3339();
        let event_data_json = serde_json::to_string(&event_data)?;
        let embedding_json = embedding.map(|e| serde_json::to_string(&e)).transpose()?;

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO user_events (id, user_id, project_id, event_data, embedding, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id, scope.user_id, scope.project_id, event_data_json, embedding_json, now],
        )?;
        Ok(id)
    }

    pub fn list(&self, scope: &Scope, topk: u32, need_summary: bool) -> Result<Vec<Event>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, event_data, embedding, created_at, updated_at FROM user_events
             WHERE user_id = ?1 AND project_id = ?2
             ORDER BY created_at DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![scope.user_id, scope.project_id, topk], row_to_event)?;
        let mut events: Vec<Event> = rows.filter_map(|r| r.ok()).collect();
        if need_summary {
            events.retain(|e| e.event_data.event_tip.is_some());
        }
        Ok(events)
    }

    pub fn get(&self, scope: &Scope, event_id: &str) -> Result<Event> {
        let db = self.db.lock().unwrap();
        let row = db
            .query_row(
                "SELECT id, event_data, embedding, created_at, updated_at FROM user_events
                 WHERE id = ?1 AND user_id = ?2 AND project_id = ?3",
                params![event_id, scope.user_id, scope.project_id],
                row_to_event,
            )
            .optional()?;
        row.ok_or_else(|| EventError::NotFound(event_id.to_string()))
    }

    /// Only the fields present (non-null) in `patch` overwrite the stored
    /// event; everything else is left untouched.
    pub fn update(&self, scope: &Scope, event_id: &str, patch: EventPatch) -> Result<()> {
        let mut event = self.get(scope, event_id)?;
        if let Some(delta) = patch.profile_delta {
            event.event_data.profile_delta = delta;
        }
        if let Some(tip) = patch.event_tip {
            event.event_data.event_tip = Some(tip);
        }
        if let Some(tags) = patch.event_tags {
            event.event_data.event_tags = Some(tags);
        }
        let now = time::now_rfc3339();
        let event_data_json = serde_json::to_string(&event.event_data)?;
        let db = self.db.lock().unwrap();
        let changed = db.execute(
            "UPDATE user_events SET event_data = ?1, updated_at = ?2
             WHERE id = ?3 AND user_id = ?4 AND project_id = ?5",
            params![event_data_json, now, event_id, scope.user_id, scope.project_id],
        )?;
        if changed == 0 {
            return Err(EventError::NotFound(event_id.to_string()));
        }
        Ok(())
    }

    pub fn delete(&self, scope: &Scope, event_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let changed = db.execute(
            "DELETE FROM user_events WHERE id = ?1 AND user_id = ?2 AND project_id = ?3",
            params![event_id, scope.user_id, scope.project_id],
        )?;
        if changed == 0 {
            return Err(EventError::NotFound(event_id.to_string()));
        }
        Ok(())
    }

    /// Drops every event for `scope`. Used by user deletion cascade.
    pub fn delete_all(&self, scope: &Scope) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM user_events WHERE user_id = ?1 AND project_id = ?2",
            params![scope.user_id, scope.project_id],
        )?;
        Ok(())
    }

    /// Brute-force cosine search over events within `time_range_in_days`,
    /// sorted by similarity descending.
    pub async fn search(
        &self,
        scope: &Scope,
        query: &str,
        topk: u32,
        similarity_threshold: f32,
        time_range_in_days: i64,
    ) -> Result<Vec<Event>> {
        let embedder = self.embedder.as_ref().ok_or(EventError::EmbeddingDisabled)?;
        let query_embedding = embedder
            .embed(query, EmbedPhase::Query)
            .await
            .map_err(EventError::EmbeddingFailed)?;

        let cutoff = time::now_rfc3339_minus_days(time_range_in_days);
        let mut candidates = {
            let db = self.db.lock().unwrap();
            let mut stmt = db.prepare(
                "SELECT id, event_data, embedding, created_at, updated_at FROM user_events
                 WHERE user_id = ?1 AND project_id = ?2 AND created_at > ?3 AND embedding IS NOT NULL",
            )?;
            let rows = stmt.query_map(params![scope.user_id, scope.project_id, cutoff], row_to_event)?;
            rows.filter_map(|r| r.ok()).collect::<Vec<_>>()
        };

        for event in &mut candidates {
            if let Some(embedding) = &event.embedding {
                event.similarity = Some(cosine_similarity(embedding, &query_embedding));
            }
        }
        candidates.retain(|e| e.similarity.unwrap_or(0.0) > similarity_threshold);
        candidates.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        candidates.truncate(topk as usize);
        Ok(candidates)
    }
}

/// Walks events in the given order, accumulating token counts of the
/// canonical representation, cutting at the last entry still within
/// `max_token_size`.
pub fn truncate_events(events: Vec<Event>, max_token_size: Option<usize>) -> Vec<Event> {
    let Some(max_tokens) = max_token_size else {
        return events;
    };
    let mut current = 0usize;
    let mut keep = 0usize;
    for (i, e) in events.iter().enumerate() {
        current += memoria_tokenizer::count_tokens(&event_embedding_str(&e.event_data));
        if current > max_tokens {
            break;
        }
        keep = i + 1;
    }
    let mut events = events;
    events.truncate(keep);
    events
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let event_data_raw: String = row.get(1)?;
    let embedding_raw: Option<String> = row.get(2)?;
    let event_data: EventData = serde_json::from_str(&event_data_raw).unwrap_or_default();
    let embedding = embedding_raw.and_then(|raw| serde_json::from_str(&raw).ok());
    Ok(Event {
        id: row.get(0)?,
        event_data,
        embedding,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        similarity: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProfileDelta;

    struct StubEmbedder {
        dim: usize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl EventEmbedder for StubEmbedder {
        async fn embed(&self, text: &str, _phase: EmbedPhase) -> std::result::Result<Vec<f32>, String> {
            if self.fail {
                return Err("provider down".into());
            }
            // deterministic pseudo-embedding: seed every dimension off the
            // text's length so different inputs produce different vectors.
            let seed = text.len() as f32;
            Ok((0..self.dim).map(|i| (seed + i as f32).sin()).collect())
        }
    }

    fn scope() -> Scope {
        Scope::new("u1", "p1")
    }

    fn event_data(tip: Option<&str>) -> EventData {
        EventData {
            profile_delta: vec![ProfileDelta {
                content: "likes tea".into(),
                topic: "preferences".into(),
                sub_topic: "drinks".into(),
            }],
            event_tip: tip.map(|s| s.to_string()),
            event_tags: None,
        }
    }

    #[tokio::test]
    async fn append_without_embedder_stores_null_embedding() {
        let store = EventStore::new(Connection::open_in_memory().unwrap(), None, 8).unwrap();
        let id = store.append(&scope(), event_data(None)).await.unwrap();
        let fetched = store.get(&scope(), &id).unwrap();
        assert!(fetched.embedding.is_none());
    }

    #[tokio::test]
    async fn append_embedding_failure_degrades_to_null() {
        let embedder = Arc::new(StubEmbedder { dim: 4, fail: true });
        let store = EventStore::new(Connection::open_in_memory().unwrap(), Some(embedder), 4).unwrap();
        let id = store.append(&scope(), event_data(None)).await.unwrap();
        let fetched = store.get(&scope(), &id).unwrap();
        assert!(fetched.embedding.is_none());
    }

    #[tokio::test]
    async fn search_without_embedder_is_not_implemented() {
        let store = EventStore::new(Connection::open_in_memory().unwrap(), None, 4).unwrap();
        let err = store.search(&scope(), "q", 10, 0.5, 21).await.unwrap_err();
        assert!(matches!(err, EventError::EmbeddingDisabled));
    }

    #[tokio::test]
    async fn update_only_overwrites_present_fields() {
        let store = EventStore::new(Connection::open_in_memory().unwrap(), None, 4).unwrap();
        let id = store.append(&scope(), event_data(Some("tip one"))).await.unwrap();
        store
            .update(
                &scope(),
                &id,
                EventPatch {
                    event_tip: Some("tip two".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        let fetched = store.get(&scope(), &id).unwrap();
        assert_eq!(fetched.event_data.event_tip.as_deref(), Some("tip two"));
        assert_eq!(fetched.event_data.profile_delta.len(), 1);
    }

    #[tokio::test]
    async fn list_need_summary_filters_out_tipless_events() {
        let store = EventStore::new(Connection::open_in_memory().unwrap(), None, 4).unwrap();
        store.append(&scope(), event_data(None)).await.unwrap();
        store.append(&scope(), event_data(Some("has tip"))).await.unwrap();
        let summarized = store.list(&scope(), 10, true).unwrap();
        assert_eq!(summarized.len(), 1);
    }

    #[tokio::test]
    async fn delete_missing_event_is_not_found() {
        let store = EventStore::new(Connection::open_in_memory().unwrap(), None, 4).unwrap();
        let err = store.delete(&scope(), "nope").unwrap_err();
        assert!(matches!(err, EventError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_all_removes_every_event_for_scope() {
        let store = EventStore::new(Connection::open_in_memory().unwrap(), None, 4).unwrap();
        store.append(&scope(), event_data(Some("a"))).await.unwrap();
        store.append(&scope(), event_data(Some("b"))).await.unwrap();
        store.delete_all(&scope()).unwrap();
        assert!(store.list(&scope(), 10, false).unwrap().is_empty());
    }
}
