use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use memoria_blob::BlobStore;
use memoria_core::types::{Blob, Scope};
use memoria_kv::DistributedLock;

use crate::error::{BufferError, Result};
use crate::store::BufferStore;
use crate::types::ChatModalResponse;

const LOCK_SCOPE: &str = "insert_blob_to_buffer";

/// Whatever mutates profiles/events from a batch of flushed blobs — the
/// chat-flusher pipeline, in production. Kept as a trait so `memoria-buffer`
/// never depends on `memoria-pipeline`.
#[async_trait::async_trait]
pub trait BlobProcessor: Send + Sync {
    async fn process(
        &self,
        scope: &Scope,
        blob_type: &str,
        blob_ids: &[String],
        blobs: &[Blob],
    ) -> Result<ChatModalResponse>;
}

/// Per (user, project, blob_type) write-behind queue.
pub struct Buffer {
    store: BufferStore,
    blobs: Arc<BlobStore>,
    lock: Arc<dyn DistributedLock>,
    processor: Arc<dyn BlobProcessor>,
    flush_interval_secs: i64,
    max_token_size: i64,
    lock_ttl: Duration,
    lock_max_wait: Duration,
    persistent_chat_blobs: bool,
}

impl Buffer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: BufferStore,
        blobs: Arc<BlobStore>,
        lock: Arc<dyn DistributedLock>,
        processor: Arc<dyn BlobProcessor>,
        flush_interval_secs: i64,
        max_token_size: i64,
        lock_ttl: Duration,
        lock_max_wait: Duration,
        persistent_chat_blobs: bool,
    ) -> Self {
        Self {
            store,
            blobs,
            lock,
            processor,
            flush_interval_secs,
            max_token_size,
            lock_ttl,
            lock_max_wait,
            persistent_chat_blobs,
        }
    }

    /// Idle-check, append, size-check, in that order.
    pub async fn append(
        &self,
        scope: &Scope,
        blob_id: &str,
        blob: &Blob,
    ) -> Result<Vec<ChatModalResponse>> {
        let blob_type = blob.blob_type.to_string();
        let _guard = self
            .lock
            .acquire(
                &format!("{LOCK_SCOPE}:{scope}"),
                self.lock_ttl,
                self.lock_max_wait,
            )
            .await
            .map_err(BufferError::Core)?;

        let mut results = Vec::new();
        if let Some(r) = self.detect_idle(scope, &blob_type).await? {
            results.push(r);
        }

        let token_size = memoria_tokenizer::count_tokens(&blob.as_text()) as i64;
        let created_at = blob
            .created_at
            .clone()
            .unwrap_or_else(memoria_core::time::now_rfc3339);
        self.store.push(scope, blob_id, &blob_type, token_size, &created_at)?;

        if let Some(r) = self.detect_full(scope, &blob_type).await? {
            results.push(r);
        }
        Ok(results)
    }

    /// Public flush entrypoint: acquires the same lock as `append` so a
    /// concurrent insert cannot race a manual flush.
    pub async fn flush(&self, scope: &Scope, blob_type: &str) -> Result<Option<ChatModalResponse>> {
        let _guard = self
            .lock
            .acquire(
                &format!("{LOCK_SCOPE}:{scope}"),
                self.lock_ttl,
                self.lock_max_wait,
            )
            .await
            .map_err(BufferError::Core)?;
        self.flush_locked(scope, blob_type).await
    }

    /// Drops every buffered entry for `scope` across all blob types, no flush.
    /// Used by cascading user deletion.
    pub fn clear_all(&self, scope: &Scope) -> Result<()> {
        self.store.clear_all(scope)
    }

    async fn detect_idle(&self, scope: &Scope, blob_type: &str) -> Result<Option<ChatModalResponse>> {
        let Some(newest) = self.store.newest_created_at(scope, blob_type)? else {
            return Ok(None);
        };
        let age = memoria_core::time::seconds_since(&newest);
        if age > self.flush_interval_secs {
            info!(%scope, blob_type, age, "flushing buffer: idle for too long");
            self.flush_locked(scope, blob_type).await
        } else {
            Ok(None)
        }
    }

    async fn detect_full(&self, scope: &Scope, blob_type: &str) -> Result<Option<ChatModalResponse>> {
        let total = self.store.total_token_size(scope, blob_type)?;
        if total > self.max_token_size {
            info!(%scope, blob_type, total, "flushing buffer: token budget exceeded");
            self.flush_locked(scope, blob_type).await
        } else {
            Ok(None)
        }
    }

    /// Caller must already hold the per-scope lock. Always clears the
    /// buffered entries (and, for non-persistent chat blobs, the blobs
    /// themselves) regardless of whether processing succeeded.
    async fn flush_locked(
        &self,
        scope: &Scope,
        blob_type: &str,
    ) -> Result<Option<ChatModalResponse>> {
        let entries = self.store.list(scope, blob_type)?;
        if entries.is_empty() {
            return Ok(None);
        }
        let blob_ids: Vec<String> = entries.iter().map(|e| e.blob_id.clone()).collect();

        let outcome = self.collect_and_process(scope, blob_type, &blob_ids).await;

        self.store.clear(scope, blob_type)?;
        if blob_type == "chat" && !self.persistent_chat_blobs {
            for id in &blob_ids {
                let _ = self.blobs.delete(scope, id);
            }
        }

        outcome.map(Some)
    }

    async fn collect_and_process(
        &self,
        scope: &Scope,
        blob_type: &str,
        blob_ids: &[String],
    ) -> Result<ChatModalResponse> {
        let mut blobs = Vec::with_capacity(blob_ids.len());
        for id in blob_ids {
            blobs.push(self.blobs.get(scope, id)?);
        }
        self.processor.process(scope, blob_type, blob_ids, &blobs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_core::types::{ChatMessage, ChatRole};
    use memoria_kv::InProcessLock;
    use rusqlite::Connection;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProcessor {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl BlobProcessor for CountingProcessor {
        async fn process(
            &self,
            _scope: &Scope,
            _blob_type: &str,
            blob_ids: &[String],
            _blobs: &[Blob],
        ) -> Result<ChatModalResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BufferError::UnsupportedType("boom".into()));
            }
            Ok(ChatModalResponse {
                event_id: Some("e1".into()),
                add_profiles: blob_ids.to_vec(),
                ..Default::default()
            })
        }
    }

    fn scope() -> Scope {
        Scope::new("u1", "p1")
    }

    fn chat_blob(text: &str) -> Blob {
        Blob::chat(vec![ChatMessage {
            role: ChatRole::User,
            content: text.into(),
            alias: None,
            created_at: None,
        }])
    }

    fn buffer(max_token_size: i64, fail: bool) -> (Buffer, Arc<BlobStore>) {
        let blobs = Arc::new(BlobStore::new(Connection::open_in_memory().unwrap()).unwrap());
        let store = BufferStore::new(Connection::open_in_memory().unwrap()).unwrap();
        let lock: Arc<dyn DistributedLock> = Arc::new(InProcessLock::new());
        let processor: Arc<dyn BlobProcessor> = Arc::new(CountingProcessor {
            calls: AtomicUsize::new(0),
            fail,
        });
        let buf = Buffer::new(
            store,
            blobs.clone(),
            lock,
            processor,
            3600,
            max_token_size,
            Duration::from_secs(1),
            Duration::from_secs(1),
            false,
        );
        (buf, blobs)
    }

    #[tokio::test]
    async fn flush_on_empty_buffer_is_noop() {
        let (buf, _blobs) = buffer(1024, false);
        let result = buf.flush(&scope(), "chat").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn size_trigger_flushes_after_append() {
        let (buf, blobs) = buffer(1, false);
        let blob = chat_blob("a reasonably long message to exceed one token of budget");
        let id = blobs.insert(&scope(), blob.clone()).unwrap();
        let results = buf.append(&scope(), &id, &blob).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].event_id.as_deref(), Some("e1"));
    }

    #[tokio::test]
    async fn buffer_clears_even_when_processing_fails() {
        let (buf, blobs) = buffer(1, true);
        let blob = chat_blob("a reasonably long message to exceed one token of budget");
        let id = blobs.insert(&scope(), blob.clone()).unwrap();
        let err = buf.append(&scope(), &id, &blob).await;
        assert!(err.is_err());
        // buffer must already be empty: a follow-up flush is a no-op
        let second = buf.flush(&scope(), "chat").await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn below_threshold_does_not_flush() {
        let (buf, blobs) = buffer(10_000, false);
        let blob = chat_blob("hi");
        let id = blobs.insert(&scope(), blob.clone()).unwrap();
        let results = buf.append(&scope(), &id, &blob).await.unwrap();
        assert!(results.is_empty());
    }
}
