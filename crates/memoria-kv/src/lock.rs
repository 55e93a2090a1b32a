use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use memoria_core::error::{MemoriaError, Result};

/// Named mutual exclusion around a scope.
///
/// Keeps the distributed lock for correctness across replicas, but layers
/// an in-process lock keyed by user on top of it to avoid KV round-trips
/// when a single process already holds exclusivity. This trait is the seam
/// a real KV-backed distributed lock would implement; the `InProcessLock`
/// below is the in-process fast path that always runs first in a
/// single-node deployment.
#[async_trait::async_trait]
pub trait DistributedLock: Send + Sync {
    async fn acquire(&self, scope: &str, ttl: Duration, max_wait: Duration) -> Result<LockGuard>;
}

/// Held while in scope; releases on drop. Release is best-effort — a
/// failure to release is logged but never masks the caller's own error.
pub struct LockGuard {
    _inner: Option<OwnedMutexGuard<()>>,
}

/// In-process implementation keyed by scope string. One `tokio::sync::Mutex`
/// per scope, created lazily and kept for the process lifetime (a handful
/// of live user scopes at a time — unbounded growth is acceptable here the
/// way a resolver cache accepts unbounded-until-evicted growth).
#[derive(Default)]
pub struct InProcessLock {
    scopes: DashMap<String, Arc<Mutex<()>>>,
}

impl InProcessLock {
    pub fn new() -> Self {
        Self {
            scopes: DashMap::new(),
        }
    }

    fn mutex_for(&self, scope: &str) -> Arc<Mutex<()>> {
        self.scopes
            .entry(scope.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait::async_trait]
impl DistributedLock for InProcessLock {
    async fn acquire(&self, scope: &str, _ttl: Duration, max_wait: Duration) -> Result<LockGuard> {
        let mutex = self.mutex_for(scope);
        match tokio::time::timeout(max_wait, mutex.lock_owned()).await {
            Ok(guard) => Ok(LockGuard {
                _inner: Some(guard),
            }),
            Err(_) => Err(MemoriaError::Timeout(max_wait.as_millis() as u64)),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self._inner.is_none() {
            warn!("lock guard dropped without an inner guard — release was already best-effort");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_scope_serializes() {
        let lock = InProcessLock::new();
        let g1 = lock
            .acquire("u1", Duration::from_secs(1), Duration::from_millis(50))
            .await
            .unwrap();
        let res = lock
            .acquire("u1", Duration::from_secs(1), Duration::from_millis(20))
            .await;
        assert!(res.is_err());
        drop(g1);
        let g2 = lock
            .acquire("u1", Duration::from_secs(1), Duration::from_millis(50))
            .await;
        assert!(g2.is_ok());
    }

    #[tokio::test]
    async fn different_scopes_do_not_block_each_other() {
        let lock = InProcessLock::new();
        let _g1 = lock
            .acquire("u1", Duration::from_secs(1), Duration::from_millis(50))
            .await
            .unwrap();
        let g2 = lock
            .acquire("u2", Duration::from_secs(1), Duration::from_millis(50))
            .await;
        assert!(g2.is_ok());
    }
}
