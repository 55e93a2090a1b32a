use dashmap::DashMap;
use std::time::{Duration, Instant};

/// A TTL key-value cache, treated as an external collaborator — ProfileStore
/// reads/invalidates through this trait so a real Redis-backed
/// implementation can be swapped in without touching ProfileStore.
pub trait TtlCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String, ttl: Duration);
    fn delete(&self, key: &str);
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process cache, one shard per key via `DashMap`: a plain string cache
/// with per-entry expiry, lock-free per key.
#[derive(Default)]
pub struct InProcessCache {
    entries: DashMap<String, Entry>,
}

impl InProcessCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl TtlCache for InProcessCache {
    fn get(&self, key: &str) -> Option<String> {
        let hit = self.entries.get(key)?;
        if hit.expires_at <= Instant::now() {
            drop(hit);
            self.entries.remove(key);
            return None;
        }
        Some(hit.value.clone())
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_roundtrips() {
        let cache = InProcessCache::new();
        cache.set("k", "v".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    #[test]
    fn expired_entry_is_absent() {
        let cache = InProcessCache::new();
        cache.set("k", "v".to_string(), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn delete_removes_entry() {
        let cache = InProcessCache::new();
        cache.set("k", "v".to_string(), Duration::from_secs(60));
        cache.delete("k");
        assert_eq!(cache.get("k"), None);
    }
}
