use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{params, Connection};

use memoria_core::types::Scope;
use memoria_core::{ids, time};
use memoria_kv::TtlCache;

use crate::db;
use crate::error::{ProfileError, Result};
use crate::types::{Profile, ProfileAttributes};

fn cache_key(scope: &Scope) -> String {
    format!("user_profiles::{}::{}", scope.project_id, scope.user_id)
}

/// Durable set of (topic, sub_topic)-keyed memos per user, with cached reads
///.
pub struct ProfileStore {
    db: Mutex<Connection>,
    cache: Arc<dyn TtlCache>,
    cache_ttl: Duration,
}

impl ProfileStore {
    pub fn new(conn: Connection, cache: Arc<dyn TtlCache>, cache_ttl: Duration) -> Result<Self> {
        db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            cache,
            cache_ttl,
        })
    }

    /// Cached read, ordered by `updated_at` descending on a cache miss.
    pub fn list(&self, scope: &Scope) -> Result<Vec<Profile>> {
        let key = cache_key(scope);
        if let Some(raw) = self.cache.get(&key) {
            if let Ok(profiles) = serde_json::from_str::<Vec<Profile>>(&raw) {
                return Ok(profiles);
            }
            self.cache.delete(&key);
        }
        let profiles = self.list_uncached(scope)?;
        if let Ok(raw) = serde_json::to_string(&profiles) {
            self.cache.set(&key, raw, self.cache_ttl);
        }
        Ok(profiles)
    }

    fn list_uncached(&self, scope: &Scope) -> Result<Vec<Profile>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, content, topic, sub_topic, update_hits, created_at, updated_at
             FROM user_profiles
             WHERE user_id = ?1 AND project_id = ?2
             ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map(params![scope.user_id, scope.project_id], row_to_profile)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn invalidate(&self, scope: &Scope) {
        self.cache.delete(&cache_key(scope));
    }

    pub fn add_many(
        &self,
        scope: &Scope,
        entries: Vec<(String, ProfileAttributes)>,
    ) -> Result<Vec<String>> {
        let now = time::now_rfc3339();
        let mut ids = Vec::with_capacity(entries.len());
        {
            let db = self.db.lock().unwrap();
            for (content, attrs) in entries {
                let id = ids::new_id();
                db.execute(
                    "INSERT INTO user_profiles
                     (id, user_id, project_id, content, topic, sub_topic, update_hits, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                    params![
                        id,
                        scope.user_id,
                        scope.project_id,
                        content,
                        attrs.topic,
                        attrs.sub_topic,
                        attrs.update_hits,
                        now
                    ],
                )?;
                ids.push(id);
            }
        }
        self.invalidate(scope);
        Ok(ids)
    }

    /// Singleton convenience form used by external callers.
    pub fn add(&self, scope: &Scope, content: &str, topic: &str, sub_topic: &str) -> Result<String> {
        let mut ids = self.add_many(
            scope,
            vec![(content.to_string(), ProfileAttributes::new(topic, sub_topic))],
        )?;
        Ok(ids.remove(0))
    }

    /// Only entries whose `attributes` is `Some` have their attributes
    /// overwritten; content is always replaced.
    pub fn update_many(
        &self,
        scope: &Scope,
        entries: Vec<(String, String, Option<ProfileAttributes>)>,
    ) -> Result<Vec<String>> {
        let now = time::now_rfc3339();
        let mut updated = Vec::with_capacity(entries.len());
        {
            let db = self.db.lock().unwrap();
            for (id, content, attrs) in entries {
                let changed = match attrs {
                    Some(a) => db.execute(
                        "UPDATE user_profiles SET content = ?1, topic = ?2, sub_topic = ?3, updated_at = ?4
                         WHERE id = ?5 AND user_id = ?6 AND project_id = ?7",
                        params![content, a.topic, a.sub_topic, now, id, scope.user_id, scope.project_id],
                    )?,
                    None => db.execute(
                        "UPDATE user_profiles SET content = ?1, updated_at = ?2
                         WHERE id = ?3 AND user_id = ?4 AND project_id = ?5",
                        params![content, now, id, scope.user_id, scope.project_id],
                    )?,
                };
                if changed > 0 {
                    updated.push(id);
                }
            }
        }
        self.invalidate(scope);
        Ok(updated)
    }

    pub fn delete(&self, scope: &Scope, id: &str) -> Result<()> {
        let changed = {
            let db = self.db.lock().unwrap();
            db.execute(
                "DELETE FROM user_profiles WHERE id = ?1 AND user_id = ?2 AND project_id = ?3",
                params![id, scope.user_id, scope.project_id],
            )?
        };
        self.invalidate(scope);
        if changed == 0 {
            return Err(ProfileError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn delete_many(&self, scope: &Scope, ids: &[String]) -> Result<Vec<String>> {
        let mut deleted = Vec::with_capacity(ids.len());
        {
            let db = self.db.lock().unwrap();
            for id in ids {
                let changed = db.execute(
                    "DELETE FROM user_profiles WHERE id = ?1 AND user_id = ?2 AND project_id = ?3",
                    params![id, scope.user_id, scope.project_id],
                )?;
                if changed > 0 {
                    deleted.push(id.clone());
                }
            }
        }
        self.invalidate(scope);
        Ok(deleted)
    }

    /// Drops every profile for `scope`. Used by user deletion cascade
    ///.
    pub fn delete_all(&self, scope: &Scope) -> Result<()> {
        {
            let db = self.db.lock().unwrap();
            db.execute(
                "DELETE FROM user_profiles WHERE user_id = ?1 AND project_id = ?2",
                params![scope.user_id, scope.project_id],
            )?;
        }
        self.invalidate(scope);
        Ok(())
    }
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        content: row.get(1)?,
        attributes: ProfileAttributes {
            topic: row.get(2)?,
            sub_topic: row.get(3)?,
            update_hits: row.get(4)?,
        },
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_kv::InProcessCache;

    fn store() -> ProfileStore {
        ProfileStore::new(
            Connection::open_in_memory().unwrap(),
            Arc::new(InProcessCache::new()),
            Duration::from_secs(1200),
        )
        .unwrap()
    }

    fn scope() -> Scope {
        Scope::new("u1", "p1")
    }

    #[test]
    fn add_then_list_round_trips() {
        let store = store();
        store.add(&scope(), "likes tea", "preferences", "drinks").unwrap();
        let profiles = store.list(&scope()).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].attributes.topic, "preferences");
    }

    #[test]
    fn list_is_served_from_cache_on_second_call() {
        let store = store();
        store.add(&scope(), "a", "t", "s").unwrap();
        let first = store.list(&scope()).unwrap();
        // mutate the table directly, bypassing the store, to prove the
        // second `list` is answered from cache rather than re-querying
        {
            let db = store.db.lock().unwrap();
            db.execute("DELETE FROM user_profiles", []).unwrap();
        }
        let second = store.list(&scope()).unwrap();
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn mutation_invalidates_cache() {
        let store = store();
        let id = store.add(&scope(), "a", "t", "s").unwrap();
        let _ = store.list(&scope()).unwrap();
        store.delete(&scope(), &id).unwrap();
        let after = store.list(&scope()).unwrap();
        assert!(after.is_empty());
    }

    #[test]
    fn delete_missing_profile_is_not_found() {
        let store = store();
        let err = store.delete(&scope(), "nope").unwrap_err();
        assert!(matches!(err, ProfileError::NotFound(_)));
    }

    #[test]
    fn update_many_keeps_attributes_when_none() {
        let store = store();
        let id = store.add(&scope(), "a", "t", "s").unwrap();
        store
            .update_many(&scope(), vec![(id.clone(), "b".into(), None)])
            .unwrap();
        let profiles = store.list(&scope()).unwrap();
        assert_eq!(profiles[0].content, "b");
        assert_eq!(profiles[0].attributes.topic, "t");
    }

    #[test]
    fn delete_all_clears_store_and_cache() {
        let store = store();
        store.add(&scope(), "a", "t", "s").unwrap();
        store.add(&scope(), "b", "t2", "s2").unwrap();
        let _ = store.list(&scope()).unwrap();

        store.delete_all(&scope()).unwrap();
        assert!(store.list(&scope()).unwrap().is_empty());
    }
}
