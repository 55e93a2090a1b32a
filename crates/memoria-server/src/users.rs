use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use memoria_blob::BlobStore;
use memoria_buffer::Buffer;
use memoria_core::types::Scope;
use memoria_core::{time, MemoriaError, Result};
use memoria_event::EventStore;
use memoria_profile::ProfileStore;

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: String,
    pub project_id: String,
    pub data: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-project user registry plus the deletion cascade across every other
/// store.
pub struct UserStore {
    db: Mutex<Connection>,
}

impl UserStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    pub fn get(&self, scope: &Scope) -> Result<Option<User>> {
        let db = self.db.lock().unwrap();
        let row = db
            .query_row(
                "SELECT user_id, project_id, data, created_at, updated_at
                 FROM users WHERE user_id = ?1 AND project_id = ?2",
                params![scope.user_id, scope.project_id],
                row_to_user,
            )
            .optional()
            .map_err(|e| MemoriaError::Database(e.to_string()))?;
        Ok(row)
    }

    pub fn require(&self, scope: &Scope) -> Result<User> {
        self.get(scope)?
            .ok_or_else(|| MemoriaError::NotFound(format!("user {scope}")))
    }

    /// Explicit creation. `user_id` is supplied by
    /// the caller; the store does not generate identities for users the
    /// way it does for projects, since callers map a user onto their own
    /// external identity.
    pub fn create(&self, project_id: &str, user_id: &str, data: serde_json::Value) -> Result<User> {
        let now = time::now_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO users (user_id, project_id, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![user_id, project_id, data.to_string(), now],
        )
        .map_err(|e| MemoriaError::Database(e.to_string()))?;
        Ok(User {
            user_id: user_id.to_string(),
            project_id: project_id.to_string(),
            data,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Users are created lazily on first reference:
    /// any handler touching a scope that has no `users` row yet gets one
    /// created for it with empty `data`.
    pub fn get_or_create(&self, scope: &Scope) -> Result<User> {
        if let Some(user) = self.get(scope)? {
            return Ok(user);
        }
        self.create(&scope.project_id, &scope.user_id, serde_json::Value::Object(Default::default()))
    }

    pub fn update(&self, scope: &Scope, data: serde_json::Value) -> Result<()> {
        let now = time::now_rfc3339();
        let db = self.db.lock().unwrap();
        let changed = db
            .execute(
                "UPDATE users SET data = ?1, updated_at = ?2 WHERE user_id = ?3 AND project_id = ?4",
                params![data.to_string(), now, scope.user_id, scope.project_id],
            )
            .map_err(|e| MemoriaError::Database(e.to_string()))?;
        if changed == 0 {
            return Err(MemoriaError::NotFound(format!("user {scope}")));
        }
        Ok(())
    }

    /// Deletes the user row; the caller (the `DELETE /users/{uid}` handler)
    /// is responsible for invoking the cascade helpers below first.
    fn delete_row(&self, scope: &Scope) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM users WHERE user_id = ?1 AND project_id = ?2",
            params![scope.user_id, scope.project_id],
        )
        .map_err(|e| MemoriaError::Database(e.to_string()))?;
        Ok(())
    }

    /// Full deletion cascade: blobs, buffer entries, profiles, events, then
    /// the user row itself.
    pub fn delete_cascade(
        &self,
        scope: &Scope,
        blobs: &BlobStore,
        buffer: &Buffer,
        profiles: &ProfileStore,
        events: &EventStore,
    ) -> Result<()> {
        blobs.delete_all(scope)?;
        buffer.clear_all(scope)?;
        profiles.delete_all(scope)?;
        events.delete_all(scope)?;
        self.delete_row(scope)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let raw: String = row.get(2)?;
    let data = serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null);
    Ok(User {
        user_id: row.get(0)?,
        project_id: row.get(1)?,
        data,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            user_id     TEXT NOT NULL,
            project_id  TEXT NOT NULL,
            data        TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            PRIMARY KEY (user_id, project_id)
         );",
    )
    .map_err(|e| MemoriaError::Database(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> UserStore {
        UserStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn scope() -> Scope {
        Scope::new("u1", "p1")
    }

    struct NoopProcessor;

    #[async_trait::async_trait]
    impl memoria_buffer::BlobProcessor for NoopProcessor {
        async fn process(
            &self,
            _scope: &Scope,
            _blob_type: &str,
            _blob_ids: &[String],
            _blobs: &[memoria_core::types::Blob],
        ) -> memoria_buffer::Result<memoria_buffer::ChatModalResponse> {
            unreachable!("not exercised by the cascade test")
        }
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let store = store();
        let first = store.get_or_create(&scope()).unwrap();
        let second = store.get_or_create(&scope()).unwrap();
        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn update_missing_user_is_not_found() {
        let store = store();
        let err = store.update(&scope(), serde_json::json!({})).unwrap_err();
        assert!(matches!(err, MemoriaError::NotFound(_)));
    }

    #[test]
    fn delete_cascade_removes_everything() {
        let store = store();
        let blobs = Arc::new(BlobStore::new(Connection::open_in_memory().unwrap()).unwrap());
        let buffer_store = memoria_buffer::BufferStore::new(Connection::open_in_memory().unwrap()).unwrap();
        let buffer = Buffer::new(
            buffer_store,
            blobs.clone(),
            Arc::new(memoria_kv::InProcessLock::new()),
            Arc::new(NoopProcessor),
            600,
            8000,
            std::time::Duration::from_secs(30),
            std::time::Duration::from_secs(5),
            false,
        );
        let profiles = ProfileStore::new(
            Connection::open_in_memory().unwrap(),
            Arc::new(memoria_kv::InProcessCache::new()),
            std::time::Duration::from_secs(60),
        )
        .unwrap();
        let events = EventStore::new(Connection::open_in_memory().unwrap(), None, 4).unwrap();

        store.get_or_create(&scope()).unwrap();
        profiles.add(&scope(), "likes tea", "preferences", "drinks").unwrap();

        store.delete_cascade(&scope(), &blobs, &buffer, &profiles, &events).unwrap();
        assert!(store.get(&scope()).unwrap().is_none());
        assert!(profiles.list(&scope()).unwrap().is_empty());
    }
}
