use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use memoria_core::types::{Blob, BlobType, Scope};
use memoria_core::{ids, time};

use crate::db;
use crate::error::{BlobError, Result};

/// Durable, per-user append of typed blobs. One SQLite
/// connection behind a mutex,.
pub struct BlobStore {
    db: Mutex<Connection>,
}

impl BlobStore {
    pub fn new(conn: Connection) -> Result<Self> {
        db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    pub fn insert(&self, scope: &Scope, mut blob: Blob) -> Result<String> {
        if !blob.blob_type.is_supported() {
            return Err(BlobError::UnsupportedType(blob.blob_type.to_string()));
        }
        let id = ids::new_id();
        if blob.created_at.is_none() {
            blob.created_at = Some(time::now_rfc3339());
        }
        let created_at = blob.created_at.clone().unwrap();
        let blob_data = serde_json::to_string(&blob)?;

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO blobs (id, user_id, project_id, blob_type, blob_data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                scope.user_id,
                scope.project_id,
                blob.blob_type.to_string(),
                blob_data,
                created_at,
            ],
        )?;
        Ok(id)
    }

    pub fn get(&self, scope: &Scope, blob_id: &str) -> Result<Blob> {
        let db = self.db.lock().unwrap();
        let blob_data: Option<String> = db
            .query_row(
                "SELECT blob_data FROM blobs WHERE id = ?1 AND user_id = ?2 AND project_id = ?3",
                params![blob_id, scope.user_id, scope.project_id],
                |row| row.get(0),
            )
            .optional()?;
        match blob_data {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Err(BlobError::NotFound(blob_id.to_string())),
        }
    }

    /// Ordered by `created_at` ascending. `page` is 1-based.
    pub fn list(
        &self,
        scope: &Scope,
        blob_type: BlobType,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<String>> {
        let offset = page.saturating_sub(1) as i64 * page_size as i64;
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id FROM blobs
             WHERE user_id = ?1 AND project_id = ?2 AND blob_type = ?3
             ORDER BY created_at ASC
             LIMIT ?4 OFFSET ?5",
        )?;
        let rows = stmt.query_map(
            params![
                scope.user_id,
                scope.project_id,
                blob_type.to_string(),
                page_size,
                offset
            ],
            |row| row.get::<_, String>(0),
        )?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Idempotent: deleting an absent blob is not an error.
    pub fn delete(&self, scope: &Scope, blob_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM blobs WHERE id = ?1 AND user_id = ?2 AND project_id = ?3",
            params![blob_id, scope.user_id, scope.project_id],
        )?;
        Ok(())
    }

    /// Drops every blob for `scope`. Used by user deletion cascade.
    pub fn delete_all(&self, scope: &Scope) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM blobs WHERE user_id = ?1 AND project_id = ?2",
            params![scope.user_id, scope.project_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_core::types::{ChatMessage, ChatRole};

    fn store() -> BlobStore {
        BlobStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn scope() -> Scope {
        Scope::new("u1", "p1")
    }

    #[test]
    fn insert_then_get_roundtrips() {
        let store = store();
        let blob = Blob::chat(vec![ChatMessage {
            role: ChatRole::User,
            content: "hi".into(),
            alias: None,
            created_at: None,
        }]);
        let id = store.insert(&scope(), blob).unwrap();
        let fetched = store.get(&scope(), &id).unwrap();
        assert_eq!(fetched.blob_type, BlobType::Chat);
        assert!(fetched.created_at.is_some());
    }

    #[test]
    fn unsupported_blob_type_is_rejected() {
        let store = store();
        let blob = Blob {
            blob_type: BlobType::Image,
            messages: None,
            doc: None,
            created_at: None,
            fields: serde_json::Value::Null,
        };
        let err = store.insert(&scope(), blob).unwrap_err();
        assert!(matches!(err, BlobError::UnsupportedType(_)));
    }

    #[test]
    fn get_missing_blob_is_not_found() {
        let store = store();
        let err = store.get(&scope(), "nope").unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_)));
    }

    #[test]
    fn list_orders_by_created_at_ascending() {
        let store = store();
        let mut ids = Vec::new();
        for i in 0..3 {
            let mut blob = Blob::chat(vec![]);
            blob.created_at = Some(format!("2024-01-0{}T00:00:00Z", i + 1));
            ids.push(store.insert(&scope(), blob).unwrap());
        }
        let listed = store.list(&scope(), BlobType::Chat, 1, 10).unwrap();
        assert_eq!(listed, ids);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = store();
        store.delete(&scope(), "missing").unwrap();
    }

    #[test]
    fn other_users_blobs_are_invisible() {
        let store = store();
        let id = store.insert(&scope(), Blob::chat(vec![])).unwrap();
        let other = Scope::new("u2", "p1");
        assert!(store.get(&other, &id).is_err());
    }

    #[test]
    fn delete_all_removes_every_blob_for_scope() {
        let store = store();
        store.insert(&scope(), Blob::chat(vec![])).unwrap();
        store.insert(&scope(), Blob::chat(vec![])).unwrap();
        let other = Scope::new("u2", "p1");
        let kept = store.insert(&other, Blob::chat(vec![])).unwrap();

        store.delete_all(&scope()).unwrap();
        assert!(store.list(&scope(), BlobType::Chat, 1, 10).unwrap().is_empty());
        assert!(store.get(&other, &kept).is_ok());
    }
}
