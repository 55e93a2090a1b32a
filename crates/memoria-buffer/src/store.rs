use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use memoria_core::types::Scope;

use crate::db;
use crate::error::Result;
use crate::types::BufferEntry;

/// Raw CRUD over the buffer-zone table. `Buffer` (in `buffer.rs`) layers the
/// idle/size trigger logic on top of this.
pub struct BufferStore {
    db: Mutex<Connection>,
}

impl BufferStore {
    pub fn new(conn: Connection) -> Result<Self> {
        db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    pub fn push(&self, scope: &Scope, blob_id: &str, blob_type: &str, token_size: i64, created_at: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO buffer_zone (user_id, project_id, blob_id, blob_type, token_size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![scope.user_id, scope.project_id, blob_id, blob_type, token_size, created_at],
        )?;
        Ok(())
    }

    /// `created_at` of the most recently buffered entry, if any.
    pub fn newest_created_at(&self, scope: &Scope, blob_type: &str) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        let val: Option<String> = db
            .query_row(
                "SELECT MAX(created_at) FROM buffer_zone
                 WHERE user_id = ?1 AND project_id = ?2 AND blob_type = ?3",
                params![scope.user_id, scope.project_id, blob_type],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(val)
    }

    pub fn total_token_size(&self, scope: &Scope, blob_type: &str) -> Result<i64> {
        let db = self.db.lock().unwrap();
        let val: Option<i64> = db
            .query_row(
                "SELECT SUM(token_size) FROM buffer_zone
                 WHERE user_id = ?1 AND project_id = ?2 AND blob_type = ?3",
                params![scope.user_id, scope.project_id, blob_type],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(val.unwrap_or(0))
    }

    /// All pending entries, ordered by `created_at` ascending.
    pub fn list(&self, scope: &Scope, blob_type: &str) -> Result<Vec<BufferEntry>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT blob_id, blob_type, token_size, created_at FROM buffer_zone
             WHERE user_id = ?1 AND project_id = ?2 AND blob_type = ?3
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(
            params![scope.user_id, scope.project_id, blob_type],
            |row| {
                Ok(BufferEntry {
                    blob_id: row.get(0)?,
                    blob_type: row.get(1)?,
                    token_size: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn clear(&self, scope: &Scope, blob_type: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM buffer_zone WHERE user_id = ?1 AND project_id = ?2 AND blob_type = ?3",
            params![scope.user_id, scope.project_id, blob_type],
        )?;
        Ok(())
    }

    /// Drops every buffered entry for `scope`, across all blob types. Used
    /// by user deletion cascade.
    pub fn clear_all(&self, scope: &Scope) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM buffer_zone WHERE user_id = ?1 AND project_id = ?2",
            params![scope.user_id, scope.project_id],
        )?;
        Ok(())
    }
}
