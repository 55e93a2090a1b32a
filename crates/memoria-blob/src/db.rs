use rusqlite::Connection;

use crate::error::Result;

/// Creates the blobs table. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS blobs (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            project_id  TEXT NOT NULL,
            blob_type   TEXT NOT NULL,
            blob_data   TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_blobs_scope
            ON blobs(project_id, user_id, blob_type, created_at);",
    )?;
    Ok(())
}
