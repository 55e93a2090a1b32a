use rusqlite::Connection;

use crate::error::Result;

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS buffer_zone (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     TEXT NOT NULL,
            project_id  TEXT NOT NULL,
            blob_id     TEXT NOT NULL,
            blob_type   TEXT NOT NULL,
            token_size  INTEGER NOT NULL,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_buffer_scope
            ON buffer_zone(project_id, user_id, blob_type, created_at);",
    )?;
    Ok(())
}
