use rusqlite::Connection;

use crate::error::Result;

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS user_events (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            project_id  TEXT NOT NULL,
            event_data  TEXT NOT NULL,
            embedding   TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_scope
            ON user_events(project_id, user_id, created_at);",
    )?;
    Ok(())
}
