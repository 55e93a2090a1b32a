use rusqlite::Connection;

use crate::error::Result;

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS user_profiles (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            project_id  TEXT NOT NULL,
            content     TEXT NOT NULL,
            topic       TEXT NOT NULL,
            sub_topic   TEXT NOT NULL,
            update_hits INTEGER,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            UNIQUE(user_id, project_id, topic, sub_topic)
        );
        CREATE INDEX IF NOT EXISTS idx_profiles_scope
            ON user_profiles(project_id, user_id, updated_at);",
    )?;
    Ok(())
}
