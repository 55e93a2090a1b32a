use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use memoria_core::config::ProjectProfileConfig;
use memoria_core::types::{ProjectStatus, ROOT_PROJECT_ID};
use memoria_core::{ids, time, MemoriaError, Result};

/// A tenant. Every deployment always has `__root__`, seeded on first
/// `ProjectStore::new` and exempt from deletion.
#[derive(Debug, Clone)]
pub struct Project {
    pub project_id: String,
    pub secret: String,
    pub status: ProjectStatus,
    pub profile_config: String,
    pub token_quota: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct BillingSnapshot {
    pub project_id: String,
    pub token_quota: Option<i64>,
    pub tokens_used_this_month: i64,
    pub month: String,
}

/// Durable project registry: auth secrets, status, and the per-project
/// `profile_config` override. One SQLite connection behind a
/// mutex, mirroring every other store in the workspace.
pub struct ProjectStore {
    db: Mutex<Connection>,
}

impl ProjectStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        seed_root(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    pub fn get(&self, project_id: &str) -> Result<Option<Project>> {
        let db = self.db.lock().unwrap();
        let row = db
            .query_row(
                "SELECT project_id, secret, status, profile_config, token_quota, created_at
                 FROM projects WHERE project_id = ?1",
                params![project_id],
                row_to_project,
            )
            .optional()
            .map_err(|e| MemoriaError::Database(e.to_string()))?;
        Ok(row)
    }

    pub fn require(&self, project_id: &str) -> Result<Project> {
        self.get(project_id)?
            .ok_or_else(|| MemoriaError::NotFound(format!("project {project_id}")))
    }

    /// Creates a project with a freshly generated secret. The secret is
    /// returned once, here — it is never re-readable afterwards.
    pub fn create(&self, project_id: Option<String>) -> Result<Project> {
        let project_id = project_id.unwrap_or_else(ids::new_id);
        let secret = ids::new_id();
        let now = time::now_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO projects (project_id, secret, status, profile_config, token_quota, created_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            params![project_id, secret, "active", "{}", now],
        )
        .map_err(|e| MemoriaError::Database(e.to_string()))?;
        Ok(Project {
            project_id,
            secret,
            status: ProjectStatus::Active,
            profile_config: "{}".to_string(),
            token_quota: None,
            created_at: now,
        })
    }

    /// Bearer-token verification: `sk-{project_id}-{secret}`
    /// resolves to a project only if the secret matches and the project is
    /// not suspended.
    pub fn verify_secret(&self, project_id: &str, secret: &str) -> Result<Project> {
        let project = self.require(project_id)?;
        if project.secret != secret {
            return Err(MemoriaError::Unauthorized("invalid project secret".to_string()));
        }
        if project.status.is_suspended() {
            return Err(MemoriaError::Forbidden(format!("project {project_id} is suspended")));
        }
        Ok(project)
    }

    pub fn profile_config(&self, project_id: &str) -> Result<ProjectProfileConfig> {
        let raw = self.require(project_id)?.profile_config;
        ProjectProfileConfig::parse(&raw)
    }

    /// Validates and persists a new `profile_config` payload. Any project's
    /// own config may be rewritten through this route — only root's other
    /// fields (status, secret) are immutable.
    pub fn set_profile_config(&self, project_id: &str, raw: &str) -> Result<()> {
        let _ = ProjectProfileConfig::parse(raw)?;
        self.require(project_id)?;
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE projects SET profile_config = ?1 WHERE project_id = ?2",
            params![raw, project_id],
        )
        .map_err(|e| MemoriaError::Database(e.to_string()))?;
        Ok(())
    }

    pub fn billing(&self, project_id: &str) -> Result<BillingSnapshot> {
        let project = self.require(project_id)?;
        let month = current_month(&project.created_at);
        let db = self.db.lock().unwrap();
        self.roll_month_locked(&db, project_id, &month)?;
        let used: i64 = db
            .query_row(
                "SELECT tokens_used FROM project_usage WHERE project_id = ?1 AND month = ?2",
                params![project_id, month],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| MemoriaError::Database(e.to_string()))?
            .unwrap_or(0);
        Ok(BillingSnapshot {
            project_id: project_id.to_string(),
            token_quota: project.token_quota,
            tokens_used_this_month: used,
            month,
        })
    }

    /// Adds `tokens` to the project's running monthly usage counter. Called
    /// from the server's `UsageSink` bridge on every completion/embedding
    /// call.
    pub fn record_usage(&self, project_id: &str, tokens: i64) -> Result<()> {
        let month = current_month(&time::now_rfc3339());
        let db = self.db.lock().unwrap();
        self.roll_month_locked(&db, project_id, &month)?;
        db.execute(
            "UPDATE project_usage SET tokens_used = tokens_used + ?1
             WHERE project_id = ?2 AND month = ?3",
            params![tokens, project_id, month],
        )
        .map_err(|e| MemoriaError::Database(e.to_string()))?;
        Ok(())
    }

    fn roll_month_locked(&self, db: &Connection, project_id: &str, month: &str) -> Result<()> {
        db.execute(
            "INSERT OR IGNORE INTO project_usage (project_id, month, tokens_used) VALUES (?1, ?2, 0)",
            params![project_id, month],
        )
        .map_err(|e| MemoriaError::Database(e.to_string()))?;
        Ok(())
    }
}

fn current_month(rfc3339: &str) -> String {
    rfc3339.get(0..7).unwrap_or("1970-01").to_string()
}

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    let status_raw: String = row.get(2)?;
    let status = match status_raw.as_str() {
        "pro" => ProjectStatus::Pro,
        "ultra" => ProjectStatus::Ultra,
        "suspended" => ProjectStatus::Suspended,
        _ => ProjectStatus::Active,
    };
    Ok(Project {
        project_id: row.get(0)?,
        secret: row.get(1)?,
        status,
        profile_config: row.get(3)?,
        token_quota: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS projects (
            project_id      TEXT PRIMARY KEY,
            secret          TEXT NOT NULL,
            status          TEXT NOT NULL,
            profile_config  TEXT NOT NULL,
            token_quota     INTEGER,
            created_at      TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS project_usage (
            project_id   TEXT NOT NULL,
            month        TEXT NOT NULL,
            tokens_used  INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (project_id, month)
         );",
    )
    .map_err(|e| MemoriaError::Database(e.to_string()))?;
    Ok(())
}

fn seed_root(conn: &Connection) -> Result<()> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM projects WHERE project_id = ?1",
            params![ROOT_PROJECT_ID],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| MemoriaError::Database(e.to_string()))?;
    if exists.is_some() {
        return Ok(());
    }
    conn.execute(
        "INSERT INTO projects (project_id, secret, status, profile_config, token_quota, created_at)
         VALUES (?1, ?2, 'active', '{}', NULL, ?3)",
        params![ROOT_PROJECT_ID, ids::new_id(), time::now_rfc3339()],
    )
    .map_err(|e| MemoriaError::Database(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ProjectStore {
        ProjectStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn root_project_is_seeded_active() {
        let store = store();
        let root = store.require(ROOT_PROJECT_ID).unwrap();
        assert_eq!(root.status, ProjectStatus::Active);
    }

    #[test]
    fn create_then_verify_secret_roundtrips() {
        let store = store();
        let project = store.create(None).unwrap();
        let verified = store.verify_secret(&project.project_id, &project.secret).unwrap();
        assert_eq!(verified.project_id, project.project_id);
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let store = store();
        let project = store.create(None).unwrap();
        let err = store.verify_secret(&project.project_id, "nope").unwrap_err();
        assert!(matches!(err, MemoriaError::Unauthorized(_)));
    }

    #[test]
    fn oversized_profile_config_is_rejected() {
        let store = store();
        let project = store.create(None).unwrap();
        let huge = "x".repeat(70_000);
        let err = store.set_profile_config(&project.project_id, &huge).unwrap_err();
        assert!(matches!(err, MemoriaError::BadRequest(_)));
    }

    #[test]
    fn record_usage_accumulates_within_month() {
        let store = store();
        let project = store.create(None).unwrap();
        store.record_usage(&project.project_id, 100).unwrap();
        store.record_usage(&project.project_id, 50).unwrap();
        let billing = store.billing(&project.project_id).unwrap();
        assert_eq!(billing.tokens_used_this_month, 150);
    }
}
