use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{MigrationError, RunReport, RunSummary};

/// SQLite store for run reports
///
/// Reports are kept whole as JSON; the summary columns exist for listing.
pub struct RunStore {
    conn: Arc<Mutex<Connection>>,
}

impl RunStore {
    /// Open (or create) the store; accepts `sqlite:` URLs and plain paths
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, MigrationError> {
        let path_str = db_path.as_ref().to_string_lossy();
        let clean_path = path_str.trim_start_matches("sqlite:").trim_start_matches("//");
        let conn = Connection::open(clean_path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self, MigrationError> {
        let store = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), MigrationError> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                database_name TEXT NOT NULL,
                started_at TEXT NOT NULL,
                succeeded INTEGER NOT NULL,
                failed INTEGER NOT NULL,
                report_json TEXT NOT NULL
            )
            "#,
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_runs_started ON runs(started_at DESC)",
            [],
        )?;
        Ok(())
    }

    pub async fn save_run(&self, report: &RunReport) -> Result<(), MigrationError> {
        let json = serde_json::to_string(report)?;
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO runs
            (id, database_name, started_at, succeeded, failed, report_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            rusqlite::params![
                report.id,
                report.database,
                report.started_at.to_rfc3339(),
                report.status.succeeded as i64,
                report.status.failed as i64,
                json,
            ],
        )?;
        Ok(())
    }

    /// Newest first
    pub async fn list_runs(&self) -> Result<Vec<RunSummary>, MigrationError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, database_name, started_at, succeeded, failed FROM runs ORDER BY started_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RunSummary {
                id: row.get(0)?,
                database: row.get(1)?,
                started_at: row.get(2)?,
                succeeded: row.get::<_, i64>(3)? as usize,
                failed: row.get::<_, i64>(4)? as usize,
            })
        })?;
        let mut runs = Vec::new();
        for run in rows {
            runs.push(run?);
        }
        Ok(runs)
    }

    pub async fn get_run(&self, id: &str) -> Result<Option<RunReport>, MigrationError> {
        let conn = self.conn.lock().await;
        let json: Option<String> = conn
            .query_row(
                "SELECT report_json FROM runs WHERE id = ?1",
                rusqlite::params![id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
