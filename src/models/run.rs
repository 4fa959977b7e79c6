use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::environment::SqlPair;
use super::table::{PhaseState, TableMirror};

/// Aggregate counters updated by concurrent table workers
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunStatus {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failed_tables: Vec<String>,
}

impl RunStatus {
    pub fn record(&mut self, table: &TableMirror) {
        self.total += 1;
        match table.phase_state {
            PhaseState::Success => self.succeeded += 1,
            _ => {
                self.failed += 1;
                self.failed_tables.push(table.name.clone());
            }
        }
    }
}

/// Result of running one database through the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub id: String,
    pub database: String,
    pub target_database: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub status: RunStatus,
    pub database_sql: Vec<SqlPair>,
    pub tables: Vec<TableMirror>,
    pub issues: Vec<String>,
}

impl RunReport {
    pub fn new(database: impl Into<String>, target_database: impl Into<String>, dry_run: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            database: database.into(),
            target_database: target_database.into(),
            started_at: Utc::now(),
            completed_at: None,
            dry_run,
            status: RunStatus::default(),
            database_sql: Vec::new(),
            tables: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn mark_completed(&mut self) {
        self.completed_at = Some(Utc::now());
        self.tables.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

/// Row returned when listing stored runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: String,
    pub database: String,
    pub started_at: String,
    pub succeeded: usize,
    pub failed: usize,
}
