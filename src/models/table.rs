use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::environment::{Environment, EnvironmentSet, EnvironmentTable};
use super::strategy::DataStrategy;
use crate::services::ddl;

/// Pipeline status of a single table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseState {
    #[default]
    Pending,
    InProgress,
    Error,
    Success,
}

impl PhaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseState::Error | PhaseState::Success)
    }
}

/// Timestamped pipeline step, kept for the run transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorStep {
    pub at: DateTime<Utc>,
    pub step: String,
    pub detail: String,
}

/// One logical table being migrated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableMirror {
    pub name: String,
    pub strategy: Option<DataStrategy>,
    pub phase_state: PhaseState,
    pub environments: EnvironmentSet,
    pub steps: Vec<MirrorStep>,
}

impl TableMirror {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut mirror = Self {
            name: name.clone(),
            ..Default::default()
        };
        mirror.environments.left = EnvironmentTable::new(name);
        mirror
    }

    pub fn left(&self) -> &EnvironmentTable {
        &self.environments.left
    }

    pub fn left_mut(&mut self) -> &mut EnvironmentTable {
        &mut self.environments.left
    }

    pub fn right(&self) -> &EnvironmentTable {
        &self.environments.right
    }

    pub fn right_mut(&mut self) -> &mut EnvironmentTable {
        &mut self.environments.right
    }

    pub fn env(&self, env: Environment) -> &EnvironmentTable {
        &self.environments[env]
    }

    pub fn env_mut(&mut self, env: Environment) -> &mut EnvironmentTable {
        &mut self.environments[env]
    }

    pub fn is_acid(&self) -> bool {
        ddl::is_acid(&self.environments.left.definition)
    }

    pub fn is_partitioned(&self) -> bool {
        self.environments.left.is_partitioned()
    }

    pub fn partition_count(&self) -> usize {
        self.environments.left.partition_count()
    }

    pub fn add_step(&mut self, step: impl Into<String>, detail: impl Into<String>) {
        self.steps.push(MirrorStep {
            at: Utc::now(),
            step: step.into(),
            detail: detail.into(),
        });
    }

    /// Mark the table as failed; ERROR is terminal
    pub fn mark_error(&mut self) {
        self.phase_state = PhaseState::Error;
    }

    pub fn mark_in_progress(&mut self) {
        if self.phase_state != PhaseState::Error {
            self.phase_state = PhaseState::InProgress;
        }
    }

    pub fn mark_success(&mut self) {
        if self.phase_state != PhaseState::Error {
            self.phase_state = PhaseState::Success;
        }
    }

    pub fn has_errors(&self) -> bool {
        self.environments.iter().any(|(_, t)| !t.errors.is_empty())
    }
}

/// A database and the tables enumerated from it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DbMirror {
    pub name: String,
    /// LEFT database location, when known
    pub location: Option<String>,
    pub managed_location: Option<String>,
    pub owner: Option<String>,
    pub tables: BTreeMap<String, TableMirror>,
    pub issues: Vec<String>,
}

impl DbMirror {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_table(&mut self, table: TableMirror) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn has_acid_tables(&self) -> bool {
        self.tables.values().any(|t| t.is_acid())
    }

    pub fn has_views(&self) -> bool {
        self.tables
            .values()
            .any(|t| ddl::is_view(&t.left().definition))
    }
}
