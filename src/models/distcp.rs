use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::environment::Environment;
use super::strategy::DataStrategy;

pub const DEFAULT_DISTCP_OPTIONS: [&str; 2] = ["-overwrite", "-update"];

/// Request to plan DistCp jobs for one database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistCpRequest {
    pub database: String,
    pub source_environment: Option<Environment>,
    pub target_environment: Option<Environment>,
    /// Path segments to trim when consolidating sources upward
    pub consolidation_level: i32,
    pub strategy: DataStrategy,
    /// Restrict to these tables; None plans the whole database
    pub tables: Option<Vec<String>>,
    /// One source list for the whole database instead of one per table
    pub consolidate_tables: bool,
}

impl Default for DistCpRequest {
    fn default() -> Self {
        Self {
            database: String::new(),
            source_environment: Some(Environment::Left),
            target_environment: Some(Environment::Right),
            consolidation_level: 0,
            strategy: DataStrategy::Sql,
            tables: None,
            consolidate_tables: false,
        }
    }
}

/// One `hadoop distcp -f` invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistCpJobDefinition {
    pub name: String,
    pub source_list_file: String,
    pub target_directory: String,
    pub options: Vec<String>,
    pub priority: u32,
    pub estimated_minutes: u64,
}

/// Planned copy work for one database
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistCpPlan {
    pub database: String,
    /// Source list name to source paths
    pub source_lists: BTreeMap<String, Vec<String>>,
    /// Source path to target path
    pub target_mappings: BTreeMap<String, String>,
    pub jobs: Vec<DistCpJobDefinition>,
    pub estimated_bytes: u64,
    pub path_count: usize,
    pub issues: Vec<String>,
}

/// Sizing advice for a DistCp job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistCpRecommendations {
    pub mappers: u64,
    pub memory_mb: u64,
    pub bandwidth_mb: u64,
    pub options: Vec<String>,
}

/// Common base directory of a path set and per-path classification
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathAlignment {
    pub common_base: String,
    pub aligned: Vec<String>,
    pub misaligned: Vec<String>,
}

impl PathAlignment {
    pub fn is_aligned(&self) -> bool {
        self.misaligned.is_empty()
    }
}
