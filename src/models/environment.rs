use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use crate::services::ddl;

/// Cluster-side view a table definition belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    /// Source cluster
    Left,
    /// Target cluster
    Right,
    /// Target-side pointer table used to read the source data
    Shadow,
    /// Staging table used to move ACID or downgraded data
    Transfer,
}

impl Environment {
    pub const ALL: [Environment; 4] = [
        Environment::Left,
        Environment::Right,
        Environment::Shadow,
        Environment::Transfer,
    ];

    fn slot(self) -> usize {
        match self {
            Environment::Left => 0,
            Environment::Right => 1,
            Environment::Shadow => 2,
            Environment::Transfer => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Left => "LEFT",
            Environment::Right => "RIGHT",
            Environment::Shadow => "SHADOW",
            Environment::Transfer => "TRANSFER",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-target decision on what to do with the table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CreateStrategy {
    #[default]
    Nothing,
    Leave,
    Create,
    Drop,
    Replace,
}

/// One generated statement with a human readable description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SqlPair {
    pub description: String,
    pub statement: String,
}

impl SqlPair {
    pub fn new(description: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            statement: statement.into(),
        }
    }
}

/// Per-environment view of a table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentTable {
    pub name: String,
    pub exists: bool,
    pub create_strategy: CreateStrategy,
    /// Ordered `SHOW CREATE TABLE` lines
    pub definition: Vec<String>,
    pub owner: Option<String>,
    /// Partition spec (`p=1/q=2`) to location
    pub partitions: BTreeMap<String, String>,
    pub statistics: BTreeMap<String, serde_json::Value>,
    pub sql: Vec<SqlPair>,
    pub cleanup_sql: Vec<SqlPair>,
    pub issues: Vec<String>,
    pub errors: Vec<String>,
}

impl EnvironmentTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn location(&self) -> Option<String> {
        ddl::table_location(&self.definition)
    }

    pub fn is_partitioned(&self) -> bool {
        ddl::is_partitioned(&self.definition)
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn add_sql(&mut self, description: impl Into<String>, statement: impl Into<String>) {
        self.sql.push(SqlPair::new(description, statement));
    }

    pub fn add_cleanup_sql(&mut self, description: impl Into<String>, statement: impl Into<String>) {
        self.cleanup_sql.push(SqlPair::new(description, statement));
    }

    pub fn add_issue(&mut self, issue: impl Into<String>) {
        self.issues.push(issue.into());
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }
}

/// Fixed four-slot set of environment tables indexed by `Environment`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSet {
    pub left: EnvironmentTable,
    pub right: EnvironmentTable,
    pub shadow: EnvironmentTable,
    pub transfer: EnvironmentTable,
}

impl EnvironmentSet {
    /// Mutable access to two distinct environments at once
    ///
    /// Panics if both arguments name the same environment.
    pub fn pair_mut(
        &mut self,
        first: Environment,
        second: Environment,
    ) -> (&mut EnvironmentTable, &mut EnvironmentTable) {
        assert_ne!(first, second, "pair_mut requires two distinct environments");
        let mut slots = self.slots_mut().map(Some);
        let a = slots[first.slot()].take();
        let b = slots[second.slot()].take();
        match (a, b) {
            (Some(a), Some(b)) => (a, b),
            _ => unreachable!("distinct environments map to distinct slots"),
        }
    }

    fn slots_mut(&mut self) -> [&mut EnvironmentTable; 4] {
        [
            &mut self.left,
            &mut self.right,
            &mut self.shadow,
            &mut self.transfer,
        ]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Environment, &EnvironmentTable)> {
        Environment::ALL.into_iter().map(move |env| (env, &self[env]))
    }
}

impl Index<Environment> for EnvironmentSet {
    type Output = EnvironmentTable;

    fn index(&self, env: Environment) -> &Self::Output {
        match env {
            Environment::Left => &self.left,
            Environment::Right => &self.right,
            Environment::Shadow => &self.shadow,
            Environment::Transfer => &self.transfer,
        }
    }
}

impl IndexMut<Environment> for EnvironmentSet {
    fn index_mut(&mut self, env: Environment) -> &mut Self::Output {
        match env {
            Environment::Left => &mut self.left,
            Environment::Right => &mut self.right,
            Environment::Shadow => &mut self.shadow,
            Environment::Transfer => &mut self.transfer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_by_environment() {
        let mut set = EnvironmentSet::default();
        set[Environment::Shadow].name = "shadow_t".to_string();
        assert_eq!(set.shadow.name, "shadow_t");
        assert_eq!(set[Environment::Shadow].name, "shadow_t");
    }

    #[test]
    fn test_pair_mut_returns_requested_order() {
        let mut set = EnvironmentSet::default();
        set.left.name = "l".to_string();
        set.transfer.name = "t".to_string();
        let (transfer, left) = set.pair_mut(Environment::Transfer, Environment::Left);
        assert_eq!(transfer.name, "t");
        assert_eq!(left.name, "l");
        left.exists = true;
        assert!(set.left.exists);
    }

    #[test]
    fn test_environment_serializes_uppercase() {
        let json = serde_json::to_string(&Environment::Transfer).unwrap();
        assert_eq!(json, "\"TRANSFER\"");
    }
}
