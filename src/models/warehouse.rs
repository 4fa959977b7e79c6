use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::MigrationError;

/// Table type a GLM target applies to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableType {
    ExternalTable,
    ManagedTable,
}

/// External/managed base directories for one database
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Warehouse {
    pub external_directory: String,
    pub managed_directory: String,
}

impl Warehouse {
    pub fn new(external_directory: impl Into<String>, managed_directory: impl Into<String>) -> Self {
        Self {
            external_directory: external_directory.into(),
            managed_directory: managed_directory.into(),
        }
    }

    /// Both directories must be non-blank and distinct
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.external_directory.trim().is_empty() || self.managed_directory.trim().is_empty() {
            return Err(MigrationError::validation(
                "External and managed warehouse directories must be defined",
            ));
        }
        if self.external_directory.trim() == self.managed_directory.trim() {
            return Err(MigrationError::validation(
                "External and managed warehouse directories must be different",
            ));
        }
        Ok(())
    }

    pub fn directory_for(&self, table_type: TableType) -> &str {
        match table_type {
            TableType::ExternalTable => &self.external_directory,
            TableType::ManagedTable => &self.managed_directory,
        }
    }
}

/// Per-database warehouse plans
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct WarehousePlanRegistry {
    plans: BTreeMap<String, Warehouse>,
}

impl WarehousePlanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_plan(
        &mut self,
        database: impl Into<String>,
        external_directory: impl Into<String>,
        managed_directory: impl Into<String>,
    ) -> Result<&Warehouse, MigrationError> {
        let database = database.into();
        if database.trim().is_empty() {
            return Err(MigrationError::validation("Database name must be defined"));
        }
        let warehouse = Warehouse::new(external_directory, managed_directory);
        warehouse.validate()?;
        self.plans.insert(database.clone(), warehouse);
        Ok(&self.plans[&database])
    }

    pub fn remove_plan(&mut self, database: &str) -> Option<Warehouse> {
        self.plans.remove(database)
    }

    pub fn get(&self, database: &str) -> Option<&Warehouse> {
        self.plans.get(database)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn validate(&self) -> Result<(), MigrationError> {
        let errors: Vec<String> = self
            .plans
            .iter()
            .filter_map(|(db, wh)| wh.validate().err().map(|e| format!("{}: {}", db, e)))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MigrationError::Validation(errors))
        }
    }
}

/// One GLM entry: source prefix and per-table-type target prefixes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GlmEntry {
    pub prefix: String,
    pub targets: BTreeMap<TableType, String>,
}

/// Ordered prefix remap table, evaluated first-match-wins
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct GlobalLocationMap {
    entries: Vec<GlmEntry>,
}

/// Result of a GLM lookup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlmMatch {
    pub source_prefix: String,
    pub target_prefix: String,
    /// Relative directory with the source prefix replaced
    pub mapped_dir: String,
}

impl GlobalLocationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; existing entries keep precedence
    pub fn add(&mut self, prefix: impl Into<String>, table_type: TableType, target: impl Into<String>) {
        let prefix = prefix.into();
        let target = target.into();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.prefix == prefix) {
            entry.targets.insert(table_type, target);
            return;
        }
        let mut targets = BTreeMap::new();
        targets.insert(table_type, target);
        self.entries.push(GlmEntry { prefix, targets });
    }

    pub fn remove(&mut self, prefix: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.prefix != prefix);
        before != self.entries.len()
    }

    pub fn entries(&self) -> &[GlmEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry (in list order) whose prefix starts `relative_dir` and
    /// carries a target for `table_type`. Not a longest-prefix match.
    pub fn lookup(&self, relative_dir: &str, table_type: TableType) -> Option<GlmMatch> {
        self.entries.iter().find_map(|entry| {
            if !relative_dir.starts_with(&entry.prefix) {
                return None;
            }
            let target = entry.targets.get(&table_type)?;
            let remainder = &relative_dir[entry.prefix.len()..];
            Some(GlmMatch {
                source_prefix: entry.prefix.clone(),
                target_prefix: target.clone(),
                mapped_dir: format!("{}{}", target, remainder),
            })
        })
    }

    pub fn validate(&self) -> Result<(), MigrationError> {
        let mut errors = Vec::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.prefix.trim().is_empty() {
                errors.push(format!("GLM entry {} has a blank prefix", idx));
            }
            if entry.targets.is_empty() {
                errors.push(format!("GLM entry '{}' has no targets", entry.prefix));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MigrationError::Validation(errors))
        }
    }
}
