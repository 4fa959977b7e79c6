use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{DbMirror, GlmMatch, MigrationError, MirrorConfig, TableMirror, TableType};
use crate::services::ddl;

/// A computed target location and the notes gathered on the way
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranslatedLocation {
    pub location: String,
    pub glm_applied: bool,
    pub issues: Vec<String>,
}

/// Target database directories derived from the warehouse plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseLocations {
    pub location: String,
    pub managed_location: String,
}

/// Computes target storage locations for tables and partitions
///
/// The Global Location Map is evaluated in list order and the first
/// matching prefix wins, even when a later entry is longer.
#[derive(Clone)]
pub struct LocationTranslator {
    config: Arc<MirrorConfig>,
}

impl LocationTranslator {
    pub fn new(config: Arc<MirrorConfig>) -> Self {
        Self { config }
    }

    /// Location with its namespace (scheme and authority) removed
    pub fn relative_dir(&self, original_location: &str) -> Option<String> {
        let original = original_location.trim();
        if original.is_empty() {
            return None;
        }
        let left_ns = self.config.clusters.left.hcfs_namespace.trim().trim_end_matches('/');
        let relative = if !left_ns.is_empty() && has_namespace(original, left_ns) {
            &original[left_ns.len()..]
        } else if let Some(idx) = original.find("://") {
            let after = &original[idx + 3..];
            after.find('/').map(|i| &after[i..]).unwrap_or("")
        } else {
            original
        };
        let relative = relative.trim_end_matches('/');
        if relative.is_empty() {
            None
        } else if relative.starts_with('/') {
            Some(relative.to_string())
        } else {
            Some(format!("/{}", relative))
        }
    }

    /// Isolated GLM lookup
    pub fn process_global_location_map(&self, relative_dir: &str, table_type: TableType) -> Option<GlmMatch> {
        self.config
            .translator
            .global_location_map
            .lookup(relative_dir, table_type)
    }

    /// Pure translation; records nothing on the table
    pub fn translate(
        &self,
        db: &DbMirror,
        table: &TableMirror,
        original_location: Option<&str>,
        partition_spec: Option<&str>,
    ) -> Result<TranslatedLocation, MigrationError> {
        let target_ns = self.config.target_namespace()?;
        let target_db = self.config.resolve_database(&db.name);
        let table_type = ddl::table_type(&table.left().definition);
        let relative = original_location.and_then(|l| self.relative_dir(l));
        let mut issues = Vec::new();

        if let Some(rel) = &relative {
            if let Some(glm) = self.process_global_location_map(rel, table_type) {
                let location = format!("{}{}", target_ns, with_leading_slash(&glm.mapped_dir));
                tracing::debug!("GLM remapped {} to {}", rel, location);
                issues.push(format!(
                    "GLM applied for '{}': '{}' -> '{}'",
                    rel, glm.source_prefix, glm.target_prefix
                ));
                check_partition_suffix(&location, partition_spec, &mut issues);
                return Ok(TranslatedLocation {
                    location,
                    glm_applied: true,
                    issues,
                });
            }
        }

        if self.config.distcp_enabled() {
            if let (Some(base), Some(original)) = (table.left().location(), original_location) {
                if !is_within(original.trim(), &base) {
                    return Err(MigrationError::FatalAlignment(format!(
                        "Location '{}' of {}.{} is outside the table location '{}' and no GLM entry maps it; DistCp cannot be planned",
                        original, db.name, table.name, base
                    )));
                }
            }
        }

        let location = match relative {
            Some(rel) => {
                let rel = replace_database_dir(&rel, &db.name, &target_db);
                format!("{}{}", target_ns, rel)
            }
            None => {
                let warehouse = self.config.warehouse_for(&db.name).ok_or_else(|| {
                    MigrationError::RequiredConfiguration(format!(
                        "No warehouse plan for database '{}' and no default warehouse",
                        db.name
                    ))
                })?;
                let base = warehouse.directory_for(table_type).trim_end_matches('/');
                let mut location = format!(
                    "{}{}/{}.db/{}",
                    target_ns,
                    with_leading_slash(base),
                    target_db,
                    table.name
                );
                if let Some(spec) = partition_spec {
                    location.push('/');
                    location.push_str(spec.trim_matches('/'));
                }
                issues.push(format!(
                    "No source location for {}; using warehouse layout {}",
                    table.name, location
                ));
                location
            }
        };

        check_partition_suffix(&location, partition_spec, &mut issues);
        Ok(TranslatedLocation {
            location,
            glm_applied: false,
            issues,
        })
    }

    /// Translate and record the outcome on the table's RIGHT environment
    ///
    /// A fatal alignment failure marks the table as ERROR.
    pub fn translate_table_location(
        &self,
        db: &DbMirror,
        table: &mut TableMirror,
        original_location: Option<&str>,
        partition_spec: Option<&str>,
    ) -> Result<String, MigrationError> {
        match self.translate(db, table, original_location, partition_spec) {
            Ok(translated) => {
                for issue in translated.issues {
                    table.right_mut().add_issue(issue);
                }
                Ok(translated.location)
            }
            Err(err) => {
                if err.is_fatal() {
                    tracing::error!("{}.{}: {}", db.name, table.name, err);
                    table.mark_error();
                }
                table.right_mut().add_error(err.to_string());
                Err(err)
            }
        }
    }

    /// Translate every LEFT partition; the first failure fails the call
    pub fn translate_partition_locations(
        &self,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<BTreeMap<String, String>, MigrationError> {
        let partitions = table.left().partitions.clone();
        let mut translated = BTreeMap::new();
        for (spec, location) in &partitions {
            let new_location = self.translate_table_location(db, table, Some(location), Some(spec))?;
            translated.insert(spec.clone(), new_location);
        }
        table.right_mut().partitions = translated.clone();
        Ok(translated)
    }

    /// RIGHT database LOCATION and MANAGEDLOCATION from the warehouse plan
    pub fn translate_database_location(&self, db: &DbMirror) -> Result<Option<DatabaseLocations>, MigrationError> {
        let Some(warehouse) = self.config.warehouse_for(&db.name) else {
            return Ok(None);
        };
        warehouse.validate()?;
        let target_ns = self.config.target_namespace()?;
        let target_db = self.config.resolve_database(&db.name);
        let dir = |base: &str| {
            format!(
                "{}{}/{}.db",
                target_ns,
                with_leading_slash(base.trim_end_matches('/')),
                target_db
            )
        };
        Ok(Some(DatabaseLocations {
            location: dir(&warehouse.external_directory),
            managed_location: dir(&warehouse.managed_directory),
        }))
    }
}

fn has_namespace(location: &str, namespace: &str) -> bool {
    location.starts_with(namespace)
        && matches!(location.as_bytes().get(namespace.len()), None | Some(b'/'))
}

fn with_leading_slash(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Directory containment on segment boundaries
fn is_within(location: &str, base: &str) -> bool {
    let base = base.trim_end_matches('/');
    location == base || location.starts_with(&format!("{}/", base))
}

/// Swap the first `/<source>.db` segment for `/<target>.db`
fn replace_database_dir(relative: &str, source_db: &str, target_db: &str) -> String {
    if source_db == target_db {
        return relative.to_string();
    }
    let needle = format!("/{}.db", source_db);
    let mut search_from = 0;
    while let Some(found) = relative[search_from..].find(&needle) {
        let start = search_from + found;
        let end = start + needle.len();
        if matches!(relative.as_bytes().get(end), None | Some(b'/')) {
            return format!("{}/{}.db{}", &relative[..start], target_db, &relative[end..]);
        }
        search_from = end;
    }
    relative.to_string()
}

fn check_partition_suffix(location: &str, partition_spec: Option<&str>, issues: &mut Vec<String>) {
    if let Some(spec) = partition_spec {
        let spec = spec.trim_matches('/');
        if !spec.is_empty() && !location.trim_end_matches('/').ends_with(spec) {
            issues.push(format!(
                "Partition location '{}' does not end with its partition spec '{}'",
                location, spec
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataMovement, Warehouse};

    fn external_table(name: &str, location: &str) -> TableMirror {
        let mut table = TableMirror::new(name);
        table.left_mut().exists = true;
        table.left_mut().definition = vec![
            format!("CREATE EXTERNAL TABLE `{}`(", name),
            "  `id` int)".to_string(),
            "PARTITIONED BY (".to_string(),
            "  `p` string)".to_string(),
            "LOCATION".to_string(),
            format!("  '{}'", location),
        ];
        table
    }

    fn config() -> MirrorConfig {
        let mut config = MirrorConfig::default();
        config.clusters.left.hcfs_namespace = "hdfs://src".to_string();
        config.clusters.right.hcfs_namespace = "hdfs://tgt".to_string();
        config
    }

    #[test]
    fn test_glm_end_to_end() {
        let mut config = config();
        config
            .translator
            .global_location_map
            .add("/warehouse/db1.db", TableType::ExternalTable, "/ext/db1");
        let translator = LocationTranslator::new(Arc::new(config));
        let db = DbMirror::new("db1");
        let table = external_table("tbl1", "hdfs://src/warehouse/db1.db/tbl1");

        let result = translator
            .translate(&db, &table, Some("hdfs://src/warehouse/db1.db/tbl1/p=1"), Some("p=1"))
            .unwrap();
        assert_eq!(result.location, "hdfs://tgt/ext/db1/tbl1/p=1");
        assert!(result.glm_applied);
        assert_eq!(result.issues.len(), 1);
    }

    #[test]
    fn test_relative_dir_strips_namespace() {
        let translator = LocationTranslator::new(Arc::new(config()));
        assert_eq!(
            translator.relative_dir("hdfs://src/warehouse/db1.db/t").as_deref(),
            Some("/warehouse/db1.db/t")
        );
        assert_eq!(
            translator.relative_dir("s3a://other-bucket/data/t/").as_deref(),
            Some("/data/t")
        );
        assert!(translator.relative_dir("hdfs://src").is_none());
        assert!(translator.relative_dir("  ").is_none());
    }

    #[test]
    fn test_unmatched_replaces_database_dir() {
        let mut config = config();
        config.database_prefix = Some("bak_".to_string());
        let translator = LocationTranslator::new(Arc::new(config));
        let db = DbMirror::new("db1");
        let table = external_table("tbl1", "hdfs://src/warehouse/db1.db/tbl1");
        let result = translator
            .translate(&db, &table, Some("hdfs://src/warehouse/db1.db/tbl1/p=1"), Some("p=1"))
            .unwrap();
        assert_eq!(result.location, "hdfs://tgt/warehouse/bak_db1.db/tbl1/p=1");
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_fallback_to_warehouse_appends_partition_spec() {
        let mut config = config();
        config
            .translator
            .warehouse_plans
            .add_plan("db1", "/w/ext", "/w/managed")
            .unwrap();
        let translator = LocationTranslator::new(Arc::new(config));
        let db = DbMirror::new("db1");
        let mut table = TableMirror::new("tbl1");
        table.left_mut().definition = vec!["CREATE TABLE `tbl1`(".into(), "  `id` int)".into()];
        let result = translator.translate(&db, &table, None, Some("p=1")).unwrap();
        assert_eq!(result.location, "hdfs://tgt/w/managed/db1.db/tbl1/p=1");
    }

    #[test]
    fn test_fallback_without_warehouse_is_configuration_error() {
        let translator = LocationTranslator::new(Arc::new(config()));
        let db = DbMirror::new("db1");
        let table = TableMirror::new("tbl1");
        let err = translator.translate(&db, &table, None, None).unwrap_err();
        assert!(matches!(err, MigrationError::RequiredConfiguration(_)));
    }

    #[test]
    fn test_misaligned_partition_with_distcp_is_fatal() {
        let mut config = config();
        config.transfer.data_movement = DataMovement::Distcp;
        let translator = LocationTranslator::new(Arc::new(config));
        let db = DbMirror::new("db1");
        let mut table = external_table("tbl1", "hdfs://src/warehouse/db1.db/tbl1");
        table
            .left_mut()
            .partitions
            .insert("p=1".into(), "hdfs://src/warehouse/db1.db/tbl1/p=1".into());
        table
            .left_mut()
            .partitions
            .insert("p=2".into(), "hdfs://src/landing/p=2".into());

        let err = translator.translate_partition_locations(&db, &mut table).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(table.phase_state, crate::models::PhaseState::Error);
        assert_eq!(table.right().errors.len(), 1);
    }

    #[test]
    fn test_misaligned_partition_without_distcp_is_translated() {
        let translator = LocationTranslator::new(Arc::new(config()));
        let db = DbMirror::new("db1");
        let mut table = external_table("tbl1", "hdfs://src/warehouse/db1.db/tbl1");
        table
            .left_mut()
            .partitions
            .insert("p=2".into(), "hdfs://src/landing/p=2".into());
        let translated = translator.translate_partition_locations(&db, &mut table).unwrap();
        assert_eq!(translated["p=2"], "hdfs://tgt/landing/p=2");
        assert_eq!(table.right().partitions.len(), 1);
    }

    #[test]
    fn test_sibling_table_prefix_is_not_contained() {
        assert!(is_within("/w/db.db/t1/p=1", "/w/db.db/t1"));
        assert!(!is_within("/w/db.db/t10/p=1", "/w/db.db/t1"));
    }

    #[test]
    fn test_translation_is_idempotent() {
        let mut config = config();
        config
            .translator
            .global_location_map
            .add("/warehouse", TableType::ExternalTable, "/ext");
        let translator = LocationTranslator::new(Arc::new(config));
        let db = DbMirror::new("db1");
        let mut table = external_table("tbl1", "hdfs://src/warehouse/db1.db/tbl1");
        let first = translator
            .translate_table_location(&db, &mut table, Some("hdfs://src/warehouse/db1.db/tbl1"), None)
            .unwrap();
        let second = translator
            .translate_table_location(&db, &mut table, Some("hdfs://src/warehouse/db1.db/tbl1"), None)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_database_locations() {
        let mut config = config();
        config.transfer.warehouse = Some(Warehouse::new("/ext", "/managed"));
        let translator = LocationTranslator::new(Arc::new(config));
        let locations = translator
            .translate_database_location(&DbMirror::new("db1"))
            .unwrap()
            .unwrap();
        assert_eq!(locations.location, "hdfs://tgt/ext/db1.db");
        assert_eq!(locations.managed_location, "hdfs://tgt/managed/db1.db");
    }
}
