use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::environment::Environment;
use super::error::MigrationError;
use super::strategy::DataStrategy;
use super::warehouse::{GlobalLocationMap, Warehouse, WarehousePlanRegistry};

/// Migration run configuration
///
/// Every field has a default so partial YAML/JSON documents load cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub data_strategy: DataStrategy,
    pub database_prefix: Option<String>,
    pub database_rename: BTreeMap<String, String>,
    pub parallelism: usize,
    pub clusters: Clusters,
    pub transfer: TransferConfig,
    pub migrate_acid: MigrateAcidConfig,
    pub hybrid: HybridConfig,
    pub ownership_transfer: OwnershipTransferConfig,
    pub optimization: OptimizationConfig,
    pub translator: TranslatorConfig,
    pub sync: bool,
    pub read_only: bool,
    /// false means dry run: SQL is generated but never executed
    pub execute: bool,
    pub save_working_tables: bool,
    pub migrate_views: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            data_strategy: DataStrategy::SchemaOnly,
            database_prefix: None,
            database_rename: BTreeMap::new(),
            parallelism: num_cpus::get().max(1),
            clusters: Clusters::default(),
            transfer: TransferConfig::default(),
            migrate_acid: MigrateAcidConfig::default(),
            hybrid: HybridConfig::default(),
            ownership_transfer: OwnershipTransferConfig::default(),
            optimization: OptimizationConfig::default(),
            translator: TranslatorConfig::default(),
            sync: false,
            read_only: false,
            execute: false,
            save_working_tables: false,
            migrate_views: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Clusters {
    pub left: ClusterConfig,
    pub right: ClusterConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub legacy_hive: bool,
    pub hcfs_namespace: String,
    pub hive_server2_uri: Option<String>,
    pub partition_discovery: PartitionDiscoveryConfig,
    pub metastore_direct: Option<MetastoreDirectConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionDiscoveryConfig {
    pub auto: bool,
    pub init_msck: bool,
}

impl Default for PartitionDiscoveryConfig {
    fn default() -> Self {
        Self {
            auto: true,
            init_msck: true,
        }
    }
}

/// Direct JDBC-style access to the metastore's backing RDBMS
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetastoreDirectConfig {
    /// `postgresql://...` or `mysql://...`
    pub uri: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataMovement {
    #[default]
    Sql,
    ExportImport,
    Distcp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub intermediate_storage: Option<String>,
    pub target_namespace: Option<String>,
    pub export_base_dir_prefix: String,
    pub remote_working_directory: String,
    pub shadow_prefix: String,
    pub transfer_prefix: String,
    pub data_movement: DataMovement,
    pub consolidation_level: i32,
    /// Default warehouse when a database has no plan
    pub warehouse: Option<Warehouse>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            intermediate_storage: None,
            target_namespace: None,
            export_base_dir_prefix: "/apps/hive/warehouse/export_".to_string(),
            remote_working_directory: "hms_mirror_remote_working_dir".to_string(),
            shadow_prefix: "hms_mirror_shadow_".to_string(),
            transfer_prefix: "hms_mirror_transfer_".to_string(),
            data_movement: DataMovement::Sql,
            consolidation_level: 0,
            warehouse: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateAcidConfig {
    pub on: bool,
    pub only: bool,
    pub downgrade: bool,
    pub in_place: bool,
    pub artificial_bucket_threshold: u32,
    pub partition_limit: usize,
}

impl Default for MigrateAcidConfig {
    fn default() -> Self {
        Self {
            on: false,
            only: false,
            downgrade: false,
            in_place: false,
            artificial_bucket_threshold: 2,
            partition_limit: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub export_import_partition_limit: i64,
    pub sql_partition_limit: i64,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            export_import_partition_limit: 100,
            sql_partition_limit: 500,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnershipTransferConfig {
    pub database: bool,
    pub table: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    pub skip: bool,
    pub auto_tune: bool,
    pub compress_text_output: bool,
    pub skip_stats_collection: bool,
    pub sort_dynamic_partition_inserts: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub force_external_location: bool,
    pub global_location_map: GlobalLocationMap,
    pub warehouse_plans: WarehousePlanRegistry,
}

impl MirrorConfig {
    pub fn cluster(&self, env: Environment) -> &ClusterConfig {
        match env {
            Environment::Left | Environment::Transfer => &self.clusters.left,
            Environment::Right | Environment::Shadow => &self.clusters.right,
        }
    }

    /// ACID semantics differ between legacy and current Hive
    pub fn crosses_legacy_boundary(&self) -> bool {
        self.clusters.left.legacy_hive != self.clusters.right.legacy_hive
    }

    pub fn distcp_enabled(&self) -> bool {
        self.transfer.data_movement == DataMovement::Distcp
    }

    pub fn intermediate_storage(&self) -> Option<&str> {
        non_blank(self.transfer.intermediate_storage.as_deref())
    }

    pub fn configured_target_namespace(&self) -> Option<&str> {
        non_blank(self.transfer.target_namespace.as_deref())
    }

    /// Namespace new RIGHT locations are built under
    pub fn target_namespace(&self) -> Result<String, MigrationError> {
        if let Some(ns) = self.configured_target_namespace() {
            return Ok(trim_slash(ns));
        }
        if self.data_strategy == DataStrategy::StorageMigration
            || self.data_strategy.is_in_place()
        {
            return self.left_namespace();
        }
        non_blank(Some(self.clusters.right.hcfs_namespace.as_str()))
            .map(trim_slash)
            .ok_or_else(|| {
                MigrationError::RequiredConfiguration(
                    "Target namespace is not defined (transfer.target_namespace or clusters.right.hcfs_namespace)"
                        .to_string(),
                )
            })
    }

    pub fn left_namespace(&self) -> Result<String, MigrationError> {
        non_blank(Some(self.clusters.left.hcfs_namespace.as_str()))
            .map(trim_slash)
            .ok_or_else(|| {
                MigrationError::RequiredConfiguration("clusters.left.hcfs_namespace is not defined".to_string())
            })
    }

    /// Target database name after rename and prefix
    pub fn resolve_database(&self, database: &str) -> String {
        let renamed = self
            .database_rename
            .get(database)
            .cloned()
            .unwrap_or_else(|| database.to_string());
        match non_blank(self.database_prefix.as_deref()) {
            Some(prefix) => format!("{}{}", prefix, renamed),
            None => renamed,
        }
    }

    /// Warehouse plan for a database, falling back to the default warehouse
    pub fn warehouse_for(&self, database: &str) -> Option<&Warehouse> {
        self.translator
            .warehouse_plans
            .get(database)
            .or(self.transfer.warehouse.as_ref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn trim_slash(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}
