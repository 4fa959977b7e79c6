// Shared test fixtures for strategy tests

use std::sync::Arc;

use crate::models::{DbMirror, MirrorConfig, TableMirror, DATA_SIZE, FILE_FORMAT};
use crate::services::executor::RecordingSqlExecutor;

use super::MigrationContext;

pub fn config() -> MirrorConfig {
    let mut config = MirrorConfig::default();
    config.clusters.left.hcfs_namespace = "hdfs://src".into();
    config.clusters.right.hcfs_namespace = "hdfs://tgt".into();
    config.parallelism = 2;
    config
}

pub fn context(config: MirrorConfig) -> (MigrationContext, Arc<RecordingSqlExecutor>) {
    let executor = Arc::new(RecordingSqlExecutor::new());
    (MigrationContext::new(Arc::new(config), executor.clone()), executor)
}

pub fn db() -> DbMirror {
    DbMirror::new("db1")
}

fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

fn table(name: &str, definition: Vec<String>) -> TableMirror {
    let mut table = TableMirror::new(name);
    table.left_mut().exists = true;
    table.left_mut().owner = Some("etl".into());
    table.left_mut().definition = definition;
    table
        .left_mut()
        .statistics
        .insert(FILE_FORMAT.to_string(), serde_json::json!("ORC"));
    table
        .left_mut()
        .statistics
        .insert(DATA_SIZE.to_string(), serde_json::json!(64 * 1024 * 1024));
    table
}

pub fn external_table(name: &str) -> TableMirror {
    table(
        name,
        lines(&[
            format!("CREATE EXTERNAL TABLE `{}`(", name).as_str(),
            "  `id` bigint,",
            "  `name` string)",
            "STORED AS ORC",
            "LOCATION",
            format!("  'hdfs://src/warehouse/db1.db/{}'", name).as_str(),
            "TBLPROPERTIES (",
            "  'bucketing_version'='2')",
        ]),
    )
}

/// Legacy (Hive 1/2) managed, non-transactional table
pub fn managed_table(name: &str) -> TableMirror {
    table(
        name,
        lines(&[
            format!("CREATE TABLE `{}`(", name).as_str(),
            "  `id` bigint,",
            "  `name` string)",
            "STORED AS ORC",
            "LOCATION",
            format!("  'hdfs://src/apps/hive/warehouse/db1.db/{}'", name).as_str(),
            "TBLPROPERTIES (",
            "  'bucketing_version'='2')",
        ]),
    )
}

/// Partitioned external table with `count` partitions under its location
pub fn partitioned_table(name: &str, count: usize) -> TableMirror {
    let mut table = table(
        name,
        lines(&[
            format!("CREATE EXTERNAL TABLE `{}`(", name).as_str(),
            "  `id` bigint,",
            "  `name` string)",
            "PARTITIONED BY (",
            "  `day` string)",
            "STORED AS ORC",
            "LOCATION",
            format!("  'hdfs://src/warehouse/db1.db/{}'", name).as_str(),
            "TBLPROPERTIES (",
            "  'bucketing_version'='2')",
        ]),
    );
    for idx in 0..count {
        table.left_mut().partitions.insert(
            format!("day={:03}", idx),
            format!("hdfs://src/warehouse/db1.db/{}/day={:03}", name, idx),
        );
    }
    table
}

/// Transactional table, optionally partitioned with `count` partitions
pub fn acid_table(name: &str, count: usize) -> TableMirror {
    let mut definition = lines(&[format!("CREATE TABLE `{}`(", name).as_str(), "  `id` bigint,", "  `name` string)"]);
    if count > 0 {
        definition.extend(lines(&["PARTITIONED BY (", "  `day` string)"]));
    }
    definition.extend(lines(&[
        "CLUSTERED BY (",
        "  id)",
        "INTO 2 BUCKETS",
        "STORED AS ORC",
        "LOCATION",
        format!("  'hdfs://src/warehouse/tablespace/managed/hive/db1.db/{}'", name).as_str(),
        "TBLPROPERTIES (",
        "  'transactional'='true',",
        "  'transactional_properties'='default')",
    ]));
    let mut table = table(name, definition);
    for idx in 0..count {
        table.left_mut().partitions.insert(
            format!("day={:03}", idx),
            format!(
                "hdfs://src/warehouse/tablespace/managed/hive/db1.db/{}/day={:03}",
                name, idx
            ),
        );
    }
    table
}

/// Statements of one environment's SQL list
pub fn statements(table: &TableMirror, env: crate::models::Environment) -> Vec<String> {
    table.env(env).sql.iter().map(|p| p.statement.clone()).collect()
}
