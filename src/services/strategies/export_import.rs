use crate::models::{CreateStrategy, DataStrategy, DbMirror, MigrationError, MirrorConfig, SqlPair, TableMirror};
use crate::services::ddl;

use super::common::{self, derive_environment};
use super::{DataStrategyService, MigrationContext};

/// Moves data with Hive `EXPORT` on LEFT and `IMPORT` on RIGHT
pub struct ExportImportDataStrategy;

/// Staging directory for an export
///
/// Intermediate storage first, then a configured target namespace, then the
/// LEFT namespace with the export directory prefix.
pub(crate) fn export_location(config: &MirrorConfig, db: &DbMirror, table_name: &str) -> Result<String, MigrationError> {
    let working = |base: &str| {
        format!(
            "{}/{}/{}/{}",
            base.trim().trim_end_matches('/'),
            config.transfer.remote_working_directory.trim_matches('/'),
            db.name,
            table_name
        )
    };
    if let Some(base) = config.intermediate_storage() {
        return Ok(working(base));
    }
    if let Some(base) = config.configured_target_namespace() {
        return Ok(working(base));
    }
    let left = config.left_namespace()?;
    Ok(format!(
        "{}{}{}/{}",
        left, config.transfer.export_base_dir_prefix, db.name, table_name
    ))
}

/// Partition counts above a positive limit are refused
pub(crate) fn check_partition_limit(
    table: &TableMirror,
    limit: i64,
    strategy: DataStrategy,
) -> Result<(), MigrationError> {
    let count = table.partition_count() as i64;
    if table.is_partitioned() && limit > 0 && count > limit {
        return Err(MigrationError::validation(format!(
            "{} has {} partitions, above the {} limit of {}; choose another strategy",
            table.name, count, strategy, limit
        )));
    }
    Ok(())
}

pub(crate) fn export_table(name: &str, location: &str) -> SqlPair {
    SqlPair::new(
        format!("Exporting {}", name),
        format!("EXPORT TABLE {} TO '{}'", name, location),
    )
}

#[async_trait::async_trait]
impl DataStrategyService for ExportImportDataStrategy {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::ExportImport
    }

    fn build_out_definition(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        let config = &ctx.config;
        if table.is_acid() && config.crosses_legacy_boundary() {
            return Err(MigrationError::validation(format!(
                "ACID table {} can't be exported between legacy and non-legacy Hive; use HYBRID or ACID",
                table.name
            )));
        }
        if !ddl::is_hive_native(&table.left().definition) {
            return Err(MigrationError::validation(format!(
                "{} uses a storage handler and can't be exported",
                table.name
            )));
        }
        check_partition_limit(table, config.hybrid.export_import_partition_limit, self.strategy())?;

        let spec = common::owned_target_spec(ctx, db, table)?;
        derive_environment(config, table, &spec)?;
        Ok(())
    }

    fn build_out_sql(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        let config = &ctx.config;
        let strategy = table.right().create_strategy;
        if !matches!(strategy, CreateStrategy::Create | CreateStrategy::Replace) {
            table
                .right_mut()
                .add_issue(format!("No import; target create strategy is {:?}", strategy));
            return Ok(());
        }
        let export = export_location(config, db, &table.name)?;

        let left = table.left_mut();
        left.sql.push(common::use_database(&db.name));
        left.sql.push(export_table(&left.name, &export));

        let right = table.right();
        let mut pairs = vec![common::use_database(&ctx.target_database(db))];
        if strategy == CreateStrategy::Replace {
            pairs.push(common::drop_table(&right.name));
        }
        if ddl::is_external(&right.definition) {
            let location = right
                .location()
                .map(|l| format!(" LOCATION '{}'", l))
                .unwrap_or_default();
            pairs.push(SqlPair::new(
                format!("Importing {}", right.name),
                format!("IMPORT EXTERNAL TABLE {} FROM '{}'{}", right.name, export, location),
            ));
            if ddl::is_purge(&right.definition) {
                pairs.push(SqlPair::new(
                    format!("Taking ownership of {} data", right.name),
                    format!(
                        "ALTER TABLE {} SET TBLPROPERTIES ('{}'='true')",
                        right.name,
                        ddl::PURGE
                    ),
                ));
            }
        } else {
            pairs.push(SqlPair::new(
                format!("Importing {}", right.name),
                format!("IMPORT TABLE {} FROM '{}'", right.name, export),
            ));
        }
        pairs.extend(common::ownership(config, table.left(), &right.name));
        table.right_mut().sql.extend(pairs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Environment;
    use crate::services::strategies::fixtures;

    #[test]
    fn test_export_location_priority() {
        let mut config = fixtures::config();
        let db = fixtures::db();
        assert_eq!(
            export_location(&config, &db, "t1").unwrap(),
            "hdfs://src/apps/hive/warehouse/export_db1/t1"
        );
        config.transfer.target_namespace = Some("s3a://target".into());
        assert_eq!(
            export_location(&config, &db, "t1").unwrap(),
            "s3a://target/hms_mirror_remote_working_dir/db1/t1"
        );
        config.transfer.intermediate_storage = Some("s3a://stage/".into());
        assert_eq!(
            export_location(&config, &db, "t1").unwrap(),
            "s3a://stage/hms_mirror_remote_working_dir/db1/t1"
        );
    }

    #[test]
    fn test_export_then_import() {
        let (ctx, _) = fixtures::context(fixtures::config());
        let mut table = fixtures::external_table("t1");
        assert!(ExportImportDataStrategy.build(&ctx, &fixtures::db(), &mut table));
        assert_eq!(
            fixtures::statements(&table, Environment::Left),
            vec![
                "USE db1".to_string(),
                "EXPORT TABLE t1 TO 'hdfs://src/apps/hive/warehouse/export_db1/t1'".to_string(),
            ]
        );
        assert_eq!(
            fixtures::statements(&table, Environment::Right)[1],
            "IMPORT EXTERNAL TABLE t1 FROM 'hdfs://src/apps/hive/warehouse/export_db1/t1' LOCATION 'hdfs://tgt/warehouse/db1.db/t1'"
        );
    }

    #[test]
    fn test_partition_limit_is_hard_failure() {
        let mut config = fixtures::config();
        config.hybrid.export_import_partition_limit = 2;
        let (ctx, _) = fixtures::context(config);
        let mut table = fixtures::partitioned_table("t1", 3);
        assert!(!ExportImportDataStrategy.build(&ctx, &fixtures::db(), &mut table));
        assert!(table.right().errors[0].contains("above the EXPORT_IMPORT limit of 2"));
        assert!(table.left().sql.is_empty());
    }

    #[test]
    fn test_rejects_acid_across_legacy_boundary() {
        let mut config = fixtures::config();
        config.clusters.left.legacy_hive = true;
        let (ctx, _) = fixtures::context(config);
        let mut table = fixtures::acid_table("t1", 0);
        assert!(!ExportImportDataStrategy.build(&ctx, &fixtures::db(), &mut table));
    }

    #[test]
    fn test_rejects_storage_handler_tables() {
        let (ctx, _) = fixtures::context(fixtures::config());
        let mut table = fixtures::external_table("t1");
        table
            .left_mut()
            .definition
            .insert(3, "STORED BY 'org.apache.hadoop.hive.hbase.HBaseStorageHandler'".into());
        assert!(!ExportImportDataStrategy.build(&ctx, &fixtures::db(), &mut table));
    }
}
