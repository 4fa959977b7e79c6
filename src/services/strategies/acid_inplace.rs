// In-place ACID downgrades
//
// These strategies rewrite a transactional table on LEFT as an external,
// non-transactional table under the same name. The original is kept as
// `<name>_archive` until cleanup. All SQL runs on LEFT; the RIGHT slot only
// carries the new definition.

use crate::models::{
    CopySpec, CreateStrategy, DataStrategy, DbMirror, Environment, MigrationError, MirrorConfig, SqlPair, TableMirror,
};
use crate::services::ddl;

use super::common::{self, ARCHIVE_SUFFIX};
use super::export_import::{check_partition_limit, export_location, export_table};
use super::{DataStrategyService, MigrationContext};

pub struct SqlAcidDowngradeInPlaceDataStrategy;

pub struct ExportImportAcidDowngradeInPlaceDataStrategy;

/// Picks the SQL or EXPORT_IMPORT in-place downgrade per table
pub struct HybridAcidDowngradeInPlaceDataStrategy;

fn archive_name(table: &TableMirror) -> String {
    format!("{}{}", table.name, ARCHIVE_SUFFIX)
}

/// Refuse tables that are already downgraded, or not transactional
fn check_downgradable(table: &TableMirror) -> Result<(), MigrationError> {
    if ddl::tbl_property(&table.left().definition, ddl::DOWNGRADED_IN_PLACE).is_some() {
        return Err(MigrationError::validation(format!(
            "{} was already downgraded in place; refusing to process it again",
            table.name
        )));
    }
    if !table.is_acid() {
        return Err(MigrationError::validation(format!(
            "{} is not transactional; nothing to downgrade",
            table.name
        )));
    }
    Ok(())
}

/// New location under the database's external warehouse directory, if planned
fn in_place_location(config: &MirrorConfig, db: &DbMirror, name: &str) -> Result<Option<String>, MigrationError> {
    let Some(warehouse) = config.warehouse_for(&db.name) else {
        return Ok(None);
    };
    Ok(Some(format!(
        "{}/{}/{}.db/{}",
        config.left_namespace()?,
        warehouse.external_directory.trim_matches('/'),
        db.name,
        name
    )))
}

/// Store the downgraded definition in the RIGHT slot
fn downgraded_definition(ctx: &MigrationContext, db: &DbMirror, table: &mut TableMirror) -> Result<(), MigrationError> {
    let config = &ctx.config;
    let mut spec = CopySpec::new(Environment::Left, Environment::Right)
        .make_non_transactional()
        .make_external()
        .take_ownership(true)
        .strip_buckets_at_or_below(config.migrate_acid.artificial_bucket_threshold);
    spec = match in_place_location(config, db, &table.name)? {
        Some(location) => spec.with_location(location),
        None => spec.strip_location(),
    };
    let mut definition = ddl::apply_copy_spec(&table.left().definition, &table.name, &spec);
    ddl::upsert_tbl_property(&mut definition, ddl::DOWNGRADED_IN_PLACE, "true");

    let name = table.name.clone();
    let right = table.right_mut();
    right.name = name;
    right.definition = definition;
    right.create_strategy = CreateStrategy::Create;
    Ok(())
}

#[async_trait::async_trait]
impl DataStrategyService for SqlAcidDowngradeInPlaceDataStrategy {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::SqlAcidDowngradeInplace
    }

    fn error_environment(&self) -> Environment {
        Environment::Left
    }

    fn build_out_definition(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        check_downgradable(table)?;
        downgraded_definition(ctx, db, table)
    }

    /// The SQL is generated even when the partition limit is exceeded, but
    /// the table then fails so nothing runs automatically.
    fn build_out_sql(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        let config = &ctx.config;
        let archive = archive_name(table);
        let right = table.right();

        let mut pairs = vec![
            common::use_database(&db.name),
            common::rename_table(&table.name, &archive),
        ];
        pairs.extend(common::table_ddl(right));
        pairs.extend(common::move_data(config, table.left(), &archive, right)?);

        let left = table.left_mut();
        left.sql.extend(pairs);
        left.cleanup_sql.push(common::drop_table(&archive));

        let limit = config.migrate_acid.partition_limit;
        let count = table.partition_count();
        if table.is_partitioned() && limit > 0 && count > limit {
            return Err(MigrationError::validation(format!(
                "{} has {} partitions, above migrate_acid.partition_limit of {}; SQL was generated but must be run manually",
                table.name, count, limit
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DataStrategyService for ExportImportAcidDowngradeInPlaceDataStrategy {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::ExportImportAcidDowngradeInplace
    }

    fn error_environment(&self) -> Environment {
        Environment::Left
    }

    fn build_out_definition(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        check_downgradable(table)?;
        check_partition_limit(table, ctx.config.hybrid.export_import_partition_limit, self.strategy())?;
        downgraded_definition(ctx, db, table)
    }

    fn build_out_sql(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        let export = export_location(&ctx.config, db, &table.name)?;
        let archive = archive_name(table);
        let name = table.name.clone();
        let location = table
            .right()
            .location()
            .map(|l| format!(" LOCATION '{}'", l))
            .unwrap_or_default();

        let left = table.left_mut();
        left.sql.push(common::use_database(&db.name));
        left.sql.push(export_table(&name, &export));
        left.sql.push(common::rename_table(&name, &archive));
        left.sql.push(SqlPair::new(
            format!("Importing {} as external", name),
            format!("IMPORT EXTERNAL TABLE {} FROM '{}'{}", name, export, location),
        ));
        left.sql.push(SqlPair::new(
            format!("Marking {} as downgraded", name),
            format!(
                "ALTER TABLE {} SET TBLPROPERTIES ('{}'='true', '{}'='true')",
                name,
                ddl::DOWNGRADED_IN_PLACE,
                ddl::PURGE
            ),
        ));
        left.cleanup_sql.push(common::drop_table(&archive));
        Ok(())
    }
}

impl HybridAcidDowngradeInPlaceDataStrategy {
    fn resolve(ctx: &MigrationContext, table: &TableMirror) -> &'static dyn DataStrategyService {
        let config = &ctx.config;
        if config.clusters.left.legacy_hive {
            return &SqlAcidDowngradeInPlaceDataStrategy;
        }
        if table.is_partitioned() {
            let limit = config.hybrid.export_import_partition_limit;
            if limit <= 0 || (table.partition_count() as i64) < limit {
                return &ExportImportAcidDowngradeInPlaceDataStrategy;
            }
            return &SqlAcidDowngradeInPlaceDataStrategy;
        }
        &ExportImportAcidDowngradeInPlaceDataStrategy
    }
}

#[async_trait::async_trait]
impl DataStrategyService for HybridAcidDowngradeInPlaceDataStrategy {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::HybridAcidDowngradeInplace
    }

    fn error_environment(&self) -> Environment {
        Environment::Left
    }

    fn build(&self, ctx: &MigrationContext, db: &DbMirror, table: &mut TableMirror) -> bool {
        let service = Self::resolve(ctx, table);
        table.strategy = Some(service.strategy());
        table.add_step("build", format!("{} chose {}", self.strategy(), service.strategy()));
        service.build(ctx, db, table)
    }

    fn build_out_definition(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        Self::resolve(ctx, table).build_out_definition(ctx, db, table)
    }

    fn build_out_sql(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        Self::resolve(ctx, table).build_out_sql(ctx, db, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PhaseState, Warehouse};
    use crate::services::strategies::fixtures;

    fn in_place_config() -> MirrorConfig {
        let mut config = fixtures::config();
        config.data_strategy = DataStrategy::SqlAcidDowngradeInplace;
        config.migrate_acid.on = true;
        config.migrate_acid.downgrade = true;
        config.migrate_acid.in_place = true;
        config
    }

    #[test]
    fn test_sql_in_place_renames_then_rewrites() {
        let mut config = in_place_config();
        config.transfer.warehouse = Some(Warehouse::new("/warehouse/external", "/warehouse/managed"));
        let (ctx, _) = fixtures::context(config);
        let mut table = fixtures::acid_table("t1", 2);
        assert!(SqlAcidDowngradeInPlaceDataStrategy.build(&ctx, &fixtures::db(), &mut table));

        let right = &table.right().definition;
        assert!(!ddl::is_acid(right));
        assert!(ddl::is_external(right));
        assert_eq!(ddl::bucket_count(right), None);
        assert_eq!(ddl::tbl_property(right, ddl::DOWNGRADED_IN_PLACE).as_deref(), Some("true"));
        assert_eq!(
            table.right().location().as_deref(),
            Some("hdfs://src/warehouse/external/db1.db/t1")
        );

        let sql = fixtures::statements(&table, Environment::Left);
        assert_eq!(sql[0], "USE db1");
        assert_eq!(sql[1], "ALTER TABLE t1 RENAME TO t1_archive");
        assert!(sql[2].starts_with("CREATE EXTERNAL TABLE `t1`("));
        assert!(sql.contains(&"INSERT OVERWRITE TABLE t1 PARTITION (day) SELECT * FROM t1_archive".to_string()));
        assert_eq!(table.left().cleanup_sql[0].statement, "DROP TABLE IF EXISTS t1_archive");
        assert!(table.right().sql.is_empty());
    }

    #[test]
    fn test_refuses_already_downgraded_table() {
        let (ctx, _) = fixtures::context(in_place_config());
        let mut table = fixtures::acid_table("t1", 0);
        ddl::upsert_tbl_property(&mut table.left_mut().definition, ddl::DOWNGRADED_IN_PLACE, "true");
        assert!(!SqlAcidDowngradeInPlaceDataStrategy.build(&ctx, &fixtures::db(), &mut table));
        assert!(table.left().errors[0].contains("already downgraded in place"));
        assert!(table.left().sql.is_empty());
    }

    #[test]
    fn test_partition_limit_generates_sql_but_fails() {
        let mut config = in_place_config();
        config.migrate_acid.partition_limit = 1;
        let (ctx, _) = fixtures::context(config);
        let mut table = fixtures::acid_table("t1", 3);
        assert!(!SqlAcidDowngradeInPlaceDataStrategy.build(&ctx, &fixtures::db(), &mut table));
        assert!(!table.left().sql.is_empty());
        assert_eq!(table.left().errors.len(), 1);
        assert_ne!(table.phase_state, PhaseState::Error);
    }

    #[test]
    fn test_export_import_in_place() {
        let (ctx, _) = fixtures::context(in_place_config());
        let mut table = fixtures::acid_table("t1", 0);
        assert!(ExportImportAcidDowngradeInPlaceDataStrategy.build(&ctx, &fixtures::db(), &mut table));
        let sql = fixtures::statements(&table, Environment::Left);
        assert_eq!(
            sql,
            vec![
                "USE db1".to_string(),
                "EXPORT TABLE t1 TO 'hdfs://src/apps/hive/warehouse/export_db1/t1'".to_string(),
                "ALTER TABLE t1 RENAME TO t1_archive".to_string(),
                "IMPORT EXTERNAL TABLE t1 FROM 'hdfs://src/apps/hive/warehouse/export_db1/t1'".to_string(),
                "ALTER TABLE t1 SET TBLPROPERTIES ('hms-mirror.downgraded.inplace'='true', 'external.table.purge'='true')"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_hybrid_in_place_decision_tree() {
        let mut config = in_place_config();
        config.hybrid.export_import_partition_limit = 3;
        let (ctx, _) = fixtures::context(config.clone());

        let mut small = fixtures::acid_table("t1", 2);
        assert!(HybridAcidDowngradeInPlaceDataStrategy.build(&ctx, &fixtures::db(), &mut small));
        assert_eq!(small.strategy, Some(DataStrategy::ExportImportAcidDowngradeInplace));

        let mut large = fixtures::acid_table("t2", 3);
        assert!(HybridAcidDowngradeInPlaceDataStrategy.build(&ctx, &fixtures::db(), &mut large));
        assert_eq!(large.strategy, Some(DataStrategy::SqlAcidDowngradeInplace));

        let mut flat = fixtures::acid_table("t3", 0);
        assert!(HybridAcidDowngradeInPlaceDataStrategy.build(&ctx, &fixtures::db(), &mut flat));
        assert_eq!(flat.strategy, Some(DataStrategy::ExportImportAcidDowngradeInplace));

        config.clusters.left.legacy_hive = true;
        let (ctx, _) = fixtures::context(config);
        let mut legacy = fixtures::acid_table("t4", 0);
        assert!(HybridAcidDowngradeInPlaceDataStrategy.build(&ctx, &fixtures::db(), &mut legacy));
        assert_eq!(legacy.strategy, Some(DataStrategy::SqlAcidDowngradeInplace));
    }
}
