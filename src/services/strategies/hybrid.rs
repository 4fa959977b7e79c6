use crate::models::{DataStrategy, DbMirror, MigrationError, TableMirror};

use super::common;
use super::export_import::ExportImportDataStrategy;
use super::intermediate::IntermediateDataStrategy;
use super::sql::SqlDataStrategy;
use super::{DataStrategyService, MigrationContext};

/// Picks EXPORT_IMPORT, SQL or ACID per table
pub struct HybridDataStrategy;

impl HybridDataStrategy {
    /// Strategy recorded on the table and the service that builds it
    fn resolve(
        ctx: &MigrationContext,
        table: &TableMirror,
    ) -> Result<(DataStrategy, &'static dyn DataStrategyService), MigrationError> {
        let config = &ctx.config;
        if table.is_acid() && config.crosses_legacy_boundary() {
            if !config.migrate_acid.on {
                return Err(MigrationError::validation(format!(
                    "ACID table {} crosses legacy/non-legacy Hive and ACID migration is disabled",
                    table.name
                )));
            }
            return Ok((DataStrategy::Acid, &IntermediateDataStrategy));
        }

        let limit = config.hybrid.export_import_partition_limit;
        if table.is_partitioned() && limit > 0 && table.partition_count() as i64 > limit {
            if config.intermediate_storage().is_some() || config.configured_target_namespace().is_some() {
                return Ok((DataStrategy::Sql, &IntermediateDataStrategy));
            }
            return Ok((DataStrategy::Sql, &SqlDataStrategy));
        }
        Ok((DataStrategy::ExportImport, &ExportImportDataStrategy))
    }
}

#[async_trait::async_trait]
impl DataStrategyService for HybridDataStrategy {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::Hybrid
    }

    fn build(&self, ctx: &MigrationContext, db: &DbMirror, table: &mut TableMirror) -> bool {
        match Self::resolve(ctx, table) {
            Ok((strategy, service)) => {
                tracing::debug!("{}.{}: HYBRID chose {}", db.name, table.name, strategy);
                table.strategy = Some(strategy);
                table.add_step("build", format!("HYBRID chose {}", strategy));
                service.build(ctx, db, table)
            }
            Err(err) => {
                table.strategy = Some(DataStrategy::Hybrid);
                common::record_outcome(table, self.error_environment(), Err(err))
            }
        }
    }

    fn build_out_definition(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        let (strategy, service) = Self::resolve(ctx, table)?;
        table.strategy = Some(strategy);
        service.build_out_definition(ctx, db, table)
    }

    fn build_out_sql(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        let (_, service) = Self::resolve(ctx, table)?;
        service.build_out_sql(ctx, db, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Environment;
    use crate::services::strategies::fixtures;

    #[test]
    fn test_small_tables_use_export_import() {
        let (ctx, _) = fixtures::context(fixtures::config());
        let mut table = fixtures::partitioned_table("t1", 3);
        assert!(HybridDataStrategy.build(&ctx, &fixtures::db(), &mut table));
        assert_eq!(table.strategy, Some(DataStrategy::ExportImport));
        assert!(fixtures::statements(&table, Environment::Left)[1].starts_with("EXPORT TABLE t1"));
    }

    #[test]
    fn test_partition_count_above_limit_switches_to_sql() {
        let mut config = fixtures::config();
        config.hybrid.export_import_partition_limit = 2;
        let (ctx, _) = fixtures::context(config);
        let mut table = fixtures::partitioned_table("t1", 3);
        assert!(HybridDataStrategy.build(&ctx, &fixtures::db(), &mut table));
        assert_eq!(table.strategy, Some(DataStrategy::Sql));
        assert_eq!(table.env(Environment::Shadow).name, "hms_mirror_shadow_t1");
    }

    #[test]
    fn test_zero_limit_never_switches() {
        let mut config = fixtures::config();
        config.hybrid.export_import_partition_limit = 0;
        let (ctx, _) = fixtures::context(config);
        let mut table = fixtures::partitioned_table("t1", 3);
        assert!(HybridDataStrategy.build(&ctx, &fixtures::db(), &mut table));
        assert_eq!(table.strategy, Some(DataStrategy::ExportImport));
    }

    #[test]
    fn test_acid_across_legacy_boundary() {
        let mut config = fixtures::config();
        config.clusters.left.legacy_hive = true;
        let (ctx, _) = fixtures::context(config.clone());
        let mut table = fixtures::acid_table("t1", 0);
        assert!(!HybridDataStrategy.build(&ctx, &fixtures::db(), &mut table));
        assert!(table.right().errors[0].contains("ACID migration is disabled"));

        config.migrate_acid.on = true;
        let (ctx, _) = fixtures::context(config);
        let mut table = fixtures::acid_table("t1", 0);
        assert!(HybridDataStrategy.build(&ctx, &fixtures::db(), &mut table));
        assert_eq!(table.strategy, Some(DataStrategy::Acid));
        assert_eq!(table.env(Environment::Transfer).name, "hms_mirror_transfer_t1");
    }
}
