use crate::models::{CopySpec, CreateStrategy, DataStrategy, DbMirror, Environment, MigrationError, TableMirror};
use crate::services::ddl;

use super::common::{self, derive_environment};
use super::{DataStrategyService, MigrationContext};

/// Recreates table definitions on RIGHT without moving data
pub struct SchemaOnlyDataStrategy;

/// RIGHT SQL for a table whose data is already in place
pub(crate) fn right_schema_sql(ctx: &MigrationContext, db: &DbMirror, table: &mut TableMirror) {
    let config = &ctx.config;
    let right = table.right();
    let creating = matches!(
        right.create_strategy,
        CreateStrategy::Create | CreateStrategy::Replace
    );
    let mut pairs = common::table_ddl(right);
    if creating {
        pairs.extend(common::detached_partitions(right));
        pairs.extend(common::repair_partitions(
            right,
            config.clusters.right.partition_discovery.init_msck,
        ));
        pairs.extend(common::ownership(config, table.left(), &right.name));
    }
    if pairs.is_empty() {
        return;
    }
    let right = table.right_mut();
    right.sql.push(common::use_database(&ctx.target_database(db)));
    right.sql.extend(pairs);
}

#[async_trait::async_trait]
impl DataStrategyService for SchemaOnlyDataStrategy {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::SchemaOnly
    }

    fn build_out_definition(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        let config = &ctx.config;
        if ddl::is_view(&table.left().definition) {
            derive_environment(config, table, &CopySpec::new(Environment::Left, Environment::Right))?;
            return Ok(());
        }

        let mut spec = common::owned_target_spec(ctx, db, table)?;
        if table.is_acid() && config.migrate_acid.downgrade {
            spec = spec.strip_buckets_at_or_below(config.migrate_acid.artificial_bucket_threshold);
        }
        derive_environment(config, table, &spec)?;

        if table.is_partitioned() && !table.is_acid() && table.partition_count() > 0 {
            ctx.translator.translate_partition_locations(db, table)?;
        }
        Ok(())
    }

    fn build_out_sql(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        right_schema_sql(ctx, db, table);
        Ok(())
    }
}
