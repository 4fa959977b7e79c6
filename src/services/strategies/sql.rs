use crate::models::{CopySpec, CreateStrategy, DataStrategy, DbMirror, Environment, MigrationError, TableMirror};
use crate::services::ddl;

use super::acid_inplace::SqlAcidDowngradeInPlaceDataStrategy;
use super::common::{self, derive_environment};
use super::export_import::check_partition_limit;
use super::intermediate::IntermediateDataStrategy;
use super::{DataStrategyService, MigrationContext};

/// Moves data with `INSERT OVERWRITE ... SELECT` through a RIGHT shadow table
pub struct SqlDataStrategy;

impl SqlDataStrategy {
    /// Strategy to hand the table to, or None for the direct shadow path
    fn delegate(ctx: &MigrationContext, table: &TableMirror) -> Option<&'static dyn DataStrategyService> {
        let config = &ctx.config;
        if ddl::tbl_property(&table.left().definition, ddl::DOWNGRADED_IN_PLACE).is_some() {
            return Some(&SqlAcidDowngradeInPlaceDataStrategy);
        }
        if config.intermediate_storage().is_some()
            || config.configured_target_namespace().is_some()
            || (table.is_acid() && config.migrate_acid.on)
        {
            return Some(&IntermediateDataStrategy);
        }
        None
    }
}

/// Shadow table on RIGHT over LEFT's data location
pub(crate) fn linked_shadow_spec(ctx: &MigrationContext, table: &TableMirror) -> CopySpec {
    let mut spec = CopySpec::new(Environment::Left, Environment::Shadow)
        .make_non_transactional()
        .make_external()
        .take_ownership(false)
        .with_prefix(ctx.config.transfer.shadow_prefix.clone());
    if let Some(location) = table.left().location() {
        spec = spec.with_location(location);
    }
    spec
}

#[async_trait::async_trait]
impl DataStrategyService for SqlDataStrategy {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::Sql
    }

    fn build(&self, ctx: &MigrationContext, db: &DbMirror, table: &mut TableMirror) -> bool {
        table.strategy.get_or_insert(DataStrategy::Sql);
        if let Some(service) = Self::delegate(ctx, table) {
            tracing::info!("{}.{}: SQL delegating to {}", db.name, table.name, service.strategy());
            table.add_step("build", format!("SQL delegated to {}", service.strategy()));
            return service.build(ctx, db, table);
        }
        let result = self
            .build_out_definition(ctx, db, table)
            .and_then(|_| self.build_out_sql(ctx, db, table));
        common::record_outcome(table, self.error_environment(), result)
    }

    fn build_out_definition(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        if let Some(service) = Self::delegate(ctx, table) {
            return service.build_out_definition(ctx, db, table);
        }
        let config = &ctx.config;
        check_partition_limit(table, config.hybrid.sql_partition_limit, self.strategy())?;

        let right_spec = common::owned_target_spec(ctx, db, table)?;
        derive_environment(config, table, &right_spec)?;
        derive_environment(config, table, &linked_shadow_spec(ctx, table))?;
        let partitions = table.left().partitions.clone();
        table.env_mut(Environment::Shadow).partitions = partitions;
        Ok(())
    }

    fn build_out_sql(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        if let Some(service) = Self::delegate(ctx, table) {
            return service.build_out_sql(ctx, db, table);
        }
        let config = &ctx.config;
        let right = table.right();
        if !matches!(right.create_strategy, CreateStrategy::Create | CreateStrategy::Replace) {
            let note = format!("Target not rebuilt ({:?}); data not moved", right.create_strategy);
            table.right_mut().add_issue(note);
            return Ok(());
        }
        let shadow = table.env(Environment::Shadow);

        let mut pairs = vec![common::use_database(&ctx.target_database(db))];
        pairs.extend(common::table_ddl(shadow));
        pairs.extend(common::detached_partitions(shadow));
        pairs.extend(common::repair_partitions(shadow, true));
        pairs.extend(common::table_ddl(right));
        pairs.extend(common::move_data(config, table.left(), &shadow.name, right)?);
        pairs.extend(common::ownership(config, table.left(), &right.name));
        let cleanup = common::drop_table(&shadow.name);

        let right = table.right_mut();
        right.sql.extend(pairs);
        right.cleanup_sql.push(cleanup);
        Ok(())
    }
}
