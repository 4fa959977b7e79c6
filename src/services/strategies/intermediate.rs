use crate::models::{CopySpec, CreateStrategy, DataStrategy, DbMirror, Environment, MigrationError, MirrorConfig, TableMirror};

use super::common::{self, derive_environment};
use super::export_import::check_partition_limit;
use super::sql::linked_shadow_spec;
use super::{DataStrategyService, MigrationContext};

/// SQL data movement through a TRANSFER table staged on shared storage
///
/// ACID tables, and any table when intermediate storage is configured, are
/// first copied on LEFT into an external TRANSFER table. RIGHT then reads the
/// staged files through a SHADOW table. Otherwise SHADOW points at LEFT's
/// storage directly.
pub struct IntermediateDataStrategy;

/// Where the TRANSFER table writes its files
fn working_location(config: &MirrorConfig, db: &DbMirror, name: &str) -> Result<String, MigrationError> {
    let base = match config.intermediate_storage() {
        Some(storage) => storage.trim().trim_end_matches('/').to_string(),
        None => config.target_namespace()?,
    };
    Ok(format!(
        "{}/{}/{}.db/{}",
        base,
        config.transfer.remote_working_directory.trim_matches('/'),
        db.name,
        name
    ))
}

fn uses_transfer(config: &MirrorConfig, table: &TableMirror) -> bool {
    table.is_acid() || config.intermediate_storage().is_some()
}

#[async_trait::async_trait]
impl DataStrategyService for IntermediateDataStrategy {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::Intermediate
    }

    fn build_out_definition(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        let config = &ctx.config;
        let acid = table.is_acid();
        if acid {
            if !config.migrate_acid.on {
                return Err(MigrationError::validation(format!(
                    "ACID migration is disabled (migrate_acid.on); can't migrate ACID table {}",
                    table.name
                )));
            }
            check_partition_limit(table, config.migrate_acid.partition_limit as i64, DataStrategy::Acid)?;
        } else {
            check_partition_limit(table, config.hybrid.sql_partition_limit, DataStrategy::Sql)?;
        }
        let threshold = config.migrate_acid.artificial_bucket_threshold;

        let mut right_spec = common::owned_target_spec(ctx, db, table)?;
        if acid && config.migrate_acid.downgrade {
            right_spec = right_spec.strip_buckets_at_or_below(threshold);
        }
        derive_environment(config, table, &right_spec)?;

        if !uses_transfer(config, table) {
            derive_environment(config, table, &linked_shadow_spec(ctx, table))?;
            let partitions = table.left().partitions.clone();
            table.env_mut(Environment::Shadow).partitions = partitions;
            return Ok(());
        }

        let transfer_prefix = config.transfer.transfer_prefix.clone();
        let transfer_name = format!("{}{}", transfer_prefix, table.name);
        let location = working_location(config, db, &transfer_name)?;

        let transfer_spec = CopySpec::new(Environment::Left, Environment::Transfer)
            .make_non_transactional()
            .make_external()
            .take_ownership(true)
            .strip_buckets_at_or_below(threshold)
            .with_prefix(transfer_prefix)
            .with_location(location.clone());
        derive_environment(config, table, &transfer_spec)?;

        let shadow_spec = CopySpec::new(Environment::Left, Environment::Shadow)
            .make_non_transactional()
            .make_external()
            .take_ownership(false)
            .strip_buckets_at_or_below(threshold)
            .with_prefix(config.transfer.shadow_prefix.clone())
            .with_location(location);
        derive_environment(config, table, &shadow_spec)?;
        Ok(())
    }

    fn build_out_sql(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        let config = &ctx.config;
        let right = table.right();
        if !matches!(right.create_strategy, CreateStrategy::Create | CreateStrategy::Replace) {
            let note = format!("Target not rebuilt ({:?}); data not moved", right.create_strategy);
            table.right_mut().add_issue(note);
            return Ok(());
        }

        if uses_transfer(config, table) {
            let left = table.left();
            let transfer = table.env(Environment::Transfer);
            let mut pairs = vec![common::use_database(&db.name)];
            pairs.extend(common::table_ddl(transfer));
            pairs.extend(common::move_data(config, left, &left.name, transfer)?);
            let cleanup = common::drop_table(&transfer.name);
            let left = table.left_mut();
            left.sql.extend(pairs);
            left.cleanup_sql.push(cleanup);
        }

        let shadow = table.env(Environment::Shadow);
        let right = table.right();
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
