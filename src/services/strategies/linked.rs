use crate::models::{CopySpec, DataStrategy, DbMirror, Environment, MigrationError, TableMirror};

use super::common::derive_environment;
use super::schema_only::right_schema_sql;
use super::{DataStrategyService, MigrationContext};

/// RIGHT tables read LEFT's storage in place
pub struct LinkedDataStrategy;

/// RIGHT tables over storage both clusters share
pub struct CommonDataStrategy;

/// RIGHT definition pointing at LEFT's data; the RIGHT table never owns it
fn shared_definition(
    ctx: &MigrationContext,
    table: &mut TableMirror,
    strategy: DataStrategy,
) -> Result<(), MigrationError> {
    if table.is_acid() {
        return Err(MigrationError::validation(format!(
            "{} can't migrate ACID table {}; transactional data can't be shared between clusters",
            strategy, table.name
        )));
    }
    let mut spec = CopySpec::new(Environment::Left, Environment::Right)
        .make_external()
        .take_ownership(false);
    if let Some(location) = table.left().location() {
        spec = spec.with_location(location);
    }
    derive_environment(&ctx.config, table, &spec)?;
    let partitions = table.left().partitions.clone();
    table.right_mut().partitions = partitions;
    Ok(())
}

#[async_trait::async_trait]
impl DataStrategyService for LinkedDataStrategy {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::Linked
    }

    fn build_out_definition(
        &self,
        ctx: &MigrationContext,
        _db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        shared_definition(ctx, table, self.strategy())?;
        table
            .right_mut()
            .add_issue("Linked to LEFT storage; data is read across clusters and is not owned by RIGHT");
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

#[async_trait::async_trait]
impl DataStrategyService for CommonDataStrategy {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::Common
    }

    fn build_out_definition(
        &self,
        ctx: &MigrationContext,
        _db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        shared_definition(ctx, table, self.strategy())?;
        table
            .right_mut()
            .add_issue("Storage is shared with LEFT; data stays owned by LEFT");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateStrategy;
    use crate::services::ddl;
    use crate::services::strategies::fixtures;

    #[test]
    fn test_linked_refuses_acid() {
        let (ctx, _) = fixtures::context(fixtures::config());
        let mut table = fixtures::acid_table("t1", 0);
        assert!(!LinkedDataStrategy.build(&ctx, &fixtures::db(), &mut table));
        assert!(table.right().errors[0].contains("can't migrate ACID table t1"));
        assert!(table.right().sql.is_empty());
    }

    #[test]
    fn test_linked_points_at_left_storage_without_ownership() {
        let (ctx, _) = fixtures::context(fixtures::config());
        let mut table = fixtures::managed_table("t1");
        ddl::upsert_tbl_property(&mut table.left_mut().definition, ddl::PURGE, "true");
        assert!(LinkedDataStrategy.build(&ctx, &fixtures::db(), &mut table));

        let right = table.right();
        assert!(ddl::is_external(&right.definition));
        assert!(!ddl::is_purge(&right.definition));
        assert_eq!(
            right.location().as_deref(),
            Some("hdfs://src/apps/hive/warehouse/db1.db/t1")
        );
    }

    #[test]
    fn test_linked_sync_replaces_changed_schema() {
        let mut config = fixtures::config();
        config.sync = true;
        let (ctx, _) = fixtures::context(config);
        let mut table = fixtures::external_table("t1");
        table.right_mut().exists = true;
        table.right_mut().definition = vec!["CREATE EXTERNAL TABLE `t1`(".into(), "  `id` int)".into()];
        assert!(LinkedDataStrategy.build(&ctx, &fixtures::db(), &mut table));
        assert_eq!(table.right().create_strategy, CreateStrategy::Replace);
        let sql = fixtures::statements(&table, Environment::Right);
        assert_eq!(sql[1], "DROP TABLE IF EXISTS t1");
    }

    #[test]
    fn test_common_shares_partitions() {
        let (ctx, _) = fixtures::context(fixtures::config());
        let mut table = fixtures::partitioned_table("t1", 3);
        assert!(CommonDataStrategy.build(&ctx, &fixtures::db(), &mut table));
        assert_eq!(table.right().partitions, table.left().partitions);
        assert_eq!(table.strategy, Some(DataStrategy::Common));
    }
}
