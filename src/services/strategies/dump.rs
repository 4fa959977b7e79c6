use crate::models::{CopySpec, CreateStrategy, DataStrategy, DbMirror, Environment, MigrationError, TableMirror};
use crate::services::ddl;

use super::common;
use super::{DataStrategyService, MigrationContext};

/// Emits the target DDL as a script; nothing is ever executed
pub struct DumpDataStrategy;

#[async_trait::async_trait]
impl DataStrategyService for DumpDataStrategy {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::Dump
    }

    fn build_out_definition(
        &self,
        _ctx: &MigrationContext,
        _db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        let spec = CopySpec::new(Environment::Left, Environment::Right)
            .take_ownership(ddl::is_purge(&table.left().definition));
        let definition = ddl::apply_copy_spec(&table.left().definition, &table.name, &spec);
        let name = spec.target_name(&table.name);
        let right = table.right_mut();
        right.name = name;
        right.definition = definition;
        right.create_strategy = CreateStrategy::Create;
        Ok(())
    }

    fn build_out_sql(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        let target_db = ctx.target_database(db);
        let right = table.right_mut();
        let pairs = common::table_ddl(right);
        right.sql.push(common::use_database(&target_db));
        right.sql.extend(pairs);
        Ok(())
    }

    async fn execute(&self, _ctx: &MigrationContext, _db: &DbMirror, table: &mut TableMirror) -> bool {
        table.add_step("execute", "DUMP produces a script only; SQL not executed");
        true
    }
}
