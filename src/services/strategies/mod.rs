// Migration strategies
//
// Every strategy is a unit value implementing `DataStrategyService`;
// `service_for` is the dispatch table from `DataStrategy` to implementation.

use std::sync::Arc;

use crate::models::{DataStrategy, DbMirror, Environment, MigrationError, MirrorConfig, TableMirror};
use crate::services::executor::SqlExecutor;
use crate::services::location::LocationTranslator;

pub mod acid_inplace;
pub mod common;
pub mod dump;
pub mod export_import;
pub mod hybrid;
pub mod intermediate;
pub mod linked;
pub mod schema_only;
pub mod sql;
pub mod storage_migration;

#[cfg(test)]
pub(crate) mod fixtures;

pub use acid_inplace::{
    ExportImportAcidDowngradeInPlaceDataStrategy, HybridAcidDowngradeInPlaceDataStrategy,
    SqlAcidDowngradeInPlaceDataStrategy,
};
pub use dump::DumpDataStrategy;
pub use export_import::ExportImportDataStrategy;
pub use hybrid::HybridDataStrategy;
pub use intermediate::IntermediateDataStrategy;
pub use linked::{CommonDataStrategy, LinkedDataStrategy};
pub use schema_only::SchemaOnlyDataStrategy;
pub use sql::SqlDataStrategy;
pub use storage_migration::StorageMigrationDataStrategy;

/// Immutable collaborators shared by every table pipeline of a run
#[derive(Clone)]
pub struct MigrationContext {
    pub config: Arc<MirrorConfig>,
    pub translator: LocationTranslator,
    pub executor: Arc<dyn SqlExecutor>,
}

impl MigrationContext {
    pub fn new(config: Arc<MirrorConfig>, executor: Arc<dyn SqlExecutor>) -> Self {
        Self {
            translator: LocationTranslator::new(config.clone()),
            config,
            executor,
        }
    }

    pub fn target_database(&self, db: &DbMirror) -> String {
        self.config.resolve_database(&db.name)
    }
}

/// Build and execute contract shared by all strategies
#[async_trait::async_trait]
pub trait DataStrategyService: Send + Sync {
    fn strategy(&self) -> DataStrategy;

    /// Environment whose error list receives build failures
    fn error_environment(&self) -> Environment {
        Environment::Right
    }

    /// Derive target definitions and assign their create strategies
    fn build_out_definition(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError>;

    /// Emit the ordered SQL for each environment
    fn build_out_sql(&self, ctx: &MigrationContext, db: &DbMirror, table: &mut TableMirror)
        -> Result<(), MigrationError>;

    fn build(&self, ctx: &MigrationContext, db: &DbMirror, table: &mut TableMirror) -> bool {
        if table.strategy.is_none() {
            table.strategy = Some(self.strategy());
        }
        let result = self
            .build_out_definition(ctx, db, table)
            .and_then(|_| self.build_out_sql(ctx, db, table));
        common::record_outcome(table, self.error_environment(), result)
    }

    async fn execute(&self, ctx: &MigrationContext, db: &DbMirror, table: &mut TableMirror) -> bool {
        common::execute(ctx, db, table).await
    }
}

pub fn service_for(strategy: DataStrategy) -> &'static dyn DataStrategyService {
    match strategy {
        DataStrategy::Dump => &DumpDataStrategy,
        DataStrategy::SchemaOnly => &SchemaOnlyDataStrategy,
        DataStrategy::Sql => &SqlDataStrategy,
        DataStrategy::ExportImport => &ExportImportDataStrategy,
        DataStrategy::Hybrid => &HybridDataStrategy,
        DataStrategy::Intermediate | DataStrategy::Acid => &IntermediateDataStrategy,
        DataStrategy::Linked => &LinkedDataStrategy,
        DataStrategy::Common => &CommonDataStrategy,
        DataStrategy::StorageMigration => &StorageMigrationDataStrategy,
        DataStrategy::SqlAcidDowngradeInplace => &SqlAcidDowngradeInPlaceDataStrategy,
        DataStrategy::ExportImportAcidDowngradeInplace => &ExportImportAcidDowngradeInPlaceDataStrategy,
        DataStrategy::HybridAcidDowngradeInplace => &HybridAcidDowngradeInPlaceDataStrategy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_strategy_has_a_service() {
        let all = [
            DataStrategy::Dump,
            DataStrategy::SchemaOnly,
            DataStrategy::Sql,
            DataStrategy::ExportImport,
            DataStrategy::Hybrid,
            DataStrategy::Intermediate,
            DataStrategy::Linked,
            DataStrategy::Common,
            DataStrategy::StorageMigration,
            DataStrategy::SqlAcidDowngradeInplace,
            DataStrategy::ExportImportAcidDowngradeInplace,
            DataStrategy::HybridAcidDowngradeInplace,
        ];
        for strategy in all {
            assert_eq!(service_for(strategy).strategy(), strategy);
        }
        assert_eq!(service_for(DataStrategy::Acid).strategy(), DataStrategy::Intermediate);
    }
}
