use crate::models::{
    DataStrategy, MigrationError, MirrorConfig, StrategyRecommendations, StrategyRequest, StrategySelection,
};

const EXPORT_IMPORT_SIZE_LIMIT: u64 = 1024 * 1024 * 1024;

/// Picks a migration strategy and gates it before any table is processed
pub struct StrategySelector;

impl StrategySelector {
    /// Resolve the strategy for a request
    ///
    /// Without a preferred strategy the primary recommendation is used.
    pub fn select_strategy(request: &StrategyRequest) -> Result<StrategySelection, MigrationError> {
        let (strategy, recommended) = match request.preferred_strategy {
            Some(strategy) => (strategy, false),
            None => (Self::get_strategy_recommendations(request).primary(), true),
        };
        Self::validate_strategy_compatibility(strategy, request)?;
        tracing::debug!("Selected strategy {} (recommended: {})", strategy, recommended);
        Ok(StrategySelection { strategy, recommended })
    }

    /// Report every rule the combination violates, not just the first
    pub fn validate_strategy_compatibility(
        strategy: DataStrategy,
        request: &StrategyRequest,
    ) -> Result<(), MigrationError> {
        let mut errors = Vec::new();
        if request.acid_tables_present && !strategy.supports_acid() {
            errors.push(format!("Strategy {} does not support ACID tables", strategy));
        }
        if request.include_data && !strategy.moves_data() {
            errors.push(format!("Strategy {} does not move data", strategy));
        }
        if request.views_present && strategy == DataStrategy::StorageMigration {
            errors.push(format!("Strategy {} does not support views", strategy));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MigrationError::Validation(errors))
        }
    }

    pub fn get_strategy_recommendations(request: &StrategyRequest) -> StrategyRecommendations {
        let mut recommendations = vec![DataStrategy::SchemaOnly];
        if request.include_data {
            if request.estimated_data_size < EXPORT_IMPORT_SIZE_LIMIT {
                recommendations.insert(0, DataStrategy::ExportImport);
            } else {
                recommendations.insert(0, DataStrategy::Hybrid);
            }
        }
        if request.acid_tables_present {
            recommendations.insert(0, DataStrategy::Acid);
        }
        StrategyRecommendations { recommendations }
    }

    pub fn check_prerequisites(strategy: DataStrategy, config: &MirrorConfig) -> Result<(), MigrationError> {
        let mut errors = Vec::new();
        if config.parallelism < 1 {
            errors.push("Parallelism must be at least 1".to_string());
        }
        match strategy {
            DataStrategy::StorageMigration => {
                if !config.distcp_enabled() {
                    errors.push("STORAGE_MIGRATION requires DISTCP data movement".to_string());
                }
                if config.transfer.warehouse.is_none() && config.translator.warehouse_plans.is_empty() {
                    errors.push("STORAGE_MIGRATION requires a warehouse plan or a default warehouse".to_string());
                }
            }
            DataStrategy::Acid => {
                if !config.migrate_acid.on {
                    errors.push("ACID strategy requires migrate_acid.on".to_string());
                }
            }
            DataStrategy::SqlAcidDowngradeInplace
            | DataStrategy::ExportImportAcidDowngradeInplace
            | DataStrategy::HybridAcidDowngradeInplace => {
                if !config.migrate_acid.downgrade {
                    errors.push(format!("{} requires migrate_acid.downgrade", strategy));
                }
            }
            DataStrategy::Linked | DataStrategy::Common => {
                if config.migrate_acid.on {
                    errors.push(format!("{} can't migrate ACID tables; disable migrate_acid", strategy));
                }
            }
            _ => {}
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MigrationError::Validation(errors))
        }
    }

    /// Prerequisites of the configured strategy plus cross-field checks
    pub fn validate_strategy_configuration(config: &MirrorConfig) -> Result<(), MigrationError> {
        let mut errors = match Self::check_prerequisites(config.data_strategy, config) {
            Ok(()) => Vec::new(),
            Err(err) => err.messages(),
        };
        if config.migrate_acid.only && !config.migrate_acid.on {
            errors.push("migrate_acid.only requires migrate_acid.on".to_string());
        }
        if config.migrate_acid.in_place && !config.data_strategy.is_in_place() {
            errors.push(format!(
                "migrate_acid.in_place requires an in-place strategy, not {}",
                config.data_strategy
            ));
        }
        if config.data_strategy.moves_data()
            && !config.data_strategy.is_in_place()
            && config.data_strategy != DataStrategy::Dump
            && config.target_namespace().is_err()
        {
            errors.push(format!(
                "{} requires a target namespace (transfer.target_namespace or clusters.right.hcfs_namespace)",
                config.data_strategy
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MigrationError::Validation(errors))
        }
    }
}
