use serde::{Deserialize, Serialize};

/// Migration technique applied to a table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataStrategy {
    Dump,
    SchemaOnly,
    Sql,
    ExportImport,
    Hybrid,
    Intermediate,
    Linked,
    Common,
    StorageMigration,
    Acid,
    SqlAcidDowngradeInplace,
    ExportImportAcidDowngradeInplace,
    HybridAcidDowngradeInplace,
}

impl DataStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataStrategy::Dump => "DUMP",
            DataStrategy::SchemaOnly => "SCHEMA_ONLY",
            DataStrategy::Sql => "SQL",
            DataStrategy::ExportImport => "EXPORT_IMPORT",
            DataStrategy::Hybrid => "HYBRID",
            DataStrategy::Intermediate => "INTERMEDIATE",
            DataStrategy::Linked => "LINKED",
            DataStrategy::Common => "COMMON",
            DataStrategy::StorageMigration => "STORAGE_MIGRATION",
            DataStrategy::Acid => "ACID",
            DataStrategy::SqlAcidDowngradeInplace => "SQL_ACID_DOWNGRADE_INPLACE",
            DataStrategy::ExportImportAcidDowngradeInplace => "EXPORT_IMPORT_ACID_DOWNGRADE_INPLACE",
            DataStrategy::HybridAcidDowngradeInplace => "HYBRID_ACID_DOWNGRADE_INPLACE",
        }
    }

    /// Strategies that may run against ACID tables
    pub fn supports_acid(&self) -> bool {
        matches!(
            self,
            DataStrategy::Acid
                | DataStrategy::HybridAcidDowngradeInplace
                | DataStrategy::SqlAcidDowngradeInplace
                | DataStrategy::ExportImportAcidDowngradeInplace
        )
    }

    /// Strategies able to move data as well as metadata
    pub fn moves_data(&self) -> bool {
        matches!(
            self,
            DataStrategy::Hybrid
                | DataStrategy::Sql
                | DataStrategy::ExportImport
                | DataStrategy::StorageMigration
                | DataStrategy::Linked
                | DataStrategy::Intermediate
                | DataStrategy::Acid
                | DataStrategy::Dump
        )
    }

    /// In-place strategies only touch the LEFT cluster
    pub fn is_in_place(&self) -> bool {
        matches!(
            self,
            DataStrategy::SqlAcidDowngradeInplace
                | DataStrategy::ExportImportAcidDowngradeInplace
                | DataStrategy::HybridAcidDowngradeInplace
                | DataStrategy::StorageMigration
        )
    }
}

impl std::fmt::Display for DataStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "DUMP" => Ok(DataStrategy::Dump),
            "SCHEMA_ONLY" => Ok(DataStrategy::SchemaOnly),
            "SQL" => Ok(DataStrategy::Sql),
            "EXPORT_IMPORT" => Ok(DataStrategy::ExportImport),
            "HYBRID" => Ok(DataStrategy::Hybrid),
            "INTERMEDIATE" => Ok(DataStrategy::Intermediate),
            "LINKED" => Ok(DataStrategy::Linked),
            "COMMON" => Ok(DataStrategy::Common),
            "STORAGE_MIGRATION" => Ok(DataStrategy::StorageMigration),
            "ACID" => Ok(DataStrategy::Acid),
            "SQL_ACID_DOWNGRADE_INPLACE" => Ok(DataStrategy::SqlAcidDowngradeInplace),
            "EXPORT_IMPORT_ACID_DOWNGRADE_INPLACE" => Ok(DataStrategy::ExportImportAcidDowngradeInplace),
            "HYBRID_ACID_DOWNGRADE_INPLACE" => Ok(DataStrategy::HybridAcidDowngradeInplace),
            _ => Err(format!("Unsupported data strategy: {}", s)),
        }
    }
}

/// Input to strategy selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyRequest {
    pub preferred_strategy: Option<DataStrategy>,
    pub include_data: bool,
    pub acid_tables_present: bool,
    pub views_present: bool,
    /// Estimated total bytes to move
    pub estimated_data_size: u64,
}

/// Outcome of a successful selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StrategySelection {
    pub strategy: DataStrategy,
    pub recommended: bool,
}

/// Ranked strategy recommendations, highest priority first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StrategyRecommendations {
    pub recommendations: Vec<DataStrategy>,
}

impl StrategyRecommendations {
    pub fn primary(&self) -> DataStrategy {
        self.recommendations
            .first()
            .copied()
            .unwrap_or(DataStrategy::SchemaOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for strategy in [
            DataStrategy::SchemaOnly,
            DataStrategy::HybridAcidDowngradeInplace,
            DataStrategy::StorageMigration,
        ] {
            let parsed: DataStrategy = strategy.as_str().parse().unwrap();
            assert_eq!(parsed, strategy);
            let json = serde_json::to_string(&strategy).unwrap();
            assert_eq!(json, format!("\"{}\"", strategy.as_str()));
        }
    }

    #[test]
    fn test_capabilities() {
        assert!(!DataStrategy::SchemaOnly.moves_data());
        assert!(!DataStrategy::Common.moves_data());
        assert!(DataStrategy::Dump.moves_data());
        assert!(DataStrategy::Acid.supports_acid());
        assert!(!DataStrategy::Hybrid.supports_acid());
    }

    #[test]
    fn test_empty_recommendations_fall_back_to_schema_only() {
        let recs = StrategyRecommendations { recommendations: vec![] };
        assert_eq!(recs.primary(), DataStrategy::SchemaOnly);
    }
}
