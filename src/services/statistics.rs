use serde::{Deserialize, Serialize};

use crate::models::{MigrationError, MirrorConfig, SerdeType, SqlPair, TableStatistics};

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;
const REDUCER_BYTES: u64 = 256 * MIB;
const MAX_REDUCERS: u64 = 100;
const TEXT_COMPRESSION_THRESHOLD: u64 = 100 * MIB;

/// Compression advice for the data written by a migration step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompressionRecommendation {
    pub compress: bool,
    pub codec: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoStatsSettings {
    pub table_stats: bool,
    pub column_stats: bool,
}

/// Derives tuning parameters from a table's collected statistics
pub struct StatisticsCalculator;

impl StatisticsCalculator {
    /// Resolve the storage format; unknown formats are reported, not fatal
    pub fn determine_serde_type(stats: &TableStatistics) -> Result<SerdeType, MigrationError> {
        let format = stats.file_format().ok_or_else(|| {
            MigrationError::MissingDataPoint("File format statistic is not available".to_string())
        })?;
        SerdeType::from_format(format).ok_or_else(|| {
            MigrationError::MissingDataPoint(format!("Unrecognized file format: {}", format))
        })
    }

    /// Twice the target size, or half of it for partitioned tables of small files
    pub fn calculate_tez_max_grouping(target_size: u64, partitioned: bool, avg_file_size: u64) -> u64 {
        if partitioned && avg_file_size < target_size / 2 {
            target_size / 2
        } else {
            target_size * 2
        }
    }

    pub fn calculate_partition_distribution_ratio(data_size: u64, partition_count: u64, target_size: u64) -> u64 {
        if partition_count == 0 || target_size == 0 {
            return 0;
        }
        let avg_part_size = data_size / partition_count;
        (avg_part_size / target_size).saturating_sub(1)
    }

    /// Load-spreading expression for dynamic partition inserts
    pub fn generate_distributed_partition_elements(
        config: &MirrorConfig,
        stats: &TableStatistics,
        serde_type: Option<SerdeType>,
    ) -> Option<String> {
        if !stats.partitioned || !config.optimization.auto_tune || config.optimization.skip_stats_collection {
            return None;
        }
        let target_size = serde_type?.target_size();
        let ratio = Self::calculate_partition_distribution_ratio(stats.data_size, stats.partition_count, target_size);
        if ratio >= 1 {
            Some(format!("ROUND((rand()*1000) % {})", ratio))
        } else {
            None
        }
    }

    pub fn calculate_compression_recommendations(
        stats: &TableStatistics,
        serde_type: Option<SerdeType>,
    ) -> CompressionRecommendation {
        match serde_type {
            Some(st) if st.is_self_compressing() => CompressionRecommendation {
                compress: false,
                codec: None,
                reason: format!("{:?} files are already compressed", st),
            },
            Some(SerdeType::Text) if stats.data_size > TEXT_COMPRESSION_THRESHOLD => CompressionRecommendation {
                compress: true,
                codec: Some("gzip".to_string()),
                reason: "Large text table benefits from output compression".to_string(),
            },
            _ => CompressionRecommendation {
                compress: false,
                codec: None,
                reason: "No compression recommendation".to_string(),
            },
        }
    }

    pub fn calculate_reducer_recommendations(data_size: u64) -> u64 {
        data_size.div_ceil(REDUCER_BYTES).clamp(1, MAX_REDUCERS)
    }

    pub fn calculate_auto_stats_settings(config: &MirrorConfig, data_size: u64) -> AutoStatsSettings {
        let enabled = !config.optimization.skip_stats_collection;
        AutoStatsSettings {
            table_stats: enabled,
            column_stats: enabled && data_size < GIB,
        }
    }

    /// Session settings emitted ahead of a SQL data movement statement
    pub fn session_settings(config: &MirrorConfig, stats: &TableStatistics) -> Vec<SqlPair> {
        let mut settings = Vec::new();
        if config.optimization.skip {
            return settings;
        }
        if stats.partitioned {
            settings.push(SqlPair::new("Enable dynamic partitions", "SET hive.exec.dynamic.partition=true"));
            settings.push(SqlPair::new(
                "Non-strict dynamic partition mode",
                "SET hive.exec.dynamic.partition.mode=nonstrict",
            ));
            if config.optimization.sort_dynamic_partition_inserts {
                settings.push(SqlPair::new(
                    "Sort dynamic partition inserts",
                    "SET hive.optimize.sort.dynamic.partition=true",
                ));
            }
        }

        let serde_type = Self::determine_serde_type(stats).ok();
        if config.optimization.auto_tune {
            if let Some(st) = serde_type {
                let grouping = Self::calculate_tez_max_grouping(st.target_size(), stats.partitioned, stats.avg_file_size);
                settings.push(SqlPair::new(
                    "Tez grouping max size",
                    format!("SET tez.grouping.max-size={}", grouping),
                ));
            }
            let reducers = Self::calculate_reducer_recommendations(stats.data_size);
            settings.push(SqlPair::new(
                "Max reducers",
                format!("SET hive.exec.reducers.max={}", reducers),
            ));
        }

        let compression = Self::calculate_compression_recommendations(stats, serde_type);
        if config.optimization.compress_text_output || compression.compress {
            settings.push(SqlPair::new("Compress output", "SET hive.exec.compress.output=true"));
            settings.push(SqlPair::new(
                "Output codec",
                "SET mapreduce.output.fileoutputformat.compress.codec=org.apache.hadoop.io.compress.GzipCodec",
            ));
        }

        let auto_stats = Self::calculate_auto_stats_settings(config, stats.data_size);
        settings.push(SqlPair::new(
            "Table stats collection",
            format!("SET hive.stats.autogather={}", auto_stats.table_stats),
        ));
        settings.push(SqlPair::new(
            "Column stats collection",
            format!("SET hive.stats.column.autogather={}", auto_stats.column_stats),
        ));
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn stats(format: &str, data_size: u64, partitions: u64, avg: u64) -> TableStatistics {
        let mut raw = BTreeMap::new();
        raw.insert(crate::models::FILE_FORMAT.to_string(), serde_json::json!(format));
        TableStatistics {
            data_size,
            partition_count: partitions,
            avg_file_size: avg,
            file_count: 0,
            partitioned: partitions > 0,
            raw,
        }
    }

    #[test]
    fn test_tez_grouping_small_files() {
        assert_eq!(StatisticsCalculator::calculate_tez_max_grouping(128, true, 40), 64);
        assert_eq!(StatisticsCalculator::calculate_tez_max_grouping(128, true, 100), 256);
        assert_eq!(StatisticsCalculator::calculate_tez_max_grouping(128, false, 40), 256);
    }

    #[test]
    fn test_distribution_ratio() {
        assert_eq!(StatisticsCalculator::calculate_partition_distribution_ratio(2000, 10, 128), 0);
        assert_eq!(StatisticsCalculator::calculate_partition_distribution_ratio(5000, 10, 128), 2);
        assert_eq!(StatisticsCalculator::calculate_partition_distribution_ratio(5000, 0, 128), 0);
    }

    #[test]
    fn test_no_distribution_sql_below_ratio_one() {
        let mut config = MirrorConfig::default();
        config.optimization.auto_tune = true;
        let s = stats("ORC", 2000 * MIB, 10, 10 * MIB);
        let elements =
            StatisticsCalculator::generate_distributed_partition_elements(&config, &s, Some(SerdeType::Orc));
        assert!(elements.is_none());
    }

    #[test]
    fn test_distribution_sql_when_partitions_are_large() {
        let mut config = MirrorConfig::default();
        config.optimization.auto_tune = true;
        let s = stats("ORC", 5000 * MIB, 10, 10 * MIB);
        let elements =
            StatisticsCalculator::generate_distributed_partition_elements(&config, &s, Some(SerdeType::Orc));
        assert_eq!(elements.as_deref(), Some("ROUND((rand()*1000) % 2)"));

        config.optimization.skip_stats_collection = true;
        assert!(StatisticsCalculator::generate_distributed_partition_elements(&config, &s, Some(SerdeType::Orc))
            .is_none());
    }

    #[test]
    fn test_serde_type_missing_is_reported() {
        let mut s = stats("ORC", 0, 0, 0);
        assert_eq!(StatisticsCalculator::determine_serde_type(&s).unwrap(), SerdeType::Orc);
        s.raw.clear();
        let err = StatisticsCalculator::determine_serde_type(&s).unwrap_err();
        assert!(matches!(err, MigrationError::MissingDataPoint(_)));
    }

    #[test]
    fn test_compression() {
        let text = stats("TEXTFILE", 200 * MIB, 0, 0);
        let rec = StatisticsCalculator::calculate_compression_recommendations(&text, Some(SerdeType::Text));
        assert!(rec.compress);
        assert_eq!(rec.codec.as_deref(), Some("gzip"));

        let orc = stats("ORC", 200 * GIB, 0, 0);
        assert!(!StatisticsCalculator::calculate_compression_recommendations(&orc, Some(SerdeType::Orc)).compress);

        let small = stats("TEXTFILE", 10 * MIB, 0, 0);
        assert!(!StatisticsCalculator::calculate_compression_recommendations(&small, Some(SerdeType::Text)).compress);
    }

    #[test]
    fn test_reducers_clamped() {
        assert_eq!(StatisticsCalculator::calculate_reducer_recommendations(0), 1);
        assert_eq!(StatisticsCalculator::calculate_reducer_recommendations(256 * MIB + 1), 2);
        assert_eq!(StatisticsCalculator::calculate_reducer_recommendations(1024 * GIB), 100);
    }

    #[test]
    fn test_auto_stats() {
        let mut config = MirrorConfig::default();
        let small = StatisticsCalculator::calculate_auto_stats_settings(&config, 10 * MIB);
        assert!(small.table_stats && small.column_stats);
        let large = StatisticsCalculator::calculate_auto_stats_settings(&config, 2 * GIB);
        assert!(large.table_stats && !large.column_stats);
        config.optimization.skip_stats_collection = true;
        let skipped = StatisticsCalculator::calculate_auto_stats_settings(&config, 10);
        assert!(!skipped.table_stats && !skipped.column_stats);
    }

    #[test]
    fn test_session_settings_for_partitioned_auto_tune() {
        let mut config = MirrorConfig::default();
        config.optimization.auto_tune = true;
        let s = stats("ORC", 512 * MIB, 4, 10 * MIB);
        let settings = StatisticsCalculator::session_settings(&config, &s);
        let statements: Vec<&str> = settings.iter().map(|p| p.statement.as_str()).collect();
        assert!(statements.contains(&"SET hive.exec.dynamic.partition.mode=nonstrict"));
        assert!(statements.contains(&"SET tez.grouping.max-size=67108864"));
        assert!(statements.contains(&"SET hive.exec.reducers.max=2"));
        assert!(statements.contains(&"SET hive.stats.column.autogather=true"));

        config.optimization.skip = true;
        assert!(StatisticsCalculator::session_settings(&config, &s).is_empty());
    }
}
