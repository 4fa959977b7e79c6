use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::environment::EnvironmentTable;

/// Statistic keys collected by the metadata source
pub const DATA_SIZE: &str = "data_size";
pub const AVG_FILE_SIZE: &str = "avg_file_size";
pub const FILE_COUNT: &str = "file_count";
pub const FILE_FORMAT: &str = "file_format";

const MIB: u64 = 1024 * 1024;

/// Known storage formats and the file size each should be written at
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SerdeType {
    Orc,
    Parquet,
    Text,
    Avro,
    Sequence,
    Json,
}

impl SerdeType {
    /// Target file size in bytes
    pub fn target_size(&self) -> u64 {
        match self {
            SerdeType::Orc | SerdeType::Parquet | SerdeType::Avro | SerdeType::Sequence => 128 * MIB,
            SerdeType::Text | SerdeType::Json => 64 * MIB,
        }
    }

    /// Formats that compress their own blocks
    pub fn is_self_compressing(&self) -> bool {
        matches!(self, SerdeType::Orc | SerdeType::Parquet)
    }

    /// Match a format name or serde/input-format class name
    pub fn from_format(format: &str) -> Option<Self> {
        let f = format.trim().to_lowercase();
        if f.is_empty() {
            return None;
        }
        if f.contains("orc") {
            Some(SerdeType::Orc)
        } else if f.contains("parquet") {
            Some(SerdeType::Parquet)
        } else if f.contains("avro") {
            Some(SerdeType::Avro)
        } else if f.contains("sequence") {
            Some(SerdeType::Sequence)
        } else if f.contains("json") {
            Some(SerdeType::Json)
        } else if f == "text" || f == "textfile" || f.contains("lazysimpleserde") || f.contains("textinputformat") {
            Some(SerdeType::Text)
        } else {
            None
        }
    }
}

/// Collected statistics for one table, consumed read-only
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableStatistics {
    pub data_size: u64,
    pub partition_count: u64,
    pub avg_file_size: u64,
    pub file_count: u64,
    pub partitioned: bool,
    pub raw: BTreeMap<String, serde_json::Value>,
}

impl TableStatistics {
    pub fn from_environment(table: &EnvironmentTable) -> Self {
        let raw = table.statistics.clone();
        let number = |key: &str| -> u64 {
            match raw.get(key) {
                Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
                Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
                _ => 0,
            }
        };
        Self {
            data_size: number(DATA_SIZE),
            partition_count: table.partition_count() as u64,
            avg_file_size: number(AVG_FILE_SIZE),
            file_count: number(FILE_COUNT),
            partitioned: table.is_partitioned(),
            raw,
        }
    }

    pub fn file_format(&self) -> Option<&str> {
        self.raw.get(FILE_FORMAT).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_format_names_and_classes() {
        assert_eq!(SerdeType::from_format("ORC"), Some(SerdeType::Orc));
        assert_eq!(
            SerdeType::from_format("org.apache.hadoop.hive.serde2.lazy.LazySimpleSerDe"),
            Some(SerdeType::Text)
        );
        assert_eq!(SerdeType::from_format("custom"), None);
        assert_eq!(SerdeType::from_format(""), None);
    }

    #[test]
    fn test_statistics_parse_numbers_and_strings() {
        let mut table = EnvironmentTable::new("t");
        table.statistics.insert(DATA_SIZE.into(), serde_json::json!(2048));
        table.statistics.insert(AVG_FILE_SIZE.into(), serde_json::json!("512"));
        table.statistics.insert(FILE_FORMAT.into(), serde_json::json!("PARQUET"));
        let stats = TableStatistics::from_environment(&table);
        assert_eq!(stats.data_size, 2048);
        assert_eq!(stats.avg_file_size, 512);
        assert_eq!(stats.file_format(), Some("PARQUET"));
        assert!(!stats.partitioned);
    }
}
