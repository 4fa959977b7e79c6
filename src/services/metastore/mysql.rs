use mysql_async::prelude::*;
use mysql_async::{Conn, Pool};
use std::collections::BTreeMap;

use super::MetastoreClient;
use crate::models::MigrationError;

const PARTITION_LOCATIONS: &str = "SELECT p.PART_NAME, s.LOCATION \
    FROM PARTITIONS p \
    JOIN TBLS t ON p.TBL_ID = t.TBL_ID \
    JOIN DBS d ON t.DB_ID = d.DB_ID \
    JOIN SDS s ON p.SD_ID = s.SD_ID \
    WHERE d.NAME = ? AND t.TBL_NAME = ?";

/// Metastore schema hosted on MySQL or MariaDB
pub struct MySqlMetastore {
    pool: Pool,
}

impl MySqlMetastore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<Conn, MigrationError> {
        self.pool
            .get_conn()
            .await
            .map_err(|e| MigrationError::Metastore(format!("Failed to get metastore connection: {}", e)))
    }
}

#[async_trait::async_trait]
impl MetastoreClient for MySqlMetastore {
    async fn partition_locations(
        &self,
        database: &str,
        table: &str,
    ) -> Result<BTreeMap<String, String>, MigrationError> {
        let mut conn = self.conn().await?;
        let rows: Vec<(String, Option<String>)> = conn
            .exec(PARTITION_LOCATIONS, (database.to_lowercase(), table.to_lowercase()))
            .await
            .map_err(|e| MigrationError::Metastore(format!("Metastore query failed: {}", e)))?;
        let partitions: BTreeMap<String, String> = rows
            .into_iter()
            .filter_map(|(name, location)| location.map(|l| (name, l)))
            .collect();
        tracing::debug!("{}.{}: {} partitions from metastore", database, table, partitions.len());
        Ok(partitions)
    }

    async fn test_connection(&self) -> Result<(), MigrationError> {
        let mut conn = self.conn().await?;
        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrationError::Metastore(format!("Metastore query failed: {}", e)))
    }

    fn backend(&self) -> &str {
        "mysql"
    }
}
