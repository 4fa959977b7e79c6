use deadpool_postgres::Pool;
use std::collections::BTreeMap;

use super::MetastoreClient;
use crate::models::MigrationError;

const PARTITION_LOCATIONS: &str = r#"SELECT p."PART_NAME", s."LOCATION"
FROM "PARTITIONS" p
JOIN "TBLS" t ON p."TBL_ID" = t."TBL_ID"
JOIN "DBS" d ON t."DB_ID" = d."DB_ID"
JOIN "SDS" s ON p."SD_ID" = s."SD_ID"
WHERE d."NAME" = $1 AND t."TBL_NAME" = $2"#;

/// Metastore schema hosted on PostgreSQL
pub struct PostgresMetastore {
    pool: Pool,
}

impl PostgresMetastore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, MigrationError> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrationError::Metastore(format!("Failed to get metastore connection: {}", e)))
    }
}

fn query_error(e: tokio_postgres::Error) -> MigrationError {
    let details = match e.as_db_error() {
        Some(db_error) => format!("Code: {}, Message: {}", db_error.code().code(), db_error.message()),
        None => e.to_string(),
    };
    MigrationError::Metastore(format!("Metastore query failed: {}", details))
}

#[async_trait::async_trait]
impl MetastoreClient for PostgresMetastore {
    async fn partition_locations(
        &self,
        database: &str,
        table: &str,
    ) -> Result<BTreeMap<String, String>, MigrationError> {
        let client = self.client().await?;
        let database = database.to_lowercase();
        let table = table.to_lowercase();
        let rows = client
            .query(PARTITION_LOCATIONS, &[&database, &table])
            .await
            .map_err(query_error)?;

        let mut partitions = BTreeMap::new();
        for row in rows {
            let name: String = row.try_get(0).map_err(query_error)?;
            let location: Option<String> = row.try_get(1).map_err(query_error)?;
            if let Some(location) = location {
                partitions.insert(name, location);
            }
        }
        tracing::debug!("{}.{}: {} partitions from metastore", database, table, partitions.len());
        Ok(partitions)
    }

    async fn test_connection(&self) -> Result<(), MigrationError> {
        let client = self.client().await?;
        client.simple_query("SELECT 1").await.map_err(query_error)?;
        Ok(())
    }

    fn backend(&self) -> &str {
        "postgresql"
    }
}
