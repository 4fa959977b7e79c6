// Direct access to the Hive metastore's backing database
//
// Used to discover partition locations when the table metadata handed to the
// engine carries none. Pools are cached per URL and shared across runs.

use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_postgres::NoTls;

use crate::models::MigrationError;

pub mod mysql;
pub mod postgresql;

pub use mysql::MySqlMetastore;
pub use postgresql::PostgresMetastore;

/// Read-only queries against a Hive metastore schema
#[async_trait::async_trait]
pub trait MetastoreClient: Send + Sync {
    /// Partition name (`p=1/q=2`) to storage location
    async fn partition_locations(
        &self,
        database: &str,
        table: &str,
    ) -> Result<BTreeMap<String, String>, MigrationError>;

    async fn test_connection(&self) -> Result<(), MigrationError>;

    fn backend(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetastoreBackend {
    Postgres,
    MySql,
}

impl MetastoreBackend {
    pub fn from_url(url: &str) -> Result<Self, MigrationError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| MigrationError::Metastore(format!("Invalid metastore URL: {}", e)))?;
        match parsed.scheme() {
            "postgresql" | "postgres" => Ok(MetastoreBackend::Postgres),
            "mysql" | "mariadb" => Ok(MetastoreBackend::MySql),
            other => Err(MigrationError::Metastore(format!(
                "Unsupported metastore scheme '{}'; use postgresql:// or mysql://",
                other
            ))),
        }
    }
}

/// Keeps one pool per metastore URL
pub struct MetastorePoolManager {
    postgres: Arc<RwLock<HashMap<String, Pool>>>,
    mysql: Arc<RwLock<HashMap<String, mysql_async::Pool>>>,
    max_pool_size: usize,
}

impl MetastorePoolManager {
    pub fn new() -> Self {
        Self::with_max_pool_size(8)
    }

    pub fn with_max_pool_size(max_pool_size: usize) -> Self {
        Self {
            postgres: Arc::new(RwLock::new(HashMap::new())),
            mysql: Arc::new(RwLock::new(HashMap::new())),
            max_pool_size,
        }
    }

    /// Client for the metastore at `url`, reusing a cached pool
    pub async fn client(&self, url: &str) -> Result<Arc<dyn MetastoreClient>, MigrationError> {
        match MetastoreBackend::from_url(url)? {
            MetastoreBackend::Postgres => {
                let pool = self.postgres_pool(url).await?;
                Ok(Arc::new(PostgresMetastore::new(pool)))
            }
            MetastoreBackend::MySql => {
                let pool = self.mysql_pool(url).await?;
                Ok(Arc::new(MySqlMetastore::new(pool)))
            }
        }
    }

    async fn postgres_pool(&self, url: &str) -> Result<Pool, MigrationError> {
        {
            let pools = self.postgres.read().await;
            if let Some(pool) = pools.get(url) {
                return Ok(pool.clone());
            }
        }

        let mut pools = self.postgres.write().await;
        // another task may have won the race for the write lock
        if let Some(pool) = pools.get(url) {
            return Ok(pool.clone());
        }

        tracing::info!(
            "Creating metastore pool for {} (max_size: {})",
            Self::mask_credentials(url),
            self.max_pool_size
        );
        let mut cfg = PoolConfig::new();
        cfg.url = Some(url.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let pool = cfg
            .create_pool(Some(deadpool_postgres::Runtime::Tokio1), NoTls)
            .map_err(|e| MigrationError::Metastore(format!("Failed to create metastore pool: {}", e)))?;
        pool.resize(self.max_pool_size);
        pools.insert(url.to_string(), pool.clone());
        Ok(pool)
    }

    async fn mysql_pool(&self, url: &str) -> Result<mysql_async::Pool, MigrationError> {
        {
            let pools = self.mysql.read().await;
            if let Some(pool) = pools.get(url) {
                return Ok(pool.clone());
            }
        }

        let mut pools = self.mysql.write().await;
        if let Some(pool) = pools.get(url) {
            return Ok(pool.clone());
        }

        tracing::info!("Creating metastore pool for {}", Self::mask_credentials(url));
        let opts = mysql_async::Opts::from_url(url)
            .map_err(|e| MigrationError::Metastore(format!("Invalid MySQL metastore URL: {}", e)))?;
        let pool = mysql_async::Pool::new(opts);
        pools.insert(url.to_string(), pool.clone());
        Ok(pool)
    }

    pub async fn pool_count(&self) -> usize {
        self.postgres.read().await.len() + self.mysql.read().await.len()
    }

    /// URL with the password replaced, for logs
    pub fn mask_credentials(url: &str) -> String {
        match url::Url::parse(url) {
            Ok(parsed) => {
                let mut masked = parsed.clone();
                if parsed.password().is_some() {
                    let _ = masked.set_password(Some("***"));
                }
                masked.to_string()
            }
            Err(_) => "[invalid-url]".to_string(),
        }
    }
}

impl Default for MetastorePoolManager {
    fn default() -> Self {
        Self::new()
    }
}
