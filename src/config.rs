use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{MigrationError, MirrorConfig};
use crate::services::selector::StrategySelector;

/// Service settings; the migration settings live in `MirrorConfig`
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub mirror_config_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("storage.url", "./hms_mirror_runs.db")?
            .set_default("logging.level", "info")?;

        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }
        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(3000))?;
        }
        if let Ok(url) = env::var("STORAGE_URL") {
            builder = builder.set_override("storage.url", url)?;
        }
        if let Ok(level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", level)?;
        }
        if let Ok(path) = env::var("HMS_MIRROR_CONFIG") {
            builder = builder.set_override("mirror_config_path", path)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Holds the current `MirrorConfig` snapshot
///
/// Readers get an `Arc` of the snapshot; updates swap it whole, so a run
/// keeps the configuration it started with.
pub struct ConfigurationProvider {
    current: RwLock<Arc<MirrorConfig>>,
    source: Option<PathBuf>,
}

impl ConfigurationProvider {
    pub fn new(config: MirrorConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
            source: None,
        }
    }

    /// Load from a YAML, JSON or TOML file; reload re-reads the same file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MigrationError> {
        let path = path.as_ref().to_path_buf();
        let config = Self::read_file(&path)?;
        Ok(Self {
            current: RwLock::new(Arc::new(config)),
            source: Some(path),
        })
    }

    fn read_file(path: &Path) -> Result<MirrorConfig, MigrationError> {
        config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .and_then(|c| c.try_deserialize::<MirrorConfig>())
            .map_err(|e| {
                MigrationError::RequiredConfiguration(format!("Failed to load {}: {}", path.display(), e))
            })
    }

    pub async fn get_config(&self) -> Arc<MirrorConfig> {
        self.current.read().await.clone()
    }

    /// Replace the configuration; an invalid one is rejected and the old kept
    pub async fn update_config(&self, config: MirrorConfig) -> Result<(), MigrationError> {
        Self::validate(&config)?;
        *self.current.write().await = Arc::new(config);
        tracing::info!("Migration configuration updated");
        Ok(())
    }

    pub async fn validate_config(&self) -> bool {
        match Self::validate(&*self.get_config().await) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("Invalid migration configuration: {}", err);
                false
            }
        }
    }

    pub async fn reload_config(&self) -> Result<(), MigrationError> {
        let Some(path) = &self.source else {
            return Err(MigrationError::RequiredConfiguration(
                "Configuration was not loaded from a file; nothing to reload".to_string(),
            ));
        };
        let config = Self::read_file(path)?;
        self.update_config(config).await?;
        tracing::info!("Reloaded migration configuration from {}", path.display());
        Ok(())
    }

    /// Every problem with `config`, accumulated
    pub fn validate(config: &MirrorConfig) -> Result<(), MigrationError> {
        let mut errors = Vec::new();
        if config.clusters.left.hcfs_namespace.trim().is_empty() {
            errors.push("clusters.left.hcfs_namespace must be defined".to_string());
        }
        if let Err(err) = config.translator.warehouse_plans.validate() {
            errors.extend(err.messages());
        }
        if let Some(warehouse) = &config.transfer.warehouse {
            if let Err(err) = warehouse.validate() {
                errors.extend(err.messages().into_iter().map(|m| format!("Default warehouse: {}", m)));
            }
        }
        if let Err(err) = config.translator.global_location_map.validate() {
            errors.extend(err.messages());
        }
        if let Err(err) = StrategySelector::validate_strategy_configuration(config) {
            errors.extend(err.messages());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MigrationError::Validation(errors))
        }
    }
}
