use std::sync::Arc;

use crate::config::{Config, ConfigurationProvider};
use crate::services::metastore::MetastorePoolManager;
use crate::storage::RunStore;

pub mod config;
pub mod distcp;
pub mod location;
pub mod migration;
pub mod strategy;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RunStore>,
    pub config: Config,
    pub provider: Arc<ConfigurationProvider>,
    pub metastore: Arc<MetastorePoolManager>,
}
