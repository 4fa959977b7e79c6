use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use hms_mirror_backend::api::routes::create_router_with_state;
use hms_mirror_backend::config::{Config, ConfigurationProvider};
use hms_mirror_backend::models::MirrorConfig;
use hms_mirror_backend::storage::RunStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let provider = match &config.mirror_config_path {
        Some(path) => {
            info!("Loading migration configuration from {}", path);
            ConfigurationProvider::from_file(path).map_err(|e| {
                error!("Failed to load migration configuration: {}", e);
                e
            })?
        }
        None => {
            warn!("HMS_MIRROR_CONFIG not set; starting with the default migration configuration");
            ConfigurationProvider::new(MirrorConfig::default())
        }
    };
    let provider = Arc::new(provider);
    if !provider.validate_config().await {
        warn!("Migration configuration is incomplete; runs will be rejected until it is updated");
    }

    let store = Arc::new(RunStore::new(&config.storage.url).await.map_err(|e| {
        error!("Failed to initialize run store: {}", e);
        e
    })?);

    let app: Router = create_router_with_state(store, config.clone(), provider);

    let addr: SocketAddr = config.server_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
