use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::api::middleware::AppError;
use crate::models::MirrorConfig;

/// Current migration configuration
pub async fn get_config(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let config = state.provider.get_config().await;
    Ok(Json(json!({ "config": *config })))
}

pub async fn update_config(
    State(state): State<AppState>,
    Json(config): Json<MirrorConfig>,
) -> Result<Json<Value>, AppError> {
    state.provider.update_config(config).await?;
    let config = state.provider.get_config().await;
    Ok(Json(json!({ "config": *config })))
}

pub async fn reload_config(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.provider.reload_config().await?;
    let config = state.provider.get_config().await;
    Ok(Json(json!({ "config": *config })))
}

#[derive(Debug, Deserialize)]
pub struct WarehousePlanRequest {
    pub external_directory: String,
    pub managed_directory: String,
}

/// Add or replace the warehouse plan of one database
pub async fn put_warehouse_plan(
    State(state): State<AppState>,
    Path(database): Path<String>,
    Json(payload): Json<WarehousePlanRequest>,
) -> Result<Json<Value>, AppError> {
    let mut config = (*state.provider.get_config().await).clone();
    let warehouse = config
        .translator
        .warehouse_plans
        .add_plan(&database, payload.external_directory, payload.managed_directory)?
        .clone();
    state.provider.update_config(config).await?;
    tracing::info!("Warehouse plan set for {}", database);
    Ok(Json(json!({ "database": database, "warehouse": warehouse })))
}

pub async fn delete_warehouse_plan(
    State(state): State<AppState>,
    Path(database): Path<String>,
) -> Result<Json<Value>, AppError> {
    let mut config = (*state.provider.get_config().await).clone();
    if config.translator.warehouse_plans.remove_plan(&database).is_none() {
        return Err(AppError::NotFound(format!("No warehouse plan for {}", database)));
    }
    state.provider.update_config(config).await?;
    Ok(Json(json!({ "database": database, "deleted": true })))
}
