use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::AppState;
use crate::api::middleware::AppError;
use crate::models::DbMirror;
use crate::services::executor::RecordingSqlExecutor;
use crate::services::runner::MigrationRunner;
use crate::services::strategies::MigrationContext;

/// Run a database through the engine and store the report
///
/// Statements go to the recording executor, so the report carries the
/// transcript of what would run.
pub async fn create_migration(
    State(state): State<AppState>,
    Json(db): Json<DbMirror>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if db.name.trim().is_empty() {
        return Err(AppError::Validation("Database name cannot be empty".to_string()));
    }
    let config = state.provider.get_config().await;
    let ctx = MigrationContext::new(config, Arc::new(RecordingSqlExecutor::new()));
    let runner = MigrationRunner::new(ctx).with_metastore(state.metastore.clone());

    let report = runner.run(db).await?;
    state.store.save_run(&report).await?;
    Ok((StatusCode::CREATED, Json(json!({ "run": report }))))
}

pub async fn list_migrations(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let runs = state.store.list_runs().await?;
    Ok(Json(json!({ "runs": runs })))
}

pub async fn get_migration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let report = state
        .store
        .get_run(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Run {} not found", id)))?;
    Ok(Json(json!({ "run": report })))
}
