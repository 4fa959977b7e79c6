use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::api::middleware::AppError;
use crate::models::{DbMirror, TableMirror};
use crate::services::location::LocationTranslator;

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub database: String,
    pub table: TableMirror,
    /// Defaults to the table's LEFT location
    pub location: Option<String>,
    pub partition_spec: Option<String>,
}

/// Translate one location with the current GLM and warehouse plans
pub async fn translate_location(
    State(state): State<AppState>,
    Json(request): Json<LocationRequest>,
) -> Result<Json<Value>, AppError> {
    let translator = LocationTranslator::new(state.provider.get_config().await);
    let db = DbMirror::new(request.database);
    let original = request.location.or_else(|| request.table.left().location());
    let relative_dir = original.as_deref().and_then(|l| translator.relative_dir(l));
    let translated = translator.translate(
        &db,
        &request.table,
        original.as_deref(),
        request.partition_spec.as_deref(),
    )?;
    Ok(Json(json!({
        "relative_dir": relative_dir,
        "translated": translated,
    })))
}
