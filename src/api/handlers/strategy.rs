use axum::Json;
use serde_json::{json, Value};

use crate::api::middleware::AppError;
use crate::models::StrategyRequest;
use crate::services::selector::StrategySelector;

pub async fn select_strategy(Json(request): Json<StrategyRequest>) -> Result<Json<Value>, AppError> {
    let selection = StrategySelector::select_strategy(&request)?;
    Ok(Json(json!({ "selection": selection })))
}

pub async fn strategy_recommendations(Json(request): Json<StrategyRequest>) -> Result<Json<Value>, AppError> {
    let recommendations = StrategySelector::get_strategy_recommendations(&request);
    Ok(Json(json!({
        "primary": recommendations.primary(),
        "recommendations": recommendations.recommendations,
    })))
}
