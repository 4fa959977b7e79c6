use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::api::middleware::AppError;
use crate::models::{DbMirror, DistCpPlan, DistCpRequest};
use crate::services::distcp::DistCpPlanner;
use crate::services::location::LocationTranslator;

#[derive(Debug, Deserialize)]
pub struct DistCpPlanRequest {
    pub request: DistCpRequest,
    pub database: DbMirror,
}

async fn plan(state: &AppState, payload: &DistCpPlanRequest) -> Result<DistCpPlan, AppError> {
    let planner = DistCpPlanner::new(LocationTranslator::new(state.provider.get_config().await));
    let plan = planner.generate_distcp_plan(&payload.request, &payload.database)?;
    tracing::info!(
        "DistCp plan for {}: {} jobs, {} paths",
        plan.database,
        plan.jobs.len(),
        plan.path_count
    );
    Ok(plan)
}

pub async fn generate_plan(
    State(state): State<AppState>,
    Json(payload): Json<DistCpPlanRequest>,
) -> Result<Json<Value>, AppError> {
    let plan = plan(&state, &payload).await?;
    let recommendations = DistCpPlanner::calculate_execution_recommendations(plan.estimated_bytes, plan.path_count as u64);
    Ok(Json(json!({ "plan": plan, "recommendations": recommendations })))
}

/// Shell script and source list files, keyed by file name
pub async fn generate_script(
    State(state): State<AppState>,
    Json(payload): Json<DistCpPlanRequest>,
) -> Result<Json<Value>, AppError> {
    let plan = plan(&state, &payload).await?;
    Ok(Json(json!({ "files": DistCpPlanner::generate_distcp_scripts(&plan) })))
}

pub async fn generate_workbook(
    State(state): State<AppState>,
    Json(payload): Json<DistCpPlanRequest>,
) -> Result<Json<Value>, AppError> {
    let plan = plan(&state, &payload).await?;
    Ok(Json(json!({ "workbook": DistCpPlanner::generate_distcp_workbook(&plan) })))
}
