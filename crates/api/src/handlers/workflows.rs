use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use engine::{validate_workflow, Workflow};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub async fn list(State(state): State<AppState>) -> Json<Vec<Workflow>> {
    Json(state.engine.registry().find_all())
}

pub async fn get(Path(name): Path<String>, State(state): State<AppState>) -> ApiResult<Json<Workflow>> {
    state
        .engine
        .registry()
        .find_by_name(&name)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("workflow '{name}' not found")))
}

pub async fn create(
    State(state): State<AppState>,
    Json(workflow): Json<Workflow>,
) -> ApiResult<(StatusCode, Json<Workflow>)> {
    validate_workflow(&workflow)?;
    info!(workflow = %workflow.name, "workflow created");
    let saved = state.engine.registry().save(workflow);
    Ok((StatusCode::CREATED, Json(saved)))
}

/// Replace a definition. The path name wins over the body's.
pub async fn update(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Json(mut workflow): Json<Workflow>,
) -> ApiResult<Json<Workflow>> {
    let registry = state.engine.registry();
    if !registry.contains(&name) {
        return Err(ApiError::NotFound(format!("workflow '{name}' not found")));
    }
    workflow.name = name;
    validate_workflow(&workflow)?;
    Ok(Json(registry.save(workflow)))
}

pub async fn delete(Path(name): Path<String>, State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.engine.registry().delete(&name)?;
    info!(workflow = %name, "workflow deleted");
    Ok(StatusCode::NO_CONTENT)
}
