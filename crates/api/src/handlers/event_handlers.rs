//! CRUD over a workflow's event handlers.
//!
//! A handler is checked against the workflow it joins, so it can only
//! reference tasks that already exist.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use engine::{validate_workflow, Handler, WorkflowRegistry};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub async fn list(Path(workflow): Path<String>, State(state): State<AppState>) -> ApiResult<Json<Vec<Handler>>> {
    Ok(Json(state.engine.registry().find_handlers(&workflow)?))
}

pub async fn get(
    Path((workflow, handler)): Path<(String, String)>,
    State(state): State<AppState>,
) -> ApiResult<Json<Handler>> {
    Ok(Json(state.engine.registry().find_handler(&workflow, &handler)?))
}

pub async fn create(
    Path(workflow): Path<String>,
    State(state): State<AppState>,
    Json(handler): Json<Handler>,
) -> ApiResult<(StatusCode, Json<Handler>)> {
    let registry = state.engine.registry();
    check(registry, &workflow, &handler)?;
    let saved = registry.save_handler(&workflow, handler)?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn update(
    Path((workflow, name)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(mut handler): Json<Handler>,
) -> ApiResult<Json<Handler>> {
    let registry = state.engine.registry();
    registry.find_handler(&workflow, &name)?;
    handler.name = name;
    check(registry, &workflow, &handler)?;
    Ok(Json(registry.save_handler(&workflow, handler)?))
}

pub async fn delete(
    Path((workflow, handler)): Path<(String, String)>,
    State(state): State<AppState>,
) -> ApiResult<StatusCode> {
    state.engine.registry().delete_handler(&workflow, &handler)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Validate the workflow as it would look with `handler` upserted.
fn check(registry: &WorkflowRegistry, workflow: &str, handler: &Handler) -> Result<(), ApiError> {
    let mut candidate = registry
        .find_by_name(workflow)
        .ok_or_else(|| ApiError::NotFound(format!("workflow '{workflow}' not found")))?;
    candidate.upsert_handler(handler.clone());
    validate_workflow(&candidate)?;
    Ok(())
}
