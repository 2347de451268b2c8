use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use engine::{validate_workflow, Task};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub async fn list(Path(workflow): Path<String>, State(state): State<AppState>) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.engine.registry().find_tasks(&workflow)?))
}

pub async fn get(
    Path((workflow, task)): Path<(String, String)>,
    State(state): State<AppState>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.engine.registry().find_task(&workflow, &task)?))
}

pub async fn create(
    Path(workflow): Path<String>,
    State(state): State<AppState>,
    Json(task): Json<Task>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let saved = state.engine.registry().save_task(&workflow, task)?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn update(
    Path((workflow, name)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(mut task): Json<Task>,
) -> ApiResult<Json<Task>> {
    let registry = state.engine.registry();
    registry.find_task(&workflow, &name)?;
    task.name = name;
    Ok(Json(registry.save_task(&workflow, task)?))
}

pub async fn delete(
    Path((workflow, task)): Path<(String, String)>,
    State(state): State<AppState>,
) -> ApiResult<StatusCode> {
    let registry = state.engine.registry();
    let mut candidate = registry
        .find_by_name(&workflow)
        .ok_or_else(|| ApiError::NotFound(format!("workflow '{workflow}' not found")))?;
    // Handlers must not be left pointing at the removed task.
    if candidate.remove_task(&task) {
        validate_workflow(&candidate)?;
    }
    registry.delete_task(&workflow, &task)?;
    Ok(StatusCode::NO_CONTENT)
}
