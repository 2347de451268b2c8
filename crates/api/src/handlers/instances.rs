use axum::{
    extract::{Path, State},
    Json,
};

use engine::WorkflowInstance;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub async fn list(State(state): State<AppState>) -> Json<Vec<WorkflowInstance>> {
    Json(state.engine.instances().await)
}

pub async fn get(Path(name): Path<String>, State(state): State<AppState>) -> ApiResult<Json<WorkflowInstance>> {
    state
        .engine
        .instance(name.clone())
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("instance '{name}' not tracked")))
}
