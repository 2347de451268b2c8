use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use engine::{ContextualInput, Operation, OperationKind};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Body of `POST /api/workflows/:name/operations`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDto {
    #[serde(default)]
    pub instance_name: Option<String>,
    pub operation: OperationKind,
    #[serde(default)]
    pub inputs: Vec<ContextualInput>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accepted {
    pub workflow_name: String,
    pub operation: OperationKind,
}

pub async fn submit(
    Path(workflow): Path<String>,
    State(state): State<AppState>,
    Json(dto): Json<OperationDto>,
) -> ApiResult<(StatusCode, Json<Accepted>)> {
    if !state.engine.registry().contains(&workflow) {
        return Err(ApiError::NotFound(format!("workflow '{workflow}' not found")));
    }

    state.engine.submit(Operation {
        workflow_name: workflow.clone(),
        instance_name: dto.instance_name,
        operation: dto.operation,
        inputs: dto.inputs,
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(Accepted {
            workflow_name: workflow,
            operation: dto.operation,
        }),
    ))
}
