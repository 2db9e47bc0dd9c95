// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Path},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::validate_payload;
use crate::application::dto::execution_request::{
    FailExecutionRequest, NodeFailureRequest, NodeProgressRequest, OutputRequest,
    RetryExecutionRequest,
};
use crate::application::dto::VersionedRequest;
use crate::domain::models::workflow_execution::{ExecutionSummary, WorkflowExecution};
use crate::domain::services::workflow_service::WorkflowService;
use crate::presentation::errors::AppError;

type ExecutionResult = Result<Json<WorkflowExecution>, AppError>;

pub async fn get_execution(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
) -> ExecutionResult {
    Ok(Json(service.get_execution(id).await?))
}

pub async fn get_execution_summary(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExecutionSummary>, AppError> {
    Ok(Json(service.get_execution(id).await?.summary()))
}

/// 开始处于 Pending 的执行（重试或重置之后）
pub async fn begin_execution(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VersionedRequest>,
) -> ExecutionResult {
    Ok(Json(service.begin_execution(id, payload.expected_version).await?))
}

pub async fn enter_node(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path((id, node_id)): Path<(Uuid, String)>,
    Json(payload): Json<VersionedRequest>,
) -> ExecutionResult {
    let execution = service
        .enter_node(id, payload.expected_version, &node_id)
        .await?;
    Ok(Json(execution))
}

pub async fn complete_node(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path((id, node_id)): Path<(Uuid, String)>,
    Json(payload): Json<OutputRequest>,
) -> ExecutionResult {
    let execution = service
        .complete_node(id, payload.expected_version, &node_id, payload.output)
        .await?;
    Ok(Json(execution))
}

pub async fn fail_node(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path((id, node_id)): Path<(Uuid, String)>,
    Json(payload): Json<NodeFailureRequest>,
) -> ExecutionResult {
    validate_payload(&payload)?;
    let execution = service
        .fail_node(id, payload.expected_version, &node_id, payload.payload())
        .await?;
    Ok(Json(execution))
}

pub async fn update_node_progress(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path((id, node_id)): Path<(Uuid, String)>,
    Json(payload): Json<NodeProgressRequest>,
) -> ExecutionResult {
    validate_payload(&payload)?;
    let execution = service
        .update_node_progress(
            id,
            payload.expected_version,
            &node_id,
            payload.percentage,
            payload.message,
        )
        .await?;
    Ok(Json(execution))
}

pub async fn pause_execution(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VersionedRequest>,
) -> ExecutionResult {
    Ok(Json(service.pause_execution(id, payload.expected_version).await?))
}

pub async fn resume_execution(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VersionedRequest>,
) -> ExecutionResult {
    Ok(Json(service.resume_execution(id, payload.expected_version).await?))
}

pub async fn complete_execution(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<OutputRequest>,
) -> ExecutionResult {
    let execution = service
        .complete_execution(id, payload.expected_version, payload.output)
        .await?;
    Ok(Json(execution))
}

pub async fn fail_execution(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FailExecutionRequest>,
) -> ExecutionResult {
    validate_payload(&payload)?;
    let execution = service
        .fail_execution(id, payload.expected_version, payload.error())
        .await?;
    Ok(Json(execution))
}

pub async fn timeout_execution(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VersionedRequest>,
) -> ExecutionResult {
    Ok(Json(service.timeout_execution(id, payload.expected_version).await?))
}

pub async fn cancel_execution(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VersionedRequest>,
) -> ExecutionResult {
    Ok(Json(service.cancel_execution(id, payload.expected_version).await?))
}

pub async fn retry_execution(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RetryExecutionRequest>,
) -> ExecutionResult {
    validate_payload(&payload)?;
    let execution = service
        .retry_execution(id, payload.expected_version, payload.reason)
        .await?;
    Ok(Json(execution))
}

pub async fn reset_execution(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VersionedRequest>,
) -> ExecutionResult {
    Ok(Json(service.reset_execution(id, payload.expected_version).await?))
}
