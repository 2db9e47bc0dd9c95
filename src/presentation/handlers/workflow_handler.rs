// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::validate_payload;
use crate::application::dto::execution_request::ExecutionListQuery;
use crate::application::dto::workflow_request::{WorkflowListQuery, WorkflowSummaryDto};
use crate::application::dto::{PageResponse, VersionedRequest};
use crate::domain::models::workflow::{NewWorkflow, Workflow};
use crate::domain::models::workflow_execution::{NewExecution, WorkflowExecution};
use crate::domain::services::workflow_service::WorkflowService;
use crate::presentation::errors::AppError;

type WorkflowResult = Result<Json<Workflow>, AppError>;

/// 创建工作流（Draft 状态）
pub async fn create_workflow(
    Extension(service): Extension<Arc<WorkflowService>>,
    Json(payload): Json<NewWorkflow>,
) -> Result<(StatusCode, Json<Workflow>), AppError> {
    let workflow = service.create_workflow(payload).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

/// 分页查询工作流概要
pub async fn list_workflows(
    Extension(service): Extension<Arc<WorkflowService>>,
    Query(params): Query<WorkflowListQuery>,
) -> Result<Json<PageResponse<WorkflowSummaryDto>>, AppError> {
    validate_payload(&params)?;
    let query = params.to_query();
    let page = query.page;
    let (workflows, total) = service.list_workflows(query).await?;
    let items = workflows.iter().map(WorkflowSummaryDto::from).collect();
    Ok(Json(PageResponse::new(items, total, page)))
}

pub async fn get_workflow(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
) -> WorkflowResult {
    Ok(Json(service.get_workflow(id).await?))
}

pub async fn activate_workflow(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VersionedRequest>,
) -> WorkflowResult {
    Ok(Json(service.activate_workflow(id, payload.expected_version).await?))
}

pub async fn deactivate_workflow(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VersionedRequest>,
) -> WorkflowResult {
    Ok(Json(service.deactivate_workflow(id, payload.expected_version).await?))
}

pub async fn archive_workflow(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VersionedRequest>,
) -> WorkflowResult {
    Ok(Json(service.archive_workflow(id, payload.expected_version).await?))
}

/// 启动一次执行
pub async fn start_execution(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewExecution>,
) -> Result<(StatusCode, Json<WorkflowExecution>), AppError> {
    let execution = service.start_execution(id, payload).await?;
    Ok((StatusCode::CREATED, Json(execution)))
}

pub async fn list_executions(
    Extension(service): Extension<Arc<WorkflowService>>,
    Path(id): Path<Uuid>,
    Query(params): Query<ExecutionListQuery>,
) -> Result<Json<PageResponse<WorkflowExecution>>, AppError> {
    validate_payload(&params)?;
    service.get_workflow(id).await?;
    let query = params.to_query(id);
    let page = query.page;
    let (items, total) = service.list_executions(query).await?;
    Ok(Json(PageResponse::new(items, total, page)))
}
