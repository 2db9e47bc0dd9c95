// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::upload_service::UploadService;
use crate::domain::services::workflow_service::WorkflowService;
use crate::presentation::handlers::{execution_handler, upload_handler, workflow_handler};
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 创建应用路由
///
/// # 参数
///
/// * `upload_service` - 上传服务
/// * `workflow_service` - 工作流服务
///
/// # 返回值
///
/// 返回配置好的路由
pub fn app(upload_service: Arc<UploadService>, workflow_service: Arc<WorkflowService>) -> Router {
    Router::new()
        .merge(routes())
        .layer(Extension(upload_service))
        .layer(Extension(workflow_service))
        .layer(TraceLayer::new_for_http())
}

/// 路由表，不含共享状态
pub fn routes() -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    Router::new()
        .merge(public_routes)
        .merge(upload_routes())
        .merge(workflow_routes())
        .merge(execution_routes())
}

fn upload_routes() -> Router {
    Router::new()
        .route(
            "/v1/uploads",
            post(upload_handler::create_upload).get(upload_handler::list_uploads),
        )
        .route("/v1/uploads/{id}", get(upload_handler::get_upload))
        .route(
            "/v1/uploads/by-task-id/{task_id}",
            get(upload_handler::get_upload_by_task_id),
        )
        .route("/v1/uploads/{id}/start", post(upload_handler::start_upload))
        .route(
            "/v1/uploads/{id}/progress",
            post(upload_handler::update_upload_progress),
        )
        .route(
            "/v1/uploads/{id}/processing",
            post(upload_handler::mark_upload_processing),
        )
        .route("/v1/uploads/{id}/complete", post(upload_handler::complete_upload))
        .route("/v1/uploads/{id}/fail", post(upload_handler::fail_upload))
        .route("/v1/uploads/{id}/retry", post(upload_handler::retry_upload))
        .route("/v1/uploads/{id}/cancel", post(upload_handler::cancel_upload))
        .route("/v1/uploads/{id}/reset", post(upload_handler::reset_upload))
        .route(
            "/v1/uploads/{id}/chunks",
            post(upload_handler::register_chunk).get(upload_handler::list_chunks),
        )
        .route(
            "/v1/uploads/{id}/chunks/{index}/start",
            post(upload_handler::start_chunk),
        )
        .route(
            "/v1/uploads/{id}/chunks/{index}/complete",
            post(upload_handler::complete_chunk),
        )
        .route(
            "/v1/uploads/{id}/chunks/{index}/fail",
            post(upload_handler::fail_chunk),
        )
        .route(
            "/v1/uploads/{id}/chunks/{index}/retry",
            post(upload_handler::retry_chunk),
        )
}

fn workflow_routes() -> Router {
    Router::new()
        .route(
            "/v1/workflows",
            post(workflow_handler::create_workflow).get(workflow_handler::list_workflows),
        )
        .route("/v1/workflows/{id}", get(workflow_handler::get_workflow))
        .route(
            "/v1/workflows/{id}/activate",
            post(workflow_handler::activate_workflow),
        )
        .route(
            "/v1/workflows/{id}/deactivate",
            post(workflow_handler::deactivate_workflow),
        )
        .route(
            "/v1/workflows/{id}/archive",
            post(workflow_handler::archive_workflow),
        )
        .route(
            "/v1/workflows/{id}/executions",
            post(workflow_handler::start_execution).get(workflow_handler::list_executions),
        )
}

fn execution_routes() -> Router {
    Router::new()
        .route("/v1/executions/{id}", get(execution_handler::get_execution))
        .route(
            "/v1/executions/{id}/summary",
            get(execution_handler::get_execution_summary),
        )
        .route(
            "/v1/executions/{id}/start",
            post(execution_handler::begin_execution),
        )
        .route(
            "/v1/executions/{id}/nodes/{node_id}/enter",
            post(execution_handler::enter_node),
        )
        .route(
            "/v1/executions/{id}/nodes/{node_id}/complete",
            post(execution_handler::complete_node),
        )
        .route(
            "/v1/executions/{id}/nodes/{node_id}/fail",
            post(execution_handler::fail_node),
        )
        .route(
            "/v1/executions/{id}/nodes/{node_id}/progress",
            post(execution_handler::update_node_progress),
        )
        .route(
            "/v1/executions/{id}/pause",
            post(execution_handler::pause_execution),
        )
        .route(
            "/v1/executions/{id}/resume",
            post(execution_handler::resume_execution),
        )
        .route(
            "/v1/executions/{id}/complete",
            post(execution_handler::complete_execution),
        )
        .route(
            "/v1/executions/{id}/fail",
            post(execution_handler::fail_execution),
        )
        .route(
            "/v1/executions/{id}/timeout",
            post(execution_handler::timeout_execution),
        )
        .route(
            "/v1/executions/{id}/cancel",
            post(execution_handler::cancel_execution),
        )
        .route(
            "/v1/executions/{id}/retry",
            post(execution_handler::retry_execution),
        )
        .route(
            "/v1/executions/{id}/reset",
            post(execution_handler::reset_execution),
        )
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
///
/// # 返回值
///
/// 返回应用版本号
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
