// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum_test::TestServer;
use migration::{Migrator, MigratorTrait};
use runledger::config::settings::DatabaseSettings;
use runledger::domain::models::upload_task::{NewUploadTask, UploadType};
use runledger::domain::services::upload_service::UploadService;
use runledger::domain::services::workflow_service::WorkflowService;
use runledger::infrastructure::database::connection;
use runledger::infrastructure::repositories::upload_chunk_repo_impl::UploadChunkRepositoryImpl;
use runledger::infrastructure::repositories::upload_task_repo_impl::UploadTaskRepositoryImpl;
use runledger::infrastructure::repositories::workflow_execution_repo_impl::WorkflowExecutionRepositoryImpl;
use runledger::infrastructure::repositories::workflow_repo_impl::WorkflowRepositoryImpl;
use runledger::presentation::routes;
use runledger::utils::retry_policy::{RetryPolicy, RetryStrategy};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[allow(dead_code)]
pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub upload_tasks: Arc<UploadTaskRepositoryImpl>,
    pub upload_chunks: Arc<UploadChunkRepositoryImpl>,
    pub workflows: Arc<WorkflowRepositoryImpl>,
    pub executions: Arc<WorkflowExecutionRepositoryImpl>,
    pub upload_service: Arc<UploadService>,
    pub workflow_service: Arc<WorkflowService>,
}

/// 固定间隔、无抖动的重试策略，便于断言重试时间
pub fn test_policy() -> RetryPolicy {
    RetryPolicy {
        strategy: RetryStrategy::Fixed,
        base_delay: Duration::from_secs(10),
        enable_jitter: false,
        ..RetryPolicy::standard()
    }
}

/// 创建基于内存 SQLite 的测试上下文
pub async fn create_test_context() -> TestContext {
    let settings = DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: None,
        min_connections: None,
        connect_timeout: Some(5),
        idle_timeout: None,
    };
    let db = connection::create_pool(&settings)
        .await
        .expect("Failed to connect to SQLite");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    let db = Arc::new(db);

    let upload_tasks = Arc::new(UploadTaskRepositoryImpl::new(db.clone()));
    let upload_chunks = Arc::new(UploadChunkRepositoryImpl::new(db.clone()));
    let workflows = Arc::new(WorkflowRepositoryImpl::new(db.clone()));
    let executions = Arc::new(WorkflowExecutionRepositoryImpl::new(db.clone()));

    let upload_service = Arc::new(UploadService::new(
        upload_tasks.clone(),
        upload_chunks.clone(),
        test_policy(),
    ));
    let workflow_service = Arc::new(WorkflowService::new(
        workflows.clone(),
        executions.clone(),
        test_policy(),
    ));

    TestContext {
        db,
        upload_tasks,
        upload_chunks,
        workflows,
        executions,
        upload_service,
        workflow_service,
    }
}

pub async fn create_test_server() -> (TestServer, TestContext) {
    let ctx = create_test_context().await;
    let app = routes::app(ctx.upload_service.clone(), ctx.workflow_service.clone());
    let server = TestServer::new(app).expect("Failed to build test server");
    (server, ctx)
}

/// 三个 1000 字节分片组成的分片上传
pub fn chunked_upload() -> NewUploadTask {
    NewUploadTask {
        task_id: None,
        original_name: "video.mp4".to_string(),
        file_size: 2500,
        mime_type: "video/mp4".to_string(),
        upload_type: UploadType::Chunk,
        total_chunks: Some(3),
        chunk_size: Some(1000),
        file_md5: None,
        uploader_id: "uploader-1".to_string(),
        temp_path: None,
        max_retries: Some(2),
        upload_config: None,
    }
}

pub fn single_upload() -> NewUploadTask {
    NewUploadTask {
        task_id: Some("single-1".to_string()),
        original_name: "report.pdf".to_string(),
        file_size: 4096,
        mime_type: "application/pdf".to_string(),
        upload_type: UploadType::Single,
        total_chunks: None,
        chunk_size: None,
        file_md5: None,
        uploader_id: "uploader-1".to_string(),
        temp_path: None,
        max_retries: Some(1),
        upload_config: None,
    }
}

pub fn workflow_payload() -> Value {
    json!({
        "name": "Nightly build",
        "workflow_type": "automation",
        "category": "ci",
        "creator_id": "user-1",
        "definition": {
            "nodes": [
                { "id": "start", "name": "Start", "type": "start" },
                { "id": "build", "name": "Build", "type": "task", "auto_assign": true },
                { "id": "end", "name": "End", "type": "end" }
            ],
            "edges": [
                { "id": "e1", "source": "start", "target": "build" },
                { "id": "e2", "source": "build", "target": "end" }
            ],
            "settings": { "retry": { "enabled": true, "max_retries": 1, "retry_delay_secs": 5, "strategy": "fixed" } }
        },
        "tags": ["nightly"]
    })
}

pub fn md5_of(index: u8) -> String {
    format!("{:032x}", u128::from(index) + 1)
}
