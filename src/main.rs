// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use runledger::config::settings::Settings;
use runledger::domain::services::upload_service::UploadService;
use runledger::domain::services::workflow_service::WorkflowService;
use runledger::infrastructure::database::connection;
use runledger::infrastructure::repositories::upload_chunk_repo_impl::UploadChunkRepositoryImpl;
use runledger::infrastructure::repositories::upload_task_repo_impl::UploadTaskRepositoryImpl;
use runledger::infrastructure::repositories::workflow_execution_repo_impl::WorkflowExecutionRepositoryImpl;
use runledger::infrastructure::repositories::workflow_repo_impl::WorkflowRepositoryImpl;
use runledger::presentation::routes;
use runledger::utils::retry_policy::RetryPolicy;
use runledger::workers::retry_worker::{ExecutionRetryWorker, UploadRetryWorker};
use runledger::workers::WorkerManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

use migration::{Migrator, MigratorTrait};
use runledger::utils::telemetry;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting runledger...");

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    // Initialize Prometheus Metrics
    runledger::infrastructure::metrics::init_metrics(&settings.metrics);

    // 3. Connect to database
    let db = connection::create_pool(&settings.database).await?;
    let db = Arc::new(db);
    info!("Database connection established");

    // Run database migrations
    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. Initialize services
    let retry_policy = RetryPolicy::from(&settings.retry);
    let upload_service = Arc::new(UploadService::new(
        Arc::new(UploadTaskRepositoryImpl::new(db.clone())),
        Arc::new(UploadChunkRepositoryImpl::new(db.clone())),
        retry_policy.clone(),
    ));
    let workflow_service = Arc::new(WorkflowService::new(
        Arc::new(WorkflowRepositoryImpl::new(db.clone())),
        Arc::new(WorkflowExecutionRepositoryImpl::new(db.clone())),
        retry_policy,
    ));

    // 5. Start Workers
    let mut worker_manager =
        WorkerManager::new(Duration::from_secs(settings.workers.retry_interval_secs));
    if settings.workers.enabled {
        worker_manager.spawn(Arc::new(UploadRetryWorker::new(
            upload_service.clone(),
            settings.workers.batch_size,
        )));
        worker_manager.spawn(Arc::new(ExecutionRetryWorker::new(
            workflow_service.clone(),
            settings.workers.batch_size,
        )));
    }

    // 6. Start HTTP server
    let app = routes::app(upload_service, workflow_service);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            worker_manager.wait_for_shutdown().await;
        })
        .await?;

    Ok(())
}
