// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::Worker;
use crate::domain::services::upload_service::UploadService;
use crate::domain::services::workflow_service::WorkflowService;
use crate::utils::errors::WorkerError;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// 上传任务重试工作器
///
/// 重新打开 `next_retry_at` 已到期的失败上传任务
pub struct UploadRetryWorker {
    service: Arc<UploadService>,
    batch_size: u64,
}

impl UploadRetryWorker {
    pub fn new(service: Arc<UploadService>, batch_size: u64) -> Self {
        Self {
            service,
            batch_size,
        }
    }
}

#[async_trait]
impl Worker for UploadRetryWorker {
    async fn run(&self) -> Result<usize, WorkerError> {
        Ok(self
            .service
            .retry_due_tasks(Utc::now(), self.batch_size)
            .await?)
    }

    fn name(&self) -> &str {
        "upload_retry"
    }
}

/// 工作流执行重试工作器
///
/// 将到期的失败或超时执行放回 Pending
pub struct ExecutionRetryWorker {
    service: Arc<WorkflowService>,
    batch_size: u64,
}

impl ExecutionRetryWorker {
    pub fn new(service: Arc<WorkflowService>, batch_size: u64) -> Self {
        Self {
            service,
            batch_size,
        }
    }
}

#[async_trait]
impl Worker for ExecutionRetryWorker {
    async fn run(&self) -> Result<usize, WorkerError> {
        Ok(self
            .service
            .retry_due_executions(Utc::now(), self.batch_size)
            .await?)
    }

    fn name(&self) -> &str {
        "execution_retry"
    }
}
