// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{Page, RepositoryError};
use crate::domain::models::workflow_execution::{ExecutionStatus, WorkflowExecution};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 执行实例查询参数
#[derive(Debug, Default, Clone)]
pub struct ExecutionQuery {
    pub workflow_id: Option<Uuid>,
    pub status: Option<ExecutionStatus>,
    pub page: Page,
}

/// 工作流执行仓库特质
#[async_trait]
pub trait WorkflowExecutionRepository: Send + Sync {
    async fn create(
        &self,
        execution: &WorkflowExecution,
    ) -> Result<WorkflowExecution, RepositoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkflowExecution>, RepositoryError>;
    async fn update(
        &self,
        execution: &WorkflowExecution,
        expected_version: i32,
    ) -> Result<WorkflowExecution, RepositoryError>;
    /// 分页查询，按创建时间倒序
    async fn query(
        &self,
        query: ExecutionQuery,
    ) -> Result<(Vec<WorkflowExecution>, u64), RepositoryError>;
    /// 查找已到重试时间的失败或超时执行
    async fn find_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<WorkflowExecution>, RepositoryError>;
}
