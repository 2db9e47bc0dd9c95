// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{Page, RepositoryError};
use crate::domain::models::workflow::{Workflow, WorkflowStatus, WorkflowType};
use async_trait::async_trait;
use uuid::Uuid;

/// 工作流仓库特质
#[derive(Debug, Default, Clone)]
pub struct WorkflowQuery {
    pub status: Option<WorkflowStatus>,
    pub workflow_type: Option<WorkflowType>,
    pub creator_id: Option<String>,
    pub page: Page,
}

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn create(&self, workflow: &Workflow) -> Result<Workflow, RepositoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Workflow>, RepositoryError>;
    async fn update(
        &self,
        workflow: &Workflow,
        expected_version: i32,
    ) -> Result<Workflow, RepositoryError>;
    /// 分页查询，按更新时间倒序，不含已删除
    async fn query(&self, query: WorkflowQuery) -> Result<(Vec<Workflow>, u64), RepositoryError>;
}
