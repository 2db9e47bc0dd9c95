// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{Page, RepositoryError};
use crate::domain::models::upload_task::{UploadStatus, UploadTask};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 上传任务查询参数
#[derive(Debug, Default, Clone)]
pub struct UploadTaskQuery {
    pub status: Option<UploadStatus>,
    pub uploader_id: Option<String>,
    pub page: Page,
}

/// 上传任务仓库特质
#[async_trait]
pub trait UploadTaskRepository: Send + Sync {
    /// 创建上传任务
    async fn create(&self, task: &UploadTask) -> Result<UploadTask, RepositoryError>;
    /// 根据主键查找
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UploadTask>, RepositoryError>;
    /// 根据业务任务编号查找
    async fn find_by_task_id(&self, task_id: &str) -> Result<Option<UploadTask>, RepositoryError>;
    /// 按期望版本更新，成功后返回版本号加一的记录
    async fn update(
        &self,
        task: &UploadTask,
        expected_version: i32,
    ) -> Result<UploadTask, RepositoryError>;
    /// 分页查询，返回 (记录, 总数)
    async fn query(&self, query: UploadTaskQuery) -> Result<(Vec<UploadTask>, u64), RepositoryError>;
    /// 查找已到重试时间的失败任务
    async fn find_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<UploadTask>, RepositoryError>;
}
