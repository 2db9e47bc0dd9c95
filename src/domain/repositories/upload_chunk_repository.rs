// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::RepositoryError;
use crate::domain::models::upload_chunk::UploadChunk;
use async_trait::async_trait;
use uuid::Uuid;

/// 上传分片仓库特质
#[async_trait]
pub trait UploadChunkRepository: Send + Sync {
    /// 创建分片，`(task_id, chunk_index)` 重复时返回 `Duplicate`
    async fn create(&self, chunk: &UploadChunk) -> Result<UploadChunk, RepositoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UploadChunk>, RepositoryError>;
    async fn find_by_index(
        &self,
        task_id: Uuid,
        chunk_index: i32,
    ) -> Result<Option<UploadChunk>, RepositoryError>;
    /// 按分片序号升序列出任务的全部分片
    async fn list_by_task(&self, task_id: Uuid) -> Result<Vec<UploadChunk>, RepositoryError>;
    async fn update(
        &self,
        chunk: &UploadChunk,
        expected_version: i32,
    ) -> Result<UploadChunk, RepositoryError>;
}
