// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{check_version, ServiceError};
use crate::domain::models::lifecycle::Transition;
use crate::domain::models::record::ErrorPayload;
use crate::domain::models::upload_chunk::{ChunkStatus, NewUploadChunk, UploadChunk};
use crate::domain::models::upload_task::{NewUploadTask, UploadStatus, UploadTask};
use crate::domain::repositories::upload_chunk_repository::UploadChunkRepository;
use crate::domain::repositories::upload_task_repository::{UploadTaskQuery, UploadTaskRepository};
use crate::domain::repositories::RepositoryError;
use crate::utils::retry_policy::RetryPolicy;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 分片完成后回写父任务进度的最大尝试次数
const PARENT_UPDATE_ATTEMPTS: usize = 3;

/// 分片完成时附带的信息
#[derive(Debug, Clone, Default)]
pub struct ChunkCompletion {
    pub storage_path: Option<String>,
    pub etag: Option<String>,
    /// 客户端计算的摘要，存在时必须与注册时一致
    pub md5: Option<String>,
}

/// 上传服务
///
/// 处理上传任务与分片的状态转换和持久化
pub struct UploadService {
    tasks: Arc<dyn UploadTaskRepository>,
    chunks: Arc<dyn UploadChunkRepository>,
    retry_policy: RetryPolicy,
}

impl UploadService {
    /// 创建新的上传服务实例
    ///
    /// # 参数
    ///
    /// * `tasks` - 上传任务仓库
    /// * `chunks` - 上传分片仓库
    /// * `retry_policy` - 失败后计算下次重试时间的策略
    pub fn new(
        tasks: Arc<dyn UploadTaskRepository>,
        chunks: Arc<dyn UploadChunkRepository>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            tasks,
            chunks,
            retry_policy,
        }
    }

    /// 创建上传任务
    pub async fn create_task(&self, input: NewUploadTask) -> Result<UploadTask, ServiceError> {
        let task = UploadTask::create(input)?;
        let task = self.tasks.create(&task).await?;

        counter!("upload_tasks_created_total", "upload_type" => task.upload_type.as_str())
            .increment(1);
        info!(
            id = %task.meta.id,
            task_id = %task.task_id,
            file_size = task.file_size,
            upload_type = %task.upload_type,
            "Upload task created"
        );
        Ok(task)
    }

    pub async fn get_task(&self, id: Uuid) -> Result<UploadTask, ServiceError> {
        self.tasks
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("upload task", id))
    }

    /// 按业务任务编号查找
    pub async fn find_task_by_task_id(&self, task_id: &str) -> Result<UploadTask, ServiceError> {
        self.tasks
            .find_by_task_id(task_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("upload task", task_id))
    }

    pub async fn list_tasks(
        &self,
        query: UploadTaskQuery,
    ) -> Result<(Vec<UploadTask>, u64), ServiceError> {
        Ok(self.tasks.query(query).await?)
    }

    pub async fn list_chunks(&self, task_id: Uuid) -> Result<Vec<UploadChunk>, ServiceError> {
        self.get_task(task_id).await?;
        Ok(self.chunks.list_by_task(task_id).await?)
    }

    async fn load_task(&self, id: Uuid, expected_version: i32) -> Result<UploadTask, ServiceError> {
        let task = self.get_task(id).await?;
        check_version(id, expected_version, task.meta.version)?;
        Ok(task)
    }

    async fn save_task(
        &self,
        task: &UploadTask,
        expected_version: i32,
        event: Transition,
    ) -> Result<UploadTask, ServiceError> {
        let saved = self.tasks.update(task, expected_version).await?;
        counter!("upload_task_transitions_total", "event" => event.as_str()).increment(1);
        debug!(
            id = %saved.meta.id,
            status = %saved.status,
            version = saved.meta.version,
            event = %event,
            "Upload task saved"
        );
        Ok(saved)
    }

    /// 加载、转换并保存上传任务
    async fn transition_task<F>(
        &self,
        id: Uuid,
        expected_version: i32,
        event: Transition,
        apply: F,
    ) -> Result<UploadTask, ServiceError>
    where
        F: FnOnce(&mut UploadTask) -> Result<(), ServiceError>,
    {
        let mut task = self.load_task(id, expected_version).await?;
        apply(&mut task)?;
        self.save_task(&task, expected_version, event).await
    }

    /// 开始上传
    ///
    /// 重试后保留的已完成分片会立即计入新一轮的进度。
    pub async fn start_task(&self, id: Uuid, expected_version: i32) -> Result<UploadTask, ServiceError> {
        let task = self
            .transition_task(id, expected_version, Transition::Start, |task| {
                Ok(task.start()?)
            })
            .await?;
        if task.is_chunk_upload() {
            return self.sync_parent_progress(id).await;
        }
        Ok(task)
    }

    /// 上报单次上传的累计进度
    pub async fn update_task_progress(
        &self,
        id: Uuid,
        expected_version: i32,
        uploaded_size: i64,
        uploaded_chunks: Option<i32>,
    ) -> Result<UploadTask, ServiceError> {
        self.transition_task(id, expected_version, Transition::UpdateProgress, |task| {
            Ok(task.update_progress(uploaded_size, uploaded_chunks)?)
        })
        .await
    }

    pub async fn mark_processing(
        &self,
        id: Uuid,
        expected_version: i32,
    ) -> Result<UploadTask, ServiceError> {
        self.transition_task(id, expected_version, Transition::MarkProcessing, |task| {
            Ok(task.mark_as_processing()?)
        })
        .await
    }

    pub async fn complete_task(
        &self,
        id: Uuid,
        expected_version: i32,
        storage_path: Option<String>,
    ) -> Result<UploadTask, ServiceError> {
        let task = self
            .transition_task(id, expected_version, Transition::Complete, |task| {
                Ok(task.mark_as_completed(storage_path)?)
            })
            .await?;

        if let Some(duration_ms) = task.duration_ms {
            histogram!("upload_task_duration_seconds").record(duration_ms as f64 / 1000.0);
        }
        info!(id = %task.meta.id, duration_ms = ?task.duration_ms, "Upload task completed");
        Ok(task)
    }

    /// 标记失败
    ///
    /// 仍可重试时根据重试策略写入 `next_retry_at`，由重试 Worker 到期后重新打开。
    pub async fn fail_task(
        &self,
        id: Uuid,
        expected_version: i32,
        error: ErrorPayload,
    ) -> Result<UploadTask, ServiceError> {
        let policy = &self.retry_policy;
        let task = self
            .transition_task(id, expected_version, Transition::Fail, |task| {
                task.mark_as_failed(error)?;
                if task.can_retry() {
                    let attempt = u32::try_from(task.retry_count + 1).unwrap_or(1);
                    task.next_retry_at = Some(policy.next_retry_time(attempt, Utc::now()));
                }
                Ok(())
            })
            .await?;

        warn!(
            id = %task.meta.id,
            retry_count = task.retry_count,
            next_retry_at = ?task.next_retry_at,
            error = task.error.as_ref().map(|e| e.message.as_str()).unwrap_or_default(),
            "Upload task failed"
        );
        Ok(task)
    }

    pub async fn retry_task(&self, id: Uuid, expected_version: i32) -> Result<UploadTask, ServiceError> {
        self.transition_task(id, expected_version, Transition::Retry, |task| {
            Ok(task.retry()?)
        })
        .await
    }

    pub async fn cancel_task(&self, id: Uuid, expected_version: i32) -> Result<UploadTask, ServiceError> {
        self.transition_task(id, expected_version, Transition::Cancel, |task| {
            Ok(task.cancel()?)
        })
        .await
    }

    /// 重置为全新的上传
    ///
    /// 分片上传的所有分片同时回到 Pending，需要重新上传。
    pub async fn reset_task(&self, id: Uuid, expected_version: i32) -> Result<UploadTask, ServiceError> {
        let task = self
            .transition_task(id, expected_version, Transition::Reset, |task| {
                task.reset();
                Ok(())
            })
            .await?;
        if task.is_chunk_upload() {
            self.reset_chunks(id).await?;
        }
        Ok(task)
    }

    async fn reset_chunks(&self, task_id: Uuid) -> Result<usize, ServiceError> {
        let mut reset = 0;
        for mut chunk in self.chunks.list_by_task(task_id).await? {
            if chunk.status == ChunkStatus::Pending && chunk.retry_count == 0 {
                continue;
            }
            let version = chunk.meta.version;
            chunk.reset();
            self.chunks.update(&chunk, version).await?;
            reset += 1;
        }
        debug!(task_id = %task_id, count = reset, "Chunks reset");
        Ok(reset)
    }

    /// 重新打开已到重试时间的失败任务
    ///
    /// # 返回值
    ///
    /// 成功重新打开的任务数。被并发修改的任务会被跳过，留给下一轮。
    pub async fn retry_due_tasks(&self, now: DateTime<Utc>, limit: u64) -> Result<usize, ServiceError> {
        let due = self.tasks.find_due_retries(now, limit).await?;
        let mut reopened = 0;

        for mut task in due {
            let version = task.meta.version;
            if let Err(e) = task.retry() {
                debug!(id = %task.meta.id, error = %e, "Skipping upload task that is no longer retryable");
                continue;
            }
            match self.save_task(&task, version, Transition::Retry).await {
                Ok(_) => reopened += 1,
                Err(ServiceError::Repository(RepositoryError::ConcurrentModification { .. })) => {
                    debug!(id = %task.meta.id, "Upload task changed concurrently, skipping retry");
                }
                Err(e) => return Err(e),
            }
        }

        if reopened > 0 {
            info!(count = reopened, "Re-opened failed upload tasks");
        }
        Ok(reopened)
    }

    /// 注册分片
    pub async fn register_chunk(
        &self,
        task_id: Uuid,
        input: NewUploadChunk,
    ) -> Result<UploadChunk, ServiceError> {
        let task = self.get_task(task_id).await?;
        if !task.is_chunk_upload() {
            return Err(ServiceError::Conflict(format!(
                "upload task {task_id} is not a chunked upload"
            )));
        }
        if task.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "upload task {task_id} is {}",
                task.status
            )));
        }
        if let Some(total) = task.total_chunks {
            if input.chunk_index >= total {
                return Err(ServiceError::Conflict(format!(
                    "chunk index {} out of range (total {total})",
                    input.chunk_index
                )));
            }
        }

        let chunk = UploadChunk::create(task_id, input, task.meta.created_by.clone())?;
        let chunk = self.chunks.create(&chunk).await?;
        debug!(task_id = %task_id, chunk_index = chunk.chunk_index, "Chunk registered");
        Ok(chunk)
    }

    async fn load_chunk(
        &self,
        task_id: Uuid,
        chunk_index: i32,
        expected_version: i32,
    ) -> Result<UploadChunk, ServiceError> {
        let chunk = self
            .chunks
            .find_by_index(task_id, chunk_index)
            .await?
            .ok_or_else(|| ServiceError::not_found("upload chunk", format!("{task_id}/{chunk_index}")))?;
        check_version(chunk.meta.id, expected_version, chunk.meta.version)?;
        Ok(chunk)
    }

    async fn require_uploading(&self, task_id: Uuid) -> Result<UploadTask, ServiceError> {
        let task = self.get_task(task_id).await?;
        if task.status != UploadStatus::Uploading {
            return Err(ServiceError::Conflict(format!(
                "upload task {task_id} is {}, expected uploading",
                task.status
            )));
        }
        Ok(task)
    }

    pub async fn start_chunk(
        &self,
        task_id: Uuid,
        chunk_index: i32,
        expected_version: i32,
    ) -> Result<UploadChunk, ServiceError> {
        self.require_uploading(task_id).await?;
        let mut chunk = self.load_chunk(task_id, chunk_index, expected_version).await?;
        chunk.start_upload()?;
        Ok(self.chunks.update(&chunk, expected_version).await?)
    }

    /// 完成分片并回写父任务的分片数、已上传字节和进度
    pub async fn complete_chunk(
        &self,
        task_id: Uuid,
        chunk_index: i32,
        expected_version: i32,
        completion: ChunkCompletion,
    ) -> Result<(UploadChunk, UploadTask), ServiceError> {
        self.require_uploading(task_id).await?;
        let mut chunk = self.load_chunk(task_id, chunk_index, expected_version).await?;
        if let Some(md5) = &completion.md5 {
            if !chunk.validate_md5(md5) {
                return Err(ServiceError::Conflict(format!(
                    "chunk {chunk_index} digest mismatch"
                )));
            }
        }
        chunk.mark_as_completed(completion.storage_path, completion.etag)?;
        let chunk = self.chunks.update(&chunk, expected_version).await?;
        counter!("upload_chunks_completed_total").increment(1);

        let task = self.sync_parent_progress(task_id).await?;
        Ok((chunk, task))
    }

    /// 根据已完成分片重新计算父任务进度
    ///
    /// 父任务会被多个分片并发更新，版本冲突时重新加载后再试。
    async fn sync_parent_progress(&self, task_id: Uuid) -> Result<UploadTask, ServiceError> {
        let mut last_error = None;
        for _ in 0..PARENT_UPDATE_ATTEMPTS {
            let mut task = self.get_task(task_id).await?;
            let completed: Vec<UploadChunk> = self
                .chunks
                .list_by_task(task_id)
                .await?
                .into_iter()
                .filter(|chunk| chunk.status == ChunkStatus::Completed)
                .collect();
            let completed_size: i64 = completed.iter().map(|chunk| chunk.chunk_size).sum();
            let completed_chunks = i32::try_from(completed.len()).unwrap_or(i32::MAX);

            // 客户端上报的进度可能领先于已完成分片，只向前推进
            let uploaded_size = completed_size.min(task.file_size).max(task.uploaded_size);
            let uploaded_chunks = completed_chunks.max(task.uploaded_chunks);
            if uploaded_size == task.uploaded_size && uploaded_chunks == task.uploaded_chunks {
                return Ok(task);
            }
            let version = task.meta.version;
            task.update_progress(uploaded_size, Some(uploaded_chunks))?;
            match self.save_task(&task, version, Transition::UpdateProgress).await {
                Ok(saved) => return Ok(saved),
                Err(ServiceError::Repository(e @ RepositoryError::ConcurrentModification { .. })) => {
                    debug!(task_id = %task_id, "Parent task changed concurrently, reloading");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error
            .map(ServiceError::Repository)
            .unwrap_or_else(|| ServiceError::Conflict(format!("upload task {task_id} is busy"))))
    }

    pub async fn fail_chunk(
        &self,
        task_id: Uuid,
        chunk_index: i32,
        expected_version: i32,
        error: ErrorPayload,
    ) -> Result<UploadChunk, ServiceError> {
        let mut chunk = self.load_chunk(task_id, chunk_index, expected_version).await?;
        chunk.mark_as_failed(error)?;
        let chunk = self.chunks.update(&chunk, expected_version).await?;
        counter!("upload_chunks_failed_total").increment(1);
        warn!(task_id = %task_id, chunk_index, retry_count = chunk.retry_count, "Chunk failed");
        Ok(chunk)
    }

    pub async fn retry_chunk(
        &self,
        task_id: Uuid,
        chunk_index: i32,
        expected_version: i32,
    ) -> Result<UploadChunk, ServiceError> {
        let mut chunk = self.load_chunk(task_id, chunk_index, expected_version).await?;
        chunk.retry()?;
        Ok(self.chunks.update(&chunk, expected_version).await?)
    }
}
