// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::lifecycle::{clamp_percentage, elapsed_ms, string_enum, DomainError, Transition};
use super::record::{ErrorPayload, Metadata, MetadataValue, RecordMeta};
use crate::utils::validators::{issue, validate_md5_hex, validate_not_blank};

/// 默认最大重试次数
pub const DEFAULT_MAX_RETRIES: i32 = 3;

string_enum! {
    /// 上传任务状态
    ///
    /// Pending → Uploading → Processing → Completed，
    /// 任一非终态都可能进入 Failed 或 Cancelled。
    pub enum UploadStatus {
        Pending => "pending",
        Uploading => "uploading",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

string_enum! {
    /// 上传方式
    pub enum UploadType {
        /// 单次上传
        Single => "single",
        /// 分片上传
        Chunk => "chunk",
        /// 断点续传
        Resumable => "resumable",
    }
}

impl UploadType {
    pub fn is_chunked(&self) -> bool {
        matches!(self, UploadType::Chunk | UploadType::Resumable)
    }
}

/// 上传配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct UploadConfig {
    /// 允许的 MIME 类型，支持 `image/*` 形式的通配
    pub allowed_types: Vec<String>,
    /// 单个文件最大字节数
    #[validate(range(min = 1))]
    pub max_size: Option<i64>,
    /// 是否压缩
    pub compress: bool,
    /// 是否添加水印
    pub watermark: bool,
}

impl UploadConfig {
    /// 判断 MIME 类型是否被允许，空列表表示不限制
    pub fn allows(&self, mime_type: &str) -> bool {
        if self.allowed_types.is_empty() {
            return true;
        }
        self.allowed_types.iter().any(|allowed| {
            match allowed.strip_suffix("/*") {
                Some(prefix) => mime_type
                    .split_once('/')
                    .is_some_and(|(major, _)| major == prefix),
                None => allowed == mime_type,
            }
        })
    }
}

/// 创建上传任务的输入
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_upload_layout"))]
pub struct NewUploadTask {
    /// 业务侧任务编号，缺省时自动生成
    #[validate(length(min = 1, max = 64))]
    pub task_id: Option<String>,
    #[validate(length(min = 1, max = 255), custom(function = "validate_not_blank"))]
    pub original_name: String,
    #[validate(range(min = 1))]
    pub file_size: i64,
    #[validate(length(min = 1, max = 100))]
    pub mime_type: String,
    pub upload_type: UploadType,
    #[validate(range(min = 1))]
    pub total_chunks: Option<i32>,
    #[validate(range(min = 1))]
    pub chunk_size: Option<i64>,
    #[validate(custom(function = "validate_md5_hex"))]
    pub file_md5: Option<String>,
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub uploader_id: String,
    pub temp_path: Option<String>,
    #[validate(range(min = 0, max = 10))]
    pub max_retries: Option<i32>,
    #[validate(nested)]
    pub upload_config: Option<UploadConfig>,
}

fn validate_upload_layout(input: &NewUploadTask) -> Result<(), ValidationError> {
    if input.upload_type.is_chunked() {
        let (Some(total_chunks), Some(chunk_size)) = (input.total_chunks, input.chunk_size) else {
            return Err(issue(
                "chunk_layout",
                "chunked uploads require total_chunks and chunk_size",
            ));
        };
        if i64::from(total_chunks).saturating_mul(chunk_size) < input.file_size {
            return Err(issue(
                "chunk_layout",
                "total_chunks * chunk_size must cover file_size",
            ));
        }
    }

    if let Some(config) = &input.upload_config {
        if config.max_size.is_some_and(|max| input.file_size > max) {
            return Err(issue("max_size", "file_size exceeds upload_config.max_size"));
        }
        if !config.allows(&input.mime_type) {
            return Err(issue(
                "mime_type",
                format!("mime type {} is not allowed", input.mime_type),
            ));
        }
    }
    Ok(())
}

/// 上传任务
///
/// 记录一次文件上传的完整生命周期。实体只记录事实，
/// 重试时间由服务层根据重试策略写入 `next_retry_at`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTask {
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// 业务任务编号（唯一）
    pub task_id: String,
    pub original_name: String,
    /// 文件大小（字节）
    pub file_size: i64,
    pub mime_type: String,
    pub upload_type: UploadType,
    pub status: UploadStatus,
    /// 进度百分比 [0, 100]
    pub progress: f64,
    pub uploaded_size: i64,
    pub total_chunks: Option<i32>,
    pub uploaded_chunks: i32,
    pub chunk_size: Option<i64>,
    pub file_md5: Option<String>,
    pub uploader_id: String,
    pub file_id: Option<Uuid>,
    pub storage_path: Option<String>,
    pub temp_path: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    /// 缓存的耗时（毫秒）
    pub duration_ms: Option<i64>,
    pub error: Option<ErrorPayload>,
    pub retry_count: i32,
    pub max_retries: i32,
    /// 下一次自动重试时间
    pub next_retry_at: Option<DateTime<Utc>>,
    pub upload_config: Option<UploadConfig>,
    pub metadata: Metadata,
}

impl UploadTask {
    /// 创建上传任务
    ///
    /// # 参数
    ///
    /// * `input` - 已反序列化的创建请求
    ///
    /// # 返回值
    ///
    /// * `Ok(UploadTask)` - 处于 Pending 状态、计数器清零的任务
    /// * `Err(DomainError)` - 输入校验失败
    pub fn create(input: NewUploadTask) -> Result<Self, DomainError> {
        input.validate()?;

        let task_id = input
            .task_id
            .unwrap_or_else(|| format!("upl_{}", Uuid::new_v4().simple()));

        Ok(Self {
            meta: RecordMeta::new(Some(input.uploader_id.clone())),
            task_id,
            original_name: input.original_name,
            file_size: input.file_size,
            mime_type: input.mime_type,
            upload_type: input.upload_type,
            status: UploadStatus::Pending,
            progress: 0.0,
            uploaded_size: 0,
            total_chunks: input.total_chunks,
            uploaded_chunks: 0,
            chunk_size: input.chunk_size,
            file_md5: input.file_md5.map(|md5| md5.to_ascii_lowercase()),
            uploader_id: input.uploader_id,
            file_id: None,
            storage_path: None,
            temp_path: input.temp_path,
            started_at: None,
            completed_at: None,
            failed_at: None,
            duration_ms: None,
            error: None,
            retry_count: 0,
            max_retries: input.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            next_retry_at: None,
            upload_config: input.upload_config,
            metadata: Metadata::default(),
        })
    }

    pub fn is_chunk_upload(&self) -> bool {
        self.upload_type.is_chunked()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            UploadStatus::Completed | UploadStatus::Cancelled
        )
    }

    fn reject(&self, event: Transition) -> DomainError {
        DomainError::invalid(self.status.as_str(), event)
    }

    /// 开始上传
    ///
    /// 只允许从 Pending 进入 Uploading，并清零进度与计数器。
    pub fn start(&mut self) -> Result<(), DomainError> {
        if self.status != UploadStatus::Pending {
            return Err(self.reject(Transition::Start));
        }
        self.status = UploadStatus::Uploading;
        self.started_at = Some(Utc::now());
        self.progress = 0.0;
        self.uploaded_size = 0;
        self.uploaded_chunks = 0;
        self.next_retry_at = None;
        Ok(())
    }

    /// 更新上传进度
    ///
    /// # 参数
    ///
    /// * `uploaded_size` - 已上传字节数（累计值）
    /// * `uploaded_chunks` - 已完成分片数（可选）
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 进度已更新
    /// * `Err(DomainError)` - 不在 Uploading 状态，或进度回退
    pub fn update_progress(
        &mut self,
        uploaded_size: i64,
        uploaded_chunks: Option<i32>,
    ) -> Result<(), DomainError> {
        if self.status != UploadStatus::Uploading {
            return Err(self.reject(Transition::UpdateProgress));
        }
        let progress = clamp_percentage(uploaded_size as f64 / self.file_size as f64 * 100.0);
        if uploaded_size < self.uploaded_size || progress < self.progress {
            return Err(DomainError::ProgressRegression {
                current: self.progress,
                requested: progress,
            });
        }
        if let Some(chunks) = uploaded_chunks {
            if chunks < self.uploaded_chunks {
                return Err(DomainError::ProgressRegression {
                    current: f64::from(self.uploaded_chunks),
                    requested: f64::from(chunks),
                });
            }
            self.uploaded_chunks = chunks;
        }
        self.uploaded_size = uploaded_size;
        self.progress = progress;
        Ok(())
    }

    /// 进入服务端处理阶段
    pub fn mark_as_processing(&mut self) -> Result<(), DomainError> {
        if self.status != UploadStatus::Uploading {
            return Err(self.reject(Transition::MarkProcessing));
        }
        self.status = UploadStatus::Processing;
        self.progress = 100.0;
        Ok(())
    }

    /// 标记上传完成
    ///
    /// 进度置为 100，存在 `started_at` 时缓存耗时。
    pub fn mark_as_completed(&mut self, storage_path: Option<String>) -> Result<(), DomainError> {
        if !matches!(
            self.status,
            UploadStatus::Uploading | UploadStatus::Processing
        ) {
            return Err(self.reject(Transition::Complete));
        }
        let now = Utc::now();
        self.status = UploadStatus::Completed;
        self.progress = 100.0;
        self.uploaded_size = self.uploaded_size.max(self.file_size);
        if let Some(total) = self.total_chunks {
            self.uploaded_chunks = total;
        }
        self.completed_at = Some(now);
        self.duration_ms = self.started_at.map(|started| elapsed_ms(started, now));
        if storage_path.is_some() {
            self.storage_path = storage_path;
        }
        Ok(())
    }

    /// 标记上传失败，错误信息原样保存
    pub fn mark_as_failed(&mut self, error: ErrorPayload) -> Result<(), DomainError> {
        if !matches!(
            self.status,
            UploadStatus::Pending | UploadStatus::Uploading | UploadStatus::Processing
        ) {
            return Err(self.reject(Transition::Fail));
        }
        let now = Utc::now();
        self.status = UploadStatus::Failed;
        self.failed_at = Some(now);
        self.duration_ms = self.started_at.map(|started| elapsed_ms(started, now));
        self.error = Some(error);
        Ok(())
    }

    /// 取消上传
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        if !matches!(
            self.status,
            UploadStatus::Pending | UploadStatus::Uploading | UploadStatus::Processing
        ) {
            return Err(self.reject(Transition::Cancel));
        }
        self.status = UploadStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        self.next_retry_at = None;
        Ok(())
    }

    /// 判断任务是否可以重试
    ///
    /// 仅在 Failed 状态且未达到最大重试次数时返回 true
    pub fn can_retry(&self) -> bool {
        self.status == UploadStatus::Failed && self.retry_count < self.max_retries
    }

    /// 重试
    ///
    /// 不满足 `can_retry` 时返回错误，任务保持原样。
    pub fn retry(&mut self) -> Result<(), DomainError> {
        if !self.can_retry() {
            return Err(self.reject(Transition::Retry));
        }
        self.retry_count += 1;
        self.status = UploadStatus::Pending;
        self.clear_attempt();
        Ok(())
    }

    /// 重置为全新的 Pending 任务，重试计数清零
    pub fn reset(&mut self) {
        self.status = UploadStatus::Pending;
        self.retry_count = 0;
        self.clear_attempt();
    }

    fn clear_attempt(&mut self) {
        self.progress = 0.0;
        self.uploaded_size = 0;
        self.uploaded_chunks = 0;
        self.started_at = None;
        self.completed_at = None;
        self.failed_at = None;
        self.duration_ms = None;
        self.error = None;
        self.next_retry_at = None;
    }

    /// 耗时（毫秒）
    ///
    /// 以完成或失败时间为终点，未结束时以当前时间为终点。
    pub fn elapsed_ms(&self) -> Option<i64> {
        let started = self.started_at?;
        let end = self
            .completed_at
            .or(self.failed_at)
            .unwrap_or_else(Utc::now);
        Some(elapsed_ms(started, end))
    }

    /// 上传速度（字节/秒）
    pub fn upload_speed(&self) -> Option<f64> {
        match self.elapsed_ms() {
            Some(ms) if ms > 0 => Some(self.uploaded_size as f64 * 1000.0 / ms as f64),
            _ => None,
        }
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.metadata.insert(key, value);
    }
}
