// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::lifecycle::{elapsed_ms, string_enum, DomainError, Transition};
use super::record::{ErrorPayload, Metadata, MetadataValue, RecordMeta};
use super::upload_task::DEFAULT_MAX_RETRIES;
use crate::utils::validators::validate_md5_hex;

string_enum! {
    /// 分片状态
    pub enum ChunkStatus {
        Pending => "pending",
        Uploading => "uploading",
        Completed => "completed",
        Failed => "failed",
    }
}

/// 注册分片的输入
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUploadChunk {
    #[validate(range(min = 0))]
    pub chunk_index: i32,
    #[validate(range(min = 1))]
    pub chunk_size: i64,
    #[validate(custom(function = "validate_md5_hex"))]
    pub chunk_md5: String,
    pub temp_path: Option<String>,
}

/// 上传分片
///
/// 分片是上传任务的子单元，`(task_id, chunk_index)` 唯一。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadChunk {
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// 所属上传任务的主键
    pub task_id: Uuid,
    pub chunk_index: i32,
    pub chunk_size: i64,
    pub chunk_md5: String,
    pub status: ChunkStatus,
    pub storage_path: Option<String>,
    pub temp_path: Option<String>,
    pub etag: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error: Option<ErrorPayload>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub metadata: Metadata,
}

impl UploadChunk {
    /// 创建分片记录，初始状态为 Pending
    pub fn create(
        task_id: Uuid,
        input: NewUploadChunk,
        created_by: Option<String>,
    ) -> Result<Self, DomainError> {
        input.validate()?;
        Ok(Self {
            meta: RecordMeta::new(created_by),
            task_id,
            chunk_index: input.chunk_index,
            chunk_size: input.chunk_size,
            chunk_md5: input.chunk_md5.to_ascii_lowercase(),
            status: ChunkStatus::Pending,
            storage_path: None,
            temp_path: input.temp_path,
            etag: None,
            started_at: None,
            uploaded_at: None,
            failed_at: None,
            duration_ms: None,
            error: None,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            metadata: Metadata::default(),
        })
    }

    fn reject(&self, event: Transition) -> DomainError {
        DomainError::invalid(self.status.as_str(), event)
    }

    /// 开始上传分片
    pub fn start_upload(&mut self) -> Result<(), DomainError> {
        if self.status != ChunkStatus::Pending {
            return Err(self.reject(Transition::Start));
        }
        self.status = ChunkStatus::Uploading;
        self.started_at = Some(Utc::now());
        self.failed_at = None;
        self.error = None;
        Ok(())
    }

    /// 标记分片上传完成
    ///
    /// # 参数
    ///
    /// * `storage_path` - 分片存储路径（可选）
    /// * `etag` - 存储端返回的 ETag（可选）
    pub fn mark_as_completed(
        &mut self,
        storage_path: Option<String>,
        etag: Option<String>,
    ) -> Result<(), DomainError> {
        if self.status != ChunkStatus::Uploading {
            return Err(self.reject(Transition::Complete));
        }
        let now = Utc::now();
        self.status = ChunkStatus::Completed;
        self.uploaded_at = Some(now);
        self.duration_ms = self.started_at.map(|started| elapsed_ms(started, now));
        if storage_path.is_some() {
            self.storage_path = storage_path;
        }
        if etag.is_some() {
            self.etag = etag;
        }
        Ok(())
    }

    pub fn mark_as_failed(&mut self, error: ErrorPayload) -> Result<(), DomainError> {
        if !matches!(self.status, ChunkStatus::Pending | ChunkStatus::Uploading) {
            return Err(self.reject(Transition::Fail));
        }
        self.status = ChunkStatus::Failed;
        self.failed_at = Some(Utc::now());
        self.error = Some(error);
        Ok(())
    }

    pub fn can_retry(&self) -> bool {
        self.status == ChunkStatus::Failed && self.retry_count < self.max_retries
    }

    /// 重试失败的分片，不可重试时保持原样
    pub fn retry(&mut self) -> Result<(), DomainError> {
        if !self.can_retry() {
            return Err(self.reject(Transition::Retry));
        }
        self.retry_count += 1;
        self.status = ChunkStatus::Pending;
        self.error = None;
        self.failed_at = None;
        self.started_at = None;
        self.uploaded_at = None;
        self.duration_ms = None;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.status = ChunkStatus::Pending;
        self.retry_count = 0;
        self.error = None;
        self.started_at = None;
        self.uploaded_at = None;
        self.failed_at = None;
        self.duration_ms = None;
        self.storage_path = None;
        self.etag = None;
    }

    /// 校验分片摘要（忽略大小写）
    pub fn validate_md5(&self, md5: &str) -> bool {
        self.chunk_md5.eq_ignore_ascii_case(md5)
    }

    /// 上传速度（字节/秒）
    pub fn upload_speed(&self) -> Option<f64> {
        match self.duration_ms {
            Some(ms) if ms > 0 => Some(self.chunk_size as f64 * 1000.0 / ms as f64),
            _ => None,
        }
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.metadata.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const MD5: &str = "0CC175B9C0F1B6A831C399E269772661";

    fn chunk() -> UploadChunk {
        UploadChunk::create(
            Uuid::new_v4(),
            NewUploadChunk {
                chunk_index: 0,
                chunk_size: 1024,
                chunk_md5: MD5.to_string(),
                temp_path: None,
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_chunk_lifecycle() {
        let mut chunk = chunk();
        assert_eq!(chunk.status, ChunkStatus::Pending);
        chunk.start_upload().unwrap();
        chunk.started_at = Some(Utc::now() - Duration::milliseconds(512));
        chunk
            .mark_as_completed(Some("/tmp/c0".to_string()), Some("etag-1".to_string()))
            .unwrap();

        assert_eq!(chunk.status, ChunkStatus::Completed);
        assert_eq!(chunk.etag.as_deref(), Some("etag-1"));
        let duration = chunk.duration_ms.unwrap();
        assert!(duration >= 512);
        assert!(chunk.upload_speed().unwrap() <= 2000.0);
    }

    #[test]
    fn test_md5_is_case_insensitive() {
        let chunk = chunk();
        assert_eq!(chunk.chunk_md5, MD5.to_ascii_lowercase());
        assert!(chunk.validate_md5(MD5));
        assert!(!chunk.validate_md5("d41d8cd98f00b204e9800998ecf8427e"));
    }

    #[test]
    fn test_invalid_md5_is_rejected() {
        let result = UploadChunk::create(
            Uuid::new_v4(),
            NewUploadChunk {
                chunk_index: -1,
                chunk_size: 10,
                chunk_md5: "abc".to_string(),
                temp_path: None,
            },
            None,
        );
        let Err(DomainError::Validation(report)) = result else {
            panic!("expected validation error");
        };
        assert!(report.has_code("md5"));
        assert!(report.has_code("range"));
    }

    #[test]
    fn test_retry_budget() {
        let mut chunk = chunk();
        chunk.start_upload().unwrap();
        chunk.mark_as_failed(ErrorPayload::new("timeout")).unwrap();
        for _ in 0..DEFAULT_MAX_RETRIES {
            chunk.retry().unwrap();
            chunk.start_upload().unwrap();
            chunk.mark_as_failed(ErrorPayload::new("timeout")).unwrap();
        }
        let before = chunk.clone();
        assert!(chunk.retry().is_err());
        assert_eq!(chunk, before);

        chunk.reset();
        assert_eq!(chunk.retry_count, 0);
        assert_eq!(chunk.status, ChunkStatus::Pending);
    }
}
