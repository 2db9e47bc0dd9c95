// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::record::ErrorPayload;
use crate::domain::models::upload_chunk::UploadChunk;
use crate::domain::models::upload_task::{UploadStatus, UploadTask};
use crate::domain::repositories::upload_task_repository::UploadTaskQuery;
use crate::domain::services::upload_service::ChunkCompletion;
use crate::utils::validators::validate_md5_hex;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 上传任务列表查询参数
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct UploadListQuery {
    pub status: Option<UploadStatus>,
    #[validate(length(min = 1, max = 128))]
    pub uploader_id: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl UploadListQuery {
    pub fn to_query(&self) -> UploadTaskQuery {
        UploadTaskQuery {
            status: self.status,
            uploader_id: self.uploader_id.clone(),
            page: super::PageQuery {
                limit: self.limit,
                offset: self.offset,
            }
            .page(),
        }
    }
}

/// 上报上传进度
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct UploadProgressRequest {
    pub expected_version: i32,
    #[validate(range(min = 0))]
    pub uploaded_size: i64,
    #[validate(range(min = 0))]
    pub uploaded_chunks: Option<i32>,
}

/// 完成上传任务
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CompleteUploadRequest {
    pub expected_version: i32,
    #[validate(length(min = 1, max = 1024))]
    pub storage_path: Option<String>,
}

/// 标记失败，上传任务与分片共用
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct FailRequest {
    pub expected_version: i32,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    #[validate(length(min = 1, max = 64))]
    pub code: Option<String>,
    pub stack: Option<String>,
}

impl FailRequest {
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            message: self.message.clone(),
            code: self.code.clone(),
            stack: self.stack.clone(),
        }
    }
}

/// 完成分片
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CompleteChunkRequest {
    pub expected_version: i32,
    #[validate(length(min = 1, max = 1024))]
    pub storage_path: Option<String>,
    pub etag: Option<String>,
    #[validate(custom(function = "validate_md5_hex"))]
    pub md5: Option<String>,
}

impl From<CompleteChunkRequest> for ChunkCompletion {
    fn from(request: CompleteChunkRequest) -> Self {
        ChunkCompletion {
            storage_path: request.storage_path,
            etag: request.etag,
            md5: request.md5,
        }
    }
}

/// 分片完成后的分片与父任务
#[derive(Debug, Serialize, Deserialize)]
pub struct ChunkCompletedResponse {
    pub chunk: UploadChunk,
    pub task: UploadTask,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_query_defaults() {
        let query = UploadListQuery::default().to_query();
        assert_eq!(query.page.limit, super::super::DEFAULT_PAGE_SIZE);
        assert_eq!(query.page.offset, 0);
        assert!(query.status.is_none());
    }

    #[test]
    fn test_list_query_limit_range() {
        let query = UploadListQuery {
            limit: Some(500),
            ..Default::default()
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_complete_chunk_rejects_bad_md5() {
        let request: CompleteChunkRequest = serde_json::from_value(json!({
            "expected_version": 2,
            "md5": "not-a-digest"
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_fail_request_payload() {
        let request: FailRequest = serde_json::from_value(json!({
            "expected_version": 3,
            "message": "disk full",
            "code": "ENOSPC"
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        let payload = request.payload();
        assert_eq!(payload.message, "disk full");
        assert_eq!(payload.code.as_deref(), Some("ENOSPC"));
    }
}
