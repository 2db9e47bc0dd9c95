// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::record::ErrorPayload;
use crate::domain::models::workflow_execution::{ErrorKind, ExecutionError, ExecutionStatus};
use crate::domain::repositories::workflow_execution_repository::ExecutionQuery;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::PageQuery;

/// 执行列表查询参数
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct ExecutionListQuery {
    pub status: Option<ExecutionStatus>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl ExecutionListQuery {
    pub fn to_query(&self, workflow_id: Uuid) -> ExecutionQuery {
        ExecutionQuery {
            workflow_id: Some(workflow_id),
            status: self.status,
            page: PageQuery {
                limit: self.limit,
                offset: self.offset,
            }
            .page(),
        }
    }
}

/// 完成节点或完成执行时附带输出
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputRequest {
    pub expected_version: i32,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
}

/// 节点失败
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct NodeFailureRequest {
    pub expected_version: i32,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    pub code: Option<String>,
}

impl NodeFailureRequest {
    pub fn payload(&self) -> ErrorPayload {
        let payload = ErrorPayload::new(self.message.clone());
        match &self.code {
            Some(code) => payload.with_code(code.clone()),
            None => payload,
        }
    }
}

/// 节点进度
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct NodeProgressRequest {
    pub expected_version: i32,
    #[validate(range(min = 0.0, max = 100.0))]
    pub percentage: f64,
    #[validate(length(max = 500))]
    pub message: Option<String>,
}

/// 执行失败
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct FailExecutionRequest {
    pub expected_version: i32,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    pub code: Option<String>,
    #[serde(default = "default_error_kind")]
    pub kind: ErrorKind,
    pub node_id: Option<String>,
    pub details: Option<String>,
}

fn default_error_kind() -> ErrorKind {
    ErrorKind::Business
}

impl FailExecutionRequest {
    pub fn error(&self) -> ExecutionError {
        let mut error = ExecutionError::new(self.kind, self.message.clone());
        if let Some(code) = &self.code {
            error = error.with_code(code.clone());
        }
        if let Some(node_id) = &self.node_id {
            error = error.at_node(node_id.clone());
        }
        error.details = self.details.clone();
        error
    }
}

/// 手动重试
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RetryExecutionRequest {
    pub expected_version: i32,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}
