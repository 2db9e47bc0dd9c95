// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 服务负责“加载 → 状态转换 → 按版本保存”的控制流程，
/// 同时记录日志和指标。
///
/// 包含的服务：
/// - 上传服务（upload_service）：上传任务与分片的生命周期
/// - 工作流服务（workflow_service）：工作流定义与执行实例的生命周期
pub mod upload_service;
pub mod workflow_service;

use crate::domain::models::lifecycle::DomainError;
use crate::domain::repositories::RepositoryError;
use thiserror::Error;
use uuid::Uuid;

/// 服务错误类型
#[derive(Error, Debug)]
pub enum ServiceError {
    /// 领域规则拒绝
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// 仓库错误
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// 记录不存在
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// 与其他记录的状态冲突
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// 调用方持有的版本与存储中的版本不一致时提前失败
pub(crate) fn check_version(id: Uuid, expected: i32, actual: i32) -> Result<(), ServiceError> {
    if expected != actual {
        return Err(RepositoryError::ConcurrentModification {
            id,
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}
