// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 上传任务仓库（upload_task_repository）
/// - 上传分片仓库（upload_chunk_repository）
/// - 工作流仓库（workflow_repository）
/// - 工作流执行仓库（workflow_execution_repository）
///
/// 所有 `update` 都带有期望版本号，只有存储中的版本与之相等时才会写入。
pub mod upload_chunk_repository;
pub mod upload_task_repository;
pub mod workflow_execution_repository;
pub mod workflow_repository;

use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 乐观锁冲突
    #[error("Concurrent modification of {id}: expected version {expected}, found {actual}")]
    ConcurrentModification { id: Uuid, expected: i32, actual: i32 },
    /// 唯一约束冲突
    #[error("Duplicate record: {0}")]
    Duplicate(String),
    /// 存储中的数据无法还原为领域对象
    #[error("Corrupted record: {0}")]
    Corrupted(String),
    /// JSON 列序列化失败
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 分页参数
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
        }
    }
}
