// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::ServiceError;
use thiserror::Error;

/// Worker错误类型
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("服务错误: {0}")]
    Service(#[from] ServiceError),

    #[error("内部错误: {0}")]
    Internal(String),
}
