// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// HTTP请求处理器模块
///
/// 包含各个API端点的具体处理逻辑
/// 每个处理器负责处理特定类型的HTTP请求并返回响应
pub mod execution_handler;
pub mod upload_handler;
pub mod workflow_handler;

use crate::domain::models::lifecycle::DomainError;
use validator::Validate;

/// 校验请求体，失败时返回结构化的校验报告
pub(crate) fn validate_payload<T: Validate>(payload: &T) -> Result<(), DomainError> {
    payload.validate().map_err(DomainError::from)
}
