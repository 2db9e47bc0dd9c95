// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 生命周期（lifecycle）：状态转换事件与领域错误
/// - 记录基础字段（record）：主键、时间戳、乐观锁版本号
/// - 上传任务（upload_task）与上传分片（upload_chunk）
/// - 工作流（workflow）与工作流执行（workflow_execution）
///
/// 实体只在内存中修改字段，持久化由仓库负责。
pub mod lifecycle;
pub mod record;
pub mod upload_chunk;
pub mod upload_task;
pub mod workflow;
pub mod workflow_execution;
