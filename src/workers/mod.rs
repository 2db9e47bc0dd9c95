// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供后台任务处理和工作器管理功能
/// 目前包括失败上传任务和工作流执行的定时重试
pub mod manager;
pub mod retry_worker;
pub mod worker;

pub use manager::WorkerManager;
pub use worker::Worker;
