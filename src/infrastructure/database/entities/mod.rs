// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 数据库实体模块
///
/// 定义数据库表对应的实体结构，使用SeaORM框架进行对象关系映射。
/// 状态与枚举列以字符串保存，嵌套结构以 JSON 列保存。
pub mod upload_chunk;
pub mod upload_task;
pub mod workflow;
pub mod workflow_execution;
