// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 数据传输对象模块
///
/// 定义应用程序层的数据传输对象
/// 用于在API请求和领域模型之间传输数据
pub mod execution_request;
pub mod upload_request;
pub mod workflow_request;

use crate::domain::repositories::Page;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 默认分页大小
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// 只携带期望版本号的状态转换请求
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionedRequest {
    pub expected_version: i32,
}

/// 分页参数
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct PageQuery {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page {
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            offset: self.offset.unwrap_or(0),
        }
    }
}

/// 分页响应
#[derive(Debug, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

impl<T> PageResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: Page) -> Self {
        Self {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}
