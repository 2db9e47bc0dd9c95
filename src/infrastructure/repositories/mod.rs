// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供领域仓库接口的 SeaORM 实现，以及实体与领域对象之间的转换辅助函数。
pub mod upload_chunk_repo_impl;
pub mod upload_task_repo_impl;
pub mod workflow_execution_repo_impl;
pub mod workflow_repo_impl;

use crate::domain::models::lifecycle::ParseEnumError;
use crate::domain::repositories::RepositoryError;
use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use sea_orm::{DbErr, SqlErr};
use serde::{de::DeserializeOwned, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// 写入数据库的时间统一截断到微秒，与 Postgres 精度一致
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) fn to_db(time: DateTime<Utc>) -> DateTime<FixedOffset> {
    time.into()
}

pub(crate) fn to_db_opt(time: Option<DateTime<Utc>>) -> Option<DateTime<FixedOffset>> {
    time.map(to_db)
}

pub(crate) fn from_db(time: DateTime<FixedOffset>) -> DateTime<Utc> {
    time.with_timezone(&Utc)
}

pub(crate) fn from_db_opt(time: Option<DateTime<FixedOffset>>) -> Option<DateTime<Utc>> {
    time.map(from_db)
}

pub(crate) fn parse_column<T>(value: &str) -> Result<T, RepositoryError>
where
    T: FromStr<Err = ParseEnumError>,
{
    value
        .parse()
        .map_err(|e: ParseEnumError| RepositoryError::Corrupted(e.to_string()))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, RepositoryError> {
    Ok(serde_json::to_value(value)?)
}

pub(crate) fn to_json_opt<T: Serialize>(
    value: Option<&T>,
) -> Result<Option<serde_json::Value>, RepositoryError> {
    value.map(to_json).transpose()
}

pub(crate) fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, RepositoryError> {
    Ok(serde_json::from_value(value)?)
}

pub(crate) fn from_json_opt<T: DeserializeOwned>(
    value: Option<serde_json::Value>,
) -> Result<Option<T>, RepositoryError> {
    value.map(from_json).transpose()
}

/// 将插入失败中的唯一约束冲突转换为 `Duplicate`
pub(crate) fn insert_error(err: DbErr, what: impl FnOnce() -> String) -> RepositoryError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => RepositoryError::Duplicate(what()),
        _ => RepositoryError::Database(err),
    }
}

/// 条件更新未命中任何行时，根据当前版本区分冲突与不存在
pub(crate) fn version_mismatch(id: Uuid, expected: i32, actual: Option<i32>) -> RepositoryError {
    match actual {
        Some(actual) => RepositoryError::ConcurrentModification {
            id,
            expected,
            actual,
        },
        None => RepositoryError::NotFound,
    }
}
