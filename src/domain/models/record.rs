// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 记录基础字段
///
/// 所有持久化记录共享的元数据。`version` 是乐观锁计数器，
/// 只由仓库在保存成功后递增，业务方法不会修改它。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// 主键
    pub id: Uuid,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 最后一次成功保存的时间
    pub updated_at: DateTime<Utc>,
    /// 软删除时间
    pub deleted_at: Option<DateTime<Utc>>,
    /// 创建者ID
    pub created_by: Option<String>,
    /// 更新者ID
    pub updated_by: Option<String>,
    /// 版本号（乐观锁）
    pub version: i32,
    /// 是否启用
    pub is_active: bool,
    /// 排序权重
    pub sort_order: i32,
    /// 备注
    pub remark: Option<String>,
}

impl RecordMeta {
    pub fn new(created_by: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            updated_by: created_by.clone(),
            created_by,
            version: 1,
            is_active: true,
            sort_order: 0,
            remark: None,
        }
    }
}

/// 失败信息
///
/// 仅在失败类转换中写入，原样保存。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            stack: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// 元数据取值
///
/// 只允许标量或字符串列表，不接受任意嵌套对象。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Flag(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Flag(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Number(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(value: Vec<String>) -> Self {
        MetadataValue::List(value)
    }
}

/// 扩展数据
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<MetadataValue> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_meta_starts_at_version_one() {
        let meta = RecordMeta::new(Some("user-1".to_string()));
        assert_eq!(meta.version, 1);
        assert!(meta.is_active);
        assert_eq!(meta.created_at, meta.updated_at);
        assert_eq!(meta.updated_by.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_metadata_accepts_scalars_only() {
        let mut metadata = Metadata::default();
        metadata.insert("compressed", true);
        metadata.insert("parts", 4_i64);
        metadata.insert("source", "browser");

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "compressed": true, "parts": 4, "source": "browser" })
        );

        let nested = serde_json::json!({ "bad": { "nested": 1 } });
        assert!(serde_json::from_value::<Metadata>(nested).is_err());
    }
}
