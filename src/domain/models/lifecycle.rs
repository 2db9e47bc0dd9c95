// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

use crate::utils::validators::ValidationReport;

/// 生成带字符串编码的封闭枚举
///
/// 数据库中状态列以字符串保存，枚举需要在 `as_str` / `FromStr` /
/// serde 三处保持同一套取值。
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// 全部取值
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::domain::models::lifecycle::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err($crate::domain::models::lifecycle::ParseEnumError::new(
                        stringify!($name),
                        s,
                    )),
                }
            }
        }
    };
}

pub(crate) use string_enum;

/// 枚举字符串解析失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// 生命周期事件
///
/// 每个状态转换方法对应一个事件，用于错误信息和指标标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    UpdateProgress,
    MarkProcessing,
    Complete,
    Fail,
    Retry,
    Reset,
    Cancel,
    Pause,
    Resume,
    Timeout,
    EnterNode,
    CompleteNode,
    FailNode,
    Activate,
    Deactivate,
    Archive,
    Delete,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::UpdateProgress => "update_progress",
            Transition::MarkProcessing => "mark_processing",
            Transition::Complete => "complete",
            Transition::Fail => "fail",
            Transition::Retry => "retry",
            Transition::Reset => "reset",
            Transition::Cancel => "cancel",
            Transition::Pause => "pause",
            Transition::Resume => "resume",
            Transition::Timeout => "timeout",
            Transition::EnterNode => "enter_node",
            Transition::CompleteNode => "complete_node",
            Transition::FailNode => "fail_node",
            Transition::Activate => "activate",
            Transition::Deactivate => "deactivate",
            Transition::Archive => "archive",
            Transition::Delete => "delete",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 领域错误类型
///
/// 状态转换方法在前置条件不满足时返回错误，且不修改任何字段。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 当前状态不允许该事件
    #[error("Invalid state transition: {from} -> {event}")]
    InvalidStateTransition {
        from: &'static str,
        event: Transition,
    },

    /// 进度回退
    #[error("Progress cannot decrease from {current} to {requested}")]
    ProgressRegression { current: f64, requested: f64 },

    /// 输入校验失败
    #[error("Validation error: {0}")]
    Validation(ValidationReport),

    /// 执行记录中不存在该节点
    #[error("Unknown node: {0}")]
    UnknownNode(String),
}

impl DomainError {
    pub fn invalid(from: &'static str, event: Transition) -> Self {
        DomainError::InvalidStateTransition { from, event }
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DomainError::Validation(ValidationReport::from(errors))
    }
}

/// 两个时间点之间的毫秒数
pub fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_milliseconds()
}

/// 将百分比限制在 [0, 100]
pub fn clamp_percentage(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}
