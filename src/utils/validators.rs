// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

/// 语义化版本号
pub static SEMVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+\.\d+\.\d+(-[a-zA-Z0-9.-]+)?(\+[a-zA-Z0-9.-]+)?$")
        .expect("semver pattern should compile")
});

/// 单个字段的校验问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// 字段路径，嵌套字段以 `.` 分隔，列表元素带下标
    pub field: String,
    /// 机器可读的错误码
    pub code: String,
    /// 人类可读的描述
    pub message: String,
}

/// 结构化校验结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<FieldIssue>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }
}

impl ValidationReport {
    pub fn push(
        &mut self,
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.valid = false;
        self.errors.push(FieldIssue {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        });
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.errors.iter().any(|issue| issue.code == code)
    }

    fn collect(&mut self, prefix: &str, errors: &ValidationErrors) {
        for (field, kind) in errors.errors() {
            let path = if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{prefix}.{field}")
            };
            match kind {
                ValidationErrorsKind::Field(field_errors) => {
                    for error in field_errors {
                        let message = error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("{path} is invalid ({})", error.code));
                        self.push(path.clone(), error.code.to_string(), message);
                    }
                }
                ValidationErrorsKind::Struct(nested) => self.collect(&path, nested),
                ValidationErrorsKind::List(items) => {
                    for (index, nested) in items {
                        self.collect(&format!("{path}[{index}]"), nested);
                    }
                }
            }
        }
    }
}

impl From<ValidationErrors> for ValidationReport {
    fn from(errors: ValidationErrors) -> Self {
        let mut report = ValidationReport::default();
        report.collect("", &errors);
        report.errors.sort_by(|a, b| a.field.cmp(&b.field).then(a.code.cmp(&b.code)));
        report
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// 构造带描述的校验错误
pub fn issue(code: &'static str, message: impl Into<String>) -> ValidationError {
    let message: String = message.into();
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

/// 校验 MD5 十六进制摘要
///
/// # 返回值
///
/// * `Ok(())` - 32 位十六进制字符串
/// * `Err(ValidationError)` - 长度或字符不合法
pub fn validate_md5_hex(value: &str) -> Result<(), ValidationError> {
    if value.len() != 32 || hex::decode(value).is_err() {
        return Err(issue("md5", "must be a 32 character hex MD5 digest"));
    }
    Ok(())
}

/// 校验字段不能只包含空白
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(issue("blank", "must not be blank"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct ChunkForm {
        #[validate(length(min = 1, max = 5))]
        name: String,
        #[validate(custom(function = "validate_md5_hex"))]
        digest: Option<String>,
        #[validate(regex(path = *SEMVER))]
        revision: String,
    }

    #[test]
    fn test_md5_validation() {
        assert!(validate_md5_hex("d41d8cd98f00b204e9800998ecf8427e").is_ok());
        assert!(validate_md5_hex("D41D8CD98F00B204E9800998ECF8427E").is_ok());
        assert!(validate_md5_hex("xyz").is_err());
        assert!(validate_md5_hex("g41d8cd98f00b204e9800998ecf8427e").is_err());
        // 长度正确但含非十六进制字符
        assert!(validate_md5_hex("d41d8cd98f00b204e9800998ecf8427z").is_err());
    }

    #[test]
    fn test_report_flattens_field_errors() {
        let form = ChunkForm {
            name: String::new(),
            digest: Some("nope".to_string()),
            revision: "1.0".to_string(),
        };
        let report = ValidationReport::from(form.validate().unwrap_err());

        assert!(!report.is_valid());
        let fields: Vec<&str> = report.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["digest", "name", "revision"]);
        assert!(report.has_code("md5"));
        assert!(report.has_code("length"));
        assert!(report.has_code("regex"));
    }

    #[test]
    fn test_semver_pattern() {
        assert!(SEMVER.is_match("1.0.0"));
        assert!(SEMVER.is_match("2.10.3-beta.1+build.7"));
        assert!(!SEMVER.is_match("v1.0"));
    }
}
