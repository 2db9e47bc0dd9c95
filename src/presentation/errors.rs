// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::models::lifecycle::DomainError;
use crate::domain::repositories::RepositoryError;
use crate::domain::services::ServiceError;

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        if let Some(err) = self.0.downcast_ref::<ServiceError>() {
            return match err {
                ServiceError::Domain(domain) => domain_status(domain),
                ServiceError::Repository(repo) => repository_status(repo),
                ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
                ServiceError::Conflict(_) => StatusCode::CONFLICT,
            };
        }
        if let Some(domain) = self.0.downcast_ref::<DomainError>() {
            return domain_status(domain);
        }
        if let Some(repo) = self.0.downcast_ref::<RepositoryError>() {
            return repository_status(repo);
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn validation_details(&self) -> Option<serde_json::Value> {
        let domain = match self.0.downcast_ref::<ServiceError>() {
            Some(ServiceError::Domain(domain)) => Some(domain),
            _ => self.0.downcast_ref::<DomainError>(),
        };
        match domain {
            Some(DomainError::Validation(report)) => serde_json::to_value(report).ok(),
            _ => None,
        }
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::UnknownNode(_) => StatusCode::NOT_FOUND,
        DomainError::InvalidStateTransition { .. } | DomainError::ProgressRegression { .. } => {
            StatusCode::CONFLICT
        }
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::ConcurrentModification { .. } | RepositoryError::Duplicate(_) => {
            StatusCode::CONFLICT
        }
        RepositoryError::Database(_)
        | RepositoryError::Corrupted(_)
        | RepositoryError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = self.0.to_string();

        if status.is_server_error() {
            tracing::error!(error = %error_message, "Request failed");
        }

        let body = match self.validation_details() {
            Some(details) => json!({ "error": error_message, "details": details }),
            None => json!({ "error": error_message }),
        };
        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
