//! HTTP-facing error type and its JSON body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use validator::ValidationErrors;

use crate::application::services::StoreError;
use crate::domain::repositories::RepositoryError;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

/// Error payload returned to clients.
#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    pub details: Value,
}

/// Errors a handler can return.
///
/// Every variant renders as `{"error": {"code", "message", "details"}}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String, details: Value },
    #[error("{message}")]
    NotFound { message: String, details: Value },
    #[error("{message}")]
    Conflict { message: String, details: Value },
    #[error("{message}")]
    TooManyRequests { message: String, details: Value },
    #[error("{message}")]
    Internal { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }
    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }
    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        Self::Conflict {
            message: message.into(),
            details,
        }
    }
    pub fn too_many_requests(message: impl Into<String>, details: Value) -> Self {
        Self::TooManyRequests {
            message: message.into(),
            details,
        }
    }
    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_error_info(self) -> ErrorInfo {
        let (code, message, details) = match self {
            AppError::Validation { message, details } => ("validation_error", message, details),
            AppError::NotFound { message, details } => ("not_found", message, details),
            AppError::Conflict { message, details } => ("conflict", message, details),
            AppError::TooManyRequests { message, details } => {
                ("rate_limited", message, details)
            }
            AppError::Internal { message, details } => ("internal_error", message, details),
        };

        ErrorInfo {
            code,
            message,
            details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_error_info(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let details = serde_json::to_value(errors.field_errors()).unwrap_or_else(|_| json!({}));
        AppError::bad_request("Validation failed", details)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e.kind() {
            RepositoryError::NotFound(code) => {
                AppError::not_found("Short code not found", json!({ "code": code }))
            }
            RepositoryError::AlreadyExists(code) => {
                AppError::conflict("Short code already exists", json!({ "code": code }))
            }
            RepositoryError::Timeout(_) | RepositoryError::Backend(_) => {
                tracing::error!(error = %e, "Store operation failed");
                AppError::internal("Storage unavailable", json!({ "op": e.op() }))
            }
        }
    }
}
