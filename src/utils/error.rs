//! Unified API error handling
//!
//! Every handler returns [`AppResult`]; errors convert to an HTTP status
//! plus a JSON [`AppResponse`] body with a stable error code.
//!
//! | Code  | Status | Meaning |
//! |-------|--------|---------|
//! | E0002 | 400    | Validation failed |
//! | E0003 | 404    | Resource not found |
//! | E0004 | 409    | Resource conflict |
//! | E0005 | 422    | Business rule violation |
//! | E9001 | 500    | Internal error |
//! | E9002 | 500    | Database error |

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

/// Standard response envelope used for error bodies
#[derive(Debug, Serialize)]
pub struct AppResponse<T> {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource conflict: {0}")]
    Conflict(String),

    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn business_rule(msg: impl Into<String>) -> Self {
        Self::BusinessRule(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "E0002", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "E0003", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "E0004", msg),
            AppError::BusinessRule(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "E0005", msg),
            AppError::Database(msg) => {
                // log the detail, never leak it to the client
                error!(target: "database", "Database error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9002",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(msg) => {
                error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9001",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(AppResponse::<()> {
            code: code.to_string(),
            message,
            data: None,
            trace_id: None,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (AppError::validation("bad"), StatusCode::BAD_REQUEST),
            (AppError::not_found("missing"), StatusCode::NOT_FOUND),
            (AppError::conflict("dup"), StatusCode::CONFLICT),
            (
                AppError::business_rule("cap"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::database("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::internal("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
