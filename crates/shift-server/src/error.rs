//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for a wrapper around [`shift_core::Error`] so
//! that route handlers can return `Result<T, AppError>` and use `?`
//! directly.  The request ID stamped into the body comes from the
//! request-id middleware's scope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::middleware::request_id::current_request_id;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError {
    inner: shift_core::Error,
}

impl AppError {
    pub fn new(inner: shift_core::Error) -> Self {
        Self { inner }
    }
}

impl From<shift_core::Error> for AppError {
    fn from(e: shift_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let code = match &self.inner {
            shift_core::Error::NotFound { .. } => "not_found",
            shift_core::Error::Expired(_) => "expired",
            shift_core::Error::Validation(_) => "validation_error",
            shift_core::Error::FileTooLarge { .. } => "file_too_large",
            shift_core::Error::PaymentRequired { .. } => "payment_required",
            shift_core::Error::UnsupportedTaskType(_) => "unsupported_task_type",
            shift_core::Error::Conversion(_) => "conversion_error",
            shift_core::Error::Timeout { .. } => "timeout",
            shift_core::Error::Storage(_) => "storage_error",
            shift_core::Error::Database { .. } => "database_error",
            shift_core::Error::Io { .. } => "io_error",
            shift_core::Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.inner.to_string(),
            "code": code,
            "request_id": current_request_id(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_produces_404() {
        let err = AppError::new(shift_core::Error::not_found("task", "abc"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn expired_produces_410() {
        let err = AppError::new(shift_core::Error::Expired("abc".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::GONE);
    }

    #[test]
    fn payment_required_produces_402() {
        let err = AppError::new(shift_core::Error::PaymentRequired {
            size_mb: 80.0,
            free_mb: 50,
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }
}
