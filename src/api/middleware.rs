use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::MigrationError;

/// Errors surfaced by the HTTP layer
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl AppError {
    fn parts(self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, ErrorDetail::new("VALIDATION_ERROR", msg)),
            AppError::Configuration(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("CONFIGURATION_ERROR", msg),
            ),
            AppError::Migration(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("MIGRATION_ERROR", msg),
            ),
            AppError::Storage(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("STORAGE_ERROR", msg),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorDetail::new("NOT_FOUND", msg)),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.parts();
        if status.is_server_error() {
            tracing::error!("{}: {}", error.code, error.message);
        }
        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<MigrationError> for AppError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::Validation(_) => AppError::Validation(err.messages().join("; ")),
            MigrationError::RequiredConfiguration(msg) => AppError::Configuration(msg),
            MigrationError::Storage(msg) => AppError::Storage(msg),
            other => AppError::Migration(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_status() {
        let response = AppError::NotFound("Run not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_migration_error_mapping() {
        let err: AppError = MigrationError::Validation(vec!["a".into(), "b".into()]).into();
        assert!(matches!(err, AppError::Validation(ref m) if m == "a; b"));

        let err: AppError = MigrationError::RequiredConfiguration("no namespace".into()).into();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err: AppError = MigrationError::FatalAlignment("x".into()).into();
        assert!(matches!(err, AppError::Migration(_)));
    }
}
