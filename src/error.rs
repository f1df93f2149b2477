//! Error types for Omnilogin
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Validation failures abort the request with a 400; everything
/// the user cannot fix surfaces as a 5xx.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Validation error (400)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Signature verification failed (401)
    #[error("Invalid signature")]
    InvalidSignature,

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing key error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    /// Constraint violations are validation failures, not server faults.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AppError::Validation("record has already been taken".to_string());
            }
            if db_err.is_foreign_key_violation() {
                return AppError::Validation("referenced record must exist".to_string());
            }
            if db_err.is_check_violation() {
                return AppError::Validation("required field can't be blank".to_string());
            }
        }
        AppError::Database(err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    fn error_type(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Validation(_) => "validation",
            AppError::Database(_) => "database",
            AppError::InvalidSignature => "invalid_signature",
            AppError::Config(_) => "config",
            AppError::Encryption(_) => "encryption",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Unauthorized | AppError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            AppError::Config(msg) | AppError::Encryption(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[self.error_type()])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
