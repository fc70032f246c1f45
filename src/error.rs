//! Error types for Codegrant
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
///
/// Operator-facing detail is logged at the failure site; response
/// bodies only ever carry the generic messages below.
#[derive(Debug, Error)]
pub enum AppError {
    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// OAuth state parameter did not match the pending session (400)
    #[error("Invalid authorization state")]
    StateMismatch,

    /// Code-for-token exchange failed (500)
    ///
    /// Covers transport failures, timeouts after the bounded retry,
    /// and provider rejections. Detail never reaches the client.
    #[error("Authentication failed")]
    TokenExchange,

    /// Session store write failed after a successful exchange (500)
    #[error("Session persist failure: {0}")]
    SessionPersist(String),

    /// Session store failure (500)
    #[error("Session error: {0}")]
    Session(String),

    /// Identity token could not be decoded
    ///
    /// Never surfaced as a response; callers degrade the rendered view.
    #[error("Identity token decode failed: {0}")]
    ClaimDecode(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "validation"),
            AppError::StateMismatch => {
                (StatusCode::BAD_REQUEST, self.to_string(), "state_mismatch")
            }
            AppError::TokenExchange => (
                StatusCode::INTERNAL_SERVER_ERROR,
                self.to_string(),
                "token_exchange",
            ),
            AppError::SessionPersist(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Session could not be saved".to_string(),
                "session_persist",
            ),
            AppError::Session(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Session error".to_string(),
                "session",
            ),
            AppError::ClaimDecode(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "claim_decode",
            ),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
