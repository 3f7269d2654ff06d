//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and its
//! mapping onto HTTP responses. Forbidden and Validation failures carry
//! their explanation to the client; everything unexpected is logged with
//! internal detail and answered with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::config::ConfigError;
use training_core::error::DomainError;
use training_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents a failure reported by the domain core.
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// Represents an error that propagated up from the storage port.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Domain(DomainError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Domain(DomainError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            ApiError::Domain(DomainError::Forbidden(msg)) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::Port(PortError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Port(PortError::Conflict(msg)) => (StatusCode::CONFLICT, msg.clone()),
            _ => {
                tracing::error!("internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}
