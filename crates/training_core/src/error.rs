//! crates/training_core/src/error.rs
//!
//! The error taxonomy shared by every core operation. All operations catch
//! internally and translate into one of these variants; nothing escapes the
//! core boundary uncaught.

/// The primary error type for core domain operations.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// A training, chapter, test, candidate or index was absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request was structurally valid but violated a domain rule.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The operation is not permitted in the current state.
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

/// A convenience type alias for `Result<T, DomainError>`.
pub type DomainResult<T> = Result<T, DomainError>;
