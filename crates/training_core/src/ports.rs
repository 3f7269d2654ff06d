//! crates/training_core/src/ports.rs
//!
//! Defines the storage contract (trait) for the application's core logic.
//! This trait forms the boundary of the hexagonal architecture, allowing the
//! core to be independent of the concrete database.
//!
//! The contract is whole-document read-modify-write: callers load a
//! document with its version, mutate it in memory, and write it back. The
//! two sides of a graph edge that live in different documents (canonical
//! training vs. personalized snapshot) are an explicit consistency boundary;
//! nothing here spans them transactionally.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Candidate, SessionLog, Test, Training};

/// A generic error type for all port operations.
/// This abstracts away the specific errors of the backing store.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The document changed since it was read; the caller's write was
    /// rejected instead of silently dropping the other writer's mutation.
    #[error("Version conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A document together with the optimistic version token it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub doc: T,
    pub version: i64,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    // --- Trainings ---
    async fn create_training(&self, training: &Training) -> PortResult<()>;
    async fn get_training(&self, training_id: Uuid) -> PortResult<Versioned<Training>>;
    async fn list_trainings(&self) -> PortResult<Vec<Training>>;
    async fn update_training(&self, training: &Training, expected_version: i64) -> PortResult<()>;
    async fn delete_training(&self, training_id: Uuid) -> PortResult<()>;
    /// Query-by-embedded-field: the training whose chapter list contains the
    /// given chapter identity.
    async fn find_training_with_chapter(&self, chapter_id: Uuid)
        -> PortResult<Versioned<Training>>;

    // --- Tests ---
    async fn create_test(&self, test: &Test) -> PortResult<()>;
    async fn get_test(&self, test_id: Uuid) -> PortResult<Versioned<Test>>;
    async fn list_tests(&self) -> PortResult<Vec<Test>>;
    async fn delete_test(&self, test_id: Uuid) -> PortResult<()>;

    // --- Candidates ---
    async fn create_candidate(&self, candidate: &Candidate) -> PortResult<()>;
    async fn get_candidate(&self, candidate_id: Uuid) -> PortResult<Versioned<Candidate>>;
    async fn update_candidate(
        &self,
        candidate: &Candidate,
        expected_version: i64,
    ) -> PortResult<()>;

    // --- Session logs ---
    async fn create_session(&self, session: &SessionLog) -> PortResult<()>;
    async fn get_session(&self, session_id: Uuid) -> PortResult<Versioned<SessionLog>>;
    async fn update_session(&self, session: &SessionLog, expected_version: i64) -> PortResult<()>;
    async fn latest_session_for_candidate(
        &self,
        candidate_id: Uuid,
    ) -> PortResult<Versioned<SessionLog>>;
    async fn recent_sessions(&self, limit: i64) -> PortResult<Vec<SessionLog>>;
}
