//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `StorageService` port from the core crate. Every
//! domain document is persisted whole as a JSONB column next to an
//! optimistic `version` counter; updates compare-and-swap on that counter
//! and surface a lost update as `PortError::Conflict` instead of silently
//! dropping the other writer's mutation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use training_core::domain::{Candidate, SessionLog, Test, Training};
use training_core::ports::{PortError, PortResult, StorageService, Versioned};

/// A Postgres-backed store implementing the `StorageService` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn to_json<T: Serialize>(doc: &T) -> PortResult<serde_json::Value> {
        serde_json::to_value(doc).map_err(|e| PortError::Unexpected(e.to_string()))
    }

    fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> PortResult<T> {
        serde_json::from_value(value).map_err(|e| PortError::Unexpected(e.to_string()))
    }

    fn row_to_versioned<T: DeserializeOwned>(row: sqlx::postgres::PgRow) -> PortResult<Versioned<T>> {
        let doc: serde_json::Value = row
            .try_get("doc")
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let version: i64 = row
            .try_get("version")
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Versioned {
            doc: Self::from_json(doc)?,
            version,
        })
    }

    /// Tables share one shape (id, doc, version); the table name is always a
    /// compile-time constant from this module, never caller input.
    async fn fetch_doc<T: DeserializeOwned>(
        &self,
        table: &str,
        id: Uuid,
        what: &str,
    ) -> PortResult<Versioned<T>> {
        let sql = format!("SELECT doc, version FROM {} WHERE id = $1", table);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .ok_or_else(|| PortError::NotFound(format!("{} {} not found", what, id)))?;
        Self::row_to_versioned(row)
    }

    async fn insert_doc(
        &self,
        table: &str,
        id: Uuid,
        doc: serde_json::Value,
    ) -> PortResult<()> {
        let sql = format!("INSERT INTO {} (id, doc, version) VALUES ($1, $2, 1)", table);
        sqlx::query(&sql)
            .bind(id)
            .bind(doc)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    /// Compare-and-swap update: rejected when the stored version no longer
    /// matches the one the caller read.
    async fn update_doc(
        &self,
        table: &str,
        id: Uuid,
        doc: serde_json::Value,
        expected_version: i64,
        what: &str,
    ) -> PortResult<()> {
        let sql = format!(
            "UPDATE {} SET doc = $2, version = version + 1 WHERE id = $1 AND version = $3",
            table
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(doc)
            .bind(expected_version)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            let exists_sql = format!("SELECT 1 FROM {} WHERE id = $1", table);
            let exists = sqlx::query(&exists_sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .is_some();
            return Err(if exists {
                PortError::Conflict(format!("{} {} was modified concurrently", what, id))
            } else {
                PortError::NotFound(format!("{} {} not found", what, id))
            });
        }
        Ok(())
    }

    async fn delete_doc(&self, table: &str, id: Uuid, what: &str) -> PortResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", table);
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("{} {} not found", what, id)));
        }
        Ok(())
    }

    async fn list_docs<T: DeserializeOwned>(&self, table: &str) -> PortResult<Vec<T>> {
        let sql = format!("SELECT doc FROM {} ORDER BY created_at DESC", table);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        rows.into_iter()
            .map(|row| {
                let doc: serde_json::Value = row
                    .try_get("doc")
                    .map_err(|e| PortError::Unexpected(e.to_string()))?;
                Self::from_json(doc)
            })
            .collect()
    }
}

#[async_trait]
impl StorageService for PgStore {
    async fn create_training(&self, training: &Training) -> PortResult<()> {
        self.insert_doc("trainings", training.id, Self::to_json(training)?)
            .await
    }

    async fn get_training(&self, training_id: Uuid) -> PortResult<Versioned<Training>> {
        self.fetch_doc("trainings", training_id, "Training").await
    }

    async fn list_trainings(&self) -> PortResult<Vec<Training>> {
        self.list_docs("trainings").await
    }

    async fn update_training(&self, training: &Training, expected_version: i64) -> PortResult<()> {
        self.update_doc(
            "trainings",
            training.id,
            Self::to_json(training)?,
            expected_version,
            "Training",
        )
        .await
    }

    async fn delete_training(&self, training_id: Uuid) -> PortResult<()> {
        self.delete_doc("trainings", training_id, "Training").await
    }

    async fn find_training_with_chapter(
        &self,
        chapter_id: Uuid,
    ) -> PortResult<Versioned<Training>> {
        // JSONB containment over the embedded chapter list.
        let needle = serde_json::json!([{ "id": chapter_id }]);
        let row = sqlx::query("SELECT doc, version FROM trainings WHERE doc->'chapters' @> $1")
            .bind(needle)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .ok_or_else(|| {
                PortError::NotFound(format!("Training containing chapter {} not found", chapter_id))
            })?;
        Self::row_to_versioned(row)
    }

    async fn create_test(&self, test: &Test) -> PortResult<()> {
        self.insert_doc("tests", test.id, Self::to_json(test)?).await
    }

    async fn get_test(&self, test_id: Uuid) -> PortResult<Versioned<Test>> {
        self.fetch_doc("tests", test_id, "Test").await
    }

    async fn list_tests(&self) -> PortResult<Vec<Test>> {
        self.list_docs("tests").await
    }

    async fn delete_test(&self, test_id: Uuid) -> PortResult<()> {
        self.delete_doc("tests", test_id, "Test").await
    }

    async fn create_candidate(&self, candidate: &Candidate) -> PortResult<()> {
        self.insert_doc("candidates", candidate.id, Self::to_json(candidate)?)
            .await
    }

    async fn get_candidate(&self, candidate_id: Uuid) -> PortResult<Versioned<Candidate>> {
        self.fetch_doc("candidates", candidate_id, "Candidate").await
    }

    async fn update_candidate(
        &self,
        candidate: &Candidate,
        expected_version: i64,
    ) -> PortResult<()> {
        self.update_doc(
            "candidates",
            candidate.id,
            Self::to_json(candidate)?,
            expected_version,
            "Candidate",
        )
        .await
    }

    async fn create_session(&self, session: &SessionLog) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO session_logs (id, candidate_id, login_time, doc, version) \
             VALUES ($1, $2, $3, $4, 1)",
        )
        .bind(session.id)
        .bind(session.candidate_id)
        .bind(session.login_time)
        .bind(Self::to_json(session)?)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Versioned<SessionLog>> {
        self.fetch_doc("session_logs", session_id, "Session").await
    }

    async fn update_session(&self, session: &SessionLog, expected_version: i64) -> PortResult<()> {
        self.update_doc(
            "session_logs",
            session.id,
            Self::to_json(session)?,
            expected_version,
            "Session",
        )
        .await
    }

    async fn latest_session_for_candidate(
        &self,
        candidate_id: Uuid,
    ) -> PortResult<Versioned<SessionLog>> {
        let row = sqlx::query(
            "SELECT doc, version FROM session_logs WHERE candidate_id = $1 \
             ORDER BY login_time DESC LIMIT 1",
        )
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .ok_or_else(|| {
            PortError::NotFound(format!("No session found for candidate {}", candidate_id))
        })?;
        Self::row_to_versioned(row)
    }

    async fn recent_sessions(&self, limit: i64) -> PortResult<Vec<SessionLog>> {
        let rows = sqlx::query(
            "SELECT doc FROM session_logs ORDER BY login_time DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        rows.into_iter()
            .map(|row| {
                let doc: serde_json::Value = row
                    .try_get("doc")
                    .map_err(|e| PortError::Unexpected(e.to_string()))?;
                Self::from_json(doc)
            })
            .collect()
    }
}
