//! services/api/src/web/sessions.rs
//!
//! Session log handlers. Candidates open a log at login, append the
//! trainings they visit and close it at logout; admins read the
//! reconstructed activity back out and can bulk-import historical logs
//! through the tolerant summary parser.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::Principal;
use crate::web::state::AppState;
use training_core::activity::{self, SessionActivity};
use training_core::domain::{SessionLog, VisitedTraining};
use training_core::error::DomainError;
use training_core::ports::PortError;

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct VisitRequest {
    pub training_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
pub struct RecentSessionsQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize, ToSchema)]
pub struct ImportSessionRequest {
    pub candidate_id: Uuid,
    pub training_id: Uuid,
    pub login_time: DateTime<Utc>,
    pub logout_time: DateTime<Utc>,
    /// A historical summary line, e.g. `Passed: Basics (80%, Attempt 2)`.
    pub summary: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ImportSessionsRequest {
    pub sessions: Vec<ImportSessionRequest>,
}

#[derive(Serialize, ToSchema)]
pub struct ImportSessionsResponse {
    pub imported_sessions: usize,
    pub applied_passes: usize,
}

#[derive(Serialize, ToSchema)]
pub struct TrainingActivityView {
    pub training_id: Uuid,
    pub training_title: String,
    pub passed_chapters: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionActivityView {
    pub session_id: Uuid,
    pub login_time: DateTime<Utc>,
    pub logout_time: Option<DateTime<Utc>>,
    pub trainings: Vec<TrainingActivityView>,
    pub summary: String,
}

impl From<SessionActivity> for SessionActivityView {
    fn from(a: SessionActivity) -> Self {
        SessionActivityView {
            session_id: a.session_id,
            login_time: a.login_time,
            logout_time: a.logout_time,
            trainings: a
                .trainings
                .into_iter()
                .map(|t| TrainingActivityView {
                    training_id: t.training_id,
                    training_title: t.training_title,
                    passed_chapters: t.passed_chapters,
                })
                .collect(),
            summary: a.summary,
        }
    }
}

//=========================================================================================
// Candidate lifecycle
//=========================================================================================

/// Open a session log at login.
#[utoipa::path(
    post,
    path = "/me/sessions",
    responses((status = 201, description = "Session opened"))
)]
pub async fn open_session(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let candidate_id = principal.candidate_id()?;
    state.store.get_candidate(candidate_id).await?;
    let session = SessionLog {
        id: Uuid::new_v4(),
        candidate_id,
        login_time: Utc::now(),
        logout_time: None,
        visited_trainings: Vec::new(),
    };
    state.store.create_session(&session).await?;
    tracing::info!(candidate_id = %candidate_id, session_id = %session.id, "session opened");
    Ok((StatusCode::CREATED, Json(session)))
}

/// Record a training visit on the candidate's open session.
///
/// Visits are deduplicated per session; revisiting a training inside the
/// same session is a no-op.
#[utoipa::path(
    post,
    path = "/me/sessions/visit",
    request_body = VisitRequest,
    responses(
        (status = 200, description = "Visit recorded"),
        (status = 400, description = "No open session"),
        (status = 404, description = "Training not found")
    )
)]
pub async fn record_visit(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<VisitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let candidate_id = principal.candidate_id()?;
    let training = state.store.get_training(req.training_id).await?.doc;
    let mut session = open_session_for(&state, candidate_id).await?;

    if !session
        .doc
        .visited_trainings
        .iter()
        .any(|v| v.training_id == req.training_id)
    {
        session.doc.visited_trainings.push(VisitedTraining {
            training_id: req.training_id,
            training_title: training.title,
            visited_at: Utc::now(),
        });
        state
            .store
            .update_session(&session.doc, session.version)
            .await?;
    }
    Ok(Json(serde_json::json!({ "message": "Visit recorded" })))
}

/// Close the candidate's open session at logout.
#[utoipa::path(
    post,
    path = "/me/sessions/close",
    responses(
        (status = 200, description = "Session closed"),
        (status = 400, description = "No open session")
    )
)]
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let candidate_id = principal.candidate_id()?;
    let mut session = open_session_for(&state, candidate_id).await?;
    session.doc.logout_time = Some(Utc::now());
    state
        .store
        .update_session(&session.doc, session.version)
        .await?;
    Ok(Json(session.doc))
}

async fn open_session_for(
    state: &AppState,
    candidate_id: Uuid,
) -> Result<training_core::ports::Versioned<SessionLog>, ApiError> {
    let session = match state.store.latest_session_for_candidate(candidate_id).await {
        Ok(s) => s,
        Err(PortError::NotFound(_)) => {
            return Err(ApiError::Domain(DomainError::Validation(
                "No open session".to_string(),
            )))
        }
        Err(e) => return Err(e.into()),
    };
    if session.doc.is_closed() {
        return Err(ApiError::Domain(DomainError::Validation(
            "No open session".to_string(),
        )));
    }
    Ok(session)
}

//=========================================================================================
// Admin read side
//=========================================================================================

/// List recent session logs across all candidates.
#[utoipa::path(
    get,
    path = "/sessions/recent",
    params(("limit" = Option<i64>, Query, description = "Max rows, default 50")),
    responses((status = 200, description = "Recent session logs"))
)]
pub async fn recent_sessions(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<RecentSessionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let sessions = state.store.recent_sessions(limit).await?;
    Ok(Json(sessions))
}

/// Reconstruct what a candidate did during one session.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}/activity",
    responses(
        (status = 200, description = "The session activity", body = SessionActivityView),
        (status = 404, description = "Session not found")
    )
)]
pub async fn session_activity(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let session = state.store.get_session(session_id).await?.doc;
    let candidate = state.store.get_candidate(session.candidate_id).await?.doc;
    let view: SessionActivityView = activity::session_activity(&session, &candidate).into();
    Ok(Json(view))
}

/// Bulk-import historical session logs.
///
/// Each summary runs through the tolerant parser; recovered passes are
/// replayed onto the candidate as synthetic results (existing passes stay
/// untouched) and the log itself is stored closed.
#[utoipa::path(
    post,
    path = "/sessions/import",
    request_body = ImportSessionsRequest,
    responses(
        (status = 200, description = "Import counts", body = ImportSessionsResponse),
        (status = 404, description = "A candidate or training was not found")
    )
)]
pub async fn import_sessions(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<ImportSessionsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let mut imported_sessions = 0;
    let mut applied_passes = 0;

    for entry in req.sessions {
        let training = state.store.get_training(entry.training_id).await?.doc;
        let mut candidate = state.store.get_candidate(entry.candidate_id).await?;

        let passes = activity::parse_passed_summary(&entry.summary);
        if !passes.is_empty() {
            applied_passes += activity::apply_imported_passes(
                &mut candidate.doc,
                &training,
                &passes,
                entry.logout_time,
            );
            state
                .store
                .update_candidate(&candidate.doc, candidate.version)
                .await?;
        }

        let session = SessionLog {
            id: Uuid::new_v4(),
            candidate_id: entry.candidate_id,
            login_time: entry.login_time,
            logout_time: Some(entry.logout_time),
            visited_trainings: vec![VisitedTraining {
                training_id: entry.training_id,
                training_title: training.title,
                visited_at: entry.login_time,
            }],
        };
        state.store.create_session(&session).await?;
        imported_sessions += 1;
    }

    tracing::info!(imported_sessions, applied_passes, "session import finished");
    Ok(Json(ImportSessionsResponse {
        imported_sessions,
        applied_passes,
    }))
}
