//! services/api/src/web/candidates.rs
//!
//! Candidate handlers: record CRUD, training assignment (the personalized
//! deep-copy snapshot) and the merged training views. A view overlays the
//! canonical chapter metadata (names, descriptions, durations change for
//! everyone) onto the snapshot's graph state (edges and accessibility
//! evolve per candidate).

use axum::{
    extract::{Path, State},
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
use training_core::domain::{
    AssignedTraining, Candidate, TestStatus, Training, TrainingStatus,
};
use training_core::error::DomainError;
use training_core::ports::{PortError, StorageService};

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct NewCandidateRequest {
    pub external_id: String,
    pub name: String,
    pub email: String,
    pub batch_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct AssignedTrainingSummary {
    pub training_id: Uuid,
    pub title: String,
    pub category: String,
    pub duration_minutes: u32,
    /// `not_started`, `in_progress` or `completed`.
    #[schema(value_type = String)]
    pub status: TrainingStatus,
    pub assigned_at: DateTime<Utc>,
    pub chapter_count: usize,
}

/// A snapshot chapter merged with the canonical metadata, plus the
/// candidate's result on its linked test if any.
#[derive(Serialize, ToSchema)]
pub struct ChapterView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub duration_minutes: u32,
    pub content_path: Option<String>,
    pub linked_test_id: Option<Uuid>,
    pub unlocks_chapters: Vec<Uuid>,
    pub dependent_chapters: Vec<Uuid>,
    pub accessible: bool,
    #[schema(value_type = Option<String>)]
    pub test_status: Option<TestStatus>,
    pub score_percentage: Option<f64>,
    pub attempt_count: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct TrainingView {
    pub training_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub duration_minutes: u32,
    #[schema(value_type = String)]
    pub status: TrainingStatus,
    pub chapters: Vec<ChapterView>,
}

//=========================================================================================
// View assembly
//=========================================================================================

fn training_view(candidate: &Candidate, canonical: &Training, snapshot: &AssignedTraining) -> TrainingView {
    let chapters = snapshot
        .chapters
        .iter()
        .map(|snap| {
            let live = canonical.chapters.iter().find(|c| c.id == snap.id);
            let result = snap
                .linked_test_id
                .and_then(|tid| candidate.test_results.iter().find(|r| r.test_id == tid));
            ChapterView {
                id: snap.id,
                name: live.map_or_else(|| snap.name.clone(), |c| c.name.clone()),
                description: live
                    .map_or_else(|| snap.description.clone(), |c| c.description.clone()),
                duration_minutes: live.map_or(snap.duration_minutes, |c| c.duration_minutes),
                content_path: live
                    .map_or_else(|| snap.content_path.clone(), |c| c.content_path.clone()),
                linked_test_id: snap.linked_test_id,
                unlocks_chapters: snap.unlocks_chapters.clone(),
                dependent_chapters: snap.dependent_chapters.clone(),
                accessible: snap.is_accessible(),
                test_status: result.map(|r| r.status),
                score_percentage: result.map(|r| r.score_percentage),
                attempt_count: result.map(|r| r.attempt_count),
            }
        })
        .collect();

    TrainingView {
        training_id: snapshot.training_id,
        title: canonical.title.clone(),
        description: canonical.description.clone(),
        category: canonical.category.clone(),
        duration_minutes: canonical.duration_minutes,
        status: snapshot.status,
        chapters,
    }
}

async fn assigned_summaries(
    store: &dyn StorageService,
    candidate: &Candidate,
) -> Result<Vec<AssignedTrainingSummary>, ApiError> {
    let mut out = Vec::with_capacity(candidate.assigned_trainings.len());
    for assigned in &candidate.assigned_trainings {
        // A canonical training deleted after assignment drops out of the
        // list rather than failing the whole view.
        let canonical = match store.get_training(assigned.training_id).await {
            Ok(v) => v.doc,
            Err(PortError::NotFound(_)) => continue,
            Err(e) => return Err(e.into()),
        };
        out.push(AssignedTrainingSummary {
            training_id: assigned.training_id,
            title: canonical.title,
            category: canonical.category,
            duration_minutes: canonical.duration_minutes,
            status: assigned.status,
            assigned_at: assigned.assigned_at,
            chapter_count: assigned.chapters.len(),
        });
    }
    Ok(out)
}

async fn snapshot_view(
    store: &dyn StorageService,
    candidate: &Candidate,
    training_id: Uuid,
) -> Result<TrainingView, ApiError> {
    let snapshot = candidate.snapshot_for(training_id).ok_or_else(|| {
        ApiError::Domain(DomainError::NotFound(format!(
            "Training {} not assigned",
            training_id
        )))
    })?;
    let canonical = store.get_training(training_id).await?.doc;
    Ok(training_view(candidate, &canonical, snapshot))
}

//=========================================================================================
// Admin handlers
//=========================================================================================

/// Register a candidate.
#[utoipa::path(
    post,
    path = "/candidates",
    request_body = NewCandidateRequest,
    responses((status = 201, description = "Candidate created"))
)]
pub async fn create_candidate(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<NewCandidateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let candidate = Candidate {
        id: Uuid::new_v4(),
        external_id: req.external_id,
        name: req.name,
        email: req.email,
        batch_id: req.batch_id,
        assigned_trainings: Vec::new(),
        test_results: Vec::new(),
    };
    state.store.create_candidate(&candidate).await?;
    Ok((StatusCode::CREATED, Json(candidate)))
}

/// Fetch a candidate record, snapshots and results included.
#[utoipa::path(
    get,
    path = "/candidates/{candidate_id}",
    responses(
        (status = 200, description = "The candidate"),
        (status = 404, description = "Candidate not found")
    )
)]
pub async fn get_candidate(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(candidate_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let candidate = state.store.get_candidate(candidate_id).await?;
    Ok(Json(candidate.doc))
}

/// Assign a training to a candidate by deep-copying the canonical chapter
/// graph into a personalized snapshot. Assigning twice is a no-op.
#[utoipa::path(
    post,
    path = "/candidates/{candidate_id}/trainings/{training_id}/assign",
    responses(
        (status = 200, description = "Assigned, or already assigned"),
        (status = 404, description = "Candidate or training not found")
    )
)]
pub async fn assign_training(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((candidate_id, training_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let mut candidate = state.store.get_candidate(candidate_id).await?;
    if candidate.doc.snapshot_for(training_id).is_some() {
        return Ok(Json(serde_json::json!({ "message": "Training already assigned" })));
    }
    let canonical = state.store.get_training(training_id).await?.doc;
    candidate.doc.assigned_trainings.push(AssignedTraining {
        training_id,
        batch_id: candidate.doc.batch_id,
        assigned_at: Utc::now(),
        status: TrainingStatus::NotStarted,
        chapters: canonical.chapters.clone(),
    });
    state
        .store
        .update_candidate(&candidate.doc, candidate.version)
        .await?;
    Ok(Json(serde_json::json!({ "message": "Training assigned" })))
}

/// List a candidate's assigned trainings. Admin view of the same merge the
/// candidate sees.
#[utoipa::path(
    get,
    path = "/candidates/{candidate_id}/trainings",
    responses(
        (status = 200, description = "Assigned training summaries", body = [AssignedTrainingSummary]),
        (status = 404, description = "Candidate not found")
    )
)]
pub async fn list_candidate_trainings(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(candidate_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let candidate = state.store.get_candidate(candidate_id).await?;
    let summaries = assigned_summaries(state.store.as_ref(), &candidate.doc).await?;
    Ok(Json(summaries))
}

/// Fetch one assigned training as the candidate sees it.
#[utoipa::path(
    get,
    path = "/candidates/{candidate_id}/trainings/{training_id}",
    responses(
        (status = 200, description = "The merged training view", body = TrainingView),
        (status = 404, description = "Candidate, training or assignment not found")
    )
)]
pub async fn get_candidate_training(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((candidate_id, training_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let candidate = state.store.get_candidate(candidate_id).await?;
    let view = snapshot_view(state.store.as_ref(), &candidate.doc, training_id).await?;
    Ok(Json(view))
}

//=========================================================================================
// Candidate self views
//=========================================================================================

/// List the calling candidate's assigned trainings.
#[utoipa::path(
    get,
    path = "/me/trainings",
    responses((status = 200, description = "Assigned training summaries", body = [AssignedTrainingSummary]))
)]
pub async fn my_trainings(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let candidate_id = principal.candidate_id()?;
    let candidate = state.store.get_candidate(candidate_id).await?;
    let summaries = assigned_summaries(state.store.as_ref(), &candidate.doc).await?;
    Ok(Json(summaries))
}

/// Fetch one of the calling candidate's trainings, merged view.
#[utoipa::path(
    get,
    path = "/me/trainings/{training_id}",
    responses(
        (status = 200, description = "The merged training view", body = TrainingView),
        (status = 404, description = "Training not assigned")
    )
)]
pub async fn my_training(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(training_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let candidate_id = principal.candidate_id()?;
    let candidate = state.store.get_candidate(candidate_id).await?;
    let view = snapshot_view(state.store.as_ref(), &candidate.doc, training_id).await?;
    Ok(Json(view))
}
