//! services/api/src/web/trainings.rs
//!
//! Admin handlers for the canonical training definitions: the training and
//! chapter CRUD, test linking, the dependency/unlock graph mutations, and
//! the nested index tree. Every handler is load-document, mutate through
//! the core, write-back.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::Principal;
use crate::web::state::AppState;
use training_core::domain::{Chapter, IndexNode, Training};
use training_core::error::DomainError;
use training_core::{graph, indexes};

//=========================================================================================
// Request Payloads
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct NewTrainingRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub duration_minutes: u32,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTrainingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub duration_minutes: Option<u32>,
}

#[derive(Deserialize, ToSchema)]
pub struct NewChapterRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration_minutes: u32,
    pub content_path: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateChapterRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<u32>,
    pub content_path: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LinkTestRequest {
    pub test_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
pub struct SetUnlocksRequest {
    pub unlocks_chapters: Vec<Uuid>,
}

#[derive(Deserialize, ToSchema)]
pub struct RemoveUnlocksRequest {
    pub remove_chapter_ids: Vec<Uuid>,
}

#[derive(Deserialize, ToSchema)]
pub struct SetDependenciesRequest {
    pub dependency_chapter_ids: Vec<Uuid>,
}

#[derive(Deserialize, ToSchema)]
pub struct NewIndexRequest {
    /// Parent index id; absent inserts at the chapter's top level.
    pub parent_index_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub page_no: u32,
    #[serde(default)]
    pub video_start_secs: u32,
    #[serde(default)]
    pub video_end_secs: u32,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateIndexRequest {
    pub name: Option<String>,
    pub page_no: Option<u32>,
    pub video_start_secs: Option<u32>,
    pub video_end_secs: Option<u32>,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn chapter_mut(training: &mut Training, chapter_id: Uuid) -> Result<&mut Chapter, ApiError> {
    training
        .chapters
        .iter_mut()
        .find(|c| c.id == chapter_id)
        .ok_or_else(|| {
            ApiError::Domain(DomainError::NotFound(format!(
                "Chapter {} not found",
                chapter_id
            )))
        })
}

//=========================================================================================
// Training CRUD
//=========================================================================================

/// Create a new training definition.
#[utoipa::path(
    post,
    path = "/trainings",
    request_body = NewTrainingRequest,
    responses(
        (status = 201, description = "Training created"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn create_training(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<NewTrainingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let training = Training {
        id: Uuid::new_v4(),
        title: req.title,
        description: req.description,
        category: req.category,
        duration_minutes: req.duration_minutes,
        chapters: Vec::new(),
    };
    state.store.create_training(&training).await?;
    Ok((StatusCode::CREATED, Json(training)))
}

/// List all training definitions.
#[utoipa::path(
    get,
    path = "/trainings",
    responses((status = 200, description = "All trainings"))
)]
pub async fn list_trainings(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let trainings = state.store.list_trainings().await?;
    Ok(Json(trainings))
}

/// Fetch one training definition.
#[utoipa::path(
    get,
    path = "/trainings/{training_id}",
    responses(
        (status = 200, description = "The training"),
        (status = 404, description = "Training not found")
    )
)]
pub async fn get_training(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(training_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let training = state.store.get_training(training_id).await?;
    Ok(Json(training.doc))
}

/// Update a training's descriptive fields.
#[utoipa::path(
    put,
    path = "/trainings/{training_id}",
    request_body = UpdateTrainingRequest,
    responses(
        (status = 200, description = "Updated training"),
        (status = 404, description = "Training not found")
    )
)]
pub async fn update_training(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(training_id): Path<Uuid>,
    Json(req): Json<UpdateTrainingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let mut training = state.store.get_training(training_id).await?;
    if let Some(title) = req.title {
        training.doc.title = title;
    }
    if let Some(description) = req.description {
        training.doc.description = description;
    }
    if let Some(category) = req.category {
        training.doc.category = category;
    }
    if let Some(duration) = req.duration_minutes {
        training.doc.duration_minutes = duration;
    }
    state
        .store
        .update_training(&training.doc, training.version)
        .await?;
    Ok(Json(training.doc))
}

/// Delete a training definition.
#[utoipa::path(
    delete,
    path = "/trainings/{training_id}",
    responses(
        (status = 200, description = "Training deleted"),
        (status = 404, description = "Training not found")
    )
)]
pub async fn delete_training(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(training_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    state.store.delete_training(training_id).await?;
    Ok(Json(serde_json::json!({ "message": "Training deleted" })))
}

//=========================================================================================
// Chapters
//=========================================================================================

/// Append a chapter to a training.
#[utoipa::path(
    post,
    path = "/trainings/{training_id}/chapters",
    request_body = NewChapterRequest,
    responses(
        (status = 200, description = "Chapter added"),
        (status = 404, description = "Training not found")
    )
)]
pub async fn add_chapter(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(training_id): Path<Uuid>,
    Json(req): Json<NewChapterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let mut training = state.store.get_training(training_id).await?;
    let chapter = Chapter {
        id: Uuid::new_v4(),
        name: req.name,
        description: req.description,
        duration_minutes: req.duration_minutes,
        content_path: req.content_path,
        linked_test_id: None,
        unlocks_chapters: Vec::new(),
        dependent_chapters: Vec::new(),
        indexes: Vec::new(),
    };
    training.doc.chapters.push(chapter.clone());
    state
        .store
        .update_training(&training.doc, training.version)
        .await?;
    Ok(Json(chapter))
}

/// List a training's chapters in order.
#[utoipa::path(
    get,
    path = "/trainings/{training_id}/chapters",
    responses(
        (status = 200, description = "The chapter list"),
        (status = 404, description = "Training not found")
    )
)]
pub async fn list_chapters(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(training_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let training = state.store.get_training(training_id).await?;
    Ok(Json(training.doc.chapters))
}

/// Update a chapter's descriptive fields.
#[utoipa::path(
    put,
    path = "/trainings/{training_id}/chapters/{chapter_id}",
    request_body = UpdateChapterRequest,
    responses(
        (status = 200, description = "Updated chapter"),
        (status = 404, description = "Training or chapter not found")
    )
)]
pub async fn update_chapter(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((training_id, chapter_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateChapterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let mut training = state.store.get_training(training_id).await?;
    let chapter = chapter_mut(&mut training.doc, chapter_id)?;
    if let Some(name) = req.name {
        chapter.name = name;
    }
    if let Some(description) = req.description {
        chapter.description = description;
    }
    if let Some(duration) = req.duration_minutes {
        chapter.duration_minutes = duration;
    }
    if let Some(content_path) = req.content_path {
        chapter.content_path = Some(content_path);
    }
    let updated = chapter.clone();
    state
        .store
        .update_training(&training.doc, training.version)
        .await?;
    Ok(Json(updated))
}

/// Remove a chapter from a training.
#[utoipa::path(
    delete,
    path = "/trainings/{training_id}/chapters/{chapter_id}",
    responses(
        (status = 200, description = "Chapter deleted"),
        (status = 404, description = "Training or chapter not found")
    )
)]
pub async fn delete_chapter(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((training_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let mut training = state.store.get_training(training_id).await?;
    chapter_mut(&mut training.doc, chapter_id)?;
    training.doc.chapters.retain(|c| c.id != chapter_id);
    state
        .store
        .update_training(&training.doc, training.version)
        .await?;
    Ok(Json(serde_json::json!({ "message": "Chapter deleted" })))
}

//=========================================================================================
// Test Linking
//=========================================================================================

/// Link a test to a chapter, gating it behind a passing score.
#[utoipa::path(
    post,
    path = "/trainings/{training_id}/chapters/{chapter_id}/linked-test",
    request_body = LinkTestRequest,
    responses(
        (status = 200, description = "Test linked"),
        (status = 404, description = "Training, chapter or test not found")
    )
)]
pub async fn link_test(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((training_id, chapter_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<LinkTestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    // Reject dangling references up front; a linked test that does not exist
    // would gate the chapter forever.
    state.store.get_test(req.test_id).await?;
    let mut training = state.store.get_training(training_id).await?;
    let chapter = chapter_mut(&mut training.doc, chapter_id)?;
    chapter.linked_test_id = Some(req.test_id);
    let updated = chapter.clone();
    state
        .store
        .update_training(&training.doc, training.version)
        .await?;
    Ok(Json(updated))
}

/// Unlink a chapter's test.
#[utoipa::path(
    delete,
    path = "/trainings/{training_id}/chapters/{chapter_id}/linked-test",
    responses(
        (status = 200, description = "Test unlinked"),
        (status = 404, description = "Training or chapter not found")
    )
)]
pub async fn unlink_test(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((training_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let mut training = state.store.get_training(training_id).await?;
    let chapter = chapter_mut(&mut training.doc, chapter_id)?;
    chapter.linked_test_id = None;
    let updated = chapter.clone();
    state
        .store
        .update_training(&training.doc, training.version)
        .await?;
    Ok(Json(updated))
}

//=========================================================================================
// Dependency / Unlock Graph
//=========================================================================================

/// Replace the set of chapters a chapter unlocks.
#[utoipa::path(
    put,
    path = "/trainings/{training_id}/chapters/{chapter_id}/unlocks",
    request_body = SetUnlocksRequest,
    responses(
        (status = 200, description = "Unlocks set"),
        (status = 404, description = "Training or chapter not found")
    )
)]
pub async fn set_unlocks(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((training_id, chapter_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<SetUnlocksRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let mut training = state.store.get_training(training_id).await?;
    graph::set_unlocks(&mut training.doc.chapters, chapter_id, &req.unlocks_chapters)?;
    state
        .store
        .update_training(&training.doc, training.version)
        .await?;
    Ok(Json(serde_json::json!({ "message": "Unlocks set" })))
}

/// Remove chapters from a chapter's unlock set.
#[utoipa::path(
    delete,
    path = "/trainings/{training_id}/chapters/{chapter_id}/unlocks",
    request_body = RemoveUnlocksRequest,
    responses(
        (status = 200, description = "Unlocks removed"),
        (status = 404, description = "Training or chapter not found")
    )
)]
pub async fn remove_unlocks(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((training_id, chapter_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<RemoveUnlocksRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let mut training = state.store.get_training(training_id).await?;
    graph::remove_unlocks(&mut training.doc.chapters, chapter_id, &req.remove_chapter_ids)?;
    state
        .store
        .update_training(&training.doc, training.version)
        .await?;
    Ok(Json(serde_json::json!({ "message": "Unlocks removed" })))
}

/// Fetch the chapters a chapter currently unlocks.
#[utoipa::path(
    get,
    path = "/trainings/{training_id}/chapters/{chapter_id}/unlocks",
    responses(
        (status = 200, description = "The unlock set"),
        (status = 404, description = "Training or chapter not found")
    )
)]
pub async fn get_unlocks(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((training_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let training = state.store.get_training(training_id).await?;
    let unlocks = graph::unlocks_of(&training.doc.chapters, chapter_id)?;
    Ok(Json(serde_json::json!({ "unlocks_chapters": unlocks })))
}

/// Declare which chapters must be passed before this chapter opens.
#[utoipa::path(
    put,
    path = "/trainings/{training_id}/chapters/{chapter_id}/dependencies",
    request_body = SetDependenciesRequest,
    responses(
        (status = 200, description = "Dependencies set"),
        (status = 400, description = "A dependency chapter has no linked test"),
        (status = 404, description = "Training or chapter not found")
    )
)]
pub async fn set_dependencies(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((training_id, chapter_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<SetDependenciesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let mut training = state.store.get_training(training_id).await?;
    graph::set_reverse_dependencies(
        &mut training.doc.chapters,
        chapter_id,
        &req.dependency_chapter_ids,
    )?;
    state
        .store
        .update_training(&training.doc, training.version)
        .await?;
    Ok(Json(serde_json::json!({ "message": "Dependencies set" })))
}

//=========================================================================================
// Index Tree
//=========================================================================================

/// Add an index marker, at the top level or nested under a parent.
#[utoipa::path(
    post,
    path = "/trainings/{training_id}/chapters/{chapter_id}/indexes",
    request_body = NewIndexRequest,
    responses(
        (status = 200, description = "Index added"),
        (status = 400, description = "Malformed video range"),
        (status = 404, description = "Training, chapter or parent index not found")
    )
)]
pub async fn add_index(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((training_id, chapter_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<NewIndexRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let mut training = state.store.get_training(training_id).await?;
    let chapter = chapter_mut(&mut training.doc, chapter_id)?;
    let node = IndexNode {
        id: Uuid::new_v4(),
        name: req.name,
        page_no: req.page_no,
        video_start_secs: req.video_start_secs,
        video_end_secs: req.video_end_secs,
        children: Vec::new(),
    };
    let created = node.clone();
    indexes::add_node(&mut chapter.indexes, req.parent_index_id, node)?;
    state
        .store
        .update_training(&training.doc, training.version)
        .await?;
    Ok(Json(created))
}

/// Fetch a chapter's full index tree.
#[utoipa::path(
    get,
    path = "/trainings/{training_id}/chapters/{chapter_id}/indexes",
    responses(
        (status = 200, description = "The index tree"),
        (status = 404, description = "Training or chapter not found")
    )
)]
pub async fn list_indexes(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((training_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let mut training = state.store.get_training(training_id).await?;
    let chapter = chapter_mut(&mut training.doc, chapter_id)?;
    Ok(Json(chapter.indexes.clone()))
}

/// Update an index marker anywhere in the tree.
#[utoipa::path(
    put,
    path = "/trainings/{training_id}/chapters/{chapter_id}/indexes/{index_id}",
    request_body = UpdateIndexRequest,
    responses(
        (status = 200, description = "Index updated"),
        (status = 400, description = "Malformed video range"),
        (status = 404, description = "Training, chapter or index not found")
    )
)]
pub async fn update_index(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((training_id, chapter_id, index_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(req): Json<UpdateIndexRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let mut training = state.store.get_training(training_id).await?;
    let chapter = chapter_mut(&mut training.doc, chapter_id)?;
    indexes::update_node(
        &mut chapter.indexes,
        index_id,
        indexes::IndexPatch {
            name: req.name,
            page_no: req.page_no,
            video_start_secs: req.video_start_secs,
            video_end_secs: req.video_end_secs,
        },
    )?;
    state
        .store
        .update_training(&training.doc, training.version)
        .await?;
    Ok(Json(serde_json::json!({ "message": "Index updated" })))
}

/// Delete an index marker and its subtree.
#[utoipa::path(
    delete,
    path = "/trainings/{training_id}/chapters/{chapter_id}/indexes/{index_id}",
    responses(
        (status = 200, description = "Index deleted"),
        (status = 404, description = "Training, chapter or index not found")
    )
)]
pub async fn delete_index(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((training_id, chapter_id, index_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;
    let mut training = state.store.get_training(training_id).await?;
    let chapter = chapter_mut(&mut training.doc, chapter_id)?;
    indexes::delete_node(&mut chapter.indexes, index_id)?;
    state
        .store
        .update_training(&training.doc, training.version)
        .await?;
    Ok(Json(serde_json::json!({ "message": "Index deleted" })))
}
