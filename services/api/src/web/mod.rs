//! services/api/src/web/mod.rs
//!
//! The HTTP surface: handler modules, the router builder and the master
//! definition for the OpenAPI specification.

pub mod candidates;
pub mod middleware;
pub mod sessions;
pub mod state;
pub mod trainings;

pub use middleware::require_principal;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;

use state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        trainings::create_training,
        trainings::list_trainings,
        trainings::get_training,
        trainings::update_training,
        trainings::delete_training,
        trainings::add_chapter,
        trainings::list_chapters,
        trainings::update_chapter,
        trainings::delete_chapter,
        trainings::link_test,
        trainings::unlink_test,
        trainings::set_unlocks,
        trainings::remove_unlocks,
        trainings::get_unlocks,
        trainings::set_dependencies,
        trainings::add_index,
        trainings::list_indexes,
        trainings::update_index,
        trainings::delete_index,
        tests::create_test,
        tests::list_tests,
        tests::get_test,
        tests::delete_test,
        tests::deliver_test,
        tests::submit_test,
        candidates::create_candidate,
        candidates::get_candidate,
        candidates::assign_training,
        candidates::list_candidate_trainings,
        candidates::get_candidate_training,
        candidates::my_trainings,
        candidates::my_training,
        sessions::open_session,
        sessions::record_visit,
        sessions::close_session,
        sessions::recent_sessions,
        sessions::session_activity,
        sessions::import_sessions,
    ),
    components(
        schemas(
            trainings::NewTrainingRequest,
            trainings::UpdateTrainingRequest,
            trainings::NewChapterRequest,
            trainings::UpdateChapterRequest,
            trainings::LinkTestRequest,
            trainings::SetUnlocksRequest,
            trainings::RemoveUnlocksRequest,
            trainings::SetDependenciesRequest,
            trainings::NewIndexRequest,
            trainings::UpdateIndexRequest,
            tests::NewTestRequest,
            tests::NewQuestionRequest,
            tests::DeliveredQuestion,
            tests::TestDelivery,
            tests::AnswerRequest,
            tests::SubmitTestRequest,
            tests::SubmitTestResponse,
            candidates::NewCandidateRequest,
            candidates::AssignedTrainingSummary,
            candidates::ChapterView,
            candidates::TrainingView,
            sessions::VisitRequest,
            sessions::ImportSessionRequest,
            sessions::ImportSessionsRequest,
            sessions::ImportSessionsResponse,
            sessions::TrainingActivityView,
            sessions::SessionActivityView,
        )
    ),
    tags(
        (name = "Training Platform API", description = "Chapter dependency graphs, test delivery and session activity.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Router
//=========================================================================================

/// Builds the full API router. Every route sits behind the principal
/// middleware; role checks happen per handler.
pub fn router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route(
            "/trainings",
            post(trainings::create_training).get(trainings::list_trainings),
        )
        .route(
            "/trainings/{training_id}",
            get(trainings::get_training)
                .put(trainings::update_training)
                .delete(trainings::delete_training),
        )
        .route(
            "/trainings/{training_id}/chapters",
            post(trainings::add_chapter).get(trainings::list_chapters),
        )
        .route(
            "/trainings/{training_id}/chapters/{chapter_id}",
            put(trainings::update_chapter).delete(trainings::delete_chapter),
        )
        .route(
            "/trainings/{training_id}/chapters/{chapter_id}/linked-test",
            post(trainings::link_test).delete(trainings::unlink_test),
        )
        .route(
            "/trainings/{training_id}/chapters/{chapter_id}/unlocks",
            put(trainings::set_unlocks)
                .delete(trainings::remove_unlocks)
                .get(trainings::get_unlocks),
        )
        .route(
            "/trainings/{training_id}/chapters/{chapter_id}/dependencies",
            put(trainings::set_dependencies),
        )
        .route(
            "/trainings/{training_id}/chapters/{chapter_id}/indexes",
            post(trainings::add_index).get(trainings::list_indexes),
        )
        .route(
            "/trainings/{training_id}/chapters/{chapter_id}/indexes/{index_id}",
            put(trainings::update_index).delete(trainings::delete_index),
        )
        .route("/tests", post(tests::create_test).get(tests::list_tests))
        .route(
            "/tests/{test_id}",
            get(tests::get_test).delete(tests::delete_test),
        )
        .route("/candidates", post(candidates::create_candidate))
        .route("/candidates/{candidate_id}", get(candidates::get_candidate))
        .route(
            "/candidates/{candidate_id}/trainings",
            get(candidates::list_candidate_trainings),
        )
        .route(
            "/candidates/{candidate_id}/trainings/{training_id}",
            get(candidates::get_candidate_training),
        )
        .route(
            "/candidates/{candidate_id}/trainings/{training_id}/assign",
            post(candidates::assign_training),
        )
        .route("/sessions/recent", get(sessions::recent_sessions))
        .route(
            "/sessions/{session_id}/activity",
            get(sessions::session_activity),
        )
        .route("/sessions/import", post(sessions::import_sessions));

    let me = Router::new()
        .route("/me/trainings", get(candidates::my_trainings))
        .route("/me/trainings/{training_id}", get(candidates::my_training))
        .route("/me/tests/{test_id}", get(tests::deliver_test))
        .route("/me/tests/{test_id}/submit", post(tests::submit_test))
        .route("/me/sessions", post(sessions::open_session))
        .route("/me/sessions/visit", post(sessions::record_visit))
        .route("/me/sessions/close", post(sessions::close_session));

    Router::new()
        .merge(admin)
        .merge(me)
        .layer(axum_middleware::from_fn(require_principal))
        .with_state(state)
}
