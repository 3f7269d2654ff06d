//! services/api/tests/flow_test.rs
//!
//! Drives the full router over an in-memory storage double: authoring a
//! training with a gated chapter, assigning it, failing and then passing
//! the linked test, and reading the session activity back out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use api_lib::config::Config;
use api_lib::web::{self, state::AppState};
use training_core::domain::{Candidate, SessionLog, Test, Training};
use training_core::ports::{PortError, PortResult, StorageService, Versioned};

//=========================================================================================
// In-memory storage double
//=========================================================================================

#[derive(Default)]
struct Inner {
    trainings: HashMap<Uuid, Versioned<Training>>,
    tests: HashMap<Uuid, Versioned<Test>>,
    candidates: HashMap<Uuid, Versioned<Candidate>>,
    sessions: HashMap<Uuid, Versioned<SessionLog>>,
}

#[derive(Default)]
struct InMemoryStore {
    inner: Mutex<Inner>,
}

fn not_found(what: &str, id: Uuid) -> PortError {
    PortError::NotFound(format!("{} {}", what, id))
}

#[async_trait]
impl StorageService for InMemoryStore {
    async fn create_training(&self, training: &Training) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.trainings.insert(
            training.id,
            Versioned {
                doc: training.clone(),
                version: 1,
            },
        );
        Ok(())
    }

    async fn get_training(&self, training_id: Uuid) -> PortResult<Versioned<Training>> {
        let inner = self.inner.lock().unwrap();
        inner
            .trainings
            .get(&training_id)
            .cloned()
            .ok_or_else(|| not_found("Training", training_id))
    }

    async fn list_trainings(&self) -> PortResult<Vec<Training>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.trainings.values().map(|v| v.doc.clone()).collect())
    }

    async fn update_training(&self, training: &Training, expected_version: i64) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .trainings
            .get_mut(&training.id)
            .ok_or_else(|| not_found("Training", training.id))?;
        if entry.version != expected_version {
            return Err(PortError::Conflict(format!("Training {}", training.id)));
        }
        entry.doc = training.clone();
        entry.version += 1;
        Ok(())
    }

    async fn delete_training(&self, training_id: Uuid) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .trainings
            .remove(&training_id)
            .map(|_| ())
            .ok_or_else(|| not_found("Training", training_id))
    }

    async fn find_training_with_chapter(
        &self,
        chapter_id: Uuid,
    ) -> PortResult<Versioned<Training>> {
        let inner = self.inner.lock().unwrap();
        inner
            .trainings
            .values()
            .find(|v| v.doc.chapters.iter().any(|c| c.id == chapter_id))
            .cloned()
            .ok_or_else(|| not_found("Chapter", chapter_id))
    }

    async fn create_test(&self, test: &Test) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.tests.insert(
            test.id,
            Versioned {
                doc: test.clone(),
                version: 1,
            },
        );
        Ok(())
    }

    async fn get_test(&self, test_id: Uuid) -> PortResult<Versioned<Test>> {
        let inner = self.inner.lock().unwrap();
        inner
            .tests
            .get(&test_id)
            .cloned()
            .ok_or_else(|| not_found("Test", test_id))
    }

    async fn list_tests(&self) -> PortResult<Vec<Test>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.tests.values().map(|v| v.doc.clone()).collect())
    }

    async fn delete_test(&self, test_id: Uuid) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .tests
            .remove(&test_id)
            .map(|_| ())
            .ok_or_else(|| not_found("Test", test_id))
    }

    async fn create_candidate(&self, candidate: &Candidate) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.candidates.insert(
            candidate.id,
            Versioned {
                doc: candidate.clone(),
                version: 1,
            },
        );
        Ok(())
    }

    async fn get_candidate(&self, candidate_id: Uuid) -> PortResult<Versioned<Candidate>> {
        let inner = self.inner.lock().unwrap();
        inner
            .candidates
            .get(&candidate_id)
            .cloned()
            .ok_or_else(|| not_found("Candidate", candidate_id))
    }

    async fn update_candidate(
        &self,
        candidate: &Candidate,
        expected_version: i64,
    ) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .candidates
            .get_mut(&candidate.id)
            .ok_or_else(|| not_found("Candidate", candidate.id))?;
        if entry.version != expected_version {
            return Err(PortError::Conflict(format!("Candidate {}", candidate.id)));
        }
        entry.doc = candidate.clone();
        entry.version += 1;
        Ok(())
    }

    async fn create_session(&self, session: &SessionLog) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.sessions.insert(
            session.id,
            Versioned {
                doc: session.clone(),
                version: 1,
            },
        );
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Versioned<SessionLog>> {
        let inner = self.inner.lock().unwrap();
        inner
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or_else(|| not_found("Session", session_id))
    }

    async fn update_session(&self, session: &SessionLog, expected_version: i64) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .sessions
            .get_mut(&session.id)
            .ok_or_else(|| not_found("Session", session.id))?;
        if entry.version != expected_version {
            return Err(PortError::Conflict(format!("Session {}", session.id)));
        }
        entry.doc = session.clone();
        entry.version += 1;
        Ok(())
    }

    async fn latest_session_for_candidate(
        &self,
        candidate_id: Uuid,
    ) -> PortResult<Versioned<SessionLog>> {
        let inner = self.inner.lock().unwrap();
        inner
            .sessions
            .values()
            .filter(|v| v.doc.candidate_id == candidate_id)
            .max_by_key(|v| v.doc.login_time)
            .cloned()
            .ok_or_else(|| not_found("Session for candidate", candidate_id))
    }

    async fn recent_sessions(&self, limit: i64) -> PortResult<Vec<SessionLog>> {
        let inner = self.inner.lock().unwrap();
        let mut sessions: Vec<_> = inner.sessions.values().map(|v| v.doc.clone()).collect();
        sessions.sort_by_key(|s| std::cmp::Reverse(s.login_time));
        sessions.truncate(limit as usize);
        Ok(sessions)
    }
}

//=========================================================================================
// Harness
//=========================================================================================

fn test_app() -> Router {
    let config = Arc::new(Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::INFO,
        cors_origin: None,
    });
    let state = Arc::new(AppState {
        store: Arc::new(InMemoryStore::default()),
        config,
    });
    web::router(state)
}

const ADMIN_ID: &str = "00000000-0000-0000-0000-000000000001";

fn request(method: &str, uri: &str, principal: (&str, &str), body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-principal-id", principal.0)
        .header("x-principal-role", principal.1)
        .header("content-type", "application/json");
    match body {
        Some(v) => builder.body(Body::from(v.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn admin(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send(app, request(method, uri, (ADMIN_ID, "admin"), body)).await
}

async fn candidate(
    app: &Router,
    id: &str,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send(app, request(method, uri, (id, "candidate"), body)).await
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn missing_principal_is_unauthorized() {
    let app = test_app();
    let req = Request::builder()
        .method("GET")
        .uri("/trainings")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn candidate_cannot_reach_admin_routes() {
    let app = test_app();
    let id = Uuid::new_v4().to_string();
    let (status, _) = candidate(&app, &id, "GET", "/trainings", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn full_training_and_test_flow() {
    let app = test_app();

    // Author a training with a gating chapter and a locked chapter.
    let (status, training) = admin(
        &app,
        "POST",
        "/trainings",
        Some(json!({ "title": "Rust Basics", "category": "engineering" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let training_id = training["id"].as_str().unwrap().to_string();

    let (_, ch1) = admin(
        &app,
        "POST",
        &format!("/trainings/{training_id}/chapters"),
        Some(json!({ "name": "Ownership" })),
    )
    .await;
    let (_, ch2) = admin(
        &app,
        "POST",
        &format!("/trainings/{training_id}/chapters"),
        Some(json!({ "name": "Lifetimes" })),
    )
    .await;
    let ch1_id = ch1["id"].as_str().unwrap().to_string();
    let ch2_id = ch2["id"].as_str().unwrap().to_string();

    // One question, full pool per delivery, 100% to pass.
    let (status, test) = admin(
        &app,
        "POST",
        "/tests",
        Some(json!({
            "title": "Ownership check",
            "passing_percentage": 100,
            "questions": [{
                "text": "Who owns a value?",
                "options": ["One binding", "Two bindings", "The heap", "Nobody"],
                "answer": "One binding"
            }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let test_id = test["id"].as_str().unwrap().to_string();

    let (status, _) = admin(
        &app,
        "POST",
        &format!("/trainings/{training_id}/chapters/{ch1_id}/linked-test"),
        Some(json!({ "test_id": test_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = admin(
        &app,
        "PUT",
        &format!("/trainings/{training_id}/chapters/{ch1_id}/unlocks"),
        Some(json!({ "unlocks_chapters": [ch2_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, unlocks) = admin(
        &app,
        "GET",
        &format!("/trainings/{training_id}/chapters/{ch1_id}/unlocks"),
        None,
    )
    .await;
    assert_eq!(unlocks["unlocks_chapters"], json!([ch2_id]));

    // Register and assign.
    let (status, cand) = admin(
        &app,
        "POST",
        "/candidates",
        Some(json!({
            "external_id": "EMP-1",
            "name": "Jordan",
            "email": "jordan@example.com"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let cand_id = cand["id"].as_str().unwrap().to_string();

    let (status, _) = admin(
        &app,
        "POST",
        &format!("/candidates/{cand_id}/trainings/{training_id}/assign"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The locked chapter starts inaccessible in the candidate's view.
    let (status, view) =
        candidate(&app, &cand_id, "GET", &format!("/me/trainings/{training_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let chapters = view["chapters"].as_array().unwrap();
    let locked = chapters.iter().find(|c| c["id"] == json!(ch2_id)).unwrap();
    assert_eq!(locked["accessible"], json!(false));

    // Open a session and visit the training before attempting the test.
    let (status, _) = candidate(&app, &cand_id, "POST", "/me/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = candidate(
        &app,
        &cand_id,
        "POST",
        "/me/sessions/visit",
        Some(json!({ "training_id": training_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Delivery must not leak the correct answer.
    let (status, delivery) =
        candidate(&app, &cand_id, "GET", &format!("/me/tests/{test_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivery["already_passed"], json!(false));
    let questions = delivery["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 1);
    assert!(questions[0].get("answer").is_none());

    // A wrong answer fails and records attempt 1.
    let (status, result) = candidate(
        &app,
        &cand_id,
        "POST",
        &format!("/me/tests/{test_id}/submit"),
        Some(json!({
            "answers": [{ "question": "Who owns a value?", "selected_option": "The heap" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["status"], json!("fail"));
    assert_eq!(result["attempt_count"], json!(1));

    // The right answer, sloppily cased and padded, passes on attempt 2.
    let (status, result) = candidate(
        &app,
        &cand_id,
        "POST",
        &format!("/me/tests/{test_id}/submit"),
        Some(json!({
            "answers": [{ "question": "Who owns a value?", "selected_option": "  ONE binding " }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["status"], json!("pass"));
    assert_eq!(result["score_percentage"], json!(100.0));
    assert_eq!(result["attempt_count"], json!(2));

    // Passing unlocked the dependent chapter in the snapshot.
    let (_, view) =
        candidate(&app, &cand_id, "GET", &format!("/me/trainings/{training_id}"), None).await;
    let chapters = view["chapters"].as_array().unwrap();
    let unlocked = chapters.iter().find(|c| c["id"] == json!(ch2_id)).unwrap();
    assert_eq!(unlocked["accessible"], json!(true));

    // A pass is terminal.
    let (status, _) = candidate(
        &app,
        &cand_id,
        "POST",
        &format!("/me/tests/{test_id}/submit"),
        Some(json!({
            "answers": [{ "question": "Who owns a value?", "selected_option": "One binding" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Close the session and read the reconstructed activity back.
    let (status, closed) = candidate(&app, &cand_id, "POST", "/me/sessions/close", None).await;
    assert_eq!(status, StatusCode::OK);
    let session_id = closed["id"].as_str().unwrap();

    let (status, activity) = admin(
        &app,
        "GET",
        &format!("/sessions/{session_id}/activity"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        activity["summary"],
        json!("Passed: Ownership (100%, Attempt 2)")
    );
}

#[tokio::test]
async fn session_import_replays_passes() {
    let app = test_app();

    let (_, training) = admin(
        &app,
        "POST",
        "/trainings",
        Some(json!({ "title": "Archived Course" })),
    )
    .await;
    let training_id = training["id"].as_str().unwrap().to_string();
    let (_, chapter) = admin(
        &app,
        "POST",
        &format!("/trainings/{training_id}/chapters"),
        Some(json!({ "name": "Intro, Part One" })),
    )
    .await;
    let chapter_id = chapter["id"].as_str().unwrap().to_string();
    let (_, test) = admin(
        &app,
        "POST",
        "/tests",
        Some(json!({
            "title": "Intro check",
            "passing_percentage": 50,
            "questions": [{
                "text": "Q",
                "options": ["a", "b", "c", "d"],
                "answer": "a"
            }]
        })),
    )
    .await;
    let test_id = test["id"].as_str().unwrap().to_string();
    admin(
        &app,
        "POST",
        &format!("/trainings/{training_id}/chapters/{chapter_id}/linked-test"),
        Some(json!({ "test_id": test_id })),
    )
    .await;

    let (_, cand) = admin(
        &app,
        "POST",
        "/candidates",
        Some(json!({ "external_id": "EMP-2", "name": "Sam", "email": "sam@example.com" })),
    )
    .await;
    let cand_id = cand["id"].as_str().unwrap().to_string();
    admin(
        &app,
        "POST",
        &format!("/candidates/{cand_id}/trainings/{training_id}/assign"),
        None,
    )
    .await;

    // The chapter name itself contains a comma; the parser re-merges it.
    let (status, imported) = admin(
        &app,
        "POST",
        "/sessions/import",
        Some(json!({
            "sessions": [{
                "candidate_id": cand_id,
                "training_id": training_id,
                "login_time": "2025-01-10T09:00:00Z",
                "logout_time": "2025-01-10T10:30:00Z",
                "summary": "Passed: Intro, Part One (87.5%, Attempt 3)"
            }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(imported["imported_sessions"], json!(1));
    assert_eq!(imported["applied_passes"], json!(1));

    let (_, record) = admin(&app, "GET", &format!("/candidates/{cand_id}"), None).await;
    let results = record["test_results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["status"], json!("pass"));
    assert_eq!(results[0]["score_percentage"], json!(87.5));
    assert_eq!(results[0]["attempt_count"], json!(3));
}
