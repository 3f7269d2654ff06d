//! crates/training_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or web framework; the api
//! crate persists them whole as JSON documents, so they carry serde derives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A canonical training definition owned by administrators.
///
/// The embedded chapter list carries the master dependency graph; candidates
/// never read it directly once a personalized snapshot has been taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Training {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub duration_minutes: u32,
    pub chapters: Vec<Chapter>,
}

/// A unit of training content, optionally gated by a linked test and by
/// prerequisite chapters.
///
/// `unlocks_chapters` and `dependent_chapters` are the two mirrored sides of
/// a single logical edge set: for every edge "A unlocks B", A lists B in
/// `unlocks_chapters` and B lists A in `dependent_chapters`. All mutation
/// goes through [`crate::graph`], which keeps both sides consistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub duration_minutes: u32,
    /// Opaque content reference; the blob store owns the actual bytes.
    pub content_path: Option<String>,
    pub linked_test_id: Option<Uuid>,
    pub unlocks_chapters: Vec<Uuid>,
    pub dependent_chapters: Vec<Uuid>,
    pub indexes: Vec<IndexNode>,
}

impl Chapter {
    /// A chapter is accessible once no outstanding prerequisites remain.
    pub fn is_accessible(&self) -> bool {
        self.dependent_chapters.is_empty()
    }
}

/// A named marker inside a chapter's content, with a page and video range.
///
/// Nodes nest to arbitrary depth; traversal in [`crate::indexes`] is
/// iterative because the depth is unbounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexNode {
    pub id: Uuid,
    pub name: String,
    pub page_no: u32,
    pub video_start_secs: u32,
    pub video_end_secs: u32,
    #[serde(default)]
    pub children: Vec<IndexNode>,
}

/// A canonical question bank with pass/fail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    pub id: Uuid,
    pub title: String,
    pub duration_minutes: u32,
    pub total_question_count: u32,
    /// How many questions a delivery draws from the pool; zero means all.
    pub randomized_question_count: u32,
    pub passing_percentage: u32,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub options: [String; 4],
    /// The correct option's text. Grading compares answer text, not letters.
    pub answer: String,
}

/// A candidate record, owner of personalized training snapshots and the
/// per-test result history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
    pub email: String,
    pub batch_id: Option<Uuid>,
    pub assigned_trainings: Vec<AssignedTraining>,
    pub test_results: Vec<TestResult>,
}

impl Candidate {
    pub fn snapshot_for(&self, training_id: Uuid) -> Option<&AssignedTraining> {
        self.assigned_trainings
            .iter()
            .find(|t| t.training_id == training_id)
    }
}

/// A personalized snapshot of a training, deep-copied at assignment time.
///
/// Chapter identities remain stable references into the canonical training,
/// but the edge arrays evolve independently per candidate as tests are
/// passed. The canonical graph may keep changing for future assignees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedTraining {
    pub training_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
    pub status: TrainingStatus,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    NotStarted,
    InProgress,
    Completed,
}

/// One result per (candidate, test). Pass is terminal: once recorded, no
/// further submission is accepted for that test by that candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: Uuid,
    pub score_percentage: f64,
    pub status: TestStatus,
    pub attempted_at: DateTime<Utc>,
    pub attempt_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
}

/// One log per candidate login. Created at login, appended to as the
/// candidate navigates trainings, closed at logout; never mutated after
/// closure except by the administrative import path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLog {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub login_time: DateTime<Utc>,
    pub logout_time: Option<DateTime<Utc>>,
    pub visited_trainings: Vec<VisitedTraining>,
}

impl SessionLog {
    pub fn is_closed(&self) -> bool {
        self.logout_time.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitedTraining {
    pub training_id: Uuid,
    pub training_title: String,
    pub visited_at: DateTime<Utc>,
}
