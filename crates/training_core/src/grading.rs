//! crates/training_core/src/grading.rs
//!
//! Test delivery, grading and the per-(candidate, test) submission state
//! machine. Randomness is injected so tests can seed it; production passes
//! `rand::thread_rng()` and deliveries are deliberately non-deterministic.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use crate::domain::{Candidate, Question, Test, TestResult, TestStatus};
use crate::error::{DomainError, DomainResult};
use crate::graph;

/// One answer of a submission: the question it answers and the option text
/// the candidate selected.
#[derive(Debug, Clone)]
pub struct SubmittedAnswer {
    pub question: String,
    pub selected_option: String,
}

/// The outcome of grading one submission, before it is recorded.
#[derive(Debug, Clone)]
pub struct GradeOutcome {
    pub correct_count: usize,
    pub total_answered: usize,
    pub score_percentage: f64,
    pub status: TestStatus,
}

/// Draws the delivery subset: a shuffle without replacement, truncated to
/// the configured randomized count (zero means the whole pool). Re-requesting
/// the same test yields a different subset.
pub fn select_questions<R: Rng>(test: &Test, rng: &mut R) -> Vec<Question> {
    let take = match test.randomized_question_count {
        0 => test.questions.len(),
        n => (n as usize).min(test.questions.len()),
    };
    let mut pool = test.questions.clone();
    pool.shuffle(rng);
    pool.truncate(take);
    pool
}

/// Answer matching is by text, trimmed and case-insensitive. Letters are
/// never compared, so authored content with mismatched answer text would
/// misgrade; normalization here covers whitespace and case only.
fn normalized(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Grades a submission against the canonical question bank.
///
/// Each submitted answer is matched to its question by normalized question
/// text; unmatched answers count as wrong. The passing threshold always
/// comes from the stored test, never from the submission.
pub fn grade(test: &Test, answers: &[SubmittedAnswer]) -> DomainResult<GradeOutcome> {
    if answers.is_empty() {
        return Err(DomainError::Validation(
            "Submission contains no answers".to_string(),
        ));
    }

    let mut correct_count = 0;
    for submitted in answers {
        let question = test
            .questions
            .iter()
            .find(|q| normalized(&q.text) == normalized(&submitted.question));
        let Some(question) = question else { continue };

        if normalized(&submitted.selected_option) == normalized(&question.answer) {
            correct_count += 1;
        }
    }

    let total_answered = answers.len();
    let score_percentage = correct_count as f64 / total_answered as f64 * 100.0;
    let status = if score_percentage >= test.passing_percentage as f64 {
        TestStatus::Pass
    } else {
        TestStatus::Fail
    };

    Ok(GradeOutcome {
        correct_count,
        total_answered,
        score_percentage,
        status,
    })
}

/// Whether the candidate has already passed the given test.
pub fn already_passed(candidate: &Candidate, test_id: Uuid) -> bool {
    candidate
        .test_results
        .iter()
        .any(|r| r.test_id == test_id && r.status == TestStatus::Pass)
}

/// Records a graded submission on the candidate.
///
/// State machine per (candidate, test): no prior result inserts a fresh
/// TestResult; a prior fail is overwritten with the attempt counter
/// incremented (resubmitting identical answers still increments it); a
/// prior pass is terminal and rejects the submission. A transition into
/// pass propagates through the unlock graph before the caller persists.
pub fn record_submission(
    candidate: &mut Candidate,
    test_id: Uuid,
    outcome: &GradeOutcome,
    now: DateTime<Utc>,
) -> DomainResult<TestResult> {
    let result = match candidate
        .test_results
        .iter_mut()
        .find(|r| r.test_id == test_id)
    {
        Some(existing) if existing.status == TestStatus::Pass => {
            return Err(DomainError::Forbidden(
                "Test already passed, cannot reattempt".to_string(),
            ))
        }
        Some(existing) => {
            existing.score_percentage = outcome.score_percentage;
            existing.status = outcome.status;
            existing.attempted_at = now;
            existing.attempt_count += 1;
            existing.clone()
        }
        None => {
            let result = TestResult {
                test_id,
                score_percentage: outcome.score_percentage,
                status: outcome.status,
                attempted_at: now,
                attempt_count: 1,
            };
            candidate.test_results.push(result.clone());
            result
        }
    };

    if result.status == TestStatus::Pass {
        graph::unlock_on_pass(candidate, test_id);
    }
    Ok(result)
}
