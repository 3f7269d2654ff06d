//! crates/training_core/src/activity.rs
//!
//! Read-side reconstruction of what a candidate did during a session, and
//! the best-effort inverse used by bulk log import.
//!
//! The live path joins a closed session's window with the candidate's test
//! results and snapshots; the import path parses the summary strings back
//! into synthetic results. The parser is a lossy adapter: its heuristics
//! never shape the live-generation format.

use chrono::{DateTime, Utc};

use crate::domain::{Candidate, SessionLog, TestStatus, Training};
use crate::graph;

/// Everything a candidate demonstrably did inside one session window.
#[derive(Debug, Clone)]
pub struct SessionActivity {
    pub session_id: uuid::Uuid,
    pub login_time: DateTime<Utc>,
    pub logout_time: Option<DateTime<Utc>>,
    pub trainings: Vec<TrainingActivity>,
    /// "Passed: a, b", "No activity", or "Session Active" while open.
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct TrainingActivity {
    pub training_id: uuid::Uuid,
    pub training_title: String,
    pub passed_chapters: Vec<String>,
}

/// One entry recovered from a "Passed: ..." summary string.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPass {
    pub chapter_name: String,
    pub score_percentage: f64,
    pub attempt_count: u32,
}

fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{}", score as i64)
    } else {
        format!("{:.1}", score)
    }
}

fn format_pass(chapter_name: &str, score: f64, attempt: u32) -> String {
    format!(
        "{} ({}%, Attempt {})",
        chapter_name,
        format_score(score),
        attempt
    )
}

/// Reconstructs the activity view for one session.
///
/// Open sessions report "Session Active" with no detail; attributing results
/// to an open-ended window would credit future attempts to this session.
/// Closed sessions credit a pass to the session iff its last attempt falls
/// inside [login, logout].
pub fn session_activity(session: &SessionLog, candidate: &Candidate) -> SessionActivity {
    let Some(logout_time) = session.logout_time else {
        return SessionActivity {
            session_id: session.id,
            login_time: session.login_time,
            logout_time: None,
            trainings: Vec::new(),
            summary: "Session Active".to_string(),
        };
    };

    let window_passes: Vec<_> = candidate
        .test_results
        .iter()
        .filter(|r| {
            r.status == TestStatus::Pass
                && r.attempted_at >= session.login_time
                && r.attempted_at <= logout_time
        })
        .collect();

    let mut trainings = Vec::new();
    let mut all_passed = Vec::new();
    for visited in &session.visited_trainings {
        let mut passed_chapters = Vec::new();
        if let Some(snapshot) = candidate.snapshot_for(visited.training_id) {
            for chapter in &snapshot.chapters {
                let Some(linked) = chapter.linked_test_id else { continue };
                if let Some(result) = window_passes.iter().find(|r| r.test_id == linked) {
                    let line =
                        format_pass(&chapter.name, result.score_percentage, result.attempt_count);
                    passed_chapters.push(line.clone());
                    all_passed.push(line);
                }
            }
        }
        trainings.push(TrainingActivity {
            training_id: visited.training_id,
            training_title: visited.training_title.clone(),
            passed_chapters,
        });
    }

    let summary = if all_passed.is_empty() {
        "No activity".to_string()
    } else {
        format!("Passed: {}", all_passed.join(", "))
    };

    SessionActivity {
        session_id: session.id,
        login_time: session.login_time,
        logout_time: Some(logout_time),
        trainings,
        summary,
    }
}

/// Parses a "Passed: ..." summary back into its entries.
///
/// Splits on commas, then re-merges fragments that were split mid-entry: a
/// fragment without "Attempt" belongs to the entry still being assembled.
/// Anything that cannot be parsed is dropped; summaries without the prefix
/// ("No activity", "Session Active") yield nothing.
pub fn parse_passed_summary(summary: &str) -> Vec<ParsedPass> {
    let Some(body) = summary.trim().strip_prefix("Passed:") else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    let mut pending = String::new();
    for fragment in body.split(',') {
        if !pending.is_empty() {
            pending.push(',');
        }
        pending.push_str(fragment);
        if fragment.contains("Attempt") {
            entries.push(pending.trim().to_string());
            pending.clear();
        }
    }

    entries.iter().filter_map(|e| parse_entry(e)).collect()
}

fn parse_entry(entry: &str) -> Option<ParsedPass> {
    let open = entry.rfind('(')?;
    let chapter_name = entry[..open].trim();
    if chapter_name.is_empty() {
        return None;
    }

    let inner = entry[open + 1..].trim_end_matches(')');
    let (score_part, attempt_part) = inner.split_once(',')?;
    let score_percentage = score_part.trim().strip_suffix('%')?.trim().parse().ok()?;
    let attempt_count = attempt_part
        .trim()
        .strip_prefix("Attempt")?
        .trim()
        .parse()
        .ok()?;

    Some(ParsedPass {
        chapter_name: chapter_name.to_string(),
        score_percentage,
        attempt_count,
    })
}

/// Replays parsed passes onto a candidate as synthetic results.
///
/// Chapter names are matched by exact string equality against the canonical
/// training; renamed chapters silently fail to match, by contract. Already
/// passed tests stay immutable. Returns how many entries were applied.
pub fn apply_imported_passes(
    candidate: &mut Candidate,
    training: &Training,
    passes: &[ParsedPass],
    at: DateTime<Utc>,
) -> usize {
    let mut applied = 0;
    for pass in passes {
        let linked = training
            .chapters
            .iter()
            .find(|c| c.name == pass.chapter_name)
            .and_then(|c| c.linked_test_id);
        let Some(test_id) = linked else { continue };

        match candidate
            .test_results
            .iter_mut()
            .find(|r| r.test_id == test_id)
        {
            Some(existing) if existing.status == TestStatus::Pass => continue,
            Some(existing) => {
                existing.score_percentage = pass.score_percentage;
                existing.status = TestStatus::Pass;
                existing.attempted_at = at;
                existing.attempt_count = existing.attempt_count.max(pass.attempt_count);
            }
            None => {
                candidate.test_results.push(crate::domain::TestResult {
                    test_id,
                    score_percentage: pass.score_percentage,
                    status: TestStatus::Pass,
                    attempted_at: at,
                    attempt_count: pass.attempt_count.max(1),
                });
            }
        }
        graph::unlock_on_pass(candidate, test_id);
        applied += 1;
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AssignedTraining, Chapter, SessionLog, TestResult, TrainingStatus, VisitedTraining,
    };
    use chrono::TimeZone;
    use uuid::Uuid;

    fn chapter(name: &str, linked_test: Option<Uuid>) -> Chapter {
        Chapter {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            duration_minutes: 15,
            content_path: None,
            linked_test_id: linked_test,
            unlocks_chapters: Vec::new(),
            dependent_chapters: Vec::new(),
            indexes: Vec::new(),
        }
    }

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, min, 0).unwrap()
    }

    fn fixture() -> (SessionLog, Candidate, Uuid) {
        let test_id = Uuid::new_v4();
        let training_id = Uuid::new_v4();
        let candidate = Candidate {
            id: Uuid::new_v4(),
            external_id: "CAND-3".to_string(),
            name: "Meera".to_string(),
            email: "meera@example.com".to_string(),
            batch_id: None,
            assigned_trainings: vec![AssignedTraining {
                training_id,
                batch_id: None,
                assigned_at: at(9, 0),
                status: TrainingStatus::InProgress,
                chapters: vec![chapter("Fire Safety", Some(test_id))],
            }],
            test_results: vec![TestResult {
                test_id,
                score_percentage: 80.0,
                status: TestStatus::Pass,
                attempted_at: at(10, 15),
                attempt_count: 2,
            }],
        };
        let session = SessionLog {
            id: Uuid::new_v4(),
            candidate_id: candidate.id,
            login_time: at(10, 0),
            logout_time: Some(at(10, 30)),
            visited_trainings: vec![VisitedTraining {
                training_id,
                training_title: "Safety Basics".to_string(),
                visited_at: at(10, 5),
            }],
        };
        (session, candidate, test_id)
    }

    #[test]
    fn closed_session_reports_passes_inside_the_window() {
        let (session, candidate, _) = fixture();
        let activity = session_activity(&session, &candidate);

        assert_eq!(activity.trainings.len(), 1);
        assert_eq!(
            activity.trainings[0].passed_chapters,
            vec!["Fire Safety (80%, Attempt 2)".to_string()]
        );
        assert_eq!(activity.summary, "Passed: Fire Safety (80%, Attempt 2)");
    }

    #[test]
    fn results_outside_the_window_produce_no_activity() {
        let (session, mut candidate, _) = fixture();
        candidate.test_results[0].attempted_at = at(10, 45);

        let activity = session_activity(&session, &candidate);
        assert_eq!(activity.summary, "No activity");
        assert!(activity.trainings[0].passed_chapters.is_empty());
    }

    #[test]
    fn open_session_suppresses_detail() {
        let (mut session, candidate, _) = fixture();
        session.logout_time = None;

        let activity = session_activity(&session, &candidate);
        assert_eq!(activity.summary, "Session Active");
        assert!(activity.trainings.is_empty());
    }

    #[test]
    fn parses_a_simple_summary() {
        let parsed = parse_passed_summary("Passed: Fire Safety (80%, Attempt 2)");
        assert_eq!(
            parsed,
            vec![ParsedPass {
                chapter_name: "Fire Safety".to_string(),
                score_percentage: 80.0,
                attempt_count: 2,
            }]
        );
    }

    #[test]
    fn remerges_fragments_split_inside_an_entry() {
        // A chapter name containing a comma splits into a fragment without
        // "Attempt"; the parser glues it back onto its successor.
        let parsed = parse_passed_summary(
            "Passed: Lifting, Rigging (66.7%, Attempt 3), Fire Safety (80%, Attempt 1)",
        );
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].chapter_name, "Lifting, Rigging");
        assert_eq!(parsed[0].score_percentage, 66.7);
        assert_eq!(parsed[0].attempt_count, 3);
        assert_eq!(parsed[1].chapter_name, "Fire Safety");
    }

    #[test]
    fn non_pass_summaries_parse_to_nothing() {
        assert!(parse_passed_summary("No activity").is_empty());
        assert!(parse_passed_summary("Session Active").is_empty());
        assert!(parse_passed_summary("Passed: garbled entry without marker").is_empty());
    }

    #[test]
    fn round_trips_the_live_format() {
        let (session, candidate, _) = fixture();
        let activity = session_activity(&session, &candidate);
        let parsed = parse_passed_summary(&activity.summary);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].chapter_name, "Fire Safety");
        assert_eq!(parsed[0].score_percentage, 80.0);
        assert_eq!(parsed[0].attempt_count, 2);
    }

    #[test]
    fn import_applies_passes_and_unlocks() {
        let test_id = Uuid::new_v4();
        let mut gate = chapter("Gate", Some(test_id));
        let next = chapter("Next", None);
        gate.unlocks_chapters.push(next.id);
        let mut next = next;
        next.dependent_chapters.push(gate.id);

        let training = Training {
            id: Uuid::new_v4(),
            title: "T".to_string(),
            description: String::new(),
            category: "safety".to_string(),
            duration_minutes: 60,
            chapters: vec![gate.clone(), next.clone()],
        };
        let mut candidate = Candidate {
            id: Uuid::new_v4(),
            external_id: "CAND-7".to_string(),
            name: "Iqbal".to_string(),
            email: "iqbal@example.com".to_string(),
            batch_id: None,
            assigned_trainings: vec![AssignedTraining {
                training_id: training.id,
                batch_id: None,
                assigned_at: at(8, 0),
                status: TrainingStatus::NotStarted,
                chapters: vec![gate, next],
            }],
            test_results: Vec::new(),
        };

        let passes = vec![
            ParsedPass {
                chapter_name: "Gate".to_string(),
                score_percentage: 90.0,
                attempt_count: 1,
            },
            ParsedPass {
                chapter_name: "Renamed Since".to_string(),
                score_percentage: 70.0,
                attempt_count: 1,
            },
        ];
        let applied = apply_imported_passes(&mut candidate, &training, &passes, at(11, 0));

        assert_eq!(applied, 1);
        assert_eq!(candidate.test_results.len(), 1);
        assert_eq!(candidate.test_results[0].status, TestStatus::Pass);
        let snapshot = &candidate.assigned_trainings[0].chapters;
        assert!(snapshot[1].dependent_chapters.is_empty());
        assert!(snapshot[0].unlocks_chapters.is_empty());
    }
}
