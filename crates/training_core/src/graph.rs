//! crates/training_core/src/graph.rs
//!
//! The chapter dependency / unlock graph engine.
//!
//! The graph is always scoped to one chapter list: either a canonical
//! training's chapters or one candidate's personalized snapshot. Every edge
//! "A unlocks B" is stored twice (A.unlocks_chapters and
//! B.dependent_chapters); the `mirror_dependent`/`unlink_edge` primitives
//! are the only code that touches both sides, so every public operation
//! keeps the mirror consistent. All operations are set-membership based and therefore
//! safe to retry after a partial write.

use uuid::Uuid;

use crate::domain::{Candidate, Chapter};
use crate::error::{DomainError, DomainResult};

/// Looks up a chapter by identity, by reference.
pub fn find_chapter(chapters: &[Chapter], chapter_id: Uuid) -> DomainResult<&Chapter> {
    chapters
        .iter()
        .find(|c| c.id == chapter_id)
        .ok_or_else(|| DomainError::NotFound(format!("Chapter {} not found", chapter_id)))
}

fn find_chapter_mut(chapters: &mut [Chapter], chapter_id: Uuid) -> DomainResult<&mut Chapter> {
    chapters
        .iter_mut()
        .find(|c| c.id == chapter_id)
        .ok_or_else(|| DomainError::NotFound(format!("Chapter {} not found", chapter_id)))
}

/// The chapter identities a given chapter currently unlocks.
pub fn unlocks_of(chapters: &[Chapter], chapter_id: Uuid) -> DomainResult<Vec<Uuid>> {
    Ok(find_chapter(chapters, chapter_id)?.unlocks_chapters.clone())
}

/// Mirrors the edge `from -> to` on the dependent side. Targets that do not
/// exist in this chapter list are skipped; the forward entry may still name
/// them, matching how a snapshot can reference since-deleted chapters.
fn mirror_dependent(chapters: &mut [Chapter], from: Uuid, to: Uuid) {
    if let Some(target) = chapters.iter_mut().find(|c| c.id == to) {
        if !target.dependent_chapters.contains(&from) {
            target.dependent_chapters.push(from);
        }
    }
}

/// Removes the edge `from -> to` from both sides of the mirror.
fn unlink_edge(chapters: &mut [Chapter], from: Uuid, to: Uuid) {
    if let Some(source) = chapters.iter_mut().find(|c| c.id == from) {
        source.unlocks_chapters.retain(|id| *id != to);
    }
    if let Some(target) = chapters.iter_mut().find(|c| c.id == to) {
        target.dependent_chapters.retain(|id| *id != from);
    }
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut out = Vec::with_capacity(ids.len());
    for &id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Replaces a chapter's unlock set and mirrors the reverse side.
///
/// Edges dropped from the set have their stale `dependent_chapters` entries
/// removed as well, so shrinking the set fully retracts the old edges.
pub fn set_unlocks(
    chapters: &mut [Chapter],
    chapter_id: Uuid,
    unlock_ids: &[Uuid],
) -> DomainResult<()> {
    let current = find_chapter(chapters, chapter_id)?.unlocks_chapters.clone();
    for stale in current {
        if !unlock_ids.contains(&stale) {
            unlink_edge(chapters, chapter_id, stale);
        }
    }

    let unlock_ids = dedup(unlock_ids);
    find_chapter_mut(chapters, chapter_id)?.unlocks_chapters = unlock_ids.clone();
    for target in unlock_ids {
        mirror_dependent(chapters, chapter_id, target);
    }
    Ok(())
}

/// Removes the given identities from a chapter's unlock set, retracting the
/// reverse entries on each named target.
pub fn remove_unlocks(
    chapters: &mut [Chapter],
    chapter_id: Uuid,
    remove_ids: &[Uuid],
) -> DomainResult<()> {
    find_chapter(chapters, chapter_id)?;
    for &target in remove_ids {
        unlink_edge(chapters, chapter_id, target);
    }
    Ok(())
}

/// Declares that a chapter depends on the given set.
///
/// Every dependency chapter must already have a linked test, because a
/// dependency can only ever be cleared by passing that test; otherwise the
/// edge would be permanent. On success the reverse unlock entries are
/// mirrored onto each dependency chapter.
pub fn set_reverse_dependencies(
    chapters: &mut [Chapter],
    chapter_id: Uuid,
    dependency_ids: &[Uuid],
) -> DomainResult<()> {
    find_chapter(chapters, chapter_id)?;

    for &dep_id in dependency_ids {
        match chapters.iter().find(|c| c.id == dep_id) {
            Some(dep) if dep.linked_test_id.is_some() => {}
            Some(dep) => {
                return Err(DomainError::Validation(format!(
                    "Cannot set dependency on chapter '{}': test not linked",
                    dep.name
                )))
            }
            None => {
                return Err(DomainError::Validation(format!(
                    "Cannot set dependency on chapter '{}': test not linked",
                    dep_id
                )))
            }
        }
    }

    let dependency_ids = dedup(dependency_ids);
    find_chapter_mut(chapters, chapter_id)?.dependent_chapters = dependency_ids.clone();
    for dep_id in dependency_ids {
        if let Some(dep) = chapters.iter_mut().find(|c| c.id == dep_id) {
            if !dep.unlocks_chapters.contains(&chapter_id) {
                dep.unlocks_chapters.push(chapter_id);
            }
        }
    }
    Ok(())
}

/// Propagates a passing test through a candidate's personalized snapshots.
///
/// Every chapter whose linked test matches is treated as a target: its
/// unlock list is walked, each named chapter in the same snapshot drops the
/// target from its prerequisites, and the target's unlock list is cleared.
/// Only the submitting candidate's snapshots are touched; other candidates
/// assigned the same canonical training are unaffected.
pub fn unlock_on_pass(candidate: &mut Candidate, test_id: Uuid) {
    for assigned in &mut candidate.assigned_trainings {
        let targets: Vec<Uuid> = assigned
            .chapters
            .iter()
            .filter(|c| c.linked_test_id == Some(test_id))
            .map(|c| c.id)
            .collect();

        for target_id in targets {
            let unlocked = assigned
                .chapters
                .iter()
                .find(|c| c.id == target_id)
                .map(|c| c.unlocks_chapters.clone())
                .unwrap_or_default();

            for unlocked_id in unlocked {
                if let Some(dependent) =
                    assigned.chapters.iter_mut().find(|c| c.id == unlocked_id)
                {
                    dependent.dependent_chapters.retain(|id| *id != target_id);
                }
            }
            if let Some(target) = assigned.chapters.iter_mut().find(|c| c.id == target_id) {
                target.unlocks_chapters.clear();
            }
        }
    }
}
