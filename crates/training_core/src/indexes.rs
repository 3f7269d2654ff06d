//! crates/training_core/src/indexes.rs
//!
//! Operations on the recursive chapter index tree. Nesting depth is
//! unbounded, so every traversal here runs on an explicit worklist rather
//! than the call stack.

use uuid::Uuid;

use crate::domain::IndexNode;
use crate::error::{DomainError, DomainResult};

/// Fields an index update may change. `None` leaves the field untouched.
#[derive(Debug, Default, Clone)]
pub struct IndexPatch {
    pub name: Option<String>,
    pub page_no: Option<u32>,
    pub video_start_secs: Option<u32>,
    pub video_end_secs: Option<u32>,
}

/// A video range is well formed when the end strictly follows the start.
pub fn validate_video_range(start_secs: u32, end_secs: u32) -> DomainResult<()> {
    if end_secs <= start_secs {
        return Err(DomainError::Validation(
            "Video end time must be greater than start time".to_string(),
        ));
    }
    Ok(())
}

/// Finds a node anywhere in the tree by identity.
pub fn find_node(roots: &[IndexNode], index_id: Uuid) -> Option<&IndexNode> {
    let mut stack: Vec<&IndexNode> = roots.iter().collect();
    while let Some(node) = stack.pop() {
        if node.id == index_id {
            return Some(node);
        }
        stack.extend(node.children.iter());
    }
    None
}

fn find_node_mut(roots: &mut [IndexNode], index_id: Uuid) -> Option<&mut IndexNode> {
    let mut stack: Vec<&mut IndexNode> = roots.iter_mut().collect();
    while let Some(node) = stack.pop() {
        if node.id == index_id {
            return Some(node);
        }
        stack.extend(node.children.iter_mut());
    }
    None
}

/// Inserts a node, either at the top level (`parent_id` is `None`) or under
/// the named parent at any depth.
pub fn add_node(
    roots: &mut Vec<IndexNode>,
    parent_id: Option<Uuid>,
    node: IndexNode,
) -> DomainResult<()> {
    if node.video_end_secs != 0 || node.video_start_secs != 0 {
        validate_video_range(node.video_start_secs, node.video_end_secs)?;
    }
    match parent_id {
        None => {
            roots.push(node);
            Ok(())
        }
        Some(parent_id) => match find_node_mut(roots, parent_id) {
            Some(parent) => {
                parent.children.push(node);
                Ok(())
            }
            None => Err(DomainError::NotFound(format!(
                "Parent index {} not found",
                parent_id
            ))),
        },
    }
}

/// Applies a patch to a node anywhere in the tree.
pub fn update_node(
    roots: &mut [IndexNode],
    index_id: Uuid,
    patch: IndexPatch,
) -> DomainResult<()> {
    let node = find_node_mut(roots, index_id)
        .ok_or_else(|| DomainError::NotFound(format!("Index {} not found", index_id)))?;

    if let Some(end) = patch.video_end_secs {
        let start = patch.video_start_secs.unwrap_or(node.video_start_secs);
        validate_video_range(start, end)?;
    }
    if let Some(name) = patch.name {
        node.name = name;
    }
    if let Some(page_no) = patch.page_no {
        node.page_no = page_no;
    }
    if let Some(start) = patch.video_start_secs {
        node.video_start_secs = start;
    }
    if let Some(end) = patch.video_end_secs {
        node.video_end_secs = end;
    }
    Ok(())
}

/// Removes a node (and its whole subtree) from anywhere in the tree.
pub fn delete_node(roots: &mut Vec<IndexNode>, index_id: Uuid) -> DomainResult<()> {
    let mut stack: Vec<&mut Vec<IndexNode>> = vec![roots];
    while let Some(list) = stack.pop() {
        if let Some(pos) = list.iter().position(|n| n.id == index_id) {
            list.remove(pos);
            return Ok(());
        }
        stack.extend(list.iter_mut().map(|n| &mut n.children));
    }
    Err(DomainError::NotFound(format!(
        "Index {} not found",
        index_id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> IndexNode {
        IndexNode {
            id: Uuid::new_v4(),
            name: name.to_string(),
            page_no: 1,
            video_start_secs: 0,
            video_end_secs: 0,
            children: Vec::new(),
        }
    }

    /// Builds a degenerate chain with one node per level.
    fn deep_chain(depth: usize) -> (Vec<IndexNode>, Uuid) {
        let mut leaf = node("leaf");
        let leaf_id = leaf.id;
        for i in (0..depth).rev() {
            let mut parent = node(&format!("level {}", i));
            parent.children.push(leaf);
            leaf = parent;
        }
        (vec![leaf], leaf_id)
    }

    #[test]
    fn adds_nested_under_parent() {
        let mut roots = vec![node("ch 1")];
        let parent_id = roots[0].id;

        add_node(&mut roots, Some(parent_id), node("ch 1.1")).unwrap();
        add_node(&mut roots, None, node("ch 2")).unwrap();

        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].children.len(), 1);
        assert_eq!(roots[0].children[0].name, "ch 1.1");
    }

    #[test]
    fn missing_parent_is_not_found() {
        let mut roots = vec![node("ch 1")];
        let err = add_node(&mut roots, Some(Uuid::new_v4()), node("x")).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn rejects_inverted_video_range() {
        let mut bad = node("clip");
        bad.video_start_secs = 90;
        bad.video_end_secs = 30;
        let err = add_node(&mut Vec::new(), None, bad).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let mut roots = vec![node("clip")];
        let id = roots[0].id;
        let err = update_node(
            &mut roots,
            id,
            IndexPatch {
                video_start_secs: Some(50),
                video_end_secs: Some(50),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn updates_and_deletes_survive_deep_nesting() {
        // Deep enough that a call-stack recursion would be in trouble.
        let (mut roots, leaf_id) = deep_chain(5_000);

        update_node(
            &mut roots,
            leaf_id,
            IndexPatch {
                name: Some("renamed".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(find_node(&roots, leaf_id).unwrap().name, "renamed");

        delete_node(&mut roots, leaf_id).unwrap();
        assert!(find_node(&roots, leaf_id).is_none());
    }
}
