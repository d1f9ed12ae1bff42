//! Child Reconciler
//!
//! Patches the live children of an element to match a freshly normalized
//! node list, mutating as little as the heuristic allows.
//!
//! # How Reconciliation Works
//!
//! 1. If the live children already equal the wanted list, nothing happens.
//!
//! 2. Otherwise we pick a run of live children to keep. Starting from each
//!    live child that is also wanted, we walk the wanted list forward and
//!    extend the run with every wanted node that sits later among the live
//!    children than the last one taken. The longest run wins; on a tie the
//!    run starting at the earliest live position wins.
//!
//! 3. Every live child outside the run is removed, last first. Removed
//!    nodes that are not wanted any more have their subtree cleaned up, and
//!    text the renderer created for them is freed from the document.
//!
//! 4. If the kept run already is the wanted list, we stop. Otherwise the
//!    wanted list is walked left to right: a missing position is appended,
//!    a wrong occupant gets the wanted node inserted before it, a correct
//!    occupant is left alone.
//!
//! The kept run is ordered the same way in both lists, so step 4 never
//! touches a kept node and always ends in exactly the wanted order. This
//! is a greedy heuristic, not a minimal edit script.

use std::collections::{HashMap, HashSet};

use crate::dom::{Document, NodeId};
use crate::error::Result;

/// Counts of the mutations one reconciliation performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub removed: usize,
    pub inserted: usize,
    pub appended: usize,
    /// Lifecycle cleanups run for discarded subtrees.
    pub cleanups: usize,
    /// Discarded renderer-created nodes freed from the document.
    pub released: usize,
}

impl ReconcileStats {
    /// Whether the live children were left untouched.
    pub fn is_noop(&self) -> bool {
        self.removed == 0 && self.inserted == 0 && self.appended == 0
    }
}

/// Indices into `before` that can stay where they are.
///
/// Returned indices are increasing, and the nodes they name appear in the
/// same relative order in `after`.
pub fn plan_kept(before: &[NodeId], after: &[NodeId]) -> Vec<usize> {
    let before_pos: HashMap<NodeId, usize> = before
        .iter()
        .enumerate()
        .map(|(i, node)| (*node, i))
        .collect();
    let after_pos: HashMap<NodeId, usize> = after
        .iter()
        .enumerate()
        .map(|(i, node)| (*node, i))
        .collect();

    let mut best: Vec<usize> = Vec::new();
    for (start, node) in before.iter().enumerate() {
        let Some(&from) = after_pos.get(node) else {
            continue;
        };

        let mut run = vec![start];
        let mut last = start;
        for wanted in &after[from + 1..] {
            if let Some(&pos) = before_pos.get(wanted) {
                if pos > last {
                    run.push(pos);
                    last = pos;
                }
            }
        }

        if run.len() > best.len() {
            best = run;
        }
    }
    best
}

/// Make the live children of `parent` equal `after`.
pub fn reconcile_children(doc: &Document, parent: NodeId, after: &[NodeId]) -> Result<ReconcileStats> {
    let before = doc.children(parent);
    let mut stats = ReconcileStats::default();
    if before == after {
        return Ok(stats);
    }

    let kept: HashSet<usize> = plan_kept(&before, after).into_iter().collect();
    let wanted: HashSet<NodeId> = after.iter().copied().collect();

    for (index, node) in before.iter().enumerate().rev() {
        if kept.contains(&index) {
            continue;
        }
        doc.remove_child(parent, *node)?;
        stats.removed += 1;
        if !wanted.contains(node) {
            stats.cleanups += doc.cleanup_subtree(*node);
            if doc.release_owned(*node) {
                stats.released += 1;
            }
        }
    }

    if kept.len() != after.len() {
        for (index, node) in after.iter().enumerate() {
            match doc.child_at(parent, index) {
                None => {
                    doc.append_child(parent, *node)?;
                    stats.appended += 1;
                }
                Some(occupant) if occupant != *node => {
                    doc.insert_before(parent, *node, Some(occupant))?;
                    stats.inserted += 1;
                }
                Some(_) => {}
            }
        }
    }

    tracing::debug!(
        ?parent,
        before = before.len(),
        after = after.len(),
        kept = kept.len(),
        removed = stats.removed,
        inserted = stats.inserted,
        appended = stats.appended,
        released = stats.released,
        "reconciled children"
    );
    Ok(stats)
}

/// Swap the occupant of a fixed slot. Returns `false` when `new` already
/// occupies it.
pub(crate) fn replace_slot(doc: &Document, parent: NodeId, current: NodeId, new: NodeId) -> Result<bool> {
    if current == new {
        return Ok(false);
    }
    doc.replace_child(parent, new, current)?;
    doc.cleanup_subtree(current);
    doc.release_owned(current);
    Ok(true)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    fn setup(n: usize) -> (Document, NodeId, Vec<NodeId>) {
        let doc = Document::new();
        let parent = doc.create_element("ul");
        let nodes: Vec<NodeId> = (0..n).map(|_| doc.create_element("li")).collect();
        (doc, parent, nodes)
    }

    fn attach(doc: &Document, parent: NodeId, nodes: &[NodeId]) {
        for node in nodes {
            doc.append_child(parent, *node).unwrap();
        }
    }

    #[test]
    fn identical_lists_do_nothing() {
        let (doc, ul, n) = setup(3);
        attach(&doc, ul, &n);

        let stats = reconcile_children(&doc, ul, &n).unwrap();
        assert!(stats.is_noop());
    }

    #[test]
    fn append_keeps_existing_nodes() {
        let (doc, ul, n) = setup(4);
        attach(&doc, ul, &n[..3]);

        let stats = reconcile_children(&doc, ul, &n).unwrap();
        assert_eq!(doc.children(ul), n);
        assert_eq!(
            stats,
            ReconcileStats {
                removed: 0,
                inserted: 0,
                appended: 1,
                cleanups: 0,
                released: 0,
            }
        );
    }

    #[test]
    fn removing_first_cleans_it_up() {
        let (doc, ul, n) = setup(3);
        attach(&doc, ul, &n);
        let inner = doc.create_element("span");
        doc.append_child(n[0], inner).unwrap();

        let count = Arc::new(AtomicI32::new(0));
        for node in [n[0], inner, n[1]] {
            let count = count.clone();
            doc.lifecycle().register(node, move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        let stats = reconcile_children(&doc, ul, &n[1..]).unwrap();
        assert_eq!(doc.children(ul), &n[1..]);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.cleanups, 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(doc.lifecycle().registered(n[1]), 1);
    }

    #[test]
    fn reorder_ends_in_wanted_order() {
        let (doc, ul, n) = setup(4);
        attach(&doc, ul, &n);
        let after = [n[0], n[2], n[3], n[1]];

        assert_eq!(plan_kept(&n, &after), vec![0, 2, 3]);
        let stats = reconcile_children(&doc, ul, &after).unwrap();
        assert_eq!(doc.children(ul), after);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.appended, 1);
        assert_eq!(stats.cleanups, 0);
    }

    #[test]
    fn moved_nodes_keep_their_subscriptions() {
        let (doc, ul, n) = setup(2);
        attach(&doc, ul, &n);
        doc.lifecycle().register(n[0], || panic!("moved node was cleaned up"));

        reconcile_children(&doc, ul, &[n[1], n[0]]).unwrap();
        assert_eq!(doc.children(ul), vec![n[1], n[0]]);
        assert_eq!(doc.lifecycle().registered(n[0]), 1);
    }

    #[test]
    fn equal_runs_prefer_earliest_start() {
        // [A, B, C, D] -> [C, D, A, B]: runs {A, B} and {C, D} tie.
        let (_, _, n) = setup(4);
        let after = [n[2], n[3], n[0], n[1]];
        assert_eq!(plan_kept(&n, &after), vec![0, 1]);
    }

    #[test]
    fn insert_into_middle() {
        let (doc, ul, n) = setup(3);
        attach(&doc, ul, &[n[0], n[2]]);

        let stats = reconcile_children(&doc, ul, &n).unwrap();
        assert_eq!(doc.children(ul), n);
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.removed, 0);
    }

    #[test]
    fn replace_everything() {
        let (doc, ul, n) = setup(4);
        attach(&doc, ul, &n[..2]);

        reconcile_children(&doc, ul, &n[2..]).unwrap();
        assert_eq!(doc.children(ul), &n[2..]);
        assert_eq!(doc.parent(n[0]), None);
    }

    #[test]
    fn replace_slot_swaps_one_child() {
        let (doc, ul, n) = setup(4);
        attach(&doc, ul, &n[..3]);
        doc.lifecycle().register(n[1], || {});

        assert!(!replace_slot(&doc, ul, n[1], n[1]).unwrap());
        assert!(replace_slot(&doc, ul, n[1], n[3]).unwrap());
        assert_eq!(doc.children(ul), vec![n[0], n[3], n[2]]);
        assert!(doc.lifecycle().is_empty());
    }

    #[test]
    fn discarded_renderer_text_is_freed() {
        let (doc, ul, n) = setup(1);
        let old = doc.create_owned_text("old");
        let mine = doc.create_text("mine");
        attach(&doc, ul, &[n[0], old, mine]);
        let before = doc.node_count();

        let stats = reconcile_children(&doc, ul, &[n[0]]).unwrap();
        assert_eq!(stats.removed, 2);
        assert_eq!(stats.released, 1);
        assert!(!doc.contains(old));
        assert!(doc.contains(mine));
        assert_eq!(doc.node_count(), before - 1);
    }

    #[test]
    fn replaced_slot_text_is_freed() {
        let (doc, ul, n) = setup(1);
        let text = doc.create_owned_text("t");
        attach(&doc, ul, &[text]);

        replace_slot(&doc, ul, text, n[0]).unwrap();
        assert!(!doc.contains(text));
        assert_eq!(doc.children(ul), vec![n[0]]);
    }
}
