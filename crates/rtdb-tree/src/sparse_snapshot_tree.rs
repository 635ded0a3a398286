use std::collections::BTreeMap;
use std::sync::Arc;

use rtdb_core::{Node, Path};

/// A mutable, path-indexed trie of pending snapshots.
///
/// Each interior slot holds either a single [`Node`] (a "remembered"
/// subtree — its descendants are not tracked individually) or a nested
/// set of children. `remember` collapses whatever was at or below a path
/// into one node; `forget` removes a path and prunes any interior node
/// left with no children and no value.
#[derive(Clone, Debug, Default)]
pub struct SparseSnapshotTree {
    value: Option<Node>,
    children: BTreeMap<Arc<str>, SparseSnapshotTree>,
}

impl SparseSnapshotTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff this tree (at its root) holds neither a value nor any
    /// children.
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    /// Replace the subtree at `path` with a single node, discarding any
    /// descendants previously remembered below it.
    pub fn remember(&mut self, path: &Path, node: Node) {
        match path.front() {
            None => {
                self.value = Some(node);
                self.children.clear();
            }
            Some(head) => {
                if self.value.is_some() {
                    // An ancestor was remembered wholesale; refine it into
                    // per-child entries so the new, more specific value can
                    // be stored without losing sibling data.
                    let existing = self.value.take().unwrap();
                    for (key, child) in existing.children() {
                        self.children
                            .entry(Arc::from(key))
                            .or_default()
                            .remember(&Path::empty(), child.clone());
                    }
                }
                self.children
                    .entry(Arc::from(head))
                    .or_default()
                    .remember(&path.pop_front(), node);
            }
        }
    }

    /// Drop whatever is remembered at `path`. Returns true if anything was
    /// actually removed. Prunes interior nodes left with nothing under
    /// them.
    pub fn forget(&mut self, path: &Path) -> bool {
        match path.front() {
            None => {
                let removed = self.value.is_some() || !self.children.is_empty();
                self.value = None;
                self.children.clear();
                removed
            }
            Some(head) => {
                if let Some(existing) = self.value.take() {
                    // Refine a wholesale value into children so we can
                    // forget just the requested subpath.
                    for (key, child) in existing.children() {
                        self.children
                            .entry(Arc::from(key))
                            .or_default()
                            .remember(&Path::empty(), child.clone());
                    }
                }
                let key: Arc<str> = Arc::from(head);
                let removed = match self.children.get_mut(&key) {
                    Some(child) => child.forget(&path.pop_front()),
                    None => false,
                };
                if let Some(child) = self.children.get(&key) {
                    if child.is_empty() {
                        self.children.remove(&key);
                    }
                }
                removed
            }
        }
    }

    /// Walk the tree rooted at `prefix`, invoking `visit(full_path, node)`
    /// for every maximal remembered node in pre-order. Never descends into
    /// a node that was `remember`ed as a whole — only the interior
    /// structure built by partial remembers is walked.
    pub fn for_each_tree<F: FnMut(&Path, &Node)>(&self, prefix: &Path, visit: &mut F) {
        if let Some(node) = &self.value {
            visit(prefix, node);
            return;
        }
        for (key, child) in &self.children {
            child.for_each_tree(&prefix.child(key.clone()), visit);
        }
    }

    /// Node remembered at exactly `path`, or the empty node if nothing (or
    /// only descendants) is remembered there.
    pub fn get(&self, path: &Path) -> Node {
        match path.front() {
            None => self.value.clone().unwrap_or_default(),
            Some(head) => match self.children.get(head) {
                Some(child) => child.get(&path.pop_front()),
                None => Node::empty(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn remember_then_get() {
        let mut tree = SparseSnapshotTree::new();
        tree.remember(&Path::parse("/a/b"), Node::leaf_number(1.0));
        assert_eq!(tree.get(&Path::parse("/a/b")).val(false), json!(1));
    }

    #[test]
    fn remember_collapses_descendants() {
        let mut tree = SparseSnapshotTree::new();
        tree.remember(&Path::parse("/a/b"), Node::leaf_number(1.0));
        tree.remember(&Path::parse("/a"), Node::leaf_string("whole"));
        assert_eq!(tree.get(&Path::parse("/a")).val(false), json!("whole"));
        // the descendant was collapsed away
        let mut seen = Vec::new();
        tree.for_each_tree(&Path::empty(), &mut |p, n| {
            seen.push((p.to_path_string(), n.val(false)))
        });
        assert_eq!(seen, vec![("/a".to_string(), json!("whole"))]);
    }

    #[test]
    fn forget_prunes_empty_interior_nodes() {
        let mut tree = SparseSnapshotTree::new();
        tree.remember(&Path::parse("/a/b"), Node::leaf_number(1.0));
        assert!(tree.forget(&Path::parse("/a/b")));
        assert!(tree.is_empty());
    }

    #[test]
    fn forget_missing_path_is_a_no_op() {
        let mut tree = SparseSnapshotTree::new();
        tree.remember(&Path::parse("/a"), Node::leaf_number(1.0));
        assert!(!tree.forget(&Path::parse("/x")));
    }

    #[test]
    fn for_each_tree_visits_maximal_nodes_in_pre_order() {
        let mut tree = SparseSnapshotTree::new();
        tree.remember(&Path::parse("/a"), Node::leaf_number(1.0));
        tree.remember(&Path::parse("/b/c"), Node::leaf_number(2.0));
        let mut seen = Vec::new();
        tree.for_each_tree(&Path::empty(), &mut |p, n| {
            seen.push((p.to_path_string(), n.val(false)))
        });
        assert_eq!(
            seen,
            vec![
                ("/a".to_string(), json!(1)),
                ("/b/c".to_string(), json!(2)),
            ]
        );
    }

    #[test]
    fn on_disconnect_round_trip_leaves_tree_empty() {
        // Invariant 5 (spec.md §8): set then cancel at the same path.
        let mut tree = SparseSnapshotTree::new();
        tree.remember(&Path::parse("/p"), Node::leaf_string("bye"));
        tree.forget(&Path::parse("/p"));
        assert!(tree.is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn remember_then_forget_always_empties(segment in "[a-z]{1,6}", value in -1000i64..1000) {
            let mut tree = SparseSnapshotTree::new();
            let path = Path::parse(&format!("/{segment}"));
            tree.remember(&path, Node::leaf_number(value as f64));
            prop_assert!(tree.forget(&path));
            prop_assert!(tree.is_empty());
        }

        #[test]
        fn remembering_disjoint_children_commutes(
            a in "[a-z]{1,4}",
            b in "[a-z]{1,4}",
            va in -1000i64..1000,
            vb in -1000i64..1000,
        ) {
            prop_assume!(a != b);
            let path_a = Path::parse(&format!("/{a}"));
            let path_b = Path::parse(&format!("/{b}"));

            let mut forward = SparseSnapshotTree::new();
            forward.remember(&path_a, Node::leaf_number(va as f64));
            forward.remember(&path_b, Node::leaf_number(vb as f64));

            let mut backward = SparseSnapshotTree::new();
            backward.remember(&path_b, Node::leaf_number(vb as f64));
            backward.remember(&path_a, Node::leaf_number(va as f64));

            prop_assert_eq!(forward.get(&path_a).val(false), backward.get(&path_a).val(false));
            prop_assert_eq!(forward.get(&path_b).val(false), backward.get(&path_b).val(false));
        }
    }
}
