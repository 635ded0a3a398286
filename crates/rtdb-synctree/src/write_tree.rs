use std::collections::BTreeMap;
use std::sync::Arc;

use rtdb_core::{Node, Path, WriteId};

/// What a pending user write does: replace the whole node at its path, or
/// merge a set of direct children into whatever is there.
#[derive(Clone, Debug)]
pub enum WriteRecord {
    /// Replace the node at the write's path wholesale.
    Overwrite(Node),
    /// Merge these direct children (keyed by child name, relative to the
    /// write's path) into the existing node. A `Node::empty()` value
    /// deletes that child.
    Merge(BTreeMap<Arc<str>, Node>),
}

#[derive(Clone, Debug)]
struct PendingWrite {
    id: WriteId,
    path: Path,
    record: WriteRecord,
    visible: bool,
}

/// The ordered set of pending user writes layered on top of a server
/// cache. Writes are kept in allocation order (ascending `WriteId`)
/// regardless of ack order, and later writes shadow earlier ones at
/// overlapping paths — `spec.md` §9's "persistent server cache plus an
/// ordered list of pending write records" model.
#[derive(Clone, Debug, Default)]
pub(crate) struct WriteTree {
    writes: Vec<PendingWrite>,
}

impl WriteTree {
    pub(crate) fn add_overwrite(&mut self, path: Path, node: Node, id: WriteId, visible: bool) {
        self.writes.push(PendingWrite {
            id,
            path,
            record: WriteRecord::Overwrite(node),
            visible,
        });
    }

    pub(crate) fn add_merge(&mut self, path: Path, children: BTreeMap<Arc<str>, Node>, id: WriteId) {
        self.writes.push(PendingWrite {
            id,
            path,
            record: WriteRecord::Merge(children),
            visible: true,
        });
    }

    /// Drop the write with this id. True iff one was actually removed —
    /// callers tolerate acks for writes that are no longer pending
    /// (`spec.md` §7, "Protocol anomalies ... tolerated silently").
    pub(crate) fn remove(&mut self, id: WriteId) -> bool {
        let before = self.writes.len();
        self.writes.retain(|w| w.id != id);
        self.writes.len() != before
    }

    /// Fuse `server_node` (the cached node already present at
    /// `view_path`) with every visible pending write that touches
    /// `view_path`, in write-id order.
    pub(crate) fn apply_to(&self, server_node: Node, view_path: &Path) -> Node {
        let mut node = server_node;
        let mut ordered: Vec<&PendingWrite> = self.writes.iter().filter(|w| w.visible).collect();
        ordered.sort_by_key(|w| w.id);
        for write in ordered {
            node = apply_one(&node, &write.path, &write.record, view_path);
        }
        node
    }
}

fn apply_one(base: &Node, write_path: &Path, record: &WriteRecord, view_path: &Path) -> Node {
    if write_path == view_path {
        return apply_at_root(base, record);
    }
    if let Some(relative) = view_path.relative_to(write_path) {
        // The write is at an ancestor of the view path: it can only
        // shadow (overwrite) or partially touch (merge) the view.
        return match record {
            WriteRecord::Overwrite(node) => node.get_child(&relative),
            WriteRecord::Merge(children) => {
                if let Some(head) = relative.front() {
                    match children.get(head) {
                        Some(child) => child.get_child(&relative.pop_front()),
                        None => base.clone(),
                    }
                } else {
                    base.clone()
                }
            }
        };
    }
    if let Some(relative) = write_path.relative_to(view_path) {
        // The write is strictly deeper than the view path: thread it
        // through as a child update.
        return match record {
            WriteRecord::Overwrite(node) => base.update_child(&relative, node.clone()),
            WriteRecord::Merge(children) => {
                let mut node = base.clone();
                for (key, child) in children {
                    node = node.update_child(&relative.child(key.clone()), child.clone());
                }
                node
            }
        };
    }
    // Disjoint paths; this write has no bearing on the view.
    base.clone()
}

fn apply_at_root(base: &Node, record: &WriteRecord) -> Node {
    match record {
        WriteRecord::Overwrite(node) => node.clone(),
        WriteRecord::Merge(children) => {
            let mut node = base.clone();
            for (key, child) in children {
                node = node.update_immediate_child(key, child.clone());
            }
            node
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overwrite_at_view_path_replaces() {
        let mut tree = WriteTree::default();
        tree.add_overwrite(Path::parse("/a"), Node::leaf_number(5.0), WriteId::new(0), true);
        let view = tree.apply_to(Node::leaf_number(1.0), &Path::parse("/a"));
        assert_eq!(view.val(false), json!(5));
    }

    #[test]
    fn ancestor_overwrite_shadows_descendant_view() {
        let mut tree = WriteTree::default();
        tree.add_overwrite(
            Path::parse("/a"),
            Node::from_json(&json!({"x": 1})),
            WriteId::new(0),
            true,
        );
        let view = tree.apply_to(Node::leaf_number(99.0), &Path::parse("/a/x"));
        assert_eq!(view.val(false), json!(1));
    }

    #[test]
    fn descendant_overwrite_threads_through_ancestor_view() {
        let mut tree = WriteTree::default();
        tree.add_overwrite(Path::parse("/a/x"), Node::leaf_number(2.0), WriteId::new(0), true);
        let view = tree.apply_to(Node::from_json(&json!({"x": 1, "y": 2})), &Path::parse("/a"));
        assert_eq!(view.val(false), json!({"x": 2, "y": 2}));
    }

    #[test]
    fn later_write_id_wins_on_overlap() {
        let mut tree = WriteTree::default();
        tree.add_overwrite(Path::parse("/a"), Node::leaf_number(1.0), WriteId::new(0), true);
        tree.add_overwrite(Path::parse("/a"), Node::leaf_number(2.0), WriteId::new(1), true);
        let view = tree.apply_to(Node::empty(), &Path::parse("/a"));
        assert_eq!(view.val(false), json!(2));
    }

    #[test]
    fn invisible_writes_are_not_applied() {
        let mut tree = WriteTree::default();
        tree.add_overwrite(Path::parse("/a"), Node::leaf_number(1.0), WriteId::new(0), false);
        let view = tree.apply_to(Node::leaf_number(0.0), &Path::parse("/a"));
        assert_eq!(view.val(false), json!(0));
    }

    #[test]
    fn remove_drops_the_write() {
        let mut tree = WriteTree::default();
        let id = WriteId::new(0);
        tree.add_overwrite(Path::parse("/a"), Node::leaf_number(1.0), id, true);
        assert!(tree.remove(id));
        let view = tree.apply_to(Node::leaf_number(0.0), &Path::parse("/a"));
        assert_eq!(view.val(false), json!(0));
        assert!(!tree.remove(id));
    }

    #[test]
    fn merge_deletes_child_with_empty_node() {
        let mut tree = WriteTree::default();
        let mut children = BTreeMap::new();
        children.insert(Arc::from("x"), Node::empty());
        tree.add_merge(Path::parse("/a"), children, WriteId::new(0));
        let view = tree.apply_to(Node::from_json(&json!({"x": 1, "y": 2})), &Path::parse("/a"));
        assert_eq!(view.val(false), json!({"y": 2}));
    }
}
