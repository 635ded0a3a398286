use rtdb_core::{Node, Path};

/// Single-writer holder for one addressable tree — used by the engine for
/// the synthetic `.info` subtree.
#[derive(Clone, Debug, Default)]
pub struct SnapshotHolder {
    root: Node,
}

impl SnapshotHolder {
    /// A holder rooted at the empty node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Functionally replace the subtree at `path`.
    pub fn update_snapshot(&mut self, path: &Path, node: Node) {
        self.root = self.root.update_child(path, node);
    }

    /// The node at `path`, or the empty node if absent.
    pub fn get_node(&self, path: &Path) -> Node {
        self.root.get_child(path)
    }
}
