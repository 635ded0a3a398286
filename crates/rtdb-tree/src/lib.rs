#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
//! Path-indexed containers: [`SparseSnapshotTree`] (used for the
//! on-disconnect tree) and [`SnapshotHolder`] (used for the `.info`
//! subtree).

mod snapshot_holder;
mod sparse_snapshot_tree;

pub use snapshot_holder::SnapshotHolder;
pub use sparse_snapshot_tree::SparseSnapshotTree;
