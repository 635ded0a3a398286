use rtdb_core::Path;

/// External collaborator the engine expects to be installed at
/// construction (`spec.md` §9: "the engine exposes two hooks ...
/// and expects an external module to install them"). The transaction
/// subsystem itself is a Non-goal; only this seam is implemented.
pub trait TransactionCoordinator {
    /// Abort any pending transactions that overlap `path`, returning the
    /// affected path (the nearest common ancestor of whatever was
    /// aborted, or `path` itself if nothing was).
    fn abort_transactions(&mut self, path: &Path) -> Path;

    /// Re-run any transactions queued at or above `path` against the
    /// current tree state, returning the affected path.
    fn rerun_transactions(&mut self, path: &Path) -> Path;
}

/// Identity stub: no transactions exist, so both hooks are no-ops that
/// return their input unchanged (`spec.md` §9: "Tests may stub these
/// with identity functions").
#[derive(Default)]
pub struct NoopTransactionCoordinator;

impl TransactionCoordinator for NoopTransactionCoordinator {
    fn abort_transactions(&mut self, path: &Path) -> Path {
        path.clone()
    }

    fn rerun_transactions(&mut self, path: &Path) -> Path {
        path.clone()
    }
}
