/// A continuation scheduled for "the next scheduler turn" rather than run
/// inline (`spec.md` §5: "a 'next-turn' primitive (minimal deferral)").
/// [`crate::Repo::tick`] drains these; every public entry point calls it
/// after finishing its own work, which is the minimal faithful model of
/// "a zero-delay task enqueue on the same executor" for an engine that
/// otherwise never blocks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum DeferredEffect {
    /// The read-only transport path synthesizes `connected=true` before
    /// the first turn runs (`spec.md` §4.H.1, §8 invariant 6).
    SyntheticConnect,
    /// The info tree's `startListening` hook applied an existing `.info`
    /// snapshot synchronously and owes a deferred `onComplete("ok")`
    /// (`spec.md` §4.H.1). Nothing in this contract consumes that
    /// completion — `addEventCallbackForQuery` only returns events — so
    /// this exists purely to preserve the scheduling shape; draining it
    /// is an inert trace event.
    InfoListenAck,
}
