use rtdb_core::{Query, QueryTag};

/// Signals that the aggregate listener set at a query just transitioned
/// between "nobody's listening" and "somebody is" (`spec.md` §3:
/// "Invokes injected `startListening`/`stopListening`... when the
/// aggregate listener set at a query changes").
///
/// The spec frames this as an injected callback hook, but the concrete
/// action (calling `transport.listen`, or applying the `.info` snapshot
/// immediately) needs sibling engine state the tree itself doesn't own —
/// the transport, the snapshot holder, the deferred-turn queue. Rather
/// than thread an `Rc<RefCell<..>>` back into the tree to get at that
/// state (and risk a reentrant double-borrow, since these fire from
/// inside `add_event_registration`/`remove_event_registration`), the tree
/// just records the intent and the engine drains it once the call that
/// produced it has returned. Same signalling contract, pull instead of
/// push.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ListenIntent {
    /// The first registration for this `(path, tag)` was just added.
    Start { query: Query, tag: Option<QueryTag> },
    /// The last registration for this `(path, tag)` was just removed.
    Stop { query: Query, tag: Option<QueryTag> },
}
