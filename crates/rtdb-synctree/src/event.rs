use rtdb_core::{Node, Path};

use crate::registration::RegistrationId;

/// The payload of one notification. `spec.md` leaves "event list"
/// abstract (§3); this is the concrete shape a realtime-database client is
/// known to deliver. `ChildMoved` is intentionally absent — priority-order
/// ranking is out of scope (`SPEC_FULL.md` §C.1).
#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    /// The complete node at the registration's path changed.
    ValueChanged(Node),
    /// A direct child appeared that wasn't there before.
    ChildAdded { key: String, node: Node },
    /// A direct child's value changed.
    ChildChanged { key: String, node: Node },
    /// A direct child disappeared.
    ChildRemoved { key: String, node: Node },
    /// The registration was torn down by the tree itself (e.g. a server
    /// rejection), rather than by the caller removing it. `spec.md` §4.H.7
    /// notes the engine's own `removeEventCallbackForQuery` never raises
    /// a cancel — this variant exists for the tree to use if a future
    /// access-control layer needs it.
    Cancel { reason: String },
}

/// One notification, tagged with the registration it's for and the path
/// that registration was made at.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Which registration this event is for.
    pub registration_id: RegistrationId,
    /// The path the registration listens at.
    pub path: Path,
    /// The notification itself.
    pub kind: EventKind,
}
