#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
//! The sync tree overlay: a server cache plus an ordered list of pending
//! user writes, fused on read and diffed on write to produce the event
//! deltas registered listeners see (`spec.md` §3, "SyncTree").

mod event;
mod listen_provider;
mod registration;
mod sync_tree;
mod write_tree;

pub use event::{Event, EventKind};
pub use listen_provider::ListenIntent;
pub use registration::RegistrationId;
pub use sync_tree::{SharedCallback, SyncTree};
pub use write_tree::WriteRecord;
