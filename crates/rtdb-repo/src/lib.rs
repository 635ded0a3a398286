#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
#![allow(clippy::too_many_arguments)]
//! The reconciliation engine: ties the server and `.info` sync trees, the
//! on-disconnect tree, and the event queue together into the single
//! `Repo` clients drive (`spec.md` §4.H). Construction, writes,
//! server-driven updates, connection lifecycle, on-disconnect, and
//! diagnostics all live here; filtered-query evaluation, transactions,
//! and persistence are external collaborators this crate only hooks into.

mod deferred;
mod error;
mod repo;
mod stats;
mod transaction;

pub use error::RepoError;
pub use repo::{CompletionCallback, QueryRegistration, Repo};
pub use stats::StatsCollector;
pub use transaction::{NoopTransactionCoordinator, TransactionCoordinator};
