#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
//! External collaborators the reconciliation engine talks to but does not
//! own: the `ServerActions` transport interface, the auth-token listener
//! seam, repository/app configuration, and the crawler heuristic used to
//! pick the read-only transport at construction (`spec.md` §1, §6).

mod auth;
mod config;
mod crawler;
mod server_actions;
mod status;

pub use auth::AuthTokenProvider;
pub use config::{DatabaseAuthVariableOverride, RepoInfo};
pub use crawler::is_being_crawled;
pub use server_actions::{CurrentHashFn, ListenCompletion, ServerActions, WriteCompletion};
pub use status::AckStatus;

pub use rtdb_core::{Error, QueryTag};
