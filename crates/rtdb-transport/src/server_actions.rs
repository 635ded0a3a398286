use rtdb_core::{Path, Query, QueryTag};

use crate::status::AckStatus;

/// Invoked exactly once when a write (`put`/`merge`/on-disconnect
/// registration) is acknowledged.
pub type WriteCompletion = Box<dyn FnOnce(AckStatus)>;

/// Invoked exactly once when a `listen` call completes its initial sync;
/// `data` is the server's full payload for the query when present.
pub type ListenCompletion = Box<dyn FnOnce(AckStatus, Option<serde_json::Value>)>;

/// Computes a content hash of whatever the engine currently believes is
/// cached for a query, so the transport can ask the server for only the
/// delta on reconnect.
pub type CurrentHashFn = Box<dyn Fn() -> String>;

/// The transport interface the engine drives (`spec.md` §6). Production
/// implementations (a persistent duplex connection, and a read-only REST
/// fallback used for crawlers) are external collaborators — out of scope
/// here, referenced only by this trait. `rtdb-testkit` provides an
/// in-memory double for tests.
///
/// No method borrows `&mut self` across a callback: every mutation the
/// transport needs to do in response happens before it invokes the
/// completion, matching the single-threaded, non-reentrant model in
/// `spec.md` §5.
pub trait ServerActions {
    /// Start listening at `query`, optionally scoped to `tag` for a
    /// filtered query. `on_complete` fires once, with the initial sync
    /// result.
    fn listen(
        &mut self,
        query: Query,
        current_hash_fn: CurrentHashFn,
        tag: Option<QueryTag>,
        on_complete: ListenCompletion,
    );

    /// Stop listening at `query` (optionally scoped to `tag`).
    fn unlisten(&mut self, query: Query, tag: Option<QueryTag>);

    /// Overwrite the value at `path` with `exported_value` (a `Node::val`
    /// rendered with `export = true`).
    fn put(&mut self, path: Path, exported_value: serde_json::Value, on_complete: WriteCompletion);

    /// Merge `children` into the value at `path`.
    fn merge(&mut self, path: Path, children: serde_json::Value, on_complete: WriteCompletion);

    /// Register a put the server applies if this session disconnects.
    fn on_disconnect_put(
        &mut self,
        path: Path,
        exported_value: serde_json::Value,
        on_complete: WriteCompletion,
    );

    /// Register a merge the server applies if this session disconnects.
    fn on_disconnect_merge(
        &mut self,
        path: Path,
        children: serde_json::Value,
        on_complete: WriteCompletion,
    );

    /// Cancel whatever on-disconnect action is registered at `path`.
    fn on_disconnect_cancel(&mut self, path: Path, on_complete: WriteCompletion);

    /// Forward a refreshed auth token (or `None` on sign-out) to the
    /// transport.
    fn refresh_auth_token(&mut self, token: Option<String>);

    /// Pause the persistent connection. A no-op on the read-only
    /// transport.
    fn interrupt(&mut self, reason: &str);

    /// Resume a previously interrupted persistent connection.
    fn resume(&mut self, reason: &str);

    /// Stable identifier for this transport instance, used to prefix log
    /// lines (`spec.md` §4.H.9, `log_`). `None` before the transport has
    /// assigned itself one.
    fn id(&self) -> Option<&str> {
        None
    }
}
