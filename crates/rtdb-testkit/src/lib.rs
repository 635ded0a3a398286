#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
//! An in-memory [`MockTransport`] standing in for the real persistent
//! connection / read-only REST transport (both out of scope — `spec.md`
//! §1). Test code drives the engine, then completes whichever calls it
//! cares about with a scripted [`rtdb_transport::AckStatus`].

use std::collections::HashMap;

use rtdb_core::{Path, Query, QueryTag};
use rtdb_transport::{AckStatus, CurrentHashFn, ListenCompletion, ServerActions, WriteCompletion};
use serde_json::Value;

/// One recorded call into the transport, in call order.
#[derive(Debug)]
pub enum Call {
    /// `listen(query, tag)`; `id` identifies the pending completion.
    Listen { id: u64, query: Query, tag: Option<QueryTag> },
    /// `unlisten(query, tag)`.
    Unlisten { query: Query, tag: Option<QueryTag> },
    /// `put(path, value)`; `id` identifies the pending completion.
    Put { id: u64, path: Path, value: Value },
    /// `merge(path, children)`; `id` identifies the pending completion.
    Merge { id: u64, path: Path, children: Value },
    /// `onDisconnectPut(path, value)`.
    OnDisconnectPut { id: u64, path: Path, value: Value },
    /// `onDisconnectMerge(path, children)`.
    OnDisconnectMerge { id: u64, path: Path, children: Value },
    /// `onDisconnectCancel(path)`.
    OnDisconnectCancel { id: u64, path: Path },
    /// `refreshAuthToken(token)`.
    RefreshAuthToken(Option<String>),
    /// `interrupt(reason)`.
    Interrupt(String),
    /// `resume(reason)`.
    Resume(String),
}

/// Records every call made against it and lets the test complete writes
/// and listens on demand, in any order.
#[derive(Default)]
pub struct MockTransport {
    /// Every call made so far, in order.
    pub calls: Vec<Call>,
    next_id: u64,
    pending_writes: HashMap<u64, WriteCompletion>,
    pending_listens: HashMap<u64, ListenCompletion>,
}

impl MockTransport {
    /// A fresh transport with nothing recorded yet.
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Fire the scripted status for a pending write call (`put`, `merge`,
    /// or any `onDisconnect*` registration).
    pub fn complete_write(&mut self, id: u64, status: AckStatus) {
        if let Some(cb) = self.pending_writes.remove(&id) {
            cb(status);
        }
    }

    /// Fire the scripted status (and optional payload) for a pending
    /// `listen` call.
    pub fn complete_listen(&mut self, id: u64, status: AckStatus, data: Option<Value>) {
        if let Some(cb) = self.pending_listens.remove(&id) {
            cb(status, data);
        }
    }

    /// The most recent call's id, for tests that immediately complete
    /// whatever they just triggered.
    pub fn last_call_id(&self) -> Option<u64> {
        self.calls.iter().rev().find_map(|c| match c {
            Call::Listen { id, .. }
            | Call::Put { id, .. }
            | Call::Merge { id, .. }
            | Call::OnDisconnectPut { id, .. }
            | Call::OnDisconnectMerge { id, .. }
            | Call::OnDisconnectCancel { id, .. } => Some(*id),
            _ => None,
        })
    }
}

impl ServerActions for MockTransport {
    fn listen(
        &mut self,
        query: Query,
        _current_hash_fn: CurrentHashFn,
        tag: Option<QueryTag>,
        on_complete: ListenCompletion,
    ) {
        let id = self.alloc_id();
        self.pending_listens.insert(id, on_complete);
        self.calls.push(Call::Listen { id, query, tag });
    }

    fn unlisten(&mut self, query: Query, tag: Option<QueryTag>) {
        self.calls.push(Call::Unlisten { query, tag });
    }

    fn put(&mut self, path: Path, exported_value: Value, on_complete: WriteCompletion) {
        let id = self.alloc_id();
        self.pending_writes.insert(id, on_complete);
        self.calls.push(Call::Put { id, path, value: exported_value });
    }

    fn merge(&mut self, path: Path, children: Value, on_complete: WriteCompletion) {
        let id = self.alloc_id();
        self.pending_writes.insert(id, on_complete);
        self.calls.push(Call::Merge { id, path, children });
    }

    fn on_disconnect_put(&mut self, path: Path, exported_value: Value, on_complete: WriteCompletion) {
        let id = self.alloc_id();
        self.pending_writes.insert(id, on_complete);
        self.calls.push(Call::OnDisconnectPut { id, path, value: exported_value });
    }

    fn on_disconnect_merge(&mut self, path: Path, children: Value, on_complete: WriteCompletion) {
        let id = self.alloc_id();
        self.pending_writes.insert(id, on_complete);
        self.calls.push(Call::OnDisconnectMerge { id, path, children });
    }

    fn on_disconnect_cancel(&mut self, path: Path, on_complete: WriteCompletion) {
        let id = self.alloc_id();
        self.pending_writes.insert(id, on_complete);
        self.calls.push(Call::OnDisconnectCancel { id, path });
    }

    fn refresh_auth_token(&mut self, token: Option<String>) {
        self.calls.push(Call::RefreshAuthToken(token));
    }

    fn interrupt(&mut self, reason: &str) {
        self.calls.push(Call::Interrupt(reason.to_string()));
    }

    fn resume(&mut self, reason: &str) {
        self.calls.push(Call::Resume(reason.to_string()));
    }

    fn id(&self) -> Option<&str> {
        Some("mock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn put_completes_with_scripted_status() {
        let mut t = MockTransport::new();
        let got = Rc::new(RefCell::new(None));
        let got2 = got.clone();
        t.put(Path::parse("/a"), Value::Null, Box::new(move |s| *got2.borrow_mut() = Some(s)));
        let id = t.last_call_id().unwrap();
        t.complete_write(id, AckStatus::Ok);
        assert_eq!(*got.borrow(), Some(AckStatus::Ok));
    }
}
