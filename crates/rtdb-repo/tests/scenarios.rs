//! End-to-end scenarios against the public `Repo` API, driven entirely
//! through an in-memory transport double — no real network I/O.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Map, Value};

use rtdb_core::{Path, Query};
use rtdb_repo::{NoopTransactionCoordinator, Repo, RepoError};
use rtdb_synctree::{Event, EventKind};
use rtdb_testkit::{Call, MockTransport};
use rtdb_transport::{AckStatus, AuthTokenProvider, CurrentHashFn, ListenCompletion, QueryTag, RepoInfo, ServerActions, WriteCompletion};

struct NoopAuthProvider;

impl AuthTokenProvider for NoopAuthProvider {
    fn add_token_change_listener(&mut self, _listener: Box<dyn FnMut(Option<String>)>) {}
}

/// Delegates every call to a shared [`MockTransport`] so the test retains
/// a handle to script acks after handing a `Box<dyn ServerActions>` to
/// [`Repo::new`].
#[derive(Clone)]
struct SharedTransport(Rc<RefCell<MockTransport>>);

impl SharedTransport {
    fn new() -> Self {
        SharedTransport(Rc::new(RefCell::new(MockTransport::new())))
    }

    fn last_call_id(&self) -> u64 {
        self.0.borrow().last_call_id().expect("a call was made")
    }

    fn complete_write(&self, id: u64, status: AckStatus) {
        self.0.borrow_mut().complete_write(id, status);
    }

    fn complete_listen(&self, id: u64, status: AckStatus, data: Option<Value>) {
        self.0.borrow_mut().complete_listen(id, status, data);
    }

    fn call_count(&self) -> usize {
        self.0.borrow().calls.len()
    }

    fn calls<R>(&self, f: impl FnOnce(&[Call]) -> R) -> R {
        f(&self.0.borrow().calls)
    }
}

impl ServerActions for SharedTransport {
    fn listen(&mut self, query: Query, current_hash_fn: CurrentHashFn, tag: Option<QueryTag>, on_complete: ListenCompletion) {
        self.0.borrow_mut().listen(query, current_hash_fn, tag, on_complete)
    }

    fn unlisten(&mut self, query: Query, tag: Option<QueryTag>) {
        self.0.borrow_mut().unlisten(query, tag)
    }

    fn put(&mut self, path: Path, exported_value: Value, on_complete: WriteCompletion) {
        self.0.borrow_mut().put(path, exported_value, on_complete)
    }

    fn merge(&mut self, path: Path, children: Value, on_complete: WriteCompletion) {
        self.0.borrow_mut().merge(path, children, on_complete)
    }

    fn on_disconnect_put(&mut self, path: Path, exported_value: Value, on_complete: WriteCompletion) {
        self.0.borrow_mut().on_disconnect_put(path, exported_value, on_complete)
    }

    fn on_disconnect_merge(&mut self, path: Path, children: Value, on_complete: WriteCompletion) {
        self.0.borrow_mut().on_disconnect_merge(path, children, on_complete)
    }

    fn on_disconnect_cancel(&mut self, path: Path, on_complete: WriteCompletion) {
        self.0.borrow_mut().on_disconnect_cancel(path, on_complete)
    }

    fn refresh_auth_token(&mut self, token: Option<String>) {
        self.0.borrow_mut().refresh_auth_token(token)
    }

    fn interrupt(&mut self, reason: &str) {
        self.0.borrow_mut().interrupt(reason)
    }

    fn resume(&mut self, reason: &str) {
        self.0.borrow_mut().resume(reason)
    }
}

fn test_repo_info() -> RepoInfo {
    RepoInfo { host: "db.example.com".into(), namespace: "my-db".into(), secure: true }
}

fn build_repo(force_rest: bool) -> (Repo, SharedTransport) {
    let transport = SharedTransport::new();
    let repo = Repo::new(
        test_repo_info(),
        Value::Null,
        "Mozilla/5.0 (test harness)",
        force_rest,
        Box::new(NoopAuthProvider),
        Box::new(transport.clone()),
        Box::new(NoopTransactionCoordinator),
    )
    .expect("construction with a null auth override must succeed");
    (repo, transport)
}

fn listen(repo: &Repo, path: &str) -> Rc<RefCell<Vec<Event>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen2 = seen.clone();
    repo.add_event_callback_for_query(
        Query::default_at(Path::parse(path)),
        Box::new(move |e: &Event| seen2.borrow_mut().push(e.clone())),
    );
    seen
}

fn last_value(events: &Rc<RefCell<Vec<Event>>>) -> Option<Value> {
    events.borrow().iter().rev().find_map(|e| match &e.kind {
        EventKind::ValueChanged(node) => Some(node.val(false)),
        _ => None,
    })
}

// S1. Optimistic set, server acks ok.
#[test]
fn optimistic_set_then_server_ack_ok() {
    let (repo, transport) = build_repo(false);
    let events = listen(&repo, "/a/b");

    let result = Rc::new(RefCell::new(None));
    let result2 = result.clone();
    repo.set_with_priority(
        Path::parse("/a/b"),
        json!(5),
        None,
        Some(Box::new(move |r| *result2.borrow_mut() = Some(r))),
    );

    assert_eq!(last_value(&events), Some(json!(5)));
    transport.calls(|calls| assert!(matches!(calls.last(), Some(Call::Put { .. }))));

    let id = transport.last_call_id();
    let before = events.borrow().len();
    transport.complete_write(id, AckStatus::Ok);

    assert!(matches!(result.borrow().as_ref(), Some(Ok(()))));
    assert_eq!(events.borrow().len(), before, "an ok ack with nothing to clear raises nothing further");
}

// S2. Optimistic set, server rejects.
#[test]
fn optimistic_set_then_server_rejects() {
    let (repo, transport) = build_repo(false);
    let events = listen(&repo, "/a/b");
    repo.update(Path::parse("/a"), {
        let mut m = Map::new();
        m.insert("b".into(), json!(1));
        m
    }, None);
    // establish a prior server value so the revert is observable
    repo.on_data_update(Path::parse("/a/b"), json!(1), false, None);

    let result = Rc::new(RefCell::new(None));
    let result2 = result.clone();
    repo.set_with_priority(
        Path::parse("/a/b"),
        json!(5),
        None,
        Some(Box::new(move |r| *result2.borrow_mut() = Some(r))),
    );
    assert_eq!(last_value(&events), Some(json!(5)));

    let id = transport.last_call_id();
    transport.complete_write(id, AckStatus::Error { code: "permission_denied".into(), reason: Some("write denied".into()) });

    assert_eq!(last_value(&events), Some(json!(1)), "ack rejection restores the prior server value");
    match result.borrow_mut().take() {
        Some(Err(e)) => {
            assert_eq!(e.code(), Some("PERMISSION_DENIED"));
            assert_eq!(e.to_string(), "PERMISSION_DENIED: write denied");
        }
        other => panic!("expected a rejected write, got {other:?}"),
    }
}

// S3. Server overwrite while a write is pending shadows it until ack.
#[test]
fn pending_write_shadows_server_overwrite_until_ack() {
    let (repo, transport) = build_repo(false);
    let events = listen(&repo, "/a");

    repo.set_with_priority(Path::parse("/a"), json!({"x": 1}), None, None);
    assert_eq!(last_value(&events), Some(json!({"x": 1})));

    repo.on_data_update(Path::parse("/a"), json!({"x": 2}), false, None);
    assert_eq!(last_value(&events), Some(json!({"x": 1})), "user write still shadows the server overwrite");

    let id = transport.last_call_id();
    transport.complete_write(id, AckStatus::Ok);
    assert_eq!(last_value(&events), Some(json!({"x": 2})), "ack clears the write, exposing the server value");
}

// S4. Disconnect flushes the on-disconnect tree.
#[test]
fn disconnect_flushes_on_disconnect_tree() {
    let (repo, transport) = build_repo(false);
    let info_events = listen(&repo, "/.info/connected");
    let p_events = listen(&repo, "/p");

    let result = Rc::new(RefCell::new(None));
    let result2 = result.clone();
    repo.on_disconnect_set(Path::parse("/p"), json!("bye"), Some(Box::new(move |r| *result2.borrow_mut() = Some(r))));
    let id = transport.last_call_id();
    transport.complete_write(id, AckStatus::Ok);
    assert!(matches!(result.borrow().as_ref(), Some(Ok(()))));

    repo.on_connect_status(false);

    assert_eq!(last_value(&info_events), Some(json!(false)));
    assert_eq!(last_value(&p_events), Some(json!("bye")));
}

// S5. Empty update is a no-op.
#[test]
fn empty_update_is_a_no_op() {
    let (repo, transport) = build_repo(false);
    let events = listen(&repo, "/x");
    let before_calls = transport.call_count();

    let result = Rc::new(RefCell::new(None));
    let result2 = result.clone();
    repo.update(Path::parse("/x"), Map::new(), Some(Box::new(move |r| *result2.borrow_mut() = Some(r))));

    assert!(matches!(result.borrow().as_ref(), Some(Ok(()))));
    assert_eq!(transport.call_count(), before_calls, "no transport call for an empty update");
    assert!(events.borrow().is_empty(), "no events for an empty update");
}

// S6. Auth override invalid.
#[test]
fn invalid_auth_override_fails_construction() {
    let transport = SharedTransport::new();
    let err = Repo::new(
        test_repo_info(),
        json!(42),
        "test-agent",
        false,
        Box::new(NoopAuthProvider),
        Box::new(transport),
        Box::new(NoopTransactionCoordinator),
    )
    .unwrap_err();
    assert!(matches!(err, RepoError::InvalidConfig(_)));
}

// Invariant 4: info idempotence.
#[test]
fn repeated_identical_info_update_raises_once() {
    let (repo, _transport) = build_repo(false);
    let events = listen(&repo, "/.info/connected");
    let before = events.borrow().len();

    repo.on_server_info_update(vec![("connected".to_string(), json!(true))]);
    let after_first = events.borrow().len();
    assert!(after_first > before);

    repo.on_server_info_update(vec![("connected".to_string(), json!(true))]);
    assert_eq!(events.borrow().len(), after_first, "identical info update raises no further events");
}

// Invariant 5: on-disconnect round-trip (set then cancel) leaves nothing
// pending.
#[test]
fn on_disconnect_set_then_cancel_round_trips() {
    let (repo, transport) = build_repo(false);

    repo.on_disconnect_set(Path::parse("/p"), json!("bye"), None);
    transport.complete_write(transport.last_call_id(), AckStatus::Ok);

    repo.on_disconnect_cancel(Path::parse("/p"), None);
    transport.complete_write(transport.last_call_id(), AckStatus::Ok);

    // A subsequent disconnect must not replay the cancelled value.
    let events = listen(&repo, "/p");
    repo.on_connect_status(false);
    assert!(events.borrow().is_empty());
}

// Invariant 6: crawler/force-rest mode delivers connected=true exactly
// once, before any user callback can have been registered.
#[test]
fn force_rest_synthesizes_connected_before_any_registration() {
    let (repo, _transport) = build_repo(true);
    let events = listen(&repo, "/.info/connected");
    // The synthetic connect already fired during construction; a fresh
    // registration sees the settled value as its initial event only.
    assert_eq!(last_value(&events), Some(json!(true)));
    assert_eq!(events.borrow().len(), 1);
}

#[test]
fn interrupt_and_resume_are_forwarded_unless_read_only() {
    let (repo, transport) = build_repo(false);
    repo.interrupt();
    repo.resume();
    transport.calls(|calls| {
        assert!(matches!(calls[0], Call::Interrupt(_)));
        assert!(matches!(calls[1], Call::Resume(_)));
    });

    let (read_only_repo, read_only_transport) = build_repo(true);
    let before = read_only_transport.call_count();
    read_only_repo.interrupt();
    read_only_repo.resume();
    assert_eq!(read_only_transport.call_count(), before, "read-only transport never sees interrupt/resume");
}

#[test]
fn data_update_count_increments_once_per_call() {
    let (repo, _transport) = build_repo(false);
    assert_eq!(repo.data_update_count(), 0);
    repo.on_data_update(Path::parse("/a"), json!(1), false, None);
    repo.on_data_update(Path::parse("/b"), json!(2), false, None);
    assert_eq!(repo.data_update_count(), 2);
}
