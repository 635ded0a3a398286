use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use serde_json::{Map, Value};

use rtdb_core::{resolve_deferred_value, Node, Path, Query, ServerValues, WriteId, WriteIdAllocator};
use rtdb_queue::{call_guarded, EventQueue};
use rtdb_synctree::{Event, ListenIntent, RegistrationId, SharedCallback, SyncTree};
use rtdb_transport::{
    is_being_crawled, AckStatus, AuthTokenProvider, CurrentHashFn, DatabaseAuthVariableOverride, ListenCompletion,
    RepoInfo, ServerActions,
};
use rtdb_tree::{SnapshotHolder, SparseSnapshotTree};

use crate::deferred::DeferredEffect;
use crate::error::RepoError;
use crate::stats::StatsCollector;
use crate::transaction::TransactionCoordinator;

/// A completion callback in the shape `spec.md` §4.H.8 describes:
/// `Ok(())` on `"ok"`, `Err` carrying the `CODE[: reason]` error otherwise.
pub type CompletionCallback = Box<dyn FnOnce(Result<(), RepoError>)>;

/// Which overlay tree a query or event belongs to — the `.info` subtree
/// or the real server-backed tree (`spec.md` §4.H.7, "route by
/// `query.path.front()`").
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Tree {
    Info,
    Server,
}

/// An event tagged with which tree produced it, so one shared
/// [`EventQueue`] can dispatch correctly despite `rtdb-synctree`'s
/// [`RegistrationId`]s being scoped per tree (`spec.md` §9: "the engine's
/// single-threaded scheduler processes commands and completions from one
/// queue").
#[derive(Clone, Debug)]
struct TreeEvent {
    tree: Tree,
    event: Event,
}

/// Invoke each collected `(callback, event)` pair. Called only after the
/// engine's `RefCell` borrow that produced the pairs has been dropped, so a
/// callback reentering the engine finds its state free to borrow. Each
/// invocation is still panic-isolated independently via `call_guarded`.
fn dispatch_pending(pending: Vec<(SharedCallback, Event)>) {
    for (callback, event) in pending {
        call_guarded("event_registration", || (callback.borrow_mut())(&event));
    }
}

/// A handle returned by [`Repo::add_event_callback_for_query`], opaque to
/// callers, needed to later call [`Repo::remove_event_callback_for_query`].
pub struct QueryRegistration {
    tree: Tree,
    query: Query,
    id: RegistrationId,
}

struct RepoState {
    info: RepoInfo,
    auth_override: DatabaseAuthVariableOverride,
    read_only: bool,
    transport: Box<dyn ServerActions>,
    write_ids: WriteIdAllocator,
    server_tree: SyncTree,
    info_tree: SyncTree,
    info_data: SnapshotHolder,
    on_disconnect: SparseSnapshotTree,
    event_queue: EventQueue<TreeEvent>,
    transactions: Box<dyn TransactionCoordinator>,
    deferred: VecDeque<DeferredEffect>,
    stats: StatsCollector,
    data_update_count: u64,
    intercept: Option<Box<dyn FnMut(Value) -> Value>>,
}

impl RepoState {
    fn server_values(&self) -> ServerValues {
        ServerValues { timestamp: now_millis() + self.info_server_time_offset() }
    }

    fn info_server_time_offset(&self) -> i64 {
        match self.info_data.get_node(&Path::parse("/.info/serverTimeOffset")).val(false) {
            Value::Number(n) => n.as_i64().unwrap_or(0),
            _ => 0,
        }
    }
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn object_to_children(value: &Value) -> BTreeMap<Arc<str>, Node> {
    match value {
        Value::Object(map) => map.iter().map(|(k, v)| (Arc::from(k.as_str()), Node::from_json(v))).collect(),
        _ => BTreeMap::new(),
    }
}

fn resolve_on_disconnect_tree(tree: &SparseSnapshotTree, values: &ServerValues) -> Vec<(Path, Node)> {
    let mut out = Vec::new();
    tree.for_each_tree(&Path::empty(), &mut |path, node| {
        out.push((path.clone(), resolve_deferred_value(node, values)));
    });
    out
}

/// The reconciliation engine itself (`spec.md` §4.H): owns the server and
/// `.info` sync trees, the pending on-disconnect tree, the event queue,
/// and the transport. Cheap to clone — every clone shares the same
/// underlying state, which is how completion callbacks (necessarily
/// `'static`, since they're boxed and handed to the transport) call back
/// into the engine without the engine borrowing itself across the call
/// (`spec.md` §9, "Cyclic references ... break the cycle").
pub struct Repo(Rc<RefCell<RepoState>>);

impl Clone for Repo {
    fn clone(&self) -> Self {
        Repo(self.0.clone())
    }
}

impl Repo {
    /// Construct the engine (`spec.md` §4.H.1).
    ///
    /// `transport` and `auth_provider` are already-built external
    /// collaborators (constructing the real persistent connection or
    /// read-only REST transport is out of scope — `spec.md` §1); `Repo`
    /// decides only whether the read-only path applies, via `force_rest`
    /// or the crawler heuristic on `user_agent`, and schedules the
    /// synthetic connect event accordingly.
    pub fn new(
        info: RepoInfo,
        auth_override: Value,
        user_agent: &str,
        force_rest: bool,
        mut auth_provider: Box<dyn AuthTokenProvider>,
        transport: Box<dyn ServerActions>,
        transactions: Box<dyn TransactionCoordinator>,
    ) -> Result<Repo, RepoError> {
        let auth_override = DatabaseAuthVariableOverride::from_value(auth_override)?;
        let read_only = force_rest || is_being_crawled(user_agent);

        let state = RepoState {
            info,
            auth_override,
            read_only,
            transport,
            write_ids: WriteIdAllocator::new(),
            server_tree: SyncTree::new(),
            info_tree: SyncTree::new(),
            info_data: SnapshotHolder::new(),
            on_disconnect: SparseSnapshotTree::new(),
            event_queue: EventQueue::new(),
            transactions,
            deferred: VecDeque::new(),
            stats: StatsCollector::default(),
            data_update_count: 0,
            intercept: None,
        };
        let repo = Repo(Rc::new(RefCell::new(state)));

        let forwarder = repo.clone();
        auth_provider.add_token_change_listener(Box::new(move |token| {
            forwarder.0.borrow_mut().transport.refresh_auth_token(token);
        }));

        repo.log("stats reporter registration skipped: no remote collector configured in this workspace");

        repo.update_info("connected", Value::Bool(false));

        if read_only {
            repo.0.borrow_mut().deferred.push_back(DeferredEffect::SyntheticConnect);
        }
        repo.tick();

        Ok(repo)
    }

    // ---- 4.H.2 Write operations -----------------------------------

    /// `setWithPriority(path, value, priority, onComplete)`.
    ///
    /// The optimistic events from the user overwrite are queued, not
    /// raised, until after `transport.put` has been invoked — then
    /// flushed synchronously with an empty drain so listeners see the
    /// new value before this call returns, but only after any
    /// transaction-manager side effects at `path` have composed
    /// (`spec.md` §4.H.2, "Ordering rule").
    pub fn set_with_priority(
        &self,
        path: Path,
        value: Value,
        priority: Option<Value>,
        on_complete: Option<CompletionCallback>,
    ) {
        let unresolved = Node::from_json(&value).with_priority(
            priority.map(|p| Node::from_json(&p)).unwrap_or_default(),
        );
        let write_id;
        let events;
        {
            let mut state = self.0.borrow_mut();
            let values = state.server_values();
            let resolved = resolve_deferred_value(&unresolved, &values);
            write_id = state.write_ids.next();
            events = state.server_tree.apply_user_overwrite(&path, resolved, write_id, true);
        }
        self.queue_only(Tree::Server, path.clone(), events);

        let repo = self.clone();
        let cb_path = path.clone();
        let exported = unresolved.val(true);
        self.0.borrow_mut().transport.put(
            path.clone(),
            exported,
            Box::new(move |status| repo.handle_write_ack(cb_path, write_id, status, on_complete)),
        );

        let affected = {
            let mut state = self.0.borrow_mut();
            let aborted = state.transactions.abort_transactions(&path);
            state.transactions.rerun_transactions(&aborted)
        };
        self.raise(Tree::Server, affected, Vec::new());
    }

    /// `update(path, childrenToMerge, onComplete)`. Same synchronous-flush
    /// ordering as [`Self::set_with_priority`].
    pub fn update(&self, path: Path, children_to_merge: Map<String, Value>, on_complete: Option<CompletionCallback>) {
        if children_to_merge.is_empty() {
            self.log("update() called with no children; treated as a no-op");
            self.deliver_completion(AckStatus::Ok, on_complete);
            return;
        }

        let write_id;
        let events;
        let mut changed_children: BTreeMap<Arc<str>, Node> = BTreeMap::new();
        let mut unresolved_children = Map::new();
        {
            let mut state = self.0.borrow_mut();
            let values = state.server_values();
            for (key, value) in &children_to_merge {
                let unresolved = Node::from_json(value);
                let resolved = resolve_deferred_value(&unresolved, &values);
                changed_children.insert(Arc::from(key.as_str()), resolved);
                unresolved_children.insert(key.clone(), unresolved.val(true));
            }
            write_id = state.write_ids.next();
            events = state.server_tree.apply_user_merge(&path, changed_children.clone(), write_id);
        }
        self.queue_only(Tree::Server, path.clone(), events);

        let repo = self.clone();
        let cb_path = path.clone();
        self.0.borrow_mut().transport.merge(
            path.clone(),
            Value::Object(unresolved_children),
            Box::new(move |status| repo.handle_merge_ack(cb_path, write_id, status, on_complete)),
        );

        for key in changed_children.keys() {
            let child_path = path.child(key.clone());
            let mut state = self.0.borrow_mut();
            let aborted = state.transactions.abort_transactions(&child_path);
            state.transactions.rerun_transactions(&aborted);
        }
        self.raise(Tree::Server, path, Vec::new());
    }

    fn handle_write_ack(
        &self,
        path: Path,
        write_id: WriteId,
        status: AckStatus,
        on_complete: Option<CompletionCallback>,
    ) {
        let success = status.is_ok();
        if !success {
            self.log(&format!("write {write_id} rejected: {status:?}"));
        }
        let clear_events = {
            let mut state = self.0.borrow_mut();
            state.server_tree.ack_user_write(write_id, !success)
        };
        self.raise(Tree::Server, path, clear_events);
        self.deliver_completion(status, on_complete);
    }

    fn handle_merge_ack(
        &self,
        path: Path,
        write_id: WriteId,
        status: AckStatus,
        on_complete: Option<CompletionCallback>,
    ) {
        let success = status.is_ok();
        if !success {
            self.log(&format!("merge {write_id} rejected: {status:?}"));
        }
        let clear_events = {
            let mut state = self.0.borrow_mut();
            state.server_tree.ack_user_write(write_id, !success)
        };
        let affected = if !clear_events.is_empty() {
            let mut state = self.0.borrow_mut();
            state.transactions.rerun_transactions(&path)
        } else {
            path.clone()
        };
        self.raise(Tree::Server, affected, clear_events);
        self.deliver_completion(status, on_complete);
    }

    // ---- 4.H.3 Server-driven updates --------------------------------

    /// `onDataUpdate_(pathString, data, isMerge, tag)`.
    pub fn on_data_update(&self, path: Path, data: Value, is_merge: bool, tag: Option<rtdb_core::QueryTag>) {
        let mut state = self.0.borrow_mut();
        state.data_update_count += 1;
        let data = match &mut state.intercept {
            Some(intercept) => intercept(data),
            None => data,
        };
        let events = match (tag, is_merge) {
            (Some(t), true) => {
                let children = object_to_children(&data);
                state.server_tree.apply_tagged_query_merge(&path, &children, t)
            }
            (Some(t), false) => state.server_tree.apply_tagged_query_overwrite(&path, Node::from_json(&data), t),
            (None, true) => {
                let children = object_to_children(&data);
                state.server_tree.apply_server_merge(&path, &children)
            }
            (None, false) => state.server_tree.apply_server_overwrite(&path, Node::from_json(&data)),
        };
        let affected = if !events.is_empty() {
            state.transactions.rerun_transactions(&path)
        } else {
            path.clone()
        };
        drop(state);
        self.raise(Tree::Server, affected, events);
    }

    /// Test/diagnostic hook: how many times [`Self::on_data_update`] has
    /// run (`spec.md` §4.H.3, "test hook").
    pub fn data_update_count(&self) -> u64 {
        self.0.borrow().data_update_count
    }

    // ---- 4.H.4 Connection lifecycle ---------------------------------

    /// `onConnectStatus_(connected)`.
    pub fn on_connect_status(&self, connected: bool) {
        self.handle_connect_status(connected);
        self.tick();
    }

    fn handle_connect_status(&self, connected: bool) {
        self.update_info("connected", Value::Bool(connected));
        if !connected {
            self.run_on_disconnect_events();
        }
    }

    /// `onServerInfoUpdate_(updates)`.
    pub fn on_server_info_update(&self, updates: Vec<(String, Value)>) {
        for (key, value) in updates {
            self.update_info(&key, value);
        }
        self.tick();
    }

    fn update_info(&self, relative_path: &str, value: Value) {
        let path = Path::parse("/.info").child_path(&Path::parse(relative_path));
        let node = Node::from_json(&value);
        let events = {
            let mut state = self.0.borrow_mut();
            state.info_data.update_snapshot(&path, node.clone());
            state.info_tree.apply_server_overwrite(&path, node)
        };
        self.raise(Tree::Info, path, events);
    }

    const INTERRUPT_REASON: &'static str = "repo_interrupt";
    const RESUME_REASON: &'static str = "repo_resume";

    /// `interrupt()`: forward to the transport with a fixed reason,
    /// unless this engine is on the read-only path.
    pub fn interrupt(&self) {
        let mut state = self.0.borrow_mut();
        if !state.read_only {
            state.transport.interrupt(Self::INTERRUPT_REASON);
        }
    }

    /// `resume()`: the idempotent counterpart of [`Self::interrupt`].
    pub fn resume(&self) {
        let mut state = self.0.borrow_mut();
        if !state.read_only {
            state.transport.resume(Self::RESUME_REASON);
        }
    }

    // ---- 4.H.5 OnDisconnect subsystem --------------------------------

    /// `onDisconnectCancel(path, onComplete)`.
    pub fn on_disconnect_cancel(&self, path: Path, on_complete: Option<CompletionCallback>) {
        let repo = self.clone();
        let cb_path = path.clone();
        self.0.borrow_mut().transport.on_disconnect_cancel(
            path,
            Box::new(move |status| {
                if status.is_ok() {
                    repo.0.borrow_mut().on_disconnect.forget(&cb_path);
                }
                repo.deliver_completion(status, on_complete);
            }),
        );
    }

    /// `onDisconnectSet(path, value, onComplete)`.
    pub fn on_disconnect_set(&self, path: Path, value: Value, on_complete: Option<CompletionCallback>) {
        self.on_disconnect_set_with_priority(path, value, None, on_complete);
    }

    /// `onDisconnectSetWithPriority(path, value, priority, onComplete)`.
    pub fn on_disconnect_set_with_priority(
        &self,
        path: Path,
        value: Value,
        priority: Option<Value>,
        on_complete: Option<CompletionCallback>,
    ) {
        let node =
            Node::from_json(&value).with_priority(priority.map(|p| Node::from_json(&p)).unwrap_or_default());
        let exported = node.val(true);
        let repo = self.clone();
        let cb_path = path.clone();
        let cb_node = node.clone();
        self.0.borrow_mut().transport.on_disconnect_put(
            path,
            exported,
            Box::new(move |status| {
                if status.is_ok() {
                    repo.0.borrow_mut().on_disconnect.remember(&cb_path, cb_node);
                }
                repo.deliver_completion(status, on_complete);
            }),
        );
    }

    /// `onDisconnectUpdate(path, children, onComplete)`.
    pub fn on_disconnect_update(&self, path: Path, children: Map<String, Value>, on_complete: Option<CompletionCallback>) {
        if children.is_empty() {
            self.deliver_completion(AckStatus::Ok, on_complete);
            return;
        }
        let repo = self.clone();
        let cb_path = path.clone();
        let cb_children = children.clone();
        self.0.borrow_mut().transport.on_disconnect_merge(
            path,
            Value::Object(children),
            Box::new(move |status| {
                if status.is_ok() {
                    let mut state = repo.0.borrow_mut();
                    for (name, value) in &cb_children {
                        state.on_disconnect.remember(&cb_path.child(name.clone()), Node::from_json(value));
                    }
                }
                repo.deliver_completion(status, on_complete);
            }),
        );
    }

    fn run_on_disconnect_events(&self) {
        let resolved = {
            let state = self.0.borrow();
            let values = state.server_values();
            resolve_on_disconnect_tree(&state.on_disconnect, &values)
        };
        let mut all_events = Vec::new();
        {
            let mut state = self.0.borrow_mut();
            for (path, node) in resolved {
                let events = state.server_tree.apply_server_overwrite(&path, node);
                let aborted = state.transactions.abort_transactions(&path);
                state.transactions.rerun_transactions(&aborted);
                all_events.extend(events);
            }
            state.on_disconnect = SparseSnapshotTree::new();
        }
        self.raise(Tree::Server, Path::empty(), all_events);
    }

    // ---- 4.H.6 Synthesised helpers -----------------------------------

    /// `serverTime()` = wall-clock now + `.info/serverTimeOffset`.
    pub fn server_time(&self) -> i64 {
        self.0.borrow().server_values().timestamp
    }

    /// `generateServerValues()`.
    pub fn generate_server_values(&self) -> ServerValues {
        self.0.borrow().server_values()
    }

    /// `toString()`.
    pub fn to_url_string(&self) -> String {
        self.0.borrow().info.to_url_string()
    }

    /// `name()`.
    pub fn name(&self) -> String {
        self.0.borrow().info.namespace.clone()
    }

    // ---- 4.H.7 Event registration -------------------------------------

    /// `addEventCallbackForQuery(query, reg)`.
    pub fn add_event_callback_for_query(&self, query: Query, callback: Box<dyn FnMut(&Event)>) -> QueryRegistration {
        let tree = tree_for(&query);
        let (id, events) = {
            let mut state = self.0.borrow_mut();
            match tree {
                Tree::Info => state.info_tree.add_event_registration(query.clone(), callback),
                Tree::Server => state.server_tree.add_event_registration(query.clone(), callback),
            }
        };
        self.process_listen_intents(tree);
        self.raise_immediate(tree, &query.path, events);
        QueryRegistration { tree, query, id }
    }

    /// `removeEventCallbackForQuery(query, reg)`.
    pub fn remove_event_callback_for_query(&self, registration: QueryRegistration) {
        let QueryRegistration { tree, query, id } = registration;
        let events = {
            let mut state = self.0.borrow_mut();
            match tree {
                Tree::Info => state.info_tree.remove_event_registration(&query, id),
                Tree::Server => state.server_tree.remove_event_registration(&query, id),
            }
        };
        self.process_listen_intents(tree);
        self.raise_immediate(tree, &query.path, events);
    }

    fn process_listen_intents(&self, tree: Tree) {
        let intents = {
            let mut state = self.0.borrow_mut();
            match tree {
                Tree::Info => state.info_tree.take_listen_intents(),
                Tree::Server => state.server_tree.take_listen_intents(),
            }
        };
        for intent in intents {
            match (tree, intent) {
                (Tree::Info, ListenIntent::Start { query, .. }) => self.start_listening_info(query),
                (Tree::Info, ListenIntent::Stop { .. }) => {}
                (Tree::Server, ListenIntent::Start { query, tag }) => self.start_listening_server(query, tag),
                (Tree::Server, ListenIntent::Stop { query, tag }) => {
                    self.0.borrow_mut().transport.unlisten(query, tag);
                }
            }
        }
    }

    fn start_listening_info(&self, query: Query) {
        let (events, had_data) = {
            let mut state = self.0.borrow_mut();
            let existing = state.info_data.get_node(&query.path);
            if existing.is_empty() {
                (Vec::new(), false)
            } else {
                (state.info_tree.apply_server_overwrite(&query.path, existing), true)
            }
        };
        if had_data {
            self.0.borrow_mut().deferred.push_back(DeferredEffect::InfoListenAck);
        }
        self.raise(Tree::Info, query.path, events);
    }

    fn start_listening_server(&self, query: Query, tag: Option<rtdb_core::QueryTag>) {
        let repo_for_hash = self.clone();
        let hash_path = query.path.clone();
        let current_hash_fn: CurrentHashFn = Box::new(move || {
            use std::hash::{Hash, Hasher};
            let node = repo_for_hash.0.borrow().server_tree.server_value(&hash_path);
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            node.hash(&mut hasher);
            format!("{:x}", hasher.finish())
        });

        let repo = self.clone();
        let cb_path = query.path.clone();
        let listen_complete: ListenCompletion = Box::new(move |status, data| {
            repo.handle_listen_complete(cb_path, tag, status, data);
        });
        self.0.borrow_mut().transport.listen(query, current_hash_fn, tag, listen_complete);
    }

    fn handle_listen_complete(&self, path: Path, tag: Option<rtdb_core::QueryTag>, status: AckStatus, data: Option<Value>) {
        if !status.is_ok() {
            self.log(&format!("listen at {path} failed: {status:?}"));
            return;
        }
        let Some(data) = data else { return };
        let node = Node::from_json(&data);
        let events = {
            let mut state = self.0.borrow_mut();
            match tag {
                Some(t) => state.server_tree.apply_tagged_query_overwrite(&path, node, t),
                None => state.server_tree.apply_server_overwrite(&path, node),
            }
        };
        self.raise(Tree::Server, path, events);
    }

    // ---- 4.H.8 Completion callback policy ------------------------------

    fn deliver_completion(&self, status: AckStatus, on_complete: Option<CompletionCallback>) {
        let Some(cb) = on_complete else { return };
        call_guarded("on_complete", move || {
            let result = match status {
                AckStatus::Ok => Ok(()),
                AckStatus::Error { code, reason } => Err(RepoError::from_status(&code, reason)),
            };
            cb(result);
        });
    }

    // ---- 4.H.9 Interception and diagnostics ----------------------------

    /// `interceptServerData_(cb)`. Passing `None` removes any previously
    /// installed interceptor.
    pub fn intercept_server_data(&self, cb: Option<Box<dyn FnMut(Value) -> Value>>) {
        self.0.borrow_mut().intercept = cb;
    }

    /// `stats(showDelta)`.
    pub fn stats(&self, show_delta: bool) {
        self.0.borrow_mut().stats.print_stats(show_delta);
    }

    /// `statsIncrementCounter(metric)`.
    pub fn stats_increment_counter(&self, metric: &str) {
        self.0.borrow_mut().stats.increment(metric);
    }

    fn log(&self, message: &str) {
        let state = self.0.borrow();
        match state.transport.id() {
            Some(id) => tracing::debug!(target: "rtdb", transport = id, "{message}"),
            None => tracing::debug!(target: "rtdb", "{message}"),
        }
    }

    /// The validated auth-variable override this engine was built with.
    pub fn auth_override(&self) -> DatabaseAuthVariableOverride {
        self.0.borrow().auth_override.clone()
    }

    // ---- internal event-queue plumbing ---------------------------------

    fn queue_only(&self, tree: Tree, path: Path, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let tagged = events.into_iter().map(|event| TreeEvent { tree, event }).collect();
        self.0.borrow_mut().event_queue.queue_events(path, tagged);
    }

    // `raise`/`raise_immediate` must not invoke a registration callback
    // while `self.0` is borrowed: a listener that calls back into the
    // engine (another write, `server_time()`, ...) would re-borrow an
    // already-borrowed `RefCell` and panic, and that panic is swallowed by
    // `call_guarded` — the reentrant call would just silently never happen.
    // `spec.md` §4.G invariants 1/2 require reentrant delivery to be
    // deferred, not dropped, so both methods collect `(callback, event)`
    // pairs while the state is borrowed, drop the borrow, then dispatch.

    fn raise(&self, tree: Tree, path: Path, events: Vec<Event>) {
        let tagged: Vec<TreeEvent> = events.into_iter().map(|event| TreeEvent { tree, event }).collect();
        let mut pending: Vec<(SharedCallback, Event)> = Vec::new();
        {
            let mut state = self.0.borrow_mut();
            let RepoState { event_queue, server_tree, info_tree, .. } = &mut *state;
            event_queue.raise_events_for_changed_path(path, tagged, |te: &TreeEvent| {
                let found = match te.tree {
                    Tree::Server => server_tree.callback_for(te.event.registration_id),
                    Tree::Info => info_tree.callback_for(te.event.registration_id),
                };
                if let Some(callback) = found {
                    pending.push((callback, te.event.clone()));
                }
            });
        }
        dispatch_pending(pending);
    }

    fn raise_immediate(&self, tree: Tree, path: &Path, events: Vec<Event>) {
        let tagged: Vec<TreeEvent> = events.into_iter().map(|event| TreeEvent { tree, event }).collect();
        let mut pending: Vec<(SharedCallback, Event)> = Vec::new();
        {
            let state = self.0.borrow();
            let RepoState { event_queue, server_tree, info_tree, .. } = &*state;
            event_queue.raise_events_at_path(path, &tagged, |te: &TreeEvent| {
                let found = match te.tree {
                    Tree::Server => server_tree.callback_for(te.event.registration_id),
                    Tree::Info => info_tree.callback_for(te.event.registration_id),
                };
                if let Some(callback) = found {
                    pending.push((callback, te.event.clone()));
                }
            });
        }
        dispatch_pending(pending);
    }

    fn tick(&self) {
        // `self.0.borrow_mut()` must not live past this statement — the
        // match arms below re-borrow `self.0`, and a `while let` holds a
        // temporary borrow from its scrutinee alive across the loop body.
        loop {
            let next = self.0.borrow_mut().deferred.pop_front();
            let Some(effect) = next else { break };
            match effect {
                DeferredEffect::SyntheticConnect => self.handle_connect_status(true),
                DeferredEffect::InfoListenAck => {
                    tracing::trace!(target: "rtdb", "deferred info listen ack fired");
                }
            }
        }
    }
}

fn tree_for(query: &Query) -> Tree {
    if query.path.front() == Some(".info") {
        Tree::Info
    } else {
        Tree::Server
    }
}
