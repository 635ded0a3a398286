use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use rtdb_core::{Node, Path, Query, QueryTag, WriteId};

use crate::event::{Event, EventKind};
use crate::listen_provider::ListenIntent;
use crate::registration::{RegistrationId, RegistrationIdAllocator};
use crate::write_tree::{WriteRecord, WriteTree};

/// A registration's callback, shared so a caller can invoke it without
/// holding whatever lock guards the tree (e.g. the engine's own `RefCell`).
pub type SharedCallback = Rc<RefCell<Box<dyn FnMut(&Event)>>>;

struct StoredRegistration {
    id: RegistrationId,
    query: Query,
    last_value: Node,
    callback: SharedCallback,
}

/// Overlay of a server cache and pending user writes (`spec.md` §3). Two
/// instances exist per engine: one backed by the real transport (the
/// "server" tree) and one backed by the `.info` snapshot holder.
pub struct SyncTree {
    server_cache: Node,
    tagged_cache: HashMap<QueryTag, Node>,
    tag_paths: HashMap<QueryTag, Path>,
    writes: WriteTree,
    registrations: Vec<StoredRegistration>,
    reg_alloc: RegistrationIdAllocator,
    pending_intents: Vec<ListenIntent>,
}

impl Default for SyncTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncTree {
    /// A fresh, empty tree.
    pub fn new() -> Self {
        SyncTree {
            server_cache: Node::empty(),
            tagged_cache: HashMap::new(),
            tag_paths: HashMap::new(),
            writes: WriteTree::default(),
            registrations: Vec::new(),
            reg_alloc: RegistrationIdAllocator::default(),
            pending_intents: Vec::new(),
        }
    }

    /// Drain the `startListening`/`stopListening` intents recorded since
    /// the last drain, in the order the aggregate listener-set
    /// transitions happened. Callers act on these after whatever
    /// registration/removal call produced them has returned, since the
    /// action (e.g. calling the transport) may itself need to touch
    /// engine state this tree doesn't own.
    pub fn take_listen_intents(&mut self) -> Vec<ListenIntent> {
        std::mem::take(&mut self.pending_intents)
    }

    /// The node currently believed to hold at `path`, server cache plus
    /// every visible pending write, with no filtering applied.
    pub fn server_value(&self, path: &Path) -> Node {
        self.writes.apply_to(self.server_cache.get_child(path), path)
    }

    fn compute_view(&self, query: &Query) -> Node {
        let base = match query.tag {
            Some(tag) => self.tagged_cache.get(&tag).cloned().unwrap_or_default(),
            None => self.server_cache.get_child(&query.path),
        };
        self.writes.apply_to(base, &query.path)
    }

    fn recompute(&mut self, predicate: impl Fn(&Query) -> bool) -> Vec<Event> {
        let mut events = Vec::new();
        for reg in &mut self.registrations {
            if !predicate(&reg.query) {
                continue;
            }
            let base = match reg.query.tag {
                Some(tag) => self.tagged_cache.get(&tag).cloned().unwrap_or_default(),
                None => self.server_cache.get_child(&reg.query.path),
            };
            let new_value = self.writes.apply_to(base, &reg.query.path);
            events.extend(diff_events(reg.id, reg.query.path.clone(), &reg.last_value, &new_value));
            reg.last_value = new_value;
        }
        events
    }

    /// Replace the server cache's node at `path` wholesale.
    pub fn apply_server_overwrite(&mut self, path: &Path, node: Node) -> Vec<Event> {
        self.server_cache = self.server_cache.update_child(path, node);
        self.recompute(|q| q.tag.is_none())
    }

    /// Merge `children` (direct children of `path`) into the server
    /// cache.
    pub fn apply_server_merge(&mut self, path: &Path, children: &BTreeMap<Arc<str>, Node>) -> Vec<Event> {
        for (key, child) in children {
            self.server_cache = self
                .server_cache
                .update_child(&path.child(key.clone()), child.clone());
        }
        self.recompute(|q| q.tag.is_none())
    }

    /// Like [`Self::apply_server_overwrite`] but scoped to an active
    /// filtered-query tag.
    pub fn apply_tagged_query_overwrite(&mut self, path: &Path, node: Node, tag: QueryTag) -> Vec<Event> {
        self.tag_paths.entry(tag).or_insert_with(|| path.clone());
        self.tagged_cache.insert(tag, node);
        self.recompute(move |q| q.tag == Some(tag))
    }

    /// Like [`Self::apply_server_merge`] but scoped to an active
    /// filtered-query tag.
    pub fn apply_tagged_query_merge(
        &mut self,
        path: &Path,
        children: &BTreeMap<Arc<str>, Node>,
        tag: QueryTag,
    ) -> Vec<Event> {
        let root = self.tag_paths.entry(tag).or_insert_with(|| path.clone()).clone();
        let mut node = self.tagged_cache.get(&tag).cloned().unwrap_or_default();
        let relative = path.relative_to(&root).unwrap_or_else(Path::empty);
        for (key, child) in children {
            node = node.update_child(&relative.child(key.clone()), child.clone());
        }
        self.tagged_cache.insert(tag, node);
        self.recompute(move |q| q.tag == Some(tag))
    }

    /// Record a pending overwrite at `path`. `visible = false` lets a
    /// caller stage a write without it showing up to listeners yet
    /// (unused by the engine today, but part of the contract in
    /// `spec.md` §3).
    pub fn apply_user_overwrite(&mut self, path: &Path, node: Node, write_id: WriteId, visible: bool) -> Vec<Event> {
        self.writes.add_overwrite(path.clone(), node, write_id, visible);
        self.recompute(|_| true)
    }

    /// Record a pending merge at `path`.
    pub fn apply_user_merge(
        &mut self,
        path: &Path,
        children: BTreeMap<Arc<str>, Node>,
        write_id: WriteId,
    ) -> Vec<Event> {
        self.writes.add_merge(path.clone(), children, write_id);
        self.recompute(|_| true)
    }

    /// Drop the pending write `write_id`. `revert` has no effect on tree
    /// mechanics (`spec.md` §9: "Revert is list-removal; ack-success is
    /// the same") — it exists purely so callers can choose what to log.
    pub fn ack_user_write(&mut self, write_id: WriteId, _revert: bool) -> Vec<Event> {
        self.writes.remove(write_id);
        self.recompute(|_| true)
    }

    /// Install a listener. Returns its id and any initial events
    /// (synthesized as if the registration's view went from empty to
    /// whatever it is now). Calls the injected `start_listening` hook iff
    /// this is the first registration for `query`'s `(path, tag)` key.
    pub fn add_event_registration(
        &mut self,
        query: Query,
        callback: Box<dyn FnMut(&Event)>,
    ) -> (RegistrationId, Vec<Event>) {
        let first_for_query = !self
            .registrations
            .iter()
            .any(|r| r.query.path == query.path && r.query.tag == query.tag);
        let id = self.reg_alloc.next();
        let initial_value = self.compute_view(&query);
        let events = diff_events(id, query.path.clone(), &Node::empty(), &initial_value);
        self.registrations.push(StoredRegistration {
            id,
            query: query.clone(),
            last_value: initial_value,
            callback: Rc::new(RefCell::new(callback)),
        });
        if first_for_query {
            self.pending_intents.push(ListenIntent::Start { query: query.clone(), tag: query.tag });
        }
        (id, events)
    }

    /// Remove a previously installed registration. Always returns an
    /// empty event list — `spec.md` §4.H.7: "Removal is specified to
    /// raise no cancel events." Calls the injected `stop_listening` hook
    /// iff this was the last registration for that `(path, tag)` key.
    pub fn remove_event_registration(&mut self, query: &Query, id: RegistrationId) -> Vec<Event> {
        if let Some(pos) = self.registrations.iter().position(|r| r.id == id) {
            self.registrations.remove(pos);
        }
        let still_listening = self
            .registrations
            .iter()
            .any(|r| r.query.path == query.path && r.query.tag == query.tag);
        if !still_listening {
            self.pending_intents.push(ListenIntent::Stop { query: query.clone(), tag: query.tag });
        }
        Vec::new()
    }

    /// Route one event to its registration's callback, if it's still
    /// installed (it may have been removed since the event was produced).
    pub fn dispatch(&mut self, event: &Event) {
        if let Some(reg) = self.registrations.iter().find(|r| r.id == event.registration_id) {
            (reg.callback.borrow_mut())(event);
        }
    }

    /// Clone out the shared handle to `registration_id`'s callback without
    /// invoking it, or `None` if the registration has since been removed.
    /// Lets a caller (the engine) drop its own borrow before running
    /// arbitrary user code, so a callback that calls back into the engine
    /// doesn't re-enter a borrow that's still held.
    pub fn callback_for(&self, registration_id: RegistrationId) -> Option<SharedCallback> {
        self.registrations
            .iter()
            .find(|r| r.id == registration_id)
            .map(|r| r.callback.clone())
    }
}

fn diff_events(id: RegistrationId, path: Path, old: &Node, new: &Node) -> Vec<Event> {
    if old == new {
        return Vec::new();
    }
    let mut events = Vec::new();
    let old_children: BTreeMap<&str, &Node> = old.children().collect();
    let new_children: BTreeMap<&str, &Node> = new.children().collect();

    for (key, old_child) in &old_children {
        match new_children.get(key) {
            None => events.push(Event {
                registration_id: id,
                path: path.clone(),
                kind: EventKind::ChildRemoved {
                    key: (*key).to_string(),
                    node: (*old_child).clone(),
                },
            }),
            Some(new_child) => {
                if old_child != new_child {
                    events.push(Event {
                        registration_id: id,
                        path: path.clone(),
                        kind: EventKind::ChildChanged {
                            key: (*key).to_string(),
                            node: (*new_child).clone(),
                        },
                    });
                }
            }
        }
    }
    for (key, new_child) in &new_children {
        if !old_children.contains_key(key) {
            events.push(Event {
                registration_id: id,
                path: path.clone(),
                kind: EventKind::ChildAdded {
                    key: (*key).to_string(),
                    node: (*new_child).clone(),
                },
            });
        }
    }
    events.push(Event {
        registration_id: id,
        path,
        kind: EventKind::ValueChanged(new.clone()),
    });
    events
}
