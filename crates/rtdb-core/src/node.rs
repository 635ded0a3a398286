use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Number, Value};

use crate::path::Path;

/// Render an `f64` as a JSON number, preferring the integer representation
/// for whole numbers that fit in `i64`. `serde_json::Number`'s equality is
/// representation-sensitive (`json!(5) != json!(5.0)`), and every numeric
/// literal a caller hands to [`Node::from_json`] arrives as an integer when
/// it looks like one — rendering it back as a bare float would silently
/// change its JSON form on the way out.
fn number_to_json(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(&n) {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Leaf or interior value carried by a [`Node`].
#[derive(Clone, Debug)]
enum NodeValue {
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Children(Arc<BTreeMap<Arc<str>, Node>>),
}

impl PartialEq for NodeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeValue::Null, NodeValue::Null) => true,
            (NodeValue::Bool(a), NodeValue::Bool(b)) => a == b,
            (NodeValue::Number(a), NodeValue::Number(b)) => a.to_bits() == b.to_bits(),
            (NodeValue::String(a), NodeValue::String(b)) => a == b,
            (NodeValue::Children(a), NodeValue::Children(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for NodeValue {}

impl std::hash::Hash for NodeValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            NodeValue::Null => {}
            NodeValue::Bool(b) => b.hash(state),
            NodeValue::Number(n) => n.to_bits().hash(state),
            NodeValue::String(s) => s.hash(state),
            NodeValue::Children(c) => {
                for (k, v) in c.iter() {
                    k.hash(state);
                    v.hash(state);
                }
            }
        }
    }
}

/// An immutable snapshot of a subtree: a value (leaf scalar or a mapping
/// from string keys to child nodes) plus an optional priority.
///
/// `Node` is a value type: cheap to clone (children are `Arc`-shared) and
/// freely passed around by the sync tree and the engine.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Node {
    value: NodeValue,
    priority: Option<Box<Node>>,
}

impl Default for Node {
    fn default() -> Self {
        Node::empty()
    }
}

impl Node {
    /// The canonical empty node (no value, no children, no priority).
    pub fn empty() -> Self {
        Node {
            value: NodeValue::Null,
            priority: None,
        }
    }

    /// True iff this node carries neither a scalar value nor any children.
    pub fn is_empty(&self) -> bool {
        matches!(&self.value, NodeValue::Null) && self.priority.is_none()
    }

    /// Build a node from a parsed JSON value (and optional priority),
    /// the counterpart of the external "JSON value parsing into tree
    /// nodes" collaborator named out of scope in `spec.md` §1 — this is
    /// the minimal slice of that needed to build nodes in tests and at
    /// the engine boundary.
    pub fn from_json(value: &Value) -> Self {
        Node::from_json_with_priority(value, None)
    }

    fn from_json_with_priority(value: &Value, priority: Option<Node>) -> Self {
        let node_value = match value {
            Value::Null => NodeValue::Null,
            Value::Bool(b) => NodeValue::Bool(*b),
            Value::Number(n) => NodeValue::Number(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => NodeValue::String(Arc::from(s.as_str())),
            Value::Array(items) => {
                let mut children = BTreeMap::new();
                for (i, item) in items.iter().enumerate() {
                    let child = Node::from_json(item);
                    if !child.is_empty() {
                        children.insert(Arc::from(i.to_string().as_str()), child);
                    }
                }
                NodeValue::Children(Arc::new(children))
            }
            Value::Object(map) => {
                let mut priority_value = priority;
                let mut children = BTreeMap::new();
                for (k, v) in map {
                    if k == ".priority" {
                        priority_value = Some(Node::from_json(v));
                        continue;
                    }
                    if k == ".value" {
                        return Node::from_json_with_priority(v, priority_value);
                    }
                    let child = Node::from_json(v);
                    if !child.is_empty() {
                        children.insert(Arc::from(k.as_str()), child);
                    }
                }
                return Node {
                    value: if children.is_empty() {
                        NodeValue::Null
                    } else {
                        NodeValue::Children(Arc::new(children))
                    },
                    priority: priority_value.filter(|p| !p.is_empty()).map(Box::new),
                };
            }
        };
        Node {
            value: node_value,
            priority: priority.filter(|p| !p.is_empty()).map(Box::new),
        }
    }

    /// A leaf string node.
    pub fn leaf_string(s: impl Into<Arc<str>>) -> Self {
        Node {
            value: NodeValue::String(s.into()),
            priority: None,
        }
    }

    /// A leaf numeric node.
    pub fn leaf_number(n: f64) -> Self {
        Node {
            value: NodeValue::Number(n),
            priority: None,
        }
    }

    /// A leaf boolean node.
    pub fn leaf_bool(b: bool) -> Self {
        Node {
            value: NodeValue::Bool(b),
            priority: None,
        }
    }

    /// Attach (or replace) a priority.
    pub fn with_priority(mut self, priority: Node) -> Self {
        self.priority = if priority.is_empty() {
            None
        } else {
            Some(Box::new(priority))
        };
        self
    }

    /// The node's priority, if any.
    pub fn priority(&self) -> Option<&Node> {
        self.priority.as_deref()
    }

    /// True iff this node has children (is an interior node).
    pub fn has_children(&self) -> bool {
        matches!(&self.value, NodeValue::Children(_))
    }

    /// Iterate over `(key, child)` pairs in key order. Empty for leaves.
    pub fn children(&self) -> Box<dyn Iterator<Item = (&str, &Node)> + '_> {
        match &self.value {
            NodeValue::Children(map) => Box::new(map.iter().map(|(k, v)| (k.as_ref(), v))),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// The direct child at `key`, or the empty node if absent / this node
    /// is a leaf.
    pub fn get_immediate_child(&self, key: &str) -> Node {
        match &self.value {
            NodeValue::Children(map) => map.get(key).cloned().unwrap_or_default(),
            _ => Node::empty(),
        }
    }

    /// Navigate `path` from this node, returning the empty node if any
    /// component is absent.
    pub fn get_child(&self, path: &Path) -> Node {
        let mut node = self.clone();
        for part in path.iter() {
            node = node.get_immediate_child(part);
        }
        node
    }

    /// Functionally replace the direct child at `key`, pruning the entry
    /// entirely if `child` is empty. Leaves this node unaffected if it is
    /// currently a leaf and `child` is empty (no-op).
    pub fn update_immediate_child(&self, key: &str, child: Node) -> Node {
        let mut map = match &self.value {
            NodeValue::Children(map) => (**map).clone(),
            _ => BTreeMap::new(),
        };
        if child.is_empty() {
            map.remove(key);
        } else {
            map.insert(Arc::from(key), child);
        }
        if map.is_empty() {
            Node {
                value: NodeValue::Null,
                priority: self.priority.clone(),
            }
        } else {
            Node {
                value: NodeValue::Children(Arc::new(map)),
                priority: self.priority.clone(),
            }
        }
    }

    /// Functionally replace the subtree at `path` with `new_child`,
    /// threading the update through every ancestor. `path` empty replaces
    /// the whole node.
    pub fn update_child(&self, path: &Path, new_child: Node) -> Node {
        match path.front() {
            None => new_child,
            Some(head) => {
                let rest = path.pop_front();
                let existing = self.get_immediate_child(head);
                let updated = existing.update_child(&rest, new_child);
                self.update_immediate_child(head, updated)
            }
        }
    }

    /// Render as a plain JSON value. When `export` is true, nodes that
    /// carry a priority render as `{".value": ..., ".priority": ...}`
    /// (and children gain `.priority` entries recursively) — the "export
    /// value" used on the wire. Without `export`, priorities are dropped.
    pub fn val(&self, export: bool) -> Value {
        let plain = match &self.value {
            NodeValue::Null => Value::Null,
            NodeValue::Bool(b) => Value::Bool(*b),
            NodeValue::Number(n) => number_to_json(*n),
            NodeValue::String(s) => Value::String(s.to_string()),
            NodeValue::Children(map) => {
                let mut obj = Map::new();
                for (k, v) in map.iter() {
                    obj.insert(k.to_string(), v.val(export));
                }
                Value::Object(obj)
            }
        };
        if !export {
            return plain;
        }
        match &self.priority {
            None => plain,
            Some(p) => {
                let mut obj = match plain {
                    Value::Object(o) => o,
                    other => {
                        let mut o = Map::new();
                        o.insert(".value".to_string(), other);
                        o
                    }
                };
                obj.insert(".priority".to_string(), p.val(false));
                Value::Object(obj)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_node_round_trips() {
        let n = Node::empty();
        assert!(n.is_empty());
        assert_eq!(n.val(false), Value::Null);
    }

    #[test]
    fn leaf_from_json() {
        let n = Node::from_json(&json!(5));
        assert_eq!(n.val(false), json!(5));
    }

    #[test]
    fn object_from_json_and_back() {
        let n = Node::from_json(&json!({"x": 1, "y": {"z": 2}}));
        assert_eq!(n.val(false), json!({"x": 1, "y": {"z": 2}}));
    }

    #[test]
    fn update_child_is_functional() {
        let root = Node::from_json(&json!({"a": {"b": 1}}));
        let updated = root.update_child(&Path::parse("/a/c"), Node::leaf_number(2.0));
        assert_eq!(root.val(false), json!({"a": {"b": 1}}));
        assert_eq!(updated.val(false), json!({"a": {"b": 1, "c": 2}}));
    }

    #[test]
    fn update_child_with_empty_prunes() {
        let root = Node::from_json(&json!({"a": {"b": 1}}));
        let updated = root.update_child(&Path::parse("/a/b"), Node::empty());
        assert!(updated.get_child(&Path::parse("/a")).is_empty());
    }

    #[test]
    fn get_child_navigates() {
        let root = Node::from_json(&json!({"a": {"b": 7}}));
        assert_eq!(root.get_child(&Path::parse("/a/b")).val(false), json!(7));
        assert!(root.get_child(&Path::parse("/a/missing")).is_empty());
    }

    #[test]
    fn priority_round_trips_export_only() {
        let n = Node::leaf_number(1.0).with_priority(Node::leaf_number(10.0));
        assert_eq!(n.val(false), json!(1));
        assert_eq!(n.val(true), json!({".value": 1, ".priority": 10}));
    }

    #[test]
    fn empty_priority_is_dropped() {
        let n = Node::leaf_number(1.0).with_priority(Node::empty());
        assert!(n.priority().is_none());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (-1000i64..1000).prop_map(|n| json!(n)),
            "[a-z]{0,8}".prop_map(Value::String),
        ]
    }

    fn shallow_object() -> impl Strategy<Value = Value> {
        prop::collection::btree_map("[a-z]{1,4}", scalar(), 0..4)
            .prop_map(|m| Value::Object(m.into_iter().collect()))
    }

    proptest! {
        #[test]
        fn from_json_val_round_trips_for_scalars(v in scalar()) {
            prop_assert_eq!(Node::from_json(&v).val(false), v);
        }

        #[test]
        fn from_json_val_round_trips_for_shallow_objects(v in shallow_object()) {
            prop_assert_eq!(Node::from_json(&v).val(false), v);
        }
    }
}
