use serde_json::Value;

use crate::node::Node;

/// The context supplied to deferred-value resolution: `generateServerValues()`
/// in `spec.md` §4.H.6. Today the only deferred token realtime-database
/// clients substitute is `timestamp`; the type is open so a future token
/// doesn't need a signature change.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerValues {
    /// Milliseconds since the epoch, as the engine's best estimate of
    /// server time (`serverTime()`).
    pub timestamp: i64,
}

/// A leaf object of the shape `{".sv": "timestamp"}` is a deferred value
/// token; substitute it against `values` wherever it appears, recursively.
/// Any other leaf or interior node is returned unchanged (by value, but
/// cheaply — `Node` clones are `Arc`-shared).
pub fn resolve_deferred_value(node: &Node, values: &ServerValues) -> Node {
    if let Some(token) = deferred_token(node) {
        return match token {
            "timestamp" => Node::leaf_number(values.timestamp as f64),
            _ => node.clone(),
        };
    }
    if !node.has_children() {
        return node.clone();
    }
    let mut resolved = Node::empty();
    for (key, child) in node.children() {
        resolved = resolved.update_immediate_child(key, resolve_deferred_value(child, values));
    }
    if let Some(priority) = node.priority() {
        resolved = resolved.with_priority(resolve_deferred_value(priority, values));
    }
    resolved
}

fn deferred_token(node: &Node) -> Option<&'static str> {
    let value = node.val(false);
    match value {
        Value::Object(map) if map.len() == 1 => match map.get(".sv") {
            Some(Value::String(s)) if s == "timestamp" => Some("timestamp"),
            _ => None,
        },
        _ => None,
    }
}
