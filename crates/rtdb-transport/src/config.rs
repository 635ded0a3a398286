use serde::{Deserialize, Serialize};
use serde_json::Value;

use rtdb_core::Error;

/// Identifies a database endpoint: host, namespace, and whether to use
/// `https`. Mirrors `spec.md` §4.H.6 (`toString()`, `name()`).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RepoInfo {
    /// Hostname (and port, if non-default), e.g. `my-db.example.com`.
    pub host: String,
    /// Database namespace.
    pub namespace: String,
    /// Use `https://` (true) or `http://` (false).
    pub secure: bool,
}

impl RepoInfo {
    /// `(secure ? "https" : "http") + "://" + host` — `spec.md` §6.
    pub fn to_url_string(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}", self.host)
    }
}

/// `databaseAuthVariableOverride`: absent, `null`, or a JSON object
/// (`spec.md` §6). The source's literal check (`typeof x !== "object"`,
/// a string compared against the `typeof` result) is noted in §9 as a
/// defect; this type makes the invalid states unrepresentable instead of
/// replicating the bug — constructing one validates at the boundary.
#[derive(Clone, Debug, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatabaseAuthVariableOverride(Option<serde_json::Map<String, Value>>);

impl DatabaseAuthVariableOverride {
    /// No override (the common case).
    pub fn none() -> Self {
        DatabaseAuthVariableOverride(None)
    }

    /// Validate an arbitrary JSON value: it must be `null` or a JSON
    /// object, and (trivially, since it already parsed) JSON-encodable.
    /// Any other shape — a string, number, array, bool — is
    /// `Error::InvalidConfig`.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(DatabaseAuthVariableOverride(None)),
            Value::Object(map) => Ok(DatabaseAuthVariableOverride(Some(map))),
            other => Err(Error::InvalidConfig(format!(
                "databaseAuthVariableOverride must be an object or null, got {}",
                value_kind(&other)
            ))),
        }
    }

    /// The underlying object, if any.
    pub fn as_object(&self) -> Option<&serde_json::Map<String, Value>> {
        self.0.as_ref()
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_string_reflects_secure_flag() {
        let info = RepoInfo {
            host: "db.example.com".into(),
            namespace: "my-db".into(),
            secure: true,
        };
        assert_eq!(info.to_url_string(), "https://db.example.com");
        let insecure = RepoInfo {
            secure: false,
            ..info
        };
        assert_eq!(insecure.to_url_string(), "http://db.example.com");
    }

    #[test]
    fn null_and_absent_override_are_valid() {
        assert!(DatabaseAuthVariableOverride::from_value(Value::Null).is_ok());
    }

    #[test]
    fn object_override_is_valid() {
        let v = DatabaseAuthVariableOverride::from_value(json!({"uid": "abc"})).unwrap();
        assert_eq!(v.as_object().unwrap().get("uid").unwrap(), "abc");
    }

    #[test]
    fn non_object_override_is_rejected() {
        // spec.md §8 S6: constructing with `42` must fail with InvalidConfig.
        let err = DatabaseAuthVariableOverride::from_value(json!(42)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn string_array_and_bool_overrides_are_rejected() {
        for bad in [json!("x"), json!([1, 2]), json!(true)] {
            assert!(DatabaseAuthVariableOverride::from_value(bad).is_err());
        }
    }
}
