use thiserror::Error;

/// Error taxonomy for the reconciliation engine (`spec.md` §7).
///
/// `CallbackFault` has no variant here: a panicking completion or event
/// callback is caught by [`rtdb_queue::call_guarded`], logged, and never
/// surfaces as a `Result` — matching §7's "caught by an exception guard
/// ... does not abort the engine".
#[derive(Debug, Error)]
pub enum RepoError {
    /// `databaseAuthVariableOverride` was present but not an object, or
    /// failed to serialize to JSON. Fatal at construction.
    #[error(transparent)]
    InvalidConfig(#[from] rtdb_core::Error),

    /// A non-`"ok"` status from a write, delivered to that write's
    /// completion callback.
    #[error("{}", self.describe())]
    Transport {
        /// The status string, upper-cased (`"ERROR"` if the transport
        /// reported an empty status).
        code: String,
        /// Optional human-readable detail from the transport.
        reason: Option<String>,
    },
}

impl RepoError {
    /// Build the completion-callback error for a failed write:
    /// `code = status.to_uppercase()` (or `"ERROR"` if `status` is empty),
    /// `reason` carried through unchanged.
    pub fn from_status(status: &str, reason: Option<String>) -> Self {
        let code = if status.is_empty() {
            "ERROR".to_string()
        } else {
            status.to_uppercase()
        };
        RepoError::Transport { code, reason }
    }

    /// The upper-cased status code, for callers that want it apart from
    /// the formatted message.
    pub fn code(&self) -> Option<&str> {
        match self {
            RepoError::Transport { code, .. } => Some(code),
            RepoError::InvalidConfig(_) => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            RepoError::Transport { code, reason: Some(r) } => format!("{code}: {r}"),
            RepoError::Transport { code, reason: None } => code.clone(),
            RepoError::InvalidConfig(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_uppercases_and_joins_reason() {
        let e = RepoError::from_status("permission_denied", Some("write denied".into()));
        assert_eq!(e.code(), Some("PERMISSION_DENIED"));
        assert_eq!(e.to_string(), "PERMISSION_DENIED: write denied");
    }

    #[test]
    fn empty_status_becomes_error() {
        let e = RepoError::from_status("", None);
        assert_eq!(e.code(), Some("ERROR"));
        assert_eq!(e.to_string(), "ERROR");
    }
}
