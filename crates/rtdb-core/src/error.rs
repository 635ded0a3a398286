use thiserror::Error;

/// Error taxonomy shared by the value-type layer.
///
/// `TransportFailure` and `CallbackFault` (see `spec.md` §7) are owned by
/// `rtdb-transport` and `rtdb-repo` respectively; this crate only ever
/// produces `InvalidConfig` and `Json`.
#[derive(Debug, Error)]
pub enum Error {
    /// `databaseAuthVariableOverride` was present but not an object, or an
    /// object that failed to serialize to JSON.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A value failed to round-trip through `serde_json`.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
