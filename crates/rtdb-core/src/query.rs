use crate::path::Path;

/// A numeric handle identifying a filtered query's listener, assigned by
/// the caller that owns query-tag allocation (outside this workspace's
/// scope — see `spec.md` §1, "the user-facing query/database façade").
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct QueryTag(pub u64);

/// Query parameters beyond "every child at this path". Filtered query
/// evaluation (order-by/limit/range) is out of scope for the
/// reconciliation engine (`SPEC_FULL.md` §C.1); `QueryParams` exists only
/// so a `Query` has a real, comparable key for the aggregation rules in
/// `spec.md` §3 ("Invokes injected `startListening`... when the aggregate
/// listener set at a query changes").
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct QueryParams {
    /// Opaque, comparable discriminator for a non-default filter. Two
    /// `QueryParams` with the same discriminator (including `None`, the
    /// "no filter" default) are considered the same query for listener
    /// aggregation purposes.
    pub filter_key: Option<String>,
}

/// A query against the tree: the path it's rooted at, the filter (if any),
/// and — once a tagged listen is active — the tag the transport uses to
/// correlate server payloads back to this query.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Query {
    /// Root path of the query.
    pub path: Path,
    /// Filter parameters; `QueryParams::default()` means "whole node".
    pub params: QueryParams,
    /// Active tag, if the server has been asked to scope updates to this
    /// query specifically.
    pub tag: Option<QueryTag>,
}

impl Query {
    /// An unfiltered, untagged query at `path` — the common case.
    pub fn default_at(path: Path) -> Self {
        Query {
            path,
            params: QueryParams::default(),
            tag: None,
        }
    }

    /// True iff this query has no filter (covers the whole node at its
    /// path).
    pub fn is_default(&self) -> bool {
        self.params.filter_key.is_none()
    }
}
