use std::fmt;
use std::sync::Arc;

/// An immutable, hierarchical key: an ordered sequence of string components.
///
/// Two paths are equal iff their components are equal component-wise.
/// `Path` is cheap to clone — components are `Arc<str>` so sharing a prefix
/// across many paths (as the sync tree does constantly) never re-allocates.
#[derive(Clone, Eq, PartialEq, Hash, Default)]
pub struct Path {
    parts: Vec<Arc<str>>,
}

impl Path {
    /// The designated empty path (the root).
    pub fn empty() -> Self {
        Path { parts: Vec::new() }
    }

    /// Build a path from an iterator of components.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Path {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a slash-joined string like `/a/b/c` (or `a/b/c`) into a path.
    /// Empty components (leading/trailing/duplicate slashes) are dropped.
    pub fn parse(s: &str) -> Self {
        Path::from_parts(s.split('/').filter(|p| !p.is_empty()))
    }

    /// True iff this is the empty (root) path.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// The first component, if any.
    pub fn front(&self) -> Option<&str> {
        self.parts.first().map(|s| s.as_ref())
    }

    /// A new path with the first component dropped.
    pub fn pop_front(&self) -> Path {
        if self.parts.is_empty() {
            self.clone()
        } else {
            Path {
                parts: self.parts[1..].to_vec(),
            }
        }
    }

    /// A new path extended with one more component.
    pub fn child(&self, key: impl Into<Arc<str>>) -> Path {
        let mut parts = self.parts.clone();
        parts.push(key.into());
        Path { parts }
    }

    /// A new path extended with every component of `other`.
    pub fn child_path(&self, other: &Path) -> Path {
        let mut parts = self.parts.clone();
        parts.extend(other.parts.iter().cloned());
        Path { parts }
    }

    /// Iterate over components front-to-back.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|s| s.as_ref())
    }

    /// True iff `self` is `other`, or an ancestor of `other` (`self` is a
    /// strict prefix of `other`).
    pub fn contains(&self, other: &Path) -> bool {
        self.parts.len() <= other.parts.len() && self.parts == other.parts[..self.parts.len()]
    }

    /// If `self` is `ancestor` or a descendant of it, the remaining
    /// components after stripping the ancestor's prefix.
    pub fn relative_to(&self, ancestor: &Path) -> Option<Path> {
        if ancestor.contains(self) {
            Some(Path {
                parts: self.parts[ancestor.parts.len()..].to_vec(),
            })
        } else {
            None
        }
    }

    /// The slash-joined, leading-slash string form, e.g. `/a/b/c`. The empty
    /// path renders as `/`.
    pub fn to_path_string(&self) -> String {
        if self.parts.is_empty() {
            "/".to_string()
        } else {
            let mut s = String::new();
            for p in &self.parts {
                s.push('/');
                s.push_str(p);
            }
            s
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path_string())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({})", self.to_path_string())
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::parse(s)
    }
}
