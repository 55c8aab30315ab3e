//! Path Codec
//!
//! A path addresses a location in the state tree as an ordered list of
//! [`Segment`]s. Its canonical form is the dot-joined string (`todos.0.text`),
//! which is what the signal registry is keyed by.
//!
//! Paths are read far more often than they are built, so [`PathCodec::split`]
//! memoizes the parsed segments per exact string. The cache belongs to one
//! store and is cleared wholesale once it reaches its capacity.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

/// Default number of distinct path strings kept in a codec cache.
pub const DEFAULT_PATH_CACHE_CAPACITY: usize = 4096;

/// One step of a path: an object key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    /// Parse a single token. Tokens made only of ASCII digits are indices.
    pub fn parse(token: &str) -> Self {
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = token.parse() {
                return Segment::Index(index);
            }
        }
        Segment::Key(token.to_string())
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Segment::Index(_))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(token: &str) -> Self {
        Segment::parse(token)
    }
}

impl From<String> for Segment {
    fn from(token: String) -> Self {
        Segment::parse(&token)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

/// Parsed path, shared out of the codec cache.
pub type Segments = Arc<[Segment]>;

/// Converts between canonical path strings and segment lists.
pub struct PathCodec {
    cache: DashMap<String, Segments>,
    capacity: usize,
}

impl PathCodec {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Split a canonical path into segments. The empty path is the root.
    pub fn split(&self, path: &str) -> Segments {
        if path.is_empty() {
            return Arc::from(Vec::new());
        }
        if let Some(hit) = self.cache.get(path) {
            return Arc::clone(hit.value());
        }

        let segments: Segments = path.split('.').map(Segment::parse).collect();
        if self.cache.len() >= self.capacity {
            trace!(capacity = self.capacity, "path cache full, clearing");
            self.cache.clear();
        }
        self.cache.insert(path.to_string(), Arc::clone(&segments));
        segments
    }

    /// Number of cached path strings.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl Default for PathCodec {
    fn default() -> Self {
        Self::new(DEFAULT_PATH_CACHE_CAPACITY)
    }
}

/// Join segments into their canonical string.
pub fn join(segments: &[Segment]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        out.push_str(&segment.to_string());
    }
    out
}

/// Canonical path of `child` under `parent`.
pub fn child(parent: &str, child: &Segment) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

/// Concatenate two canonical paths.
pub fn concat(prefix: &str, rest: &str) -> String {
    match (prefix.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}.{rest}"),
    }
}

/// Ancestors of `path`, deepest first, ending with the root. Excludes `path`.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    let mut rest = if path.is_empty() { None } else { Some(path) };
    std::iter::from_fn(move || {
        let current = rest?;
        let parent = match current.rfind('.') {
            Some(at) => &current[..at],
            None => "",
        };
        rest = if parent.is_empty() { None } else { Some(parent) };
        Some(parent)
    })
}

/// Whether `path` lies strictly below `ancestor`.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return !path.is_empty();
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'.'
}

/// Whether a write at one path can change the value at the other.
pub fn overlaps(a: &str, b: &str) -> bool {
    a == b || is_descendant(a, b) || is_descendant(b, a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_parses_keys_and_indices() {
        let codec = PathCodec::default();
        let segments = codec.split("todos.0.text");
        assert_eq!(
            &*segments,
            &[
                Segment::Key("todos".into()),
                Segment::Index(0),
                Segment::Key("text".into()),
            ]
        );
        assert!(codec.split("").is_empty());
    }

    #[test]
    fn split_is_memoized() {
        let codec = PathCodec::default();
        let first = codec.split("a.b");
        let second = codec.split("a.b");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(codec.cached(), 1);
    }

    #[test]
    fn cache_clears_at_capacity() {
        let codec = PathCodec::new(2);
        codec.split("a");
        codec.split("b");
        codec.split("c");
        assert_eq!(codec.cached(), 1);
    }

    #[test]
    fn join_inverts_split() {
        let codec = PathCodec::default();
        assert_eq!(join(&codec.split("user.tags.3")), "user.tags.3");
        assert_eq!(join(&[]), "");
    }

    #[test]
    fn ancestors_walk_up_to_root() {
        let found: Vec<_> = ancestors("a.b.c").collect();
        assert_eq!(found, vec!["a.b", "a", ""]);
        assert_eq!(ancestors("").count(), 0);
    }

    #[test]
    fn descendant_checks_respect_segment_boundaries() {
        assert!(is_descendant("a.b", "a"));
        assert!(!is_descendant("ab", "a"));
        assert!(!is_descendant("a", "a"));
        assert!(is_descendant("a", ""));
        assert!(overlaps("user", "user.name"));
        assert!(!overlaps("user.age", "user.name"));
    }

    #[test]
    fn child_and_concat_handle_root() {
        assert_eq!(child("", &Segment::Index(2)), "2");
        assert_eq!(child("todos", &Segment::Index(2)), "todos.2");
        assert_eq!(concat("", "a"), "a");
        assert_eq!(concat("a", ""), "a");
        assert_eq!(concat("a", "b.c"), "a.b.c");
    }
}
