//! Segment trie for key patterns.
//!
//! A [`Matcher`] stores values under separator-delimited paths. A segment
//! equal to [`WILDCARD`] matches any single segment on lookup. Exact children
//! always take priority over the wildcard child at the same depth.
//!
//! ```
//! use warren_config::Matcher;
//!
//! let mut m = Matcher::new(".");
//! m.set("item.*", "any item");
//! m.set("item.special", "special item");
//!
//! assert_eq!(m.get("item.foo"), Some(&"any item"));
//! assert_eq!(m.get("item.special"), Some(&"special item"));
//! assert_eq!(m.get("other"), None);
//! ```

use std::collections::HashMap;

/// Segment token reserved for the wildcard slot.
///
/// It can never be stored as a literal segment.
pub const WILDCARD: &str = "*";

/// A trie keyed by path segments with single-level wildcard support.
#[derive(Debug, Clone)]
pub struct Matcher<V> {
    separator: String,
    root: Node<V>,
    len: usize,
}

#[derive(Debug, Clone)]
struct Node<V> {
    children: HashMap<String, Node<V>>,
    wildcard: Option<Box<Node<V>>>,
    content: Option<V>,
}

impl<V> Default for Node<V> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            wildcard: None,
            content: None,
        }
    }
}

impl<V> Node<V> {
    fn get(&self, path: &[&str]) -> Option<&V> {
        let Some((current, rest)) = path.split_first() else {
            return self.content.as_ref();
        };

        if *current != WILDCARD {
            if let Some(found) = self.children.get(*current).and_then(|c| c.get(rest)) {
                return Some(found);
            }
        }

        self.wildcard.as_ref().and_then(|w| w.get(rest))
    }

    fn get_or_create(&mut self, path: &[&str]) -> &mut Self {
        let Some((current, rest)) = path.split_first() else {
            return self;
        };

        let child = if *current == WILDCARD {
            self.wildcard.get_or_insert_with(Box::default).as_mut()
        } else {
            self.children.entry((*current).to_string()).or_default()
        };
        child.get_or_create(rest)
    }
}

impl<V> Matcher<V> {
    /// Creates an empty matcher splitting paths on `separator`.
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            root: Node::default(),
            len: 0,
        }
    }

    /// Returns the path separator.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Stores `value` at `path`, replacing any previous value.
    pub fn set(&mut self, path: &str, value: V) -> Option<V> {
        let parts: Vec<&str> = path.split(self.separator.as_str()).collect();
        let previous = self.root.get_or_create(&parts).content.replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Looks up the value stored for `path`.
    ///
    /// Exact segments are tried before the wildcard at every depth. If an
    /// exact branch dead-ends, the wildcard branch is tried instead.
    pub fn get(&self, path: &str) -> Option<&V> {
        let parts: Vec<&str> = path.split(self.separator.as_str()).collect();
        self.root.get(&parts)
    }

    /// Returns true if a value is reachable for `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Number of stored patterns.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true when no pattern is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<V> Default for Matcher<V> {
    fn default() -> Self {
        Self::new(".")
    }
}
