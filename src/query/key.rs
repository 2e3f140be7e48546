//! Hierarchical cache keys.
//!
//! A [`QueryKey`] is an ordered sequence of [`KeySegment`]s, from the most
//! generic segment (the resource name) to the most specific one (an id or a
//! filter object):
//!
//! ```text
//! ["patients"] → ["patients", "list"] → ["patients", "list", {"filters": "john"}]
//! ```
//!
//! Invalidating a prefix invalidates every key that extends it, so
//! invalidating `["patients"]` touches every patient query.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use serde_json::{Value, json};

/// A single segment of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum KeySegment {
    Str(String),
    Int(i64),
    /// A filter object, embedded verbatim.
    Object(Value),
}

impl Hash for KeySegment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Str(s) => s.hash(state),
            Self::Int(n) => n.hash(state),
            // serde_json maps are ordered, so equal values serialize identically.
            Self::Object(v) => v.to_string().hash(state),
        }
    }
}

impl From<&str> for KeySegment {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for KeySegment {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Value> for KeySegment {
    fn from(value: Value) -> Self {
        Self::Object(value)
    }
}

/// An ordered, hierarchical cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(transparent)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
    /// Creates a key from a list of segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<KeySegment>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Returns a new key with `segment` appended.
    #[must_use]
    pub fn extend(&self, segment: impl Into<KeySegment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Returns `true` if `prefix` is a (non-strict) prefix of this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

impl<S: Into<KeySegment>> FromIterator<S> for QueryKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Key registry for a single resource.
///
/// Every builder extends [`ResourceKeys::all`], so invalidating the root
/// invalidates every query of the resource.
///
/// ```
/// use ward::query::ResourceKeys;
///
/// let patients = ResourceKeys::new("patients");
/// assert!(patients.detail("1").starts_with(&patients.details()));
/// assert!(patients.stats().starts_with(&patients.all()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceKeys {
    resource: &'static str,
}

impl ResourceKeys {
    #[must_use]
    pub const fn new(resource: &'static str) -> Self {
        Self { resource }
    }

    pub const fn resource(&self) -> &'static str {
        self.resource
    }

    /// The root key of the resource.
    pub fn all(&self) -> QueryKey {
        QueryKey::new([self.resource])
    }

    /// A resource-specific variant directly under the root.
    pub fn scoped(&self, name: &str) -> QueryKey {
        self.all().extend(name)
    }

    pub fn lists(&self) -> QueryKey {
        self.scoped("list")
    }

    /// A list query; `filters` is embedded verbatim so distinct filters never share an entry.
    pub fn list(&self, filters: impl Into<Value>) -> QueryKey {
        self.lists().extend(json!({ "filters": filters.into() }))
    }

    pub fn details(&self) -> QueryKey {
        self.scoped("detail")
    }

    pub fn detail(&self, id: impl Into<KeySegment>) -> QueryKey {
        self.details().extend(id)
    }

    pub fn stats(&self) -> QueryKey {
        self.scoped("stats")
    }
}
