//! In-memory URL model.
//!
//! # Responsibilities
//! - Represent a URL as an outlet-keyed tree of segment groups
//! - Carry query parameters and the fragment alongside the tree
//! - Provide value equality used by containment checks and same-URL detection
//!
//! # Design Decisions
//! - Values are immutable in practice: navigation builds new trees, it never edits the committed one
//! - `IndexMap` keeps outlet, matrix and query ordering stable so serialization is deterministic
//! - Equality ignores map ordering (two trees with the same outlets are equal)

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::url::serializer::{DefaultUrlSerializer, UrlSerializer};

/// Name of the default outlet.
pub const PRIMARY_OUTLET: &str = "primary";

/// Matrix or path parameters (key → value).
pub type Params = IndexMap<String, String>;

/// Query parameters (key → single value or repeated values).
pub type QueryParams = IndexMap<String, QueryValue>;

/// A query parameter value. Repeated keys collapse into `Multi`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    Multi(Vec<String>),
}

impl QueryValue {
    /// First value, the one a single-valued reader sees.
    pub fn first(&self) -> Option<&str> {
        match self {
            QueryValue::Single(v) => Some(v),
            QueryValue::Multi(values) => values.first().map(String::as_str),
        }
    }

    /// All values in order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(v) => vec![v.as_str()],
            QueryValue::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Append a value, promoting a single value to a list.
    pub(crate) fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(existing) => {
                let first = std::mem::take(existing);
                *self = QueryValue::Multi(vec![first, value]);
            }
            QueryValue::Multi(values) => values.push(value),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(value)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        QueryValue::Multi(values)
    }
}

/// One path token plus its matrix parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlSegment {
    pub path: String,
    pub parameters: Params,
}

impl UrlSegment {
    pub fn new(path: impl Into<String>, parameters: Params) -> Self {
        Self {
            path: path.into(),
            parameters,
        }
    }

    /// A segment without matrix parameters.
    pub fn path(path: impl Into<String>) -> Self {
        Self::new(path, Params::new())
    }
}

impl fmt::Display for UrlSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::url::serializer::serialize_segment(self))
    }
}

/// One outlet's ordered segments plus its named child groups.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct UrlSegmentGroup {
    pub segments: Vec<UrlSegment>,
    pub children: IndexMap<String, UrlSegmentGroup>,
}

impl UrlSegmentGroup {
    pub fn new(segments: Vec<UrlSegment>, children: IndexMap<String, UrlSegmentGroup>) -> Self {
        Self { segments, children }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn number_of_children(&self) -> usize {
        self.children.len()
    }

    /// No segments and no children.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.children.is_empty()
    }

    pub fn child(&self, outlet: &str) -> Option<&UrlSegmentGroup> {
        self.children.get(outlet)
    }

    /// Children with the primary outlet first, the rest in insertion order.
    pub fn children_primary_first(&self) -> Vec<(&str, &UrlSegmentGroup)> {
        let mut out = Vec::with_capacity(self.children.len());
        if let Some(primary) = self.children.get(PRIMARY_OUTLET) {
            out.push((PRIMARY_OUTLET, primary));
        }
        for (name, child) in &self.children {
            if name != PRIMARY_OUTLET {
                out.push((name.as_str(), child));
            }
        }
        out
    }
}

impl fmt::Display for UrlSegmentGroup {
    /// Serializes only this group's own segments.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::url::serializer::serialize_paths(self))
    }
}

/// The full URL model: root group, query parameters and fragment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct UrlTree {
    pub root: UrlSegmentGroup,
    pub query_params: QueryParams,
    pub fragment: Option<String>,
}

impl UrlTree {
    pub fn new(root: UrlSegmentGroup, query_params: QueryParams, fragment: Option<String>) -> Self {
        Self {
            root,
            query_params,
            fragment,
        }
    }

    /// The tree for `/`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse with the default serializer.
    pub fn parse(url: &str) -> Result<Self, crate::url::MalformedUrlError> {
        DefaultUrlSerializer.parse(url)
    }

    /// First value of a query parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query_params.get(key).and_then(QueryValue::first)
    }
}

impl fmt::Display for UrlTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&DefaultUrlSerializer.serialize(self))
    }
}

/// Shallow map equality used for params comparisons.
pub(crate) fn shallow_equal<V: PartialEq>(a: &IndexMap<String, V>, b: &IndexMap<String, V>) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
}

/// Segment-by-segment equality of path tokens and matrix params.
pub(crate) fn equal_segments(a: &[UrlSegment], b: &[UrlSegment]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.path == y.path && shallow_equal(&x.parameters, &y.parameters))
}

/// Path-token equality, ignoring matrix params.
pub(crate) fn equal_path(a: &[UrlSegment], b: &[UrlSegment]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.path == y.path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_value_push_promotes_to_multi() {
        let mut value = QueryValue::from("a");
        value.push("b".to_string());
        assert_eq!(value, QueryValue::Multi(vec!["a".into(), "b".into()]));
        assert_eq!(value.first(), Some("a"));
    }

    #[test]
    fn test_children_primary_first() {
        let mut children = IndexMap::new();
        children.insert("aux".to_string(), UrlSegmentGroup::default());
        children.insert(PRIMARY_OUTLET.to_string(), UrlSegmentGroup::default());
        let group = UrlSegmentGroup::new(vec![], children);

        let names: Vec<&str> = group.children_primary_first().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["primary", "aux"]);
    }

    #[test]
    fn test_equality_ignores_param_order() {
        let mut a = Params::new();
        a.insert("x".into(), "1".into());
        a.insert("y".into(), "2".into());
        let mut b = Params::new();
        b.insert("y".into(), "2".into());
        b.insert("x".into(), "1".into());
        assert!(shallow_equal(&a, &b));
    }
}
