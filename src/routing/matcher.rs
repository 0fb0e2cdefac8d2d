//! Segment matching against single routes.
//!
//! # Responsibilities
//! - Match a route's `path` (or custom matcher) against the front of a segment list
//! - Bind `:name` tokens positionally and absorb everything for `**`
//! - Split a segment group so empty-path routes on named outlets get a group to match
//!
//! # Design Decisions
//! - `full` matching refuses leftovers and child groups; `prefix` leaves them for children
//! - Parameters of the last consumed segment's matrix params win over positional ones
//! - No allocation of new groups unless an empty-path split is actually needed

use std::sync::Arc;

use indexmap::IndexMap;

use crate::routing::route::{PathMatch, Route, UrlMatchResult};
use crate::url::{Params, UrlSegment, UrlSegmentGroup, PRIMARY_OUTLET};

/// Outcome of matching one route.
#[derive(Debug, Clone, Default)]
pub(crate) struct MatchResult {
    pub matched: bool,
    pub consumed: Vec<UrlSegment>,
    pub remaining: Vec<UrlSegment>,
    pub parameters: Params,
    pub positional: IndexMap<String, UrlSegment>,
}

impl MatchResult {
    fn no_match() -> Self {
        Self::default()
    }
}

/// The built-in matcher: literal parts and `:param` bindings.
pub fn default_url_matcher(segments: &[UrlSegment], group: &UrlSegmentGroup, route: &Route) -> Option<UrlMatchResult> {
    let path = route.path()?;
    let parts: Vec<&str> = path.split('/').collect();

    if parts.len() > segments.len() {
        return None;
    }
    if route.path_match() == PathMatch::Full && (group.has_children() || parts.len() < segments.len()) {
        return None;
    }

    let mut pos_params = IndexMap::new();
    for (part, segment) in parts.iter().zip(segments) {
        if let Some(name) = part.strip_prefix(':') {
            pos_params.insert(name.to_string(), segment.clone());
        } else if *part != segment.path {
            return None;
        }
    }

    Some(UrlMatchResult {
        consumed: segments[..parts.len()].to_vec(),
        pos_params,
    })
}

/// Match `route` against `segments` without running any guards.
pub(crate) fn match_route(group: &UrlSegmentGroup, route: &Route, segments: &[UrlSegment]) -> MatchResult {
    if route.path() == Some("**") {
        return MatchResult {
            matched: true,
            consumed: segments.to_vec(),
            remaining: Vec::new(),
            parameters: segments.last().map(|s| s.parameters.clone()).unwrap_or_default(),
            positional: IndexMap::new(),
        };
    }

    if route.path() == Some("") {
        if route.path_match() == PathMatch::Full && (group.has_children() || !segments.is_empty()) {
            return MatchResult::no_match();
        }
        return MatchResult {
            matched: true,
            consumed: Vec::new(),
            remaining: segments.to_vec(),
            parameters: Params::new(),
            positional: IndexMap::new(),
        };
    }

    let result = match &route.matcher {
        Some(matcher) => matcher.match_segments(segments, group, route),
        None => default_url_matcher(segments, group, route),
    };
    let Some(result) = result else {
        return MatchResult::no_match();
    };

    let mut parameters: Params = result
        .pos_params
        .iter()
        .map(|(k, v)| (k.clone(), v.path.clone()))
        .collect();
    if let Some(last) = result.consumed.last() {
        for (k, v) in &last.parameters {
            parameters.insert(k.clone(), v.clone());
        }
    }

    let consumed_len = result.consumed.len().min(segments.len());
    MatchResult {
        matched: true,
        remaining: segments[consumed_len..].to_vec(),
        consumed: result.consumed,
        parameters,
        positional: result.pos_params,
    }
}

/// An empty-path route that could match here without consuming anything.
pub(crate) fn empty_path_match(group: &UrlSegmentGroup, sliced: &[UrlSegment], route: &Route) -> bool {
    if (group.has_children() || !sliced.is_empty()) && route.path_match() == PathMatch::Full {
        return false;
    }
    route.path() == Some("")
}

/// Cheap pre-check before guards run.
pub(crate) fn is_immediate_match(route: &Route, group: &UrlSegmentGroup, segments: &[UrlSegment], outlet: &str) -> bool {
    if route.outlet() != outlet && (outlet == PRIMARY_OUTLET || !empty_path_match(group, segments, route)) {
        return false;
    }
    if route.path() == Some("**") {
        return true;
    }
    match_route(group, route, segments).matched
}

/// Nothing left to match on this outlet.
pub(crate) fn no_leftovers(group: &UrlSegmentGroup, segments: &[UrlSegment], outlet: &str) -> bool {
    segments.is_empty() && group.child(outlet).is_none()
}

/// Routes declaring `outlet` first, the rest after.
pub(crate) fn sort_by_matching_outlets(routes: &[Arc<Route>], outlet: &str) -> Vec<Arc<Route>> {
    let (mut matching, rest): (Vec<_>, Vec<_>) = routes.iter().cloned().partition(|r| r.outlet() == outlet);
    matching.extend(rest);
    matching
}

/// Regroup `group` after `consumed` so empty-path routes on named outlets have something to match.
pub(crate) fn split(
    group: &UrlSegmentGroup,
    consumed: &[UrlSegment],
    sliced: &[UrlSegment],
    config: &[Arc<Route>],
) -> (UrlSegmentGroup, Vec<UrlSegment>) {
    let has_named_empty = config
        .iter()
        .any(|r| empty_path_match(group, sliced, r) && r.outlet() != PRIMARY_OUTLET);

    if !sliced.is_empty() && has_named_empty {
        let mut children = IndexMap::new();
        children.insert(
            PRIMARY_OUTLET.to_string(),
            UrlSegmentGroup::new(sliced.to_vec(), group.children.clone()),
        );
        for route in config {
            if route.path() == Some("") && route.outlet() != PRIMARY_OUTLET {
                children.insert(route.outlet().to_string(), UrlSegmentGroup::default());
            }
        }
        return (UrlSegmentGroup::new(consumed.to_vec(), children), Vec::new());
    }

    if sliced.is_empty() && config.iter().any(|r| empty_path_match(group, sliced, r)) {
        let mut children = group.children.clone();
        for route in config {
            if empty_path_match(group, sliced, route) && !group.children.contains_key(route.outlet()) {
                children.insert(route.outlet().to_string(), UrlSegmentGroup::default());
            }
        }
        return (UrlSegmentGroup::new(group.segments.clone(), children), sliced.to_vec());
    }

    (group.clone(), sliced.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(paths: &[&str]) -> Vec<UrlSegment> {
        paths.iter().map(|p| UrlSegment::path(*p)).collect()
    }

    #[test]
    fn test_positional_params() {
        let route = Route::new("team/:id");
        let group = UrlSegmentGroup::default();
        let res = match_route(&group, &route, &segs(&["team", "33", "user"]));
        assert!(res.matched);
        assert_eq!(res.consumed.len(), 2);
        assert_eq!(res.remaining.len(), 1);
        assert_eq!(res.parameters.get("id").map(String::as_str), Some("33"));
    }

    #[test]
    fn test_full_match_rejects_leftovers() {
        let route = Route::new("a").with_path_match(PathMatch::Full);
        let group = UrlSegmentGroup::default();
        assert!(!match_route(&group, &route, &segs(&["a", "b"])).matched);
        assert!(match_route(&group, &route, &segs(&["a"])).matched);
    }

    #[test]
    fn test_wildcard_absorbs_everything() {
        let route = Route::new("**");
        let mut last = UrlSegment::path("z");
        last.parameters.insert("k".into(), "v".into());
        let mut segments = segs(&["x", "y"]);
        segments.push(last);

        let res = match_route(&UrlSegmentGroup::default(), &route, &segments);
        assert!(res.matched);
        assert_eq!(res.consumed.len(), 3);
        assert!(res.remaining.is_empty());
        assert_eq!(res.parameters.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn test_matrix_params_override_positional() {
        let route = Route::new(":id");
        let mut seg = UrlSegment::path("5");
        seg.parameters.insert("id".into(), "matrix".into());
        let res = match_route(&UrlSegmentGroup::default(), &route, &[seg]);
        assert_eq!(res.parameters.get("id").map(String::as_str), Some("matrix"));
    }

    #[test]
    fn test_custom_matcher() {
        let route = Route::matching(|segments: &[UrlSegment], _: &UrlSegmentGroup, _: &Route| {
            let first = segments.first()?;
            first.path.ends_with(".html").then(|| UrlMatchResult {
                consumed: vec![first.clone()],
                pos_params: IndexMap::from([("page".to_string(), first.clone())]),
            })
        });
        let res = match_route(&UrlSegmentGroup::default(), &route, &segs(&["index.html"]));
        assert!(res.matched);
        assert_eq!(res.parameters.get("page").map(String::as_str), Some("index.html"));
        assert!(!match_route(&UrlSegmentGroup::default(), &route, &segs(&["index"])).matched);
    }

    #[test]
    fn test_split_adds_named_empty_path_groups() {
        let config = vec![
            Arc::new(Route::new("").with_outlet("aux").with_component("Aux")),
            Arc::new(Route::new("b").with_component("B")),
        ];
        let group = UrlSegmentGroup::new(segs(&["a", "b"]), IndexMap::new());
        let (split_group, sliced) = split(&group, &segs(&["a"]), &segs(&["b"]), &config);

        assert!(sliced.is_empty());
        assert_eq!(split_group.child(PRIMARY_OUTLET).map(|g| g.segments.len()), Some(1));
        assert!(split_group.child("aux").is_some());
    }
}
