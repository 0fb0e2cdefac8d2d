//! `redirect_to` rewriting.
//!
//! # Responsibilities
//! - Build the target tree of a redirect from consumed segments and positional bindings
//! - Copy `:name` query values from the URL being redirected
//! - Flatten relative redirect targets back into a segment list for re-matching
//!
//! # Design Decisions
//! - Absolute targets (`/...`) restart recognition from the root; the recognizer counts hops
//! - Relative targets splice into the current level and are re-matched with redirects off,
//!   so a relative redirect can never cycle
//! - Named outlets are only allowed in absolute targets

use crate::routing::error::{RoutingError, RoutingResult};
use crate::routing::matcher::MatchResult;
use crate::routing::route::Route;
use crate::url::{QueryParams, QueryValue, UrlSegment, UrlSegmentGroup, UrlSerializer, UrlTree, PRIMARY_OUTLET};

/// Result of applying one `redirect_to`.
pub(crate) enum Redirect {
    /// Restart recognition with this tree.
    Absolute(UrlTree),
    /// Re-match these segments at the current level.
    Relative(Vec<UrlSegment>),
}

/// Apply `route.redirect_to` to a successful match.
pub(crate) fn apply_redirect(
    serializer: &dyn UrlSerializer,
    route: &Route,
    matched: &MatchResult,
    current: &UrlTree,
) -> RoutingResult<Redirect> {
    let redirect_to = route
        .redirect_to()
        .ok_or_else(|| RoutingError::InvalidRedirect(format!("route '{}' has no redirect", route.display_path())))?;

    let target = serializer
        .parse(redirect_to)
        .map_err(|e| RoutingError::InvalidRedirect(e.to_string()))?;

    let mut actual = matched.consumed.clone();
    let root = create_segment_group(redirect_to, &target.root, &mut actual, matched)?;
    let tree = UrlTree::new(
        root,
        create_query_params(&target.query_params, &current.query_params),
        target.fragment.clone(),
    );

    if redirect_to.starts_with('/') {
        return Ok(Redirect::Absolute(tree));
    }
    lineralize_segments(redirect_to, &tree).map(Redirect::Relative)
}

fn create_query_params(redirect_params: &QueryParams, actual: &QueryParams) -> QueryParams {
    let mut out = QueryParams::new();
    for (key, value) in redirect_params {
        match value {
            QueryValue::Single(v) if v.starts_with(':') => {
                if let Some(source) = actual.get(&v[1..]) {
                    out.insert(key.clone(), source.clone());
                }
            }
            other => {
                out.insert(key.clone(), other.clone());
            }
        }
    }
    out
}

fn create_segment_group(
    redirect_to: &str,
    group: &UrlSegmentGroup,
    actual: &mut Vec<UrlSegment>,
    matched: &MatchResult,
) -> RoutingResult<UrlSegmentGroup> {
    let mut segments = Vec::with_capacity(group.segments.len());
    for segment in &group.segments {
        if let Some(name) = segment.path.strip_prefix(':') {
            let bound = matched.positional.get(name).ok_or_else(|| {
                RoutingError::InvalidRedirect(format!(
                    "cannot redirect to '{}': cannot find '{}'",
                    redirect_to, segment.path
                ))
            })?;
            segments.push(bound.clone());
        } else {
            segments.push(find_or_return(segment, actual));
        }
    }

    let mut children = indexmap::IndexMap::new();
    for (name, child) in &group.children {
        children.insert(name.clone(), create_segment_group(redirect_to, child, actual, matched)?);
    }
    Ok(UrlSegmentGroup::new(segments, children))
}

/// Reuse a consumed segment with the same path (keeping its matrix params), dropping it
/// and everything after it from the candidates.
fn find_or_return(target: &UrlSegment, actual: &mut Vec<UrlSegment>) -> UrlSegment {
    match actual.iter().position(|s| s.path == target.path) {
        Some(idx) => {
            let found = actual[idx].clone();
            actual.truncate(idx);
            found
        }
        None => target.clone(),
    }
}

fn lineralize_segments(redirect_to: &str, tree: &UrlTree) -> RoutingResult<Vec<UrlSegment>> {
    let mut res = Vec::new();
    let mut current = &tree.root;
    loop {
        res.extend(current.segments.iter().cloned());
        if current.number_of_children() == 0 {
            return Ok(res);
        }
        match current.child(PRIMARY_OUTLET) {
            Some(primary) if current.number_of_children() == 1 => current = primary,
            _ => {
                return Err(RoutingError::InvalidRedirect(format!(
                    "only absolute redirects can have named outlets. redirect_to: '{}'",
                    redirect_to
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::matcher::match_route;
    use crate::url::DefaultUrlSerializer;

    fn redirect(path: &str, to: &str, url: &str) -> RoutingResult<Redirect> {
        let route = Route::new(path).with_redirect(to);
        let current = UrlTree::parse(url).expect("url");
        let primary = current.root.child(PRIMARY_OUTLET).cloned().unwrap_or_default();
        let matched = match_route(&primary, &route, &primary.segments);
        apply_redirect(&DefaultUrlSerializer, &route, &matched, &current)
    }

    #[test]
    fn test_relative_redirect_substitutes_params() {
        match redirect("user/:id", "profile/:id", "/user/7").unwrap() {
            Redirect::Relative(segments) => {
                let paths: Vec<_> = segments.iter().map(|s| s.path.as_str()).collect();
                assert_eq!(paths, vec!["profile", "7"]);
            }
            Redirect::Absolute(_) => panic!("expected relative redirect"),
        }
    }

    #[test]
    fn test_absolute_redirect_copies_query_placeholders() {
        match redirect("old/:id", "/new/:id?ref=:src&fixed=1", "/old/3?src=mail&other=x").unwrap() {
            Redirect::Absolute(tree) => assert_eq!(tree.to_string(), "/new/3?ref=mail&fixed=1"),
            Redirect::Relative(_) => panic!("expected absolute redirect"),
        }
    }

    #[test]
    fn test_consumed_segment_keeps_matrix_params() {
        match redirect("a", "a/b", "/a;k=v").unwrap() {
            Redirect::Relative(segments) => {
                assert_eq!(segments[0].parameters.get("k").map(String::as_str), Some("v"));
                assert_eq!(segments[1].path, "b");
            }
            Redirect::Absolute(_) => panic!("expected relative redirect"),
        }
    }

    #[test]
    fn test_missing_positional_param() {
        assert!(matches!(redirect("a", "b/:id", "/a"), Err(RoutingError::InvalidRedirect(_))));
    }

    #[test]
    fn test_relative_named_outlet_rejected() {
        assert!(matches!(redirect("a", "b(aux:c)", "/a"), Err(RoutingError::InvalidRedirect(_))));
    }
}
