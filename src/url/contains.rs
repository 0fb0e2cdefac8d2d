//! Active-URL containment checks.
//!
//! # Responsibilities
//! - Decide whether a URL tree is "active" relative to the committed tree
//! - Compare paths exactly or as a prefix, and params exactly, as a subset, or not at all

use serde::{Deserialize, Serialize};

use crate::url::tree::{equal_path, shallow_equal, Params, QueryParams, UrlSegment, UrlSegmentGroup, UrlTree, PRIMARY_OUTLET};

/// How paths are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathMatchMode {
    Exact,
    Subset,
}

/// How query or matrix params are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamMatchMode {
    Exact,
    Subset,
    Ignored,
}

/// How the fragment is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentMatchMode {
    Exact,
    Ignored,
}

/// Options for `is_active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsActiveMatchOptions {
    pub paths: PathMatchMode,
    pub query_params: ParamMatchMode,
    pub matrix_params: ParamMatchMode,
    pub fragment: FragmentMatchMode,
}

impl IsActiveMatchOptions {
    /// Same paths and query params; matrix params and fragment ignored.
    pub const EXACT: Self = Self {
        paths: PathMatchMode::Exact,
        query_params: ParamMatchMode::Exact,
        matrix_params: ParamMatchMode::Ignored,
        fragment: FragmentMatchMode::Ignored,
    };

    /// Path prefix and query-param subset; matrix params and fragment ignored.
    pub const SUBSET: Self = Self {
        paths: PathMatchMode::Subset,
        query_params: ParamMatchMode::Subset,
        matrix_params: ParamMatchMode::Ignored,
        fragment: FragmentMatchMode::Ignored,
    };

    pub fn exact(exact: bool) -> Self {
        if exact {
            Self::EXACT
        } else {
            Self::SUBSET
        }
    }
}

/// True when `container` (the committed tree) contains `containee`.
pub fn contains_tree(container: &UrlTree, containee: &UrlTree, options: &IsActiveMatchOptions) -> bool {
    let paths = match options.paths {
        PathMatchMode::Exact => equal_groups(&container.root, &containee.root, options.matrix_params),
        PathMatchMode::Subset => contains_group(&container.root, &containee.root, &containee.root.segments, options.matrix_params),
    };
    paths
        && query_params_match(&container.query_params, &containee.query_params, options.query_params)
        && !(options.fragment == FragmentMatchMode::Exact && container.fragment != containee.fragment)
}

fn query_params_match(container: &QueryParams, containee: &QueryParams, mode: ParamMatchMode) -> bool {
    match mode {
        ParamMatchMode::Exact => shallow_equal(container, containee),
        ParamMatchMode::Subset => {
            containee.len() <= container.len()
                && containee.iter().all(|(k, v)| match container.get(k) {
                    Some(existing) => {
                        let mut a = existing.values();
                        let mut b = v.values();
                        a.sort_unstable();
                        b.sort_unstable();
                        a == b
                    }
                    None => false,
                })
        }
        ParamMatchMode::Ignored => true,
    }
}

fn matrix_params_match(container: &Params, containee: &Params, mode: ParamMatchMode) -> bool {
    match mode {
        ParamMatchMode::Exact => shallow_equal(container, containee),
        ParamMatchMode::Subset => {
            containee.len() <= container.len() && containee.iter().all(|(k, v)| container.get(k) == Some(v))
        }
        ParamMatchMode::Ignored => true,
    }
}

fn segments_params_match(container: &[UrlSegment], containee: &[UrlSegment], mode: ParamMatchMode) -> bool {
    containee
        .iter()
        .zip(container)
        .all(|(inner, outer)| matrix_params_match(&outer.parameters, &inner.parameters, mode))
}

fn equal_groups(container: &UrlSegmentGroup, containee: &UrlSegmentGroup, mode: ParamMatchMode) -> bool {
    if !equal_path(&container.segments, &containee.segments) {
        return false;
    }
    if !segments_params_match(&container.segments, &containee.segments, mode) {
        return false;
    }
    if container.number_of_children() != containee.number_of_children() {
        return false;
    }
    containee.children.iter().all(|(outlet, inner)| match container.child(outlet) {
        Some(outer) => equal_groups(outer, inner, mode),
        None => false,
    })
}

fn contains_group(
    container: &UrlSegmentGroup,
    containee: &UrlSegmentGroup,
    containee_paths: &[UrlSegment],
    mode: ParamMatchMode,
) -> bool {
    let own = container.segments.len();

    if own > containee_paths.len() {
        let current = &container.segments[..containee_paths.len()];
        equal_path(current, containee_paths)
            && !containee.has_children()
            && segments_params_match(current, containee_paths, mode)
    } else if own == containee_paths.len() {
        if !equal_path(&container.segments, containee_paths) {
            return false;
        }
        if !segments_params_match(&container.segments, containee_paths, mode) {
            return false;
        }
        containee.children.iter().all(|(outlet, inner)| match container.child(outlet) {
            Some(outer) => contains_group(outer, inner, &inner.segments, mode),
            None => false,
        })
    } else {
        let (current, next) = containee_paths.split_at(own);
        if !equal_path(&container.segments, current) {
            return false;
        }
        if !segments_params_match(&container.segments, current, mode) {
            return false;
        }
        match container.child(PRIMARY_OUTLET) {
            Some(primary) => contains_group(primary, containee, next, mode),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(current: &str, target: &str, options: IsActiveMatchOptions) -> bool {
        let current = UrlTree::parse(current).expect("current");
        let target = UrlTree::parse(target).expect("target");
        contains_tree(&current, &target, &options)
    }

    #[test]
    fn test_exact_match() {
        assert!(active("/a/b?x=1", "/a/b?x=1", IsActiveMatchOptions::EXACT));
        assert!(!active("/a/b?x=1", "/a/b", IsActiveMatchOptions::EXACT));
        assert!(!active("/a/b", "/a", IsActiveMatchOptions::EXACT));
    }

    #[test]
    fn test_subset_match() {
        assert!(active("/a/b/c?x=1&y=2", "/a/b?x=1", IsActiveMatchOptions::SUBSET));
        assert!(!active("/a/b", "/a/c", IsActiveMatchOptions::SUBSET));
        assert!(!active("/a?x=1", "/a?x=2", IsActiveMatchOptions::SUBSET));
    }

    #[test]
    fn test_subset_through_outlets() {
        assert!(active("/a/(b//aux:c)", "/a/b", IsActiveMatchOptions::SUBSET));
        assert!(active("/a(aux:c)", "/a", IsActiveMatchOptions::SUBSET));
    }

    #[test]
    fn test_matrix_and_fragment_modes() {
        let mut options = IsActiveMatchOptions::EXACT;
        assert!(active("/a;k=1", "/a;k=2", options));
        options.matrix_params = ParamMatchMode::Exact;
        assert!(!active("/a;k=1", "/a;k=2", options));
        options.fragment = FragmentMatchMode::Exact;
        assert!(!active("/a;k=1#x", "/a;k=1#y", options));
        assert!(active("/a;k=1#x", "/a;k=1#x", options));
    }
}
