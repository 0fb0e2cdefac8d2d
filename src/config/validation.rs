//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation of the TOML file (serde handles syntactic)
//! - Structural validation of built route tables, including lazily loaded ones
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Route errors carry the full path from the table root, so nested mistakes are findable
//! - Runs before a table is accepted by the router or cached by the loader

use std::fmt;
use std::sync::Arc;

use crate::config::schema::{NavigationConfig, RouteConfig};
use crate::routing::route::Route;
use crate::url::PRIMARY_OUTLET;

/// A validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Where the problem is (`router.max_redirects`, `admin/users`).
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a parsed configuration file.
pub fn validate_config(config: &NavigationConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.router.max_redirects == 0 {
        errors.push(ValidationError::new("router.max_redirects", "must be at least 1"));
    }
    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }
    validate_entries(&config.routes, "routes", &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_entries(entries: &[RouteConfig], at: &str, errors: &mut Vec<ValidationError>) {
    for (idx, entry) in entries.iter().enumerate() {
        let here = format!("{at}[{idx}]");
        if entry.path.is_none() {
            errors.push(ValidationError::new(&here, "routes written as data need a path"));
        }
        for key in entry.resolve.keys().filter(|k| k.is_empty()) {
            errors.push(ValidationError::new(&here, format!("empty resolve key '{key}'")));
        }
        if let Some(children) = &entry.children {
            validate_entries(children, &format!("{here}.children"), errors);
        }
    }
}

/// Validate a route table. `parent_path` prefixes every reported path.
pub fn validate_routes(routes: &[Arc<Route>], parent_path: &str) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    for route in routes {
        validate_node(route, parent_path, &mut errors);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn full_path(parent: &str, route: &Route) -> String {
    let own = route.path.as_deref().unwrap_or("<matcher>");
    match (parent.is_empty(), own.is_empty()) {
        (true, _) => own.to_string(),
        (false, true) => parent.to_string(),
        (false, false) => format!("{parent}/{own}"),
    }
}

fn validate_node(route: &Route, parent: &str, errors: &mut Vec<ValidationError>) {
    let path = full_path(parent, route);
    let mut fail = |message: &str| errors.push(ValidationError::new(&path, message));

    let has_component = route.component.is_some() || route.load_component.is_some();
    if route.redirect_to.is_some() {
        if route.children.is_some() {
            fail("redirect_to and children cannot be used together");
        }
        if route.load_children.is_some() {
            fail("redirect_to and load_children cannot be used together");
        }
        if has_component {
            fail("redirect_to and component cannot be used together");
        }
        if !route.can_activate.is_empty() {
            fail("redirect_to and can_activate cannot be used together");
        }
    }
    if route.children.is_some() && route.load_children.is_some() {
        fail("children and load_children cannot be used together");
    }
    if route.component.is_some() && route.load_component.is_some() {
        fail("component and load_component cannot be used together");
    }
    match (&route.path, &route.matcher) {
        (Some(_), Some(_)) => fail("path and matcher cannot be used together"),
        (None, None) => fail("routes must have either a path or a matcher specified"),
        _ => {}
    }
    let has_content = has_component || route.children.is_some() || route.load_children.is_some();
    if route.redirect_to.is_none() && !has_content {
        fail("one of component, load_component, redirect_to, children or load_children must be provided");
    }
    if route.path.as_deref().is_some_and(|p| p.starts_with('/')) {
        fail("path cannot start with a slash");
    }
    if route.path.as_deref() == Some("") && route.redirect_to.is_some() && !route.has_explicit_path_match() {
        fail("an empty-path redirect needs an explicit path_match");
    }
    if route.outlet() != PRIMARY_OUTLET && !has_content {
        fail("a componentless route without children or load_children cannot have a named outlet");
    }

    if let Some(children) = &route.children {
        for child in children {
            validate_node(child, &path, errors);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::route::{PathMatch, UrlMatchResult};

    fn check(routes: Vec<Route>) -> Vec<ValidationError> {
        let routes: Vec<Arc<Route>> = routes.into_iter().map(Arc::new).collect();
        validate_routes(&routes, "").err().unwrap_or_default()
    }

    #[test]
    fn test_valid_table_passes() {
        let errors = check(vec![
            Route::new("").with_redirect("home").with_path_match(PathMatch::Full),
            Route::new("home").with_component("Home"),
            Route::new("admin").with_children(vec![Route::new("users").with_component("Users")]),
            Route::new("aux").with_outlet("side").with_component("Side"),
        ]);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_reports_every_violation() {
        let errors = check(vec![
            Route::new("/abs").with_component("A"),
            Route::new("").with_redirect("x"),
            Route::new("bare"),
        ]);
        assert_eq!(errors.len(), 3);
        assert!(errors[0].message.contains("slash"));
        assert!(errors[1].message.contains("path_match"));
        assert!(errors[2].message.contains("must be provided"));
    }

    #[test]
    fn test_redirect_with_children_is_rejected() {
        let errors = check(vec![Route::new("a")
            .with_redirect("b")
            .with_children(vec![Route::new("c").with_component("C")])]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "a");
    }

    #[test]
    fn test_nested_errors_carry_full_path() {
        let errors = check(vec![Route::new("admin").with_children(vec![Route::new("users")])]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "admin/users");
    }

    #[test]
    fn test_path_and_matcher_are_exclusive() {
        let mut route = Route::matching(|_: &[crate::url::UrlSegment], _: &crate::url::UrlSegmentGroup, _: &Route| {
            None::<UrlMatchResult>
        })
        .with_component("M");
        route.path = Some("m".into());
        let errors = check(vec![route]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("matcher"));
    }

    #[test]
    fn test_config_entries_need_path() {
        let mut config = NavigationConfig::default();
        config.routes.push(RouteConfig {
            component: Some("A".into()),
            ..RouteConfig::default()
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].path, "routes[0]");
    }
}
