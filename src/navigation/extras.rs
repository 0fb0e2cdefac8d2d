//! Per-call navigation options.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::schema::OnSameUrlNavigation;
use crate::state::activated::ActivatedRoute;
use crate::url::{QueryParams, UrlTree};

/// How query params of the new tree relate to the current ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryParamsHandling {
    /// Use only the given params.
    #[default]
    Replace,
    /// Current params overlaid with the given ones.
    Merge,
    /// Keep the current params, ignore the given ones.
    Preserve,
}

/// Options for building a tree from commands.
#[derive(Debug, Clone, Default)]
pub struct UrlCreationOptions {
    /// Commands that do not start with `/` are applied relative to this route.
    pub relative_to: Option<Arc<ActivatedRoute>>,
    pub query_params: Option<QueryParams>,
    pub query_params_handling: QueryParamsHandling,
    pub fragment: Option<String>,
    /// Keep the current fragment, ignoring `fragment`.
    pub preserve_fragment: bool,
}

impl UrlCreationOptions {
    /// Query params and fragment for the new tree, given the committed one.
    pub(crate) fn query_and_fragment(&self, current: &UrlTree) -> (QueryParams, Option<String>) {
        let given = self.query_params.clone().unwrap_or_default();
        let query_params = match self.query_params_handling {
            QueryParamsHandling::Replace => given,
            QueryParamsHandling::Preserve => current.query_params.clone(),
            QueryParamsHandling::Merge => {
                let mut merged = current.query_params.clone();
                merged.extend(given);
                merged
            }
        };
        let fragment = if self.preserve_fragment {
            current.fragment.clone()
        } else {
            self.fragment.clone()
        };
        (query_params, fragment)
    }
}

/// Options for how a navigation behaves.
#[derive(Debug, Clone, Default)]
pub struct NavigationBehaviorOptions {
    /// Navigate without touching the location.
    pub skip_location_change: bool,
    /// Replace the current history entry instead of pushing one.
    pub replace_url: bool,
    /// Stored in the history entry and reported back on popstate.
    pub state: Option<serde_json::Value>,
    /// Overrides the router's option for this call.
    pub on_same_url_navigation: Option<OnSameUrlNavigation>,
}

/// Everything `Router::navigate` accepts.
#[derive(Debug, Clone, Default)]
pub struct NavigationExtras {
    pub url: UrlCreationOptions,
    pub behavior: NavigationBehaviorOptions,
}

impl NavigationExtras {
    pub fn relative_to(mut self, route: Arc<ActivatedRoute>) -> Self {
        self.url.relative_to = Some(route);
        self
    }

    pub fn query_params(mut self, params: QueryParams) -> Self {
        self.url.query_params = Some(params);
        self
    }

    pub fn query_params_handling(mut self, handling: QueryParamsHandling) -> Self {
        self.url.query_params_handling = handling;
        self
    }

    pub fn fragment(mut self, fragment: impl Into<String>) -> Self {
        self.url.fragment = Some(fragment.into());
        self
    }

    pub fn preserve_fragment(mut self) -> Self {
        self.url.preserve_fragment = true;
        self
    }

    pub fn skip_location_change(mut self) -> Self {
        self.behavior.skip_location_change = true;
        self
    }

    pub fn replace_url(mut self) -> Self {
        self.behavior.replace_url = true;
        self
    }

    pub fn state(mut self, state: serde_json::Value) -> Self {
        self.behavior.state = Some(state);
        self
    }

    pub fn on_same_url_navigation(mut self, mode: OnSameUrlNavigation) -> Self {
        self.behavior.on_same_url_navigation = Some(mode);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::QueryValue;

    fn current() -> UrlTree {
        UrlTree::parse("/a?x=1&y=2#top").unwrap()
    }

    fn given() -> QueryParams {
        let mut params = QueryParams::new();
        params.insert("y".into(), QueryValue::from("9"));
        params.insert("z".into(), QueryValue::from("3"));
        params
    }

    #[test]
    fn test_replace_uses_only_given_params() {
        let extras = NavigationExtras::default().query_params(given());
        let (params, fragment) = extras.url.query_and_fragment(&current());
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["y", "z"]);
        assert_eq!(fragment, None);
    }

    #[test]
    fn test_merge_overlays_given_params() {
        let extras = NavigationExtras::default()
            .query_params(given())
            .query_params_handling(QueryParamsHandling::Merge);
        let (params, _) = extras.url.query_and_fragment(&current());
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["x", "y", "z"]);
        assert_eq!(params["y"], QueryValue::from("9"));
    }

    #[test]
    fn test_preserve_keeps_current_params_and_fragment() {
        let extras = NavigationExtras::default()
            .query_params(given())
            .query_params_handling(QueryParamsHandling::Preserve)
            .fragment("ignored")
            .preserve_fragment();
        let (params, fragment) = extras.url.query_and_fragment(&current());
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(fragment.as_deref(), Some("top"));
    }
}
