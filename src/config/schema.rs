//! Configuration schema definitions.
//!
//! This module defines the TOML shape of a navigation setup: router options,
//! observability settings and a recursive route table. Route entries name their
//! guards and resolvers by token; `RouteConfig::build` turns them into `Route`s.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::FutureExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::loader::ConfigError;
use crate::guards::injector::Injector;
use crate::observability::logging::LogFormat;
use crate::routing::loader::{LoadError, RouteModule};
use crate::routing::route::{PathMatch, Route, RunGuardsAndResolvers};
use crate::state::snapshot::ParamsInheritanceStrategy;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NavigationConfig {
    /// Router behavior.
    pub router: RouterOptions,

    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// The route table.
    pub routes: Vec<RouteConfig>,
}

impl NavigationConfig {
    /// Build the route table, resolving tokens against `injector`.
    ///
    /// `load_children` files are resolved relative to `base_dir`.
    pub fn build_routes(&self, injector: &Arc<Injector>, base_dir: &Path) -> Result<Vec<Route>, ConfigError> {
        self.routes.iter().map(|r| r.build(injector, base_dir)).collect()
    }
}

/// What to do when navigating to the URL that is already committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnSameUrlNavigation {
    #[default]
    Ignore,
    Reload,
}

/// When the location is updated during a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlUpdateStrategy {
    /// After activation.
    #[default]
    Deferred,
    /// As soon as routes are recognized.
    Eager,
}

/// What happens to the location when a navigation fails or a guard rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CanceledNavigationResolution {
    /// Put the committed URL back.
    #[default]
    Replace,
    /// Leave the location alone.
    None,
}

/// Router behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterOptions {
    pub on_same_url_navigation: OnSameUrlNavigation,

    pub url_update_strategy: UrlUpdateStrategy,

    pub params_inheritance_strategy: ParamsInheritanceStrategy,

    pub canceled_navigation_resolution: CanceledNavigationResolution,

    /// Absolute redirects allowed per navigation.
    pub max_redirects: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            on_same_url_navigation: OnSameUrlNavigation::default(),
            url_update_strategy: UrlUpdateStrategy::default(),
            params_inheritance_strategy: ParamsInheritanceStrategy::default(),
            canceled_navigation_resolution: CanceledNavigationResolution::default(),
            max_redirects: 31,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG` is unset.
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

/// Re-run policy as written in a route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunGuardsPolicy {
    PathParamsChange,
    PathParamsOrQueryParamsChange,
    ParamsChange,
    ParamsOrQueryParamsChange,
    Always,
}

impl From<RunGuardsPolicy> for RunGuardsAndResolvers {
    fn from(policy: RunGuardsPolicy) -> Self {
        match policy {
            RunGuardsPolicy::PathParamsChange => RunGuardsAndResolvers::PathParamsChange,
            RunGuardsPolicy::PathParamsOrQueryParamsChange => RunGuardsAndResolvers::PathParamsOrQueryParamsChange,
            RunGuardsPolicy::ParamsChange => RunGuardsAndResolvers::ParamsChange,
            RunGuardsPolicy::ParamsOrQueryParamsChange => RunGuardsAndResolvers::ParamsOrQueryParamsChange,
            RunGuardsPolicy::Always => RunGuardsAndResolvers::Always,
        }
    }
}

/// One route table entry.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    pub path: Option<String>,

    pub path_match: Option<PathMatch>,

    pub redirect_to: Option<String>,

    pub outlet: Option<String>,

    pub component: Option<String>,

    /// Static data, merged into the snapshot's data.
    pub data: IndexMap<String, serde_json::Value>,

    pub children: Option<Vec<RouteConfig>>,

    /// Another route file, loaded the first time a navigation needs it.
    pub load_children: Option<String>,

    pub can_activate: Vec<String>,
    pub can_activate_child: Vec<String>,
    pub can_deactivate: Vec<String>,
    pub can_match: Vec<String>,
    pub can_load: Vec<String>,

    /// Data key → resolver token.
    pub resolve: IndexMap<String, String>,

    pub run_guards_and_resolvers: Option<RunGuardsPolicy>,
}

/// Contents of a file named by `load_children`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteFile {
    pub routes: Vec<RouteConfig>,
}

fn unknown(kind: &'static str, token: &str, path: &str) -> ConfigError {
    ConfigError::UnknownToken {
        kind,
        token: token.to_string(),
        path: path.to_string(),
    }
}

impl RouteConfig {
    /// Turn this entry (and its inline children) into a `Route`.
    pub fn build(&self, injector: &Arc<Injector>, base_dir: &Path) -> Result<Route, ConfigError> {
        let path = self.path.clone().ok_or_else(|| ConfigError::MissingPath {
            component: self.component.clone().unwrap_or_default(),
        })?;
        let mut route = Route::new(path.clone());

        if let Some(path_match) = self.path_match {
            route = route.with_path_match(path_match);
        }
        if let Some(target) = &self.redirect_to {
            route = route.with_redirect(target.clone());
        }
        if let Some(outlet) = &self.outlet {
            route = route.with_outlet(outlet.clone());
        }
        if let Some(component) = &self.component {
            route = route.with_component(component.as_str());
        }
        for (key, value) in &self.data {
            route = route.with_data(key.clone(), value.clone());
        }
        for token in &self.can_activate {
            let guard = injector.can_activate(token).ok_or_else(|| unknown("can_activate", token, &path))?;
            route = route.with_can_activate(guard);
        }
        for token in &self.can_activate_child {
            let guard = injector
                .can_activate(token)
                .ok_or_else(|| unknown("can_activate_child", token, &path))?;
            route = route.with_can_activate_child(guard);
        }
        for token in &self.can_deactivate {
            let guard = injector
                .can_deactivate(token)
                .ok_or_else(|| unknown("can_deactivate", token, &path))?;
            route = route.with_can_deactivate(guard);
        }
        for token in &self.can_match {
            let guard = injector.can_match(token).ok_or_else(|| unknown("can_match", token, &path))?;
            route = route.with_can_match(guard);
        }
        for token in &self.can_load {
            let guard = injector.can_match(token).ok_or_else(|| unknown("can_load", token, &path))?;
            route = route.with_can_load(guard);
        }
        for (key, token) in &self.resolve {
            let resolver = injector.resolver(token).ok_or_else(|| unknown("resolve", token, &path))?;
            route = route.with_resolver(key.clone(), resolver);
        }
        if let Some(policy) = self.run_guards_and_resolvers {
            route = route.with_run_guards_and_resolvers(policy.into());
        }
        if let Some(children) = &self.children {
            let built = children
                .iter()
                .map(|c| c.build(injector, base_dir))
                .collect::<Result<Vec<_>, _>>()?;
            route = route.with_children(built);
        }
        if let Some(file) = &self.load_children {
            route = route.with_load_children_fn(lazy_route_file(base_dir.join(file), Arc::clone(injector)));
        }
        Ok(route)
    }
}

/// A loader that reads, parses and builds a route file each time it runs.
fn lazy_route_file(file: PathBuf, injector: Arc<Injector>) -> crate::routing::route::LoadChildrenFn {
    Arc::new(move || {
        let file = file.clone();
        let injector = Arc::clone(&injector);
        async move {
            let content = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| LoadError::new(format!("{}: {e}", file.display())))?;
            let parsed: RouteFile =
                toml::from_str(&content).map_err(|e| LoadError::new(format!("{}: {e}", file.display())))?;
            let base = file.parent().map(Path::to_path_buf).unwrap_or_default();
            let routes = parsed
                .routes
                .iter()
                .map(|r| r.build(&injector, &base))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| LoadError::InvalidConfig(e.to_string()))?;
            Ok(RouteModule::new(routes))
        }
        .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::types::{CanActivateGuard, Resolver};

    fn injector() -> Arc<Injector> {
        Injector::builder("test")
            .can_activate("allow", CanActivateGuard::from_sync(|_, _| true))
            .resolver("user", Resolver::value(|_| serde_json::json!("ada")))
            .build()
    }

    #[test]
    fn test_defaults() {
        let config: NavigationConfig = toml::from_str("").unwrap();
        assert_eq!(config.router.max_redirects, 31);
        assert_eq!(config.router.on_same_url_navigation, OnSameUrlNavigation::Ignore);
        assert_eq!(config.router.url_update_strategy, UrlUpdateStrategy::Deferred);
        assert_eq!(config.router.canceled_navigation_resolution, CanceledNavigationResolution::Replace);
        assert_eq!(config.observability.log_level, "info");
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_parse_nested_routes() {
        let config: NavigationConfig = toml::from_str(
            r#"
            [router]
            on_same_url_navigation = "reload"
            url_update_strategy = "eager"
            canceled_navigation_resolution = "none"

            [[routes]]
            path = ""
            redirect_to = "home"
            path_match = "full"

            [[routes]]
            path = "user/:id"
            component = "User"
            can_activate = ["allow"]
            resolve = { name = "user" }
            run_guards_and_resolvers = "always"
            data = { title = "User", level = 3 }

            [[routes.children]]
            path = "settings"
            component = "Settings"
            "#,
        )
        .unwrap();

        assert_eq!(config.router.on_same_url_navigation, OnSameUrlNavigation::Reload);
        assert_eq!(config.router.url_update_strategy, UrlUpdateStrategy::Eager);
        assert_eq!(config.router.canceled_navigation_resolution, CanceledNavigationResolution::None);
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].path_match, Some(PathMatch::Full));
        assert_eq!(config.routes[1].data["level"], serde_json::json!(3));
        assert_eq!(config.routes[1].children.as_ref().unwrap()[0].path.as_deref(), Some("settings"));
    }

    #[test]
    fn test_build_resolves_tokens() {
        let config: NavigationConfig = toml::from_str(
            r#"
            [[routes]]
            path = "user/:id"
            component = "User"
            can_activate = ["allow"]
            resolve = { name = "user" }
            "#,
        )
        .unwrap();
        let routes = config.build_routes(&injector(), Path::new(".")).unwrap();
        assert_eq!(routes[0].path(), Some("user/:id"));
        assert_eq!(routes[0].resolvers().len(), 1);
        assert_eq!(routes[0].can_activate.len(), 1);
    }

    #[test]
    fn test_build_rejects_unknown_token() {
        let config: NavigationConfig = toml::from_str(
            r#"
            [[routes]]
            path = "admin"
            component = "Admin"
            can_activate = ["nope"]
            "#,
        )
        .unwrap();
        let err = config.build_routes(&injector(), Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownToken { kind: "can_activate", .. }));
    }

    #[tokio::test]
    async fn test_load_children_reads_route_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("admin.toml"),
            "[[routes]]\npath = \"users\"\ncomponent = \"AdminUsers\"\n",
        )
        .unwrap();
        let entry = RouteConfig {
            path: Some("admin".into()),
            load_children: Some("admin.toml".into()),
            ..RouteConfig::default()
        };
        let route = Arc::new(entry.build(&injector(), dir.path()).unwrap());
        let loader = crate::routing::loader::RouterConfigLoader::new();
        let loaded = loader.load_children(&route).await.unwrap();
        assert_eq!(loaded.routes.len(), 1);
        assert_eq!(loaded.routes[0].path(), Some("users"));
    }
}
