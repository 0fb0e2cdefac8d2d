//! Route configuration nodes.
//!
//! # Responsibilities
//! - Describe one entry of the declarative route table
//! - Hold guard, resolver and loader capabilities resolved at registration time
//! - Cache lazily loaded children and components on the node itself
//!
//! # Design Decisions
//! - A node is shared as `Arc<Route>`; the allocation is the reuse identity
//! - Builder methods consume and return `Self` so tables read top-down
//! - Lazy results live in `OnceLock`s, so they are dropped together with the node

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::guards::injector::Injector;
use crate::guards::types::{CanActivateGuard, CanDeactivateGuard, CanMatchGuard, Resolver};
use crate::routing::loader::{LoadError, LoadedRouterConfig, RouteModule};
use crate::state::snapshot::ActivatedRouteSnapshot;
use crate::url::{UrlSegment, UrlSegmentGroup, PRIMARY_OUTLET};

/// Static and resolved route data.
pub type Data = IndexMap<String, serde_json::Value>;

/// Names a component type for the host to instantiate.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ComponentRef(Arc<str>);

impl ComponentRef {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentRef({})", self.0)
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ComponentRef {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Whether a path must consume all remaining segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathMatch {
    #[default]
    Prefix,
    Full,
}

/// When guards and resolvers re-run for a route that stays active.
#[derive(Clone, Default)]
pub enum RunGuardsAndResolvers {
    PathParamsChange,
    PathParamsOrQueryParamsChange,
    #[default]
    ParamsChange,
    ParamsOrQueryParamsChange,
    Always,
    /// Re-run when the predicate returns true for (current, future).
    Custom(Arc<dyn Fn(&ActivatedRouteSnapshot, &ActivatedRouteSnapshot) -> bool + Send + Sync>),
}

impl fmt::Debug for RunGuardsAndResolvers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathParamsChange => f.write_str("PathParamsChange"),
            Self::PathParamsOrQueryParamsChange => f.write_str("PathParamsOrQueryParamsChange"),
            Self::ParamsChange => f.write_str("ParamsChange"),
            Self::ParamsOrQueryParamsChange => f.write_str("ParamsOrQueryParamsChange"),
            Self::Always => f.write_str("Always"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Result of a custom matcher.
#[derive(Debug, Clone, Default)]
pub struct UrlMatchResult {
    /// Segments consumed from the front of the candidate list.
    pub consumed: Vec<UrlSegment>,
    /// Named positional bindings.
    pub pos_params: IndexMap<String, UrlSegment>,
}

/// Custom segment matcher replacing `path`.
pub trait UrlMatcher: Send + Sync {
    fn match_segments(&self, segments: &[UrlSegment], group: &UrlSegmentGroup, route: &Route) -> Option<UrlMatchResult>;
}

impl<F> UrlMatcher for F
where
    F: Fn(&[UrlSegment], &UrlSegmentGroup, &Route) -> Option<UrlMatchResult> + Send + Sync,
{
    fn match_segments(&self, segments: &[UrlSegment], group: &UrlSegmentGroup, route: &Route) -> Option<UrlMatchResult> {
        self(segments, group, route)
    }
}

/// Loads a child route table on demand.
pub type LoadChildrenFn = Arc<dyn Fn() -> BoxFuture<'static, Result<RouteModule, LoadError>> + Send + Sync>;

/// Loads a component on demand.
pub type LoadComponentFn = Arc<dyn Fn() -> BoxFuture<'static, Result<ComponentRef, LoadError>> + Send + Sync>;

/// Stable per-process identifier, used for logging and in-flight load keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(u64);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route#{}", self.0)
    }
}

fn next_route_id() -> RouteId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    RouteId(NEXT.fetch_add(1, Ordering::Relaxed))
}

/// One node of the route table.
pub struct Route {
    pub(crate) id: RouteId,
    pub(crate) path: Option<String>,
    pub(crate) matcher: Option<Arc<dyn UrlMatcher>>,
    pub(crate) path_match: Option<PathMatch>,
    pub(crate) redirect_to: Option<String>,
    pub(crate) outlet: Option<String>,
    pub(crate) component: Option<ComponentRef>,
    pub(crate) load_component: Option<LoadComponentFn>,
    pub(crate) children: Option<Vec<Arc<Route>>>,
    pub(crate) load_children: Option<LoadChildrenFn>,
    pub(crate) data: Data,
    pub(crate) resolve: IndexMap<String, Resolver>,
    pub(crate) can_activate: Vec<CanActivateGuard>,
    pub(crate) can_activate_child: Vec<CanActivateGuard>,
    pub(crate) can_deactivate: Vec<CanDeactivateGuard>,
    pub(crate) can_match: Vec<CanMatchGuard>,
    pub(crate) can_load: Vec<CanMatchGuard>,
    pub(crate) run_guards_and_resolvers: RunGuardsAndResolvers,
    pub(crate) providers: Option<Arc<Injector>>,
    pub(crate) loaded: OnceLock<LoadedRouterConfig>,
    pub(crate) loaded_component: OnceLock<ComponentRef>,
}

impl Route {
    /// A route matching `path` (`"a/:id"`, `""`, `"**"`).
    pub fn new(path: impl Into<String>) -> Self {
        Self::blank(Some(path.into()), None)
    }

    /// A route matched by a custom matcher instead of a path.
    pub fn matching(matcher: impl UrlMatcher + 'static) -> Self {
        Self::blank(None, Some(Arc::new(matcher)))
    }

    fn blank(path: Option<String>, matcher: Option<Arc<dyn UrlMatcher>>) -> Self {
        Self {
            id: next_route_id(),
            path,
            matcher,
            path_match: None,
            redirect_to: None,
            outlet: None,
            component: None,
            load_component: None,
            children: None,
            load_children: None,
            data: Data::new(),
            resolve: IndexMap::new(),
            can_activate: Vec::new(),
            can_activate_child: Vec::new(),
            can_deactivate: Vec::new(),
            can_match: Vec::new(),
            can_load: Vec::new(),
            run_guards_and_resolvers: RunGuardsAndResolvers::default(),
            providers: None,
            loaded: OnceLock::new(),
            loaded_component: OnceLock::new(),
        }
    }

    pub fn with_component(mut self, component: impl Into<ComponentRef>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_load_component<F, Fut>(mut self, load: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ComponentRef, LoadError>> + Send + 'static,
    {
        self.load_component = Some(Arc::new(move || load().boxed()));
        self
    }

    pub fn with_redirect(mut self, target: impl Into<String>) -> Self {
        self.redirect_to = Some(target.into());
        self
    }

    pub fn with_path_match(mut self, path_match: PathMatch) -> Self {
        self.path_match = Some(path_match);
        self
    }

    pub fn with_outlet(mut self, outlet: impl Into<String>) -> Self {
        self.outlet = Some(outlet.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Route>) -> Self {
        self.children = Some(children.into_iter().map(Arc::new).collect());
        self
    }

    pub fn with_load_children<F, Fut>(mut self, load: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RouteModule, LoadError>> + Send + 'static,
    {
        self.load_children = Some(Arc::new(move || load().boxed()));
        self
    }

    pub(crate) fn with_load_children_fn(mut self, load: LoadChildrenFn) -> Self {
        self.load_children = Some(load);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_resolver(mut self, key: impl Into<String>, resolver: Resolver) -> Self {
        self.resolve.insert(key.into(), resolver);
        self
    }

    pub fn with_can_activate(mut self, guard: CanActivateGuard) -> Self {
        self.can_activate.push(guard);
        self
    }

    pub fn with_can_activate_child(mut self, guard: CanActivateGuard) -> Self {
        self.can_activate_child.push(guard);
        self
    }

    pub fn with_can_deactivate(mut self, guard: CanDeactivateGuard) -> Self {
        self.can_deactivate.push(guard);
        self
    }

    pub fn with_can_match(mut self, guard: CanMatchGuard) -> Self {
        self.can_match.push(guard);
        self
    }

    pub fn with_can_load(mut self, guard: CanMatchGuard) -> Self {
        self.can_load.push(guard);
        self
    }

    pub fn with_run_guards_and_resolvers(mut self, policy: RunGuardsAndResolvers) -> Self {
        self.run_guards_and_resolvers = policy;
        self
    }

    /// Scope guards and components of this subtree to `injector`.
    pub fn with_providers(mut self, injector: Arc<Injector>) -> Self {
        self.providers = Some(injector);
        self
    }

    pub fn id(&self) -> RouteId {
        self.id
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn has_matcher(&self) -> bool {
        self.matcher.is_some()
    }

    pub fn path_match(&self) -> PathMatch {
        self.path_match.unwrap_or_default()
    }

    pub(crate) fn has_explicit_path_match(&self) -> bool {
        self.path_match.is_some()
    }

    pub fn redirect_to(&self) -> Option<&str> {
        self.redirect_to.as_deref()
    }

    /// Declared outlet, `primary` when none.
    pub fn outlet(&self) -> &str {
        self.outlet.as_deref().unwrap_or(PRIMARY_OUTLET)
    }

    pub fn component(&self) -> Option<&ComponentRef> {
        self.component.as_ref()
    }

    /// Declared or already-loaded component.
    pub fn resolved_component(&self) -> Option<ComponentRef> {
        self.component.clone().or_else(|| self.loaded_component.get().cloned())
    }

    pub fn has_load_component(&self) -> bool {
        self.load_component.is_some()
    }

    pub fn children(&self) -> Option<&[Arc<Route>]> {
        self.children.as_deref()
    }

    pub fn has_load_children(&self) -> bool {
        self.load_children.is_some()
    }

    /// Children after a completed lazy load.
    pub fn loaded_config(&self) -> Option<&LoadedRouterConfig> {
        self.loaded.get()
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn resolvers(&self) -> &IndexMap<String, Resolver> {
        &self.resolve
    }

    pub fn run_guards_and_resolvers(&self) -> &RunGuardsAndResolvers {
        &self.run_guards_and_resolvers
    }

    pub fn providers(&self) -> Option<&Arc<Injector>> {
        self.providers.as_ref()
    }

    /// Path for error messages; custom matchers print as `<matcher>`.
    pub(crate) fn display_path(&self) -> &str {
        match (&self.path, &self.matcher) {
            (Some(p), _) => p,
            (None, Some(_)) => "<matcher>",
            (None, None) => "<none>",
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("has_matcher", &self.matcher.is_some())
            .field("redirect_to", &self.redirect_to)
            .field("outlet", &self.outlet())
            .field("component", &self.component)
            .field("children", &self.children.as_ref().map(Vec::len))
            .field("lazy", &self.load_children.is_some())
            .field("guards", &(self.can_activate.len() + self.can_activate_child.len() + self.can_deactivate.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let route = Route::new("a").with_component("A");
        assert_eq!(route.path(), Some("a"));
        assert_eq!(route.outlet(), PRIMARY_OUTLET);
        assert_eq!(route.path_match(), PathMatch::Prefix);
        assert!(!route.has_explicit_path_match());
        assert_eq!(route.resolved_component(), Some(ComponentRef::new("A")));
    }

    #[test]
    fn test_route_ids_are_unique() {
        let a = Route::new("a");
        let b = Route::new("a");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_children_are_shared_nodes() {
        let parent = Route::new("p").with_children(vec![Route::new("c").with_component("C")]);
        let children = parent.children().expect("children");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].path(), Some("c"));
    }
}
