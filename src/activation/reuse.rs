//! Route reuse policy.
//!
//! # Responsibilities
//! - Decide whether a previously activated route is kept across a navigation
//! - Optionally detach a route subtree (instance plus outlet contexts) and hand it back later
//!
//! # Design Decisions
//! - The default policy keeps a route exactly when both snapshots matched the same
//!   `Route` allocation; equal paths in different tables do not count
//! - Stored handles are `Arc`s so the strategy and the activation walk can share them

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::activation::host::ComponentHandle;
use crate::activation::outlet::OutletContext;
use crate::routing::route::RouteId;
use crate::state::activated::ActivatedRoute;
use crate::state::snapshot::ActivatedRouteSnapshot;
use crate::state::tree::TreeNode;

/// A route subtree taken out of the outlet tree but kept alive.
#[derive(Debug)]
pub struct DetachedRouteHandle {
    pub component: Option<ComponentHandle>,
    pub route: TreeNode<Arc<ActivatedRoute>>,
    pub(crate) contexts: HashMap<String, Arc<OutletContext>>,
}

/// Pluggable reuse decisions, consulted per route.
pub trait RouteReuseStrategy: Send + Sync {
    /// Should `route` be detached (stored) instead of destroyed when it leaves?
    fn should_detach(&self, route: &ActivatedRouteSnapshot) -> bool;

    /// Store a detached subtree; `None` drops whatever was stored for `route`.
    fn store(&self, route: &ActivatedRouteSnapshot, handle: Option<Arc<DetachedRouteHandle>>);

    /// Should a stored subtree be re-attached for `route`?
    fn should_attach(&self, route: &ActivatedRouteSnapshot) -> bool;

    fn retrieve(&self, route: &ActivatedRouteSnapshot) -> Option<Arc<DetachedRouteHandle>>;

    /// Keep the live route of `curr` for `future`?
    fn should_reuse_route(&self, future: &ActivatedRouteSnapshot, curr: &ActivatedRouteSnapshot) -> bool;
}

/// Reuse by route identity, never detach.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRouteReuseStrategy;

impl RouteReuseStrategy for DefaultRouteReuseStrategy {
    fn should_detach(&self, _route: &ActivatedRouteSnapshot) -> bool {
        false
    }

    fn store(&self, _route: &ActivatedRouteSnapshot, _handle: Option<Arc<DetachedRouteHandle>>) {}

    fn should_attach(&self, _route: &ActivatedRouteSnapshot) -> bool {
        false
    }

    fn retrieve(&self, _route: &ActivatedRouteSnapshot) -> Option<Arc<DetachedRouteHandle>> {
        None
    }

    fn should_reuse_route(&self, future: &ActivatedRouteSnapshot, curr: &ActivatedRouteSnapshot) -> bool {
        future.same_config(curr)
    }
}

/// Detaches routes whose static data carries `keep_alive: true` and re-attaches them
/// when their route is matched again.
#[derive(Debug, Default)]
pub struct KeepAliveReuseStrategy {
    stored: DashMap<RouteId, Arc<DetachedRouteHandle>>,
}

impl KeepAliveReuseStrategy {
    pub const DATA_KEY: &'static str = "keep_alive";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self) -> usize {
        self.stored.len()
    }

    fn key(route: &ActivatedRouteSnapshot) -> Option<RouteId> {
        route.route_config().map(|r| r.id())
    }
}

impl RouteReuseStrategy for KeepAliveReuseStrategy {
    fn should_detach(&self, route: &ActivatedRouteSnapshot) -> bool {
        route
            .route_config()
            .and_then(|r| r.data().get(Self::DATA_KEY))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    fn store(&self, route: &ActivatedRouteSnapshot, handle: Option<Arc<DetachedRouteHandle>>) {
        let Some(key) = Self::key(route) else {
            return;
        };
        match handle {
            Some(handle) => {
                tracing::debug!(route = %key, "Storing detached route");
                self.stored.insert(key, handle);
            }
            None => {
                self.stored.remove(&key);
            }
        }
    }

    fn should_attach(&self, route: &ActivatedRouteSnapshot) -> bool {
        Self::key(route).is_some_and(|key| self.stored.contains_key(&key))
    }

    fn retrieve(&self, route: &ActivatedRouteSnapshot) -> Option<Arc<DetachedRouteHandle>> {
        Self::key(route).and_then(|key| self.stored.get(&key).map(|entry| Arc::clone(entry.value())))
    }

    fn should_reuse_route(&self, future: &ActivatedRouteSnapshot, curr: &ActivatedRouteSnapshot) -> bool {
        future.same_config(curr)
    }
}
