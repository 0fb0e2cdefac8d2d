//! Committing a new router state into the outlet tree.
//!
//! # Responsibilities
//! - Walk the current and future live trees in parallel, per outlet
//! - Tear down (or detach) routes that are not kept, children before parents
//! - Advance kept routes in place, create components for new ones, parents before children
//!
//! # Design Decisions
//! - "Kept" means the future tree holds the very same `ActivatedRoute` allocation
//! - The whole walk is synchronous; it runs after every asynchronous phase has settled
//! - Componentless routes share their parent's outlet contexts

use std::collections::HashMap;
use std::sync::Arc;

use crate::activation::host::ComponentHost;
use crate::activation::outlet::ChildrenOutletContexts;
use crate::activation::reuse::{DetachedRouteHandle, RouteReuseStrategy};
use crate::guards::injector::Injector;
use crate::navigation::events::RouterEvent;
use crate::state::activated::RouterState;
use crate::state::tree::NodeId;

pub(crate) struct ActivateRoutes<'a> {
    strategy: &'a dyn RouteReuseStrategy,
    host: &'a dyn ComponentHost,
    root_injector: &'a Arc<Injector>,
    future: &'a RouterState,
    curr: &'a RouterState,
    emit: &'a mut dyn FnMut(RouterEvent),
}

impl<'a> ActivateRoutes<'a> {
    pub(crate) fn new(
        strategy: &'a dyn RouteReuseStrategy,
        host: &'a dyn ComponentHost,
        root_injector: &'a Arc<Injector>,
        future: &'a RouterState,
        curr: &'a RouterState,
        emit: &'a mut dyn FnMut(RouterEvent),
    ) -> Self {
        Self {
            strategy,
            host,
            root_injector,
            future,
            curr,
            emit,
        }
    }

    pub(crate) fn activate(mut self, contexts: &Arc<ChildrenOutletContexts>) {
        let future_root = self.future.tree.root();
        let curr_root = Some(self.curr.tree.root());

        self.deactivate_child_routes(future_root, curr_root, contexts);
        self.future.root().advance();
        self.activate_child_routes(future_root, curr_root, contexts);
    }

    fn curr_children_by_outlet(&self, curr: Option<NodeId>) -> HashMap<String, NodeId> {
        let state = self.curr;
        curr.map(|id| {
            state
                .tree
                .children(id)
                .iter()
                .map(|&c| (state.route(c).outlet().to_string(), c))
                .collect()
        })
        .unwrap_or_default()
    }

    fn deactivate_child_routes(&mut self, future: NodeId, curr: Option<NodeId>, contexts: &Arc<ChildrenOutletContexts>) {
        let future_state = self.future;
        let mut remaining = self.curr_children_by_outlet(curr);

        for &child in future_state.tree.children(future) {
            let prev = remaining.remove(future_state.route(child).outlet());
            self.deactivate_routes(child, prev, contexts);
        }
        // Outlets with nothing new in them are torn down too.
        let mut leftovers: Vec<NodeId> = remaining.into_values().collect();
        leftovers.sort_unstable();
        for prev in leftovers {
            self.deactivate_route_and_its_children(prev, contexts);
        }
    }

    fn deactivate_routes(&mut self, future: NodeId, curr: Option<NodeId>, contexts: &Arc<ChildrenOutletContexts>) {
        let future_route = self.future.route(future);
        let Some(curr_id) = curr else {
            return;
        };

        if Arc::ptr_eq(future_route, self.curr.route(curr_id)) {
            if future_route.component().is_some() {
                if let Some(context) = contexts.get_context(future_route.outlet()) {
                    self.deactivate_child_routes(future, curr, context.children());
                }
            } else {
                self.deactivate_child_routes(future, curr, contexts);
            }
        } else {
            self.deactivate_route_and_its_children(curr_id, contexts);
        }
    }

    fn deactivate_route_and_its_children(&mut self, curr: NodeId, contexts: &Arc<ChildrenOutletContexts>) {
        let route = self.curr.route(curr);
        if route.component().is_some() && self.strategy.should_detach(&route.snapshot()) {
            self.detach_and_store_route_subtree(curr, contexts);
        } else {
            self.deactivate_route_and_outlet(curr, contexts);
        }
    }

    fn child_contexts(&self, curr: NodeId, contexts: &Arc<ChildrenOutletContexts>) -> Arc<ChildrenOutletContexts> {
        let route = self.curr.route(curr);
        match (contexts.get_context(route.outlet()), route.component()) {
            (Some(context), Some(_)) => Arc::clone(context.children()),
            _ => Arc::clone(contexts),
        }
    }

    fn detach_and_store_route_subtree(&mut self, curr: NodeId, contexts: &Arc<ChildrenOutletContexts>) {
        let curr_state = self.curr;
        let route = curr_state.route(curr);
        let child_contexts = self.child_contexts(curr, contexts);

        for &child in curr_state.tree.children(curr) {
            self.deactivate_route_and_its_children(child, &child_contexts);
        }

        let Some(context) = contexts.get_context(route.outlet()) else {
            return;
        };
        let slot = context.clear();
        if let Some(component) = &slot.component {
            self.host.detach(component);
        }
        tracing::debug!(outlet = route.outlet(), component = ?route.component(), "Route detached");

        let handle = DetachedRouteHandle {
            component: slot.component,
            route: curr_state.tree.subtree(curr),
            contexts: context.children().on_outlet_deactivated(),
        };
        self.strategy.store(&route.snapshot(), Some(Arc::new(handle)));
    }

    fn deactivate_route_and_outlet(&mut self, curr: NodeId, contexts: &Arc<ChildrenOutletContexts>) {
        let curr_state = self.curr;
        let route = curr_state.route(curr);
        let child_contexts = self.child_contexts(curr, contexts);

        for &child in curr_state.tree.children(curr) {
            self.deactivate_route_and_its_children(child, &child_contexts);
        }

        if let Some(context) = contexts.get_context(route.outlet()) {
            let slot = context.clear();
            if let Some(component) = slot.component {
                self.host.destroy(&component);
            }
            context.children().on_outlet_deactivated();
        }
    }

    fn activate_child_routes(&mut self, future: NodeId, curr: Option<NodeId>, contexts: &Arc<ChildrenOutletContexts>) {
        let future_state = self.future;
        let prev = self.curr_children_by_outlet(curr);
        let children = future_state.tree.children(future);

        for &child in children {
            let route = future_state.route(child);
            self.activate_routes(child, prev.get(route.outlet()).copied(), contexts);
            (self.emit)(RouterEvent::ActivationEnd {
                snapshot: route.snapshot(),
            });
        }
        if !children.is_empty() {
            (self.emit)(RouterEvent::ChildActivationEnd {
                snapshot: future_state.route(future).snapshot(),
            });
        }
    }

    fn activate_routes(&mut self, future: NodeId, curr: Option<NodeId>, contexts: &Arc<ChildrenOutletContexts>) {
        let future_state = self.future;
        let route = future_state.route(future);
        route.advance();

        let kept = curr.is_some_and(|c| Arc::ptr_eq(route, self.curr.route(c)));
        if kept {
            if route.component().is_some() {
                let context = contexts.get_or_create_context(route.outlet());
                self.activate_child_routes(future, curr, context.children());
            } else {
                self.activate_child_routes(future, curr, contexts);
            }
            return;
        }

        let Some(component) = route.component() else {
            self.activate_child_routes(future, None, contexts);
            return;
        };

        let context = contexts.get_or_create_context(route.outlet());
        let snapshot = route.snapshot();
        let injector = self.closest_injector(future);

        if self.strategy.should_attach(&snapshot) {
            if let Some(stored) = self.strategy.retrieve(&snapshot) {
                self.strategy.store(&snapshot, None);
                context.children().on_outlet_reattached(stored.contexts.clone());
                context.set_route(Arc::clone(&stored.route.value), injector);
                context.set_component(stored.component.clone());
                if let Some(handle) = &stored.component {
                    self.host.attach(handle, &stored.route.value);
                }
                stored.route.value.advance();
                tracing::debug!(outlet = route.outlet(), component = %component, "Route re-attached");
                self.activate_child_routes(future, None, context.children());
                return;
            }
        }

        context.set_route(Arc::clone(route), Arc::clone(&injector));
        let handle = self.host.create(&component, route, &injector);
        context.set_component(Some(handle));
        self.activate_child_routes(future, None, context.children());
    }

    /// The route's own providers, else the nearest ancestor's loaded or declared scope.
    fn closest_injector(&self, id: NodeId) -> Arc<Injector> {
        let tree = &self.future.tree;
        if let Some(providers) = tree.value(id).route_config().and_then(|r| r.providers().cloned()) {
            return providers;
        }
        let mut current = tree.parent(id);
        while let Some(parent) = current {
            if let Some(route) = tree.value(parent).route_config() {
                if let Some(injector) = route.loaded_config().and_then(|l| l.injector.clone()) {
                    return injector;
                }
                if let Some(providers) = route.providers() {
                    return Arc::clone(providers);
                }
            }
            current = tree.parent(parent);
        }
        Arc::clone(self.root_injector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::host::TracingHost;
    use crate::activation::reuse::{DefaultRouteReuseStrategy, KeepAliveReuseStrategy};
    use crate::routing::route::Route;
    use crate::state::activated::create_router_state;
    use crate::state::snapshot::{ActivatedRouteSnapshot, RouterStateSnapshot};
    use crate::state::tree::TreeNode;
    use crate::url::{Params, QueryParams, UrlSegment, PRIMARY_OUTLET};

    fn snap(route: &Arc<Route>, path: &str) -> ActivatedRouteSnapshot {
        ActivatedRouteSnapshot::new(
            vec![UrlSegment::path(path)],
            Params::new(),
            QueryParams::new(),
            None,
            Some(Arc::clone(route)),
            route.outlet().to_string(),
        )
    }

    fn state(children: Vec<TreeNode<ActivatedRouteSnapshot>>) -> Arc<RouterStateSnapshot> {
        let root = ActivatedRouteSnapshot::root(QueryParams::new(), None);
        Arc::new(RouterStateSnapshot::new("/".into(), TreeNode::new(root, children)))
    }

    struct Fixture {
        host: TracingHost,
        contexts: Arc<ChildrenOutletContexts>,
        injector: Arc<Injector>,
        current: RouterState,
        events: Vec<String>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                host: TracingHost::new(),
                contexts: Arc::new(ChildrenOutletContexts::new()),
                injector: Injector::empty(),
                current: RouterState::empty(),
                events: Vec::new(),
            }
        }

        fn go(&mut self, strategy: &dyn RouteReuseStrategy, next: Arc<RouterStateSnapshot>) {
            let future = create_router_state(strategy, next, &self.current);
            let mut events = Vec::new();
            let mut emit = |e: RouterEvent| events.push(e.kind().to_string());
            ActivateRoutes::new(strategy, &self.host, &self.injector, &future, &self.current, &mut emit).activate(&self.contexts);
            self.events = events;
            self.current = future;
        }
    }

    #[test]
    fn test_parent_and_child_components_are_created() {
        let team = Arc::new(Route::new("team").with_component("Team"));
        let user = Arc::new(Route::new("user").with_component("User"));
        let mut fx = Fixture::new();

        fx.go(
            &DefaultRouteReuseStrategy,
            state(vec![TreeNode::new(snap(&team, "team"), vec![TreeNode::leaf(snap(&user, "user"))])]),
        );

        assert_eq!(fx.host.live(), vec!["Team", "User"]);
        let described: Vec<String> = fx.contexts.describe().into_iter().map(|(p, c)| format!("{p}={c}")).collect();
        assert_eq!(described, vec!["primary=Team", "primary/primary=User"]);
        assert_eq!(fx.events, vec!["ActivationEnd", "ChildActivationEnd", "ActivationEnd", "ChildActivationEnd"]);
    }

    #[test]
    fn test_switching_child_keeps_parent_instance() {
        let team = Arc::new(Route::new("team").with_component("Team"));
        let user = Arc::new(Route::new("user").with_component("User"));
        let admin = Arc::new(Route::new("admin").with_component("Admin"));
        let mut fx = Fixture::new();

        fx.go(
            &DefaultRouteReuseStrategy,
            state(vec![TreeNode::new(snap(&team, "team"), vec![TreeNode::leaf(snap(&user, "user"))])]),
        );
        let team_handle = fx.contexts.get_context(PRIMARY_OUTLET).and_then(|c| c.component());

        fx.go(
            &DefaultRouteReuseStrategy,
            state(vec![TreeNode::new(snap(&team, "team"), vec![TreeNode::leaf(snap(&admin, "admin"))])]),
        );

        assert_eq!(fx.host.live(), vec!["Team", "Admin"]);
        assert_eq!(fx.contexts.get_context(PRIMARY_OUTLET).and_then(|c| c.component()), team_handle);
    }

    #[test]
    fn test_removed_named_outlet_is_torn_down() {
        let a = Arc::new(Route::new("a").with_component("A"));
        let side = Arc::new(Route::new("s").with_outlet("side").with_component("Side"));
        let mut fx = Fixture::new();

        fx.go(
            &DefaultRouteReuseStrategy,
            state(vec![TreeNode::leaf(snap(&a, "a")), TreeNode::leaf(snap(&side, "s"))]),
        );
        assert_eq!(fx.host.live(), vec!["A", "Side"]);

        fx.go(&DefaultRouteReuseStrategy, state(vec![TreeNode::leaf(snap(&a, "a"))]));
        assert_eq!(fx.host.live(), vec!["A"]);
        assert!(fx.contexts.get_context("side").and_then(|c| c.component()).is_none());
    }

    #[test]
    fn test_keep_alive_detaches_and_reattaches() {
        let list = Arc::new(Route::new("list").with_component("List").with_data(KeepAliveReuseStrategy::DATA_KEY, true));
        let detail = Arc::new(Route::new("detail").with_component("Detail"));
        let strategy = KeepAliveReuseStrategy::new();
        let mut fx = Fixture::new();

        fx.go(&strategy, state(vec![TreeNode::leaf(snap(&list, "list"))]));
        let first = fx.contexts.get_context(PRIMARY_OUTLET).and_then(|c| c.component());

        fx.go(&strategy, state(vec![TreeNode::leaf(snap(&detail, "detail"))]));
        assert_eq!(strategy.stored(), 1);
        // Detached, not destroyed.
        assert_eq!(fx.host.live(), vec!["List", "Detail"]);

        fx.go(&strategy, state(vec![TreeNode::leaf(snap(&list, "list"))]));
        assert_eq!(strategy.stored(), 0);
        assert_eq!(fx.host.live(), vec!["List"]);
        assert_eq!(fx.contexts.get_context(PRIMARY_OUTLET).and_then(|c| c.component()), first);
    }
}
