//! Live router state.
//!
//! # Responsibilities
//! - Keep one `ActivatedRoute` per activated route, observable by components
//! - Build the next live tree from a snapshot, reusing routes that stay
//! - Publish param/query/fragment/url/data changes only when they actually change
//!
//! # Design Decisions
//! - Observable values are `tokio::sync::watch` channels; late subscribers see the current value
//! - `future_snapshot` is set when the next tree is built, `snapshot` only when it is committed
//! - Reused routes keep their `Arc`, so component subscriptions survive navigations

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use tokio::sync::watch;

use crate::activation::reuse::RouteReuseStrategy;
use crate::routing::route::{ComponentRef, Data, Route};
use crate::state::snapshot::{ActivatedRouteSnapshot, RouterStateSnapshot};
use crate::state::tree::{NodeId, Tree, TreeNode};
use crate::url::tree::{equal_segments, shallow_equal};
use crate::url::{Params, QueryParams, UrlSegment, PRIMARY_OUTLET};

/// A route as seen by the component it activated.
pub struct ActivatedRoute {
    snapshot: ArcSwapOption<ActivatedRouteSnapshot>,
    future_snapshot: ArcSwap<ActivatedRouteSnapshot>,
    url: watch::Sender<Vec<UrlSegment>>,
    params: watch::Sender<Params>,
    query_params: watch::Sender<QueryParams>,
    fragment: watch::Sender<Option<String>>,
    data: watch::Sender<Data>,
    outlet: String,
}

impl ActivatedRoute {
    pub(crate) fn new(future: ActivatedRouteSnapshot) -> Self {
        Self {
            url: watch::channel(future.url.clone()).0,
            params: watch::channel(future.params.clone()).0,
            query_params: watch::channel(future.query_params.clone()).0,
            fragment: watch::channel(future.fragment.clone()).0,
            data: watch::channel(future.data.clone()).0,
            outlet: future.outlet.clone(),
            snapshot: ArcSwapOption::empty(),
            future_snapshot: ArcSwap::from_pointee(future),
        }
    }

    /// The committed snapshot; before the first commit, the pending one.
    pub fn snapshot(&self) -> Arc<ActivatedRouteSnapshot> {
        self.snapshot
            .load_full()
            .unwrap_or_else(|| self.future_snapshot.load_full())
    }

    pub fn future_snapshot(&self) -> Arc<ActivatedRouteSnapshot> {
        self.future_snapshot.load_full()
    }

    pub fn outlet(&self) -> &str {
        &self.outlet
    }

    /// Component to render; lazily loaded components count once loaded.
    pub fn component(&self) -> Option<ComponentRef> {
        let future = self.future_snapshot.load();
        future
            .component
            .clone()
            .or_else(|| future.route_config.as_ref().and_then(|r| r.resolved_component()))
    }

    pub fn route_config(&self) -> Option<Arc<Route>> {
        self.future_snapshot.load().route_config.clone()
    }

    pub fn url(&self) -> watch::Receiver<Vec<UrlSegment>> {
        self.url.subscribe()
    }

    pub fn params(&self) -> watch::Receiver<Params> {
        self.params.subscribe()
    }

    pub fn query_params(&self) -> watch::Receiver<QueryParams> {
        self.query_params.subscribe()
    }

    pub fn fragment(&self) -> watch::Receiver<Option<String>> {
        self.fragment.subscribe()
    }

    pub fn data(&self) -> watch::Receiver<Data> {
        self.data.subscribe()
    }

    pub(crate) fn set_future_snapshot(&self, future: ActivatedRouteSnapshot) {
        self.future_snapshot.store(Arc::new(future));
    }

    /// Make the pending snapshot current and notify subscribers of what changed.
    pub(crate) fn advance(&self) {
        let future = self.future_snapshot.load_full();
        match self.snapshot.load_full() {
            Some(current) => {
                if !shallow_equal(&current.query_params, &future.query_params) {
                    self.query_params.send_replace(future.query_params.clone());
                }
                if current.fragment != future.fragment {
                    self.fragment.send_replace(future.fragment.clone());
                }
                if !shallow_equal(&current.params, &future.params) {
                    self.params.send_replace(future.params.clone());
                }
                if !equal_segments(&current.url, &future.url) {
                    self.url.send_replace(future.url.clone());
                }
                if !shallow_equal(&current.data, &future.data) {
                    self.data.send_replace(future.data.clone());
                }
            }
            None => {
                self.data.send_replace(future.data.clone());
            }
        }
        self.snapshot.store(Some(future));
    }
}

impl std::fmt::Debug for ActivatedRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivatedRoute")
            .field("outlet", &self.outlet)
            .field("component", &self.component())
            .field("url", &*self.url.borrow())
            .finish()
    }
}

/// The live counterpart of a `RouterStateSnapshot`.
#[derive(Debug, Clone)]
pub struct RouterState {
    pub(crate) tree: Tree<Arc<ActivatedRoute>>,
    pub(crate) snapshot: Arc<RouterStateSnapshot>,
}

impl RouterState {
    /// State before the first navigation.
    pub(crate) fn empty() -> Self {
        let snapshot = Arc::new(RouterStateSnapshot::empty());
        let root = Arc::new(ActivatedRoute::new(snapshot.root().clone()));
        root.advance();
        Self {
            tree: Tree::from_node(TreeNode::leaf(root)),
            snapshot,
        }
    }

    pub fn root(&self) -> &Arc<ActivatedRoute> {
        self.tree.value(self.tree.root())
    }

    pub fn snapshot(&self) -> &Arc<RouterStateSnapshot> {
        &self.snapshot
    }

    pub fn tree(&self) -> &Tree<Arc<ActivatedRoute>> {
        &self.tree
    }

    pub fn route(&self, id: NodeId) -> &Arc<ActivatedRoute> {
        self.tree.value(id)
    }

    /// Deepest route on the primary outlet chain.
    pub fn primary_leaf(&self) -> &Arc<ActivatedRoute> {
        let mut id = self.tree.root();
        while let Some(next) = self
            .tree
            .children(id)
            .iter()
            .copied()
            .find(|&c| self.tree.value(c).outlet() == PRIMARY_OUTLET)
        {
            id = next;
        }
        self.tree.value(id)
    }
}

/// Build the live tree for `curr`, reusing nodes of `prev` the strategy allows.
pub(crate) fn create_router_state(
    strategy: &dyn RouteReuseStrategy,
    curr: Arc<RouterStateSnapshot>,
    prev: &RouterState,
) -> RouterState {
    let root = create_node(strategy, &curr.tree, curr.tree.root(), Some((&prev.tree, prev.tree.root())));
    RouterState {
        tree: Tree::from_node(root),
        snapshot: curr,
    }
}

type Prev<'a> = Option<(&'a Tree<Arc<ActivatedRoute>>, NodeId)>;

fn create_node(
    strategy: &dyn RouteReuseStrategy,
    curr: &Tree<ActivatedRouteSnapshot>,
    id: NodeId,
    prev: Prev<'_>,
) -> TreeNode<Arc<ActivatedRoute>> {
    let future = curr.value(id);

    if let Some((prev_tree, prev_id)) = prev {
        let existing = prev_tree.value(prev_id);
        if strategy.should_reuse_route(future, &existing.snapshot()) {
            existing.set_future_snapshot(future.clone());
            let children = curr
                .children(id)
                .iter()
                .map(|&child| {
                    let reusable = prev_tree
                        .children(prev_id)
                        .iter()
                        .copied()
                        .find(|&p| strategy.should_reuse_route(curr.value(child), &prev_tree.value(p).snapshot()));
                    create_node(strategy, curr, child, reusable.map(|p| (prev_tree, p)))
                })
                .collect();
            return TreeNode::new(Arc::clone(existing), children);
        }
    }

    if strategy.should_attach(future) {
        if let Some(handle) = strategy.retrieve(future) {
            let route = Arc::clone(&handle.route.value);
            route.set_future_snapshot(future.clone());
            let children = curr
                .children(id)
                .iter()
                .map(|&child| create_node(strategy, curr, child, None))
                .collect();
            return TreeNode::new(route, children);
        }
    }

    let children = curr
        .children(id)
        .iter()
        .map(|&child| create_node(strategy, curr, child, None))
        .collect();
    TreeNode::new(Arc::new(ActivatedRoute::new(future.clone())), children)
}
