//! Immutable route snapshots.
//!
//! # Responsibilities
//! - Describe one matched route: consumed segments, params, data, component
//! - Hold the snapshot tree of one navigation (`RouterStateSnapshot`)
//! - Apply params/data inheritance down the tree
//!
//! # Design Decisions
//! - The matched `Route` is kept as `Arc<Route>`; reuse decisions compare allocations
//! - Snapshots are cloned freely; they are small and never shared mutably
//! - A committed `RouterStateSnapshot` is wrapped in `Arc` and never edited again

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::routing::route::{ComponentRef, Data, Route};
use crate::state::tree::{NodeId, Tree, TreeNode};
use crate::url::tree::{equal_path, equal_segments, shallow_equal};
use crate::url::{Params, QueryParams, RelativePosition, UrlSegment, PRIMARY_OUTLET};

/// How params and data flow from parent to child routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamsInheritanceStrategy {
    /// Inherit only through empty-path children and componentless parents.
    #[default]
    EmptyOnly,
    /// Always inherit.
    Always,
}

/// One matched route at one moment.
#[derive(Debug, Clone)]
pub struct ActivatedRouteSnapshot {
    pub url: Vec<UrlSegment>,
    pub params: Params,
    pub query_params: QueryParams,
    pub fragment: Option<String>,
    pub data: Data,
    pub outlet: String,
    pub component: Option<ComponentRef>,
    pub(crate) route_config: Option<Arc<Route>>,
    pub(crate) resolved_data: Data,
    pub(crate) url_path: Vec<UrlSegment>,
    pub(crate) top_outlet: String,
}

impl ActivatedRouteSnapshot {
    pub(crate) fn new(
        url: Vec<UrlSegment>,
        params: Params,
        query_params: QueryParams,
        fragment: Option<String>,
        route: Option<Arc<Route>>,
        outlet: String,
    ) -> Self {
        let data = route.as_ref().map(|r| r.data.clone()).unwrap_or_default();
        let component = route.as_ref().and_then(|r| r.resolved_component());
        Self {
            url,
            params,
            query_params,
            fragment,
            data,
            outlet,
            component,
            route_config: route,
            resolved_data: Data::new(),
            url_path: Vec::new(),
            top_outlet: PRIMARY_OUTLET.to_string(),
        }
    }

    /// The snapshot at the root of every tree.
    pub(crate) fn root(query_params: QueryParams, fragment: Option<String>) -> Self {
        Self::new(Vec::new(), Params::new(), query_params, fragment, None, PRIMARY_OUTLET.to_string())
    }

    /// The route this snapshot matched; `None` for the root.
    pub fn route_config(&self) -> Option<&Arc<Route>> {
        self.route_config.as_ref()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).and_then(|v| v.first())
    }

    /// Data produced by this route's own resolvers.
    pub fn resolved_data(&self) -> &Data {
        &self.resolved_data
    }

    /// Where commands relative to this route start.
    pub fn relative_position(&self) -> RelativePosition {
        RelativePosition {
            outlet: self.top_outlet.clone(),
            segments: self.url_path.clone(),
        }
    }

    /// Both snapshots matched the same route node.
    pub(crate) fn same_config(&self, other: &ActivatedRouteSnapshot) -> bool {
        match (&self.route_config, &other.route_config) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub(crate) fn path_params_equal(&self, other: &ActivatedRouteSnapshot) -> bool {
        equal_path(&self.url, &other.url)
    }

    pub(crate) fn params_equal(&self, other: &ActivatedRouteSnapshot) -> bool {
        equal_segments(&self.url, &other.url) && shallow_equal(&self.params, &other.params)
    }

    pub(crate) fn query_params_equal(&self, other: &ActivatedRouteSnapshot) -> bool {
        shallow_equal(&self.query_params, &other.query_params)
    }

    fn has_empty_path_config(&self) -> bool {
        self.route_config.as_ref().and_then(|r| r.path()) == Some("")
    }

    fn is_componentless(&self) -> bool {
        self.component.is_none() && !self.route_config.as_ref().is_some_and(|r| r.has_load_component())
    }
}

/// The snapshot tree of one navigation.
#[derive(Debug, Clone)]
pub struct RouterStateSnapshot {
    pub url: String,
    pub(crate) tree: Tree<ActivatedRouteSnapshot>,
}

impl RouterStateSnapshot {
    pub(crate) fn new(url: String, root: TreeNode<ActivatedRouteSnapshot>) -> Self {
        Self {
            url,
            tree: Tree::from_node(root),
        }
    }

    /// State before the first navigation: just the root.
    pub(crate) fn empty() -> Self {
        Self::new(
            "/".to_string(),
            TreeNode::leaf(ActivatedRouteSnapshot::root(QueryParams::new(), None)),
        )
    }

    pub fn root(&self) -> &ActivatedRouteSnapshot {
        self.tree.value(Tree::<ActivatedRouteSnapshot>::ROOT)
    }

    pub fn tree(&self) -> &Tree<ActivatedRouteSnapshot> {
        &self.tree
    }

    pub fn node(&self, id: NodeId) -> &ActivatedRouteSnapshot {
        self.tree.value(id)
    }

    /// Follow the primary outlet down to the deepest route.
    pub fn primary_leaf(&self) -> &ActivatedRouteSnapshot {
        let mut id = self.tree.root();
        while let Some(next) = self
            .tree
            .children(id)
            .iter()
            .copied()
            .find(|&c| self.tree.value(c).outlet == PRIMARY_OUTLET)
        {
            id = next;
        }
        self.tree.value(id)
    }

    /// Snapshots from the root to the primary leaf, root excluded.
    pub fn primary_chain(&self) -> Vec<&ActivatedRouteSnapshot> {
        let mut chain = Vec::new();
        let mut id = self.tree.root();
        while let Some(next) = self
            .tree
            .children(id)
            .iter()
            .copied()
            .find(|&c| self.tree.value(c).outlet == PRIMARY_OUTLET)
        {
            chain.push(self.tree.value(next));
            id = next;
        }
        chain
    }
}

/// Params and data a route ends up with after inheritance.
pub(crate) struct Inherited {
    pub params: Params,
    pub data: Data,
    pub resolve: Data,
}

fn merge<V: Clone>(base: &indexmap::IndexMap<String, V>, over: &indexmap::IndexMap<String, V>) -> indexmap::IndexMap<String, V> {
    let mut out = base.clone();
    for (k, v) in over {
        out.insert(k.clone(), v.clone());
    }
    out
}

/// Compute what `route` inherits from its (already processed) `parent`.
pub(crate) fn get_inherited(
    route: &ActivatedRouteSnapshot,
    parent: Option<&ActivatedRouteSnapshot>,
    strategy: ParamsInheritanceStrategy,
) -> Inherited {
    let static_data = route.route_config.as_ref().map(|r| r.data.clone()).unwrap_or_default();
    match parent {
        Some(parent)
            if strategy == ParamsInheritanceStrategy::Always
                || route.has_empty_path_config()
                || parent.is_componentless() =>
        {
            let resolve = merge(&merge(&merge(&route.data, &parent.data), &static_data), &route.resolved_data);
            Inherited {
                params: merge(&parent.params, &route.params),
                data: merge(&parent.data, &route.data),
                resolve,
            }
        }
        _ => Inherited {
            params: route.params.clone(),
            data: route.data.clone(),
            resolve: merge(&route.data, &route.resolved_data),
        },
    }
}

/// Top-down params/data inheritance after recognition.
pub(crate) fn inherit_params_and_data(tree: &mut Tree<ActivatedRouteSnapshot>, strategy: ParamsInheritanceStrategy) {
    let ids: Vec<NodeId> = tree.ids().collect();
    for id in ids {
        let inherited = {
            let parent = tree.parent(id).map(|p| tree.value(p));
            get_inherited(tree.value(id), parent, strategy)
        };
        let node = tree.value_mut(id);
        node.params = inherited.params;
        node.data = inherited.data;
    }
}

/// Fill in each node's position for relative navigation.
pub(crate) fn assign_positions(tree: &mut Tree<ActivatedRouteSnapshot>) {
    let ids: Vec<NodeId> = tree.ids().collect();
    for id in ids {
        let position = match tree.parent(id) {
            None => None,
            Some(parent) if parent == tree.root() => {
                let node = tree.value(id);
                Some((node.outlet.clone(), node.url.clone()))
            }
            Some(parent) => {
                let parent = tree.value(parent);
                let mut path = parent.url_path.clone();
                path.extend(tree.value(id).url.iter().cloned());
                Some((parent.top_outlet.clone(), path))
            }
        };
        if let Some((outlet, path)) = position {
            let node = tree.value_mut(id);
            node.top_outlet = outlet;
            node.url_path = path;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(route: Route, url: &[&str], params: &[(&str, &str)]) -> ActivatedRouteSnapshot {
        ActivatedRouteSnapshot::new(
            url.iter().map(|s| UrlSegment::path(*s)).collect(),
            params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            QueryParams::new(),
            None,
            Some(Arc::new(route)),
            PRIMARY_OUTLET.to_string(),
        )
    }

    #[test]
    fn test_empty_path_child_inherits() {
        let root = ActivatedRouteSnapshot::root(QueryParams::new(), None);
        let parent = snap(Route::new("team/:id").with_component("Team").with_data("p", "1"), &["team", "5"], &[("id", "5")]);
        let child = snap(Route::new("").with_component("Home"), &[], &[]);

        let mut tree = Tree::from_node(TreeNode::new(root, vec![TreeNode::new(parent, vec![TreeNode::leaf(child)])]));
        inherit_params_and_data(&mut tree, ParamsInheritanceStrategy::EmptyOnly);

        let child = tree.value(2);
        assert_eq!(child.param("id"), Some("5"));
        assert_eq!(child.data.get("p"), Some(&serde_json::json!("1")));
    }

    #[test]
    fn test_component_parent_blocks_inheritance() {
        let root = ActivatedRouteSnapshot::root(QueryParams::new(), None);
        let parent = snap(Route::new("team/:id").with_component("Team"), &["team", "5"], &[("id", "5")]);
        let child = snap(Route::new("user").with_component("User"), &["user"], &[]);

        let mut tree = Tree::from_node(TreeNode::new(root, vec![TreeNode::new(parent.clone(), vec![TreeNode::leaf(child.clone())])]));
        inherit_params_and_data(&mut tree, ParamsInheritanceStrategy::EmptyOnly);
        assert_eq!(tree.value(2).param("id"), None);

        let root = ActivatedRouteSnapshot::root(QueryParams::new(), None);
        let mut tree = Tree::from_node(TreeNode::new(root, vec![TreeNode::new(parent, vec![TreeNode::leaf(child)])]));
        inherit_params_and_data(&mut tree, ParamsInheritanceStrategy::Always);
        assert_eq!(tree.value(2).param("id"), Some("5"));
    }

    #[test]
    fn test_positions_follow_outlet_chain() {
        let root = ActivatedRouteSnapshot::root(QueryParams::new(), None);
        let a = snap(Route::new("a").with_component("A"), &["a"], &[]);
        let b = snap(Route::new("b").with_component("B"), &["b"], &[]);
        let mut tree = Tree::from_node(TreeNode::new(root, vec![TreeNode::new(a, vec![TreeNode::leaf(b)])]));
        assign_positions(&mut tree);

        let pos = tree.value(2).relative_position();
        assert_eq!(pos.outlet, PRIMARY_OUTLET);
        assert_eq!(pos.segments.iter().map(|s| s.path.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
