//! Guard checklists.
//!
//! # Responsibilities
//! - Compare the future snapshot tree with the committed one, outlet by outlet
//! - List the routes that must pass `can_deactivate` and `can_activate(_child)`
//! - Decide, for kept routes, whether their guards and resolvers run again
//!
//! # Design Decisions
//! - Checks reference nodes by `NodeId`; deactivate checks point into the committed tree
//! - Deactivate checks are listed children first, so leaf components are asked before their parents
//! - Kept routes whose policy says "don't rerun" inherit the previous data and resolved data

use std::collections::HashMap;
use std::sync::Arc;

use crate::activation::host::ComponentHandle;
use crate::activation::outlet::ChildrenOutletContexts;
use crate::routing::route::RunGuardsAndResolvers;
use crate::state::snapshot::ActivatedRouteSnapshot;
use crate::state::tree::{NodeId, Tree};

/// A route being entered (or re-checked), with its path from the root in the future tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CanActivateCheck {
    pub path: Vec<NodeId>,
}

impl CanActivateCheck {
    pub fn route(&self) -> NodeId {
        self.path.last().copied().unwrap_or(0)
    }
}

/// A route being left, in the committed tree, with the instance that fills its outlet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CanDeactivateCheck {
    pub component: Option<ComponentHandle>,
    pub route: NodeId,
}

#[derive(Debug, Default)]
pub(crate) struct Checks {
    pub can_activate: Vec<CanActivateCheck>,
    pub can_deactivate: Vec<CanDeactivateCheck>,
    /// Kept routes that skip guards: (future node, committed node) whose data is carried over.
    pub carried: Vec<(NodeId, NodeId)>,
}

impl Checks {
    pub fn is_empty(&self) -> bool {
        self.can_activate.is_empty() && self.can_deactivate.is_empty()
    }
}

type SnapshotTree = Tree<ActivatedRouteSnapshot>;

struct Walk<'a> {
    future: &'a SnapshotTree,
    curr: &'a SnapshotTree,
    checks: Checks,
}

/// Compute every check for moving from `curr` to `future`.
pub(crate) fn get_all_route_guards(
    future: &SnapshotTree,
    curr: &SnapshotTree,
    contexts: &Arc<ChildrenOutletContexts>,
) -> Checks {
    let mut walk = Walk {
        future,
        curr,
        checks: Checks::default(),
    };
    let root = future.root();
    walk.child_route_guards(root, Some(curr.root()), Some(contexts), vec![root]);
    walk.checks
}

/// Apply the carried-over data of kept routes to the future tree.
pub(crate) fn carry_over_data(future: &mut SnapshotTree, curr: &SnapshotTree, carried: &[(NodeId, NodeId)]) {
    for &(f, c) in carried {
        let previous = curr.value(c);
        let node = future.value_mut(f);
        node.data = previous.data.clone();
        node.resolved_data = previous.resolved_data.clone();
    }
}

impl Walk<'_> {
    fn children_by_outlet(&self, curr: Option<NodeId>) -> HashMap<String, NodeId> {
        curr.map(|id| {
            self.curr
                .children(id)
                .iter()
                .map(|&c| (self.curr.value(c).outlet.clone(), c))
                .collect()
        })
        .unwrap_or_default()
    }

    fn child_route_guards(
        &mut self,
        future: NodeId,
        curr: Option<NodeId>,
        contexts: Option<&Arc<ChildrenOutletContexts>>,
        future_path: Vec<NodeId>,
    ) {
        let mut prev = self.children_by_outlet(curr);
        let future_tree = self.future;

        for &child in future_tree.children(future) {
            let outlet = &future_tree.value(child).outlet;
            let mut path = future_path.clone();
            path.push(child);
            self.route_guards(child, prev.remove(outlet), contexts, path);
        }

        let mut leftovers: Vec<(String, NodeId)> = prev.into_iter().collect();
        leftovers.sort_by_key(|(_, id)| *id);
        for (outlet, node) in leftovers {
            let context = contexts.and_then(|c| c.get_context(&outlet));
            self.deactivate_route_and_its_children(node, context.as_ref().map(|c| c.children()).cloned(), context.and_then(|c| c.component()));
        }
    }

    fn route_guards(
        &mut self,
        future: NodeId,
        curr: Option<NodeId>,
        parent_contexts: Option<&Arc<ChildrenOutletContexts>>,
        future_path: Vec<NodeId>,
    ) {
        let future_snap = self.future.value(future);
        let context = parent_contexts.and_then(|c| c.get_context(&future_snap.outlet));
        let child_contexts = context.as_ref().map(|c| Arc::clone(c.children()));
        let has_component = future_snap.component.is_some()
            || future_snap.route_config().is_some_and(|r| r.has_load_component());

        match curr {
            Some(curr_id) if self.curr.value(curr_id).same_config(future_snap) => {
                let should_run = self.should_run_guards_and_resolvers(curr_id, future);
                if should_run {
                    self.checks.can_activate.push(CanActivateCheck {
                        path: future_path.clone(),
                    });
                } else {
                    self.checks.carried.push((future, curr_id));
                }

                if has_component {
                    self.child_route_guards(future, curr, child_contexts.as_ref(), future_path);
                } else {
                    self.child_route_guards(future, curr, parent_contexts, future_path);
                }

                if should_run {
                    if let Some(component) = context.and_then(|c| c.component()) {
                        self.checks.can_deactivate.push(CanDeactivateCheck {
                            component: Some(component),
                            route: curr_id,
                        });
                    }
                }
            }
            _ => {
                if let Some(curr_id) = curr {
                    let component = context.as_ref().and_then(|c| c.component());
                    self.deactivate_route_and_its_children(curr_id, child_contexts.clone(), component);
                }
                self.checks.can_activate.push(CanActivateCheck {
                    path: future_path.clone(),
                });
                if has_component {
                    self.child_route_guards(future, None, child_contexts.as_ref(), future_path);
                } else {
                    self.child_route_guards(future, None, parent_contexts, future_path);
                }
            }
        }
    }

    /// `contexts` are the outlets inside the route's component (if it has one and it is mounted).
    fn deactivate_route_and_its_children(
        &mut self,
        route: NodeId,
        contexts: Option<Arc<ChildrenOutletContexts>>,
        component: Option<ComponentHandle>,
    ) {
        let curr_tree = self.curr;
        let snapshot = curr_tree.value(route);
        let componentless = snapshot.component.is_none();

        let mut children: Vec<NodeId> = curr_tree.children(route).to_vec();
        children.sort_unstable();
        for child in children {
            let outlet = &curr_tree.value(child).outlet;
            if componentless {
                // Children of a componentless route live in the same outlet.
                self.deactivate_route_and_its_children(child, contexts.clone(), component.clone());
            } else {
                let context = contexts.as_ref().and_then(|c| c.get_context(outlet));
                let inner = context.as_ref().map(|c| Arc::clone(c.children()));
                let handle = context.and_then(|c| c.component());
                self.deactivate_route_and_its_children(child, inner, handle);
            }
        }

        self.checks.can_deactivate.push(CanDeactivateCheck {
            component: if componentless { None } else { component },
            route,
        });
    }

    fn should_run_guards_and_resolvers(&self, curr: NodeId, future: NodeId) -> bool {
        let c = self.curr.value(curr);
        let f = self.future.value(future);
        let Some(config) = f.route_config() else {
            return false;
        };
        match config.run_guards_and_resolvers() {
            RunGuardsAndResolvers::PathParamsChange => !c.path_params_equal(f),
            RunGuardsAndResolvers::PathParamsOrQueryParamsChange => !c.path_params_equal(f) || !c.query_params_equal(f),
            RunGuardsAndResolvers::ParamsChange => !self.params_and_segments_equal(curr, future),
            RunGuardsAndResolvers::ParamsOrQueryParamsChange => {
                !self.params_and_segments_equal(curr, future) || !c.query_params_equal(f)
            }
            RunGuardsAndResolvers::Always => true,
            RunGuardsAndResolvers::Custom(predicate) => predicate(c, f),
        }
    }

    /// Params and segments equal on this route and on every ancestor.
    fn params_and_segments_equal(&self, curr: NodeId, future: NodeId) -> bool {
        let mut c = Some(curr);
        let mut f = Some(future);
        loop {
            match (c, f) {
                (None, None) => return true,
                (Some(ci), Some(fi)) => {
                    if !self.curr.value(ci).params_equal(self.future.value(fi)) {
                        return false;
                    }
                    c = self.curr.parent(ci);
                    f = self.future.parent(fi);
                }
                _ => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::route::Route;
    use crate::state::tree::TreeNode;
    use crate::url::{Params, QueryParams, UrlSegment, PRIMARY_OUTLET};

    fn snap(route: &Arc<Route>, url: &str, params: &[(&str, &str)]) -> ActivatedRouteSnapshot {
        ActivatedRouteSnapshot::new(
            url.split('/').filter(|s| !s.is_empty()).map(UrlSegment::path).collect(),
            params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<Params>(),
            QueryParams::new(),
            None,
            Some(Arc::clone(route)),
            PRIMARY_OUTLET.to_string(),
        )
    }

    fn tree(children: Vec<TreeNode<ActivatedRouteSnapshot>>) -> SnapshotTree {
        Tree::from_node(TreeNode::new(ActivatedRouteSnapshot::root(QueryParams::new(), None), children))
    }

    #[test]
    fn test_initial_navigation_activates_every_route() {
        let team = Arc::new(Route::new("team/:id").with_component("Team"));
        let user = Arc::new(Route::new("user").with_component("User"));
        let future = tree(vec![TreeNode::new(
            snap(&team, "team/1", &[("id", "1")]),
            vec![TreeNode::leaf(snap(&user, "user", &[]))],
        )]);
        let curr = tree(Vec::new());

        let checks = get_all_route_guards(&future, &curr, &Arc::new(ChildrenOutletContexts::new()));
        let paths: Vec<Vec<NodeId>> = checks.can_activate.iter().map(|c| c.path.clone()).collect();
        assert_eq!(paths, vec![vec![0, 1], vec![0, 1, 2]]);
        assert!(checks.can_deactivate.is_empty());
    }

    #[test]
    fn test_param_change_reruns_kept_route() {
        let team = Arc::new(Route::new("team/:id").with_component("Team"));
        let curr = tree(vec![TreeNode::leaf(snap(&team, "team/1", &[("id", "1")]))]);
        let same = tree(vec![TreeNode::leaf(snap(&team, "team/1", &[("id", "1")]))]);
        let changed = tree(vec![TreeNode::leaf(snap(&team, "team/2", &[("id", "2")]))]);
        let contexts = Arc::new(ChildrenOutletContexts::new());

        let checks = get_all_route_guards(&same, &curr, &contexts);
        assert!(checks.is_empty());
        assert_eq!(checks.carried, vec![(1, 1)]);

        let checks = get_all_route_guards(&changed, &curr, &contexts);
        assert_eq!(checks.can_activate.len(), 1);
    }

    #[test]
    fn test_replaced_subtree_deactivates_children_first() {
        let a = Arc::new(Route::new("a").with_component("A"));
        let b = Arc::new(Route::new("b").with_component("B"));
        let c = Arc::new(Route::new("c").with_component("C"));
        let curr = tree(vec![TreeNode::new(snap(&a, "a", &[]), vec![TreeNode::leaf(snap(&b, "b", &[]))])]);
        let future = tree(vec![TreeNode::leaf(snap(&c, "c", &[]))]);

        let checks = get_all_route_guards(&future, &curr, &Arc::new(ChildrenOutletContexts::new()));
        let order: Vec<NodeId> = checks.can_deactivate.iter().map(|c| c.route).collect();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(checks.can_activate.len(), 1);
    }

    #[test]
    fn test_always_policy_reruns() {
        let team = Arc::new(
            Route::new("team")
                .with_component("Team")
                .with_run_guards_and_resolvers(RunGuardsAndResolvers::Always),
        );
        let curr = tree(vec![TreeNode::leaf(snap(&team, "team", &[]))]);
        let future = tree(vec![TreeNode::leaf(snap(&team, "team", &[]))]);
        let checks = get_all_route_guards(&future, &curr, &Arc::new(ChildrenOutletContexts::new()));
        assert_eq!(checks.can_activate.len(), 1);
    }
}
