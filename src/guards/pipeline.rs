//! Running guards and resolvers for one transition.
//!
//! # Responsibilities
//! - Run `can_deactivate` checks, then `can_activate_child` / `can_activate` per entered route
//! - Stop at the first guard that does not allow, in declaration order
//! - Run resolvers top-down and recompute inherited data for the affected subtree
//!
//! # Design Decisions
//! - Every guard and resolver unit is preceded by a cancellation check
//! - A thrown guard or resolver error is an error, not a rejection
//! - Resolvers of one route run concurrently; routes are resolved parent before child

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::try_join_all;
use tokio_util::sync::CancellationToken;

use crate::guards::checks::{CanActivateCheck, CanDeactivateCheck, Checks};
use crate::guards::types::{GuardError, GuardResult, ResolverError};
use crate::navigation::events::RouterEvent;
use crate::observability::metrics;
use crate::routing::route::Data;
use crate::state::snapshot::{get_inherited, ParamsInheritanceStrategy, RouterStateSnapshot};
use crate::state::tree::{NodeId, Tree};

/// Why the pipeline stopped without a decision.
#[derive(Debug, Clone)]
pub(crate) enum PipelineError {
    Superseded,
    Guard(GuardError),
    Resolver(ResolverError),
}

impl From<GuardError> for PipelineError {
    fn from(e: GuardError) -> Self {
        PipelineError::Guard(e)
    }
}

impl From<ResolverError> for PipelineError {
    fn from(e: ResolverError) -> Self {
        PipelineError::Resolver(e)
    }
}

pub(crate) type PipelineResult<T> = Result<T, PipelineError>;

fn checkpoint(token: &CancellationToken) -> PipelineResult<()> {
    if token.is_cancelled() {
        Err(PipelineError::Superseded)
    } else {
        Ok(())
    }
}

pub(crate) struct GuardPipeline<'a> {
    pub future: &'a RouterStateSnapshot,
    pub curr: &'a RouterStateSnapshot,
    pub token: &'a CancellationToken,
    pub emit: &'a (dyn Fn(RouterEvent) + Send + Sync),
}

impl GuardPipeline<'_> {
    /// Run every check; the first non-`Allow` result wins.
    pub async fn check_guards(&self, checks: &Checks) -> PipelineResult<GuardResult> {
        if checks.is_empty() {
            return Ok(GuardResult::Allow);
        }

        for check in &checks.can_deactivate {
            let result = self.run_can_deactivate(check).await?;
            if !result.is_allow() {
                return Ok(result);
            }
        }

        for check in &checks.can_activate {
            let route = check.route();
            if let Some(parent) = self.future.tree().parent(route) {
                (self.emit)(RouterEvent::ChildActivationStart {
                    snapshot: Arc::new(self.future.node(parent).clone()),
                });
            }
            (self.emit)(RouterEvent::ActivationStart {
                snapshot: Arc::new(self.future.node(route).clone()),
            });

            let result = self.run_can_activate_child(check).await?;
            if !result.is_allow() {
                return Ok(result);
            }
            let result = self.run_can_activate(route).await?;
            if !result.is_allow() {
                return Ok(result);
            }
        }
        Ok(GuardResult::Allow)
    }

    async fn run_can_deactivate(&self, check: &CanDeactivateCheck) -> PipelineResult<GuardResult> {
        let route = self.curr.node(check.route);
        let Some(config) = route.route_config() else {
            return Ok(GuardResult::Allow);
        };
        for guard in &config.can_deactivate {
            checkpoint(self.token)?;
            let result = guard
                .check(check.component.as_ref(), route, self.curr, self.future)
                .await?;
            metrics::record_guard("can_deactivate", &result);
            if !result.is_allow() {
                tracing::debug!(route = %config.id(), path = config.display_path(), "can_deactivate did not allow");
                return Ok(result);
            }
        }
        Ok(GuardResult::Allow)
    }

    /// Ancestors' `can_activate_child` guards, root first, each asked about the entered route.
    async fn run_can_activate_child(&self, check: &CanActivateCheck) -> PipelineResult<GuardResult> {
        let target = self.future.node(check.route());
        let ancestors = &check.path[..check.path.len().saturating_sub(1)];
        for &ancestor in ancestors {
            let Some(config) = self.future.node(ancestor).route_config() else {
                continue;
            };
            for guard in &config.can_activate_child {
                checkpoint(self.token)?;
                let result = guard.check(target, self.future).await?;
                metrics::record_guard("can_activate_child", &result);
                if !result.is_allow() {
                    tracing::debug!(route = %config.id(), path = config.display_path(), "can_activate_child did not allow");
                    return Ok(result);
                }
            }
        }
        Ok(GuardResult::Allow)
    }

    async fn run_can_activate(&self, route: NodeId) -> PipelineResult<GuardResult> {
        let snapshot = self.future.node(route);
        let Some(config) = snapshot.route_config() else {
            return Ok(GuardResult::Allow);
        };
        for guard in &config.can_activate {
            checkpoint(self.token)?;
            let result = guard.check(snapshot, self.future).await?;
            metrics::record_guard("can_activate", &result);
            if !result.is_allow() {
                tracing::debug!(route = %config.id(), path = config.display_path(), "can_activate did not allow");
                return Ok(result);
            }
        }
        Ok(GuardResult::Allow)
    }
}

fn descendants<T>(tree: &Tree<T>, id: NodeId, out: &mut Vec<NodeId>) {
    for &child in tree.children(id) {
        out.push(child);
        descendants(tree, child, out);
    }
}

/// Run resolvers of entered routes and refresh inherited data below them.
pub(crate) async fn resolve_data(
    state: &mut Arc<RouterStateSnapshot>,
    checks: &Checks,
    strategy: ParamsInheritanceStrategy,
    token: &CancellationToken,
) -> PipelineResult<()> {
    let Some(first) = checks.can_activate.first() else {
        return Ok(());
    };
    let with_resolvers: HashSet<NodeId> = checks.can_activate.iter().map(CanActivateCheck::route).collect();
    let start = state.tree().parent(first.route()).unwrap_or_else(|| state.tree().root());

    let mut affected = Vec::new();
    descendants(state.tree(), start, &mut affected);

    for id in affected {
        if with_resolvers.contains(&id) {
            let resolved = run_resolvers(&**state, id, token).await?;
            let tree = &mut Arc::make_mut(state).tree;
            tree.value_mut(id).resolved_data = resolved;
        }
        let tree = &mut Arc::make_mut(state).tree;
        let data = {
            let parent = tree.parent(id).map(|p| tree.value(p));
            get_inherited(tree.value(id), parent, strategy).resolve
        };
        tree.value_mut(id).data = data;
    }
    Ok(())
}

async fn run_resolvers(state: &RouterStateSnapshot, id: NodeId, token: &CancellationToken) -> PipelineResult<Data> {
    let route = state.node(id);
    let Some(config) = route.route_config() else {
        return Ok(Data::new());
    };
    if config.resolvers().is_empty() {
        return Ok(Data::new());
    }
    checkpoint(token)?;

    let pending = config.resolvers().iter().map(|(key, resolver)| async move {
        let value = resolver.resolve(route, state).await.map_err(|e| e.with_key(key))?;
        Ok::<_, ResolverError>((key.clone(), value))
    });
    let values = try_join_all(pending).await?;
    tracing::debug!(route = %config.id(), keys = values.len(), "Resolvers settled");
    Ok(values.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::activation::outlet::ChildrenOutletContexts;
    use crate::guards::checks::get_all_route_guards;
    use crate::guards::types::{CanActivateGuard, Resolver};
    use crate::routing::route::Route;
    use crate::state::snapshot::ActivatedRouteSnapshot;
    use crate::state::tree::TreeNode;
    use crate::url::{Params, QueryParams, UrlSegment, PRIMARY_OUTLET};

    fn snap(route: &Arc<Route>) -> ActivatedRouteSnapshot {
        ActivatedRouteSnapshot::new(
            vec![UrlSegment::path(route.path().unwrap_or(""))],
            Params::new(),
            QueryParams::new(),
            None,
            Some(Arc::clone(route)),
            PRIMARY_OUTLET.to_string(),
        )
    }

    fn state(children: Vec<TreeNode<ActivatedRouteSnapshot>>) -> Arc<RouterStateSnapshot> {
        Arc::new(RouterStateSnapshot::new(
            "/".into(),
            TreeNode::new(ActivatedRouteSnapshot::root(QueryParams::new(), None), children),
        ))
    }

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str, allow: bool) -> CanActivateGuard {
        let log = Arc::clone(log);
        CanActivateGuard::from_sync(move |_, _| {
            log.lock().unwrap().push(name);
            allow
        })
    }

    #[tokio::test]
    async fn test_guards_short_circuit_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let route = Arc::new(
            Route::new("a")
                .with_component("A")
                .with_can_activate(recording(&log, "g1", true))
                .with_can_activate(recording(&log, "g2", false))
                .with_can_activate(recording(&log, "g3", true)),
        );
        let future = state(vec![TreeNode::leaf(snap(&route))]);
        let curr = state(Vec::new());
        let checks = get_all_route_guards(future.tree(), curr.tree(), &Arc::new(ChildrenOutletContexts::new()));

        let events = Mutex::new(Vec::new());
        let emit = |e: RouterEvent| events.lock().unwrap().push(e.kind());
        let token = CancellationToken::new();
        let pipeline = GuardPipeline {
            future: &future,
            curr: &curr,
            token: &token,
            emit: &emit,
        };

        assert_eq!(pipeline.check_guards(&checks).await.unwrap(), GuardResult::Deny);
        assert_eq!(*log.lock().unwrap(), vec!["g1", "g2"]);
        assert_eq!(*events.lock().unwrap(), vec!["ChildActivationStart", "ActivationStart"]);
    }

    #[tokio::test]
    async fn test_parent_can_activate_child_runs_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let child = Route::new("c").with_component("C").with_can_activate(recording(&log, "own", true));
        let parent = Arc::new(
            Route::new("p")
                .with_component("P")
                .with_can_activate_child(recording(&log, "child-guard", true))
                .with_children(vec![child]),
        );
        let child = Arc::clone(&parent.children().unwrap()[0]);
        let future = state(vec![TreeNode::new(snap(&parent), vec![TreeNode::leaf(snap(&child))])]);
        let curr = state(Vec::new());
        let checks = get_all_route_guards(future.tree(), curr.tree(), &Arc::new(ChildrenOutletContexts::new()));

        let emit = |_: RouterEvent| {};
        let token = CancellationToken::new();
        let pipeline = GuardPipeline {
            future: &future,
            curr: &curr,
            token: &token,
            emit: &emit,
        };
        assert_eq!(pipeline.check_guards(&checks).await.unwrap(), GuardResult::Allow);
        assert_eq!(*log.lock().unwrap(), vec!["child-guard", "own"]);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_first_guard() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let route = Arc::new(Route::new("a").with_component("A").with_can_activate(recording(&log, "g1", true)));
        let future = state(vec![TreeNode::leaf(snap(&route))]);
        let curr = state(Vec::new());
        let checks = get_all_route_guards(future.tree(), curr.tree(), &Arc::new(ChildrenOutletContexts::new()));

        let emit = |_: RouterEvent| {};
        let token = CancellationToken::new();
        token.cancel();
        let pipeline = GuardPipeline {
            future: &future,
            curr: &curr,
            token: &token,
            emit: &emit,
        };
        assert!(matches!(pipeline.check_guards(&checks).await, Err(PipelineError::Superseded)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolvers_fill_data_and_children_inherit() {
        let child = Route::new("").with_component("Home");
        let parent = Arc::new(
            Route::new("user")
                .with_component("User")
                .with_resolver("profile", Resolver::value(|_| serde_json::json!({"name": "ada"})))
                .with_children(vec![child]),
        );
        let child = Arc::clone(&parent.children().unwrap()[0]);
        let mut future = state(vec![TreeNode::new(snap(&parent), vec![TreeNode::leaf(snap(&child))])]);
        let curr = state(Vec::new());
        let checks = get_all_route_guards(future.tree(), curr.tree(), &Arc::new(ChildrenOutletContexts::new()));

        resolve_data(&mut future, &checks, ParamsInheritanceStrategy::EmptyOnly, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(future.node(1).data["profile"]["name"], "ada");
        assert_eq!(future.node(1).resolved_data()["profile"]["name"], "ada");
        assert_eq!(future.node(2).data["profile"]["name"], "ada");
    }

    #[tokio::test]
    async fn test_resolver_error_carries_key() {
        let route = Arc::new(Route::new("a").with_component("A").with_resolver(
            "broken",
            Resolver::from_fn(|_, _| Box::pin(async { Err(ResolverError::new("backend down")) })),
        ));
        let mut future = state(vec![TreeNode::leaf(snap(&route))]);
        let curr = state(Vec::new());
        let checks = get_all_route_guards(future.tree(), curr.tree(), &Arc::new(ChildrenOutletContexts::new()));

        let err = resolve_data(&mut future, &checks, ParamsInheritanceStrategy::EmptyOnly, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            PipelineError::Resolver(e) => assert_eq!(e.key.as_deref(), Some("broken")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
