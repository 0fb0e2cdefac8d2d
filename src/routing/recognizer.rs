//! Route recognition.
//!
//! # Responsibilities
//! - Match a `UrlTree` against the route table, outlet by outlet
//! - Apply `redirect_to` rules while matching and restart on absolute redirects
//! - Run `can_match` and `can_load` guards and trigger lazy child loads
//! - Produce the candidate `RouterStateSnapshot` and the URL after redirects
//!
//! # Design Decisions
//! - Candidates are tried in table order; the first complete match wins
//! - A miss (`NoMatch`) is local: the caller moves on to the next candidate
//! - Absolute redirects are counted per navigation and bounded by `max_redirects`
//! - The cancellation token is checked before every guard and load

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;

use crate::guards::types::GuardResult;
use crate::observability::metrics;
use crate::routing::error::{RoutingError, RoutingResult};
use crate::routing::loader::RouterConfigLoader;
use crate::routing::matcher::{is_immediate_match, match_route, no_leftovers, sort_by_matching_outlets, split, MatchResult};
use crate::routing::redirects::{apply_redirect, Redirect};
use crate::routing::route::Route;
use crate::state::snapshot::{assign_positions, inherit_params_and_data, ActivatedRouteSnapshot, ParamsInheritanceStrategy, RouterStateSnapshot};
use crate::state::tree::{NodeId, Tree, TreeNode};
use crate::url::{UrlSegment, UrlSegmentGroup, UrlSerializer, UrlTree, PRIMARY_OUTLET};

/// Output of a successful recognition.
#[derive(Debug, Clone)]
pub struct Recognized {
    pub url_after_redirects: UrlTree,
    pub state: RouterStateSnapshot,
    pub absolute_redirects: usize,
}

enum Miss {
    NoMatch(String),
    Absolute(UrlTree),
    Fatal(RoutingError),
}

impl From<RoutingError> for Miss {
    fn from(e: RoutingError) -> Self {
        Miss::Fatal(e)
    }
}

type Step<T> = Result<T, Miss>;
type SnapshotNode = TreeNode<ActivatedRouteSnapshot>;

fn no_match<T>(group: &UrlSegmentGroup) -> Step<T> {
    Err(Miss::NoMatch(group.to_string()))
}

/// One recognition run for one navigation.
pub struct Recognizer<'a> {
    config: &'a [Arc<Route>],
    loader: &'a RouterConfigLoader,
    serializer: &'a dyn UrlSerializer,
    strategy: ParamsInheritanceStrategy,
    max_redirects: usize,
    token: &'a CancellationToken,
    url: UrlTree,
}

impl<'a> Recognizer<'a> {
    pub fn new(
        config: &'a [Arc<Route>],
        loader: &'a RouterConfigLoader,
        serializer: &'a dyn UrlSerializer,
        strategy: ParamsInheritanceStrategy,
        max_redirects: usize,
        token: &'a CancellationToken,
        url: UrlTree,
    ) -> Self {
        Self {
            config,
            loader,
            serializer,
            strategy,
            max_redirects,
            token,
            url,
        }
    }

    /// Match until no absolute redirect remains.
    pub async fn recognize(mut self) -> RoutingResult<Recognized> {
        let mut absolute_redirects = 0;
        loop {
            let outcome = self.match_root().await;
            match outcome {
                Ok(children) => return Ok(self.finish(children, absolute_redirects)),
                Err(Miss::Absolute(next)) => {
                    absolute_redirects += 1;
                    if absolute_redirects > self.max_redirects {
                        tracing::warn!(hops = absolute_redirects, "Redirects did not converge");
                        return Err(RoutingError::RedirectLoop(self.max_redirects));
                    }
                    tracing::debug!(hop = absolute_redirects, to = %self.serializer.serialize(&next), "Absolute redirect");
                    self.url = next;
                }
                Err(Miss::NoMatch(segment)) => return Err(RoutingError::NoMatch(segment)),
                Err(Miss::Fatal(e)) => return Err(e),
            }
        }
    }

    fn finish(&self, children: Vec<SnapshotNode>, absolute_redirects: usize) -> Recognized {
        let root = ActivatedRouteSnapshot::root(self.url.query_params.clone(), self.url.fragment.clone());
        let mut tree = Tree::from_node(TreeNode::new(root, children));

        let url_after_redirects = url_tree_from_snapshot(&tree, &self.url);
        inherit_params_and_data(&mut tree, self.strategy);
        assign_positions(&mut tree);

        Recognized {
            state: RouterStateSnapshot {
                url: self.serializer.serialize(&url_after_redirects),
                tree,
            },
            url_after_redirects,
            absolute_redirects,
        }
    }

    fn checkpoint(&self) -> Step<()> {
        if self.token.is_cancelled() {
            Err(Miss::Fatal(RoutingError::Superseded))
        } else {
            Ok(())
        }
    }

    async fn match_root(&self) -> Step<Vec<SnapshotNode>> {
        let (root, _) = split(&self.url.root, &[], &[], self.config);
        self.process_segment_group(self.config, &root, PRIMARY_OUTLET).await
    }

    fn process_segment_group<'b>(
        &'b self,
        config: &'b [Arc<Route>],
        group: &'b UrlSegmentGroup,
        outlet: &'b str,
    ) -> BoxFuture<'b, Step<Vec<SnapshotNode>>> {
        async move {
            if group.segments.is_empty() && group.has_children() {
                return self.process_children(config, group).await;
            }
            let child = self
                .process_segment(config, group, group.segments.clone(), outlet, true)
                .await?;
            Ok(child.into_iter().collect())
        }
        .boxed()
    }

    fn process_children<'b>(&'b self, config: &'b [Arc<Route>], group: &'b UrlSegmentGroup) -> BoxFuture<'b, Step<Vec<SnapshotNode>>> {
        async move {
            let mut children = Vec::new();
            for (outlet, child) in group.children_primary_first() {
                let sorted = sort_by_matching_outlets(config, outlet);
                children.extend(self.process_segment_group(&sorted, child, outlet).await?);
            }

            let mut merged = merge_empty_path_matches(children);
            check_outlet_name_uniqueness(&merged)?;
            merged.sort_by_key(|n| (n.value.outlet != PRIMARY_OUTLET, n.value.outlet.clone()));
            Ok(merged)
        }
        .boxed()
    }

    fn process_segment<'b>(
        &'b self,
        routes: &'b [Arc<Route>],
        group: &'b UrlSegmentGroup,
        segments: Vec<UrlSegment>,
        outlet: &'b str,
        allow_redirects: bool,
    ) -> BoxFuture<'b, Step<Option<SnapshotNode>>> {
        async move {
            for route in routes {
                match self
                    .process_segment_against_route(routes, route, group, &segments, outlet, allow_redirects)
                    .await
                {
                    Err(Miss::NoMatch(_)) => continue,
                    other => return other,
                }
            }
            if no_leftovers(group, &segments, outlet) {
                return Ok(None);
            }
            no_match(group)
        }
        .boxed()
    }

    fn process_segment_against_route<'b>(
        &'b self,
        routes: &'b [Arc<Route>],
        route: &'b Arc<Route>,
        group: &'b UrlSegmentGroup,
        segments: &'b [UrlSegment],
        outlet: &'b str,
        allow_redirects: bool,
    ) -> BoxFuture<'b, Step<Option<SnapshotNode>>> {
        async move {
            if !is_immediate_match(route, group, segments, outlet) {
                return no_match(group);
            }
            if route.redirect_to().is_none() {
                return self
                    .match_segment_against_route(group, route, segments, outlet)
                    .await
                    .map(Some);
            }
            if allow_redirects {
                return self.expand_using_redirect(routes, route, group, segments, outlet).await;
            }
            no_match(group)
        }
        .boxed()
    }

    async fn expand_using_redirect(
        &self,
        routes: &[Arc<Route>],
        route: &Arc<Route>,
        group: &UrlSegmentGroup,
        segments: &[UrlSegment],
        outlet: &str,
    ) -> Step<Option<SnapshotNode>> {
        let matched = match_route(group, route, segments);
        if !matched.matched {
            return no_match(group);
        }

        match apply_redirect(self.serializer, route, &matched, &self.url)? {
            Redirect::Absolute(tree) => Err(Miss::Absolute(tree)),
            Redirect::Relative(mut next) => {
                tracing::trace!(from = route.display_path(), to = ?route.redirect_to(), "Relative redirect");
                next.extend(matched.remaining);
                self.process_segment(routes, group, next, outlet, false).await
            }
        }
    }

    fn match_segment_against_route<'b>(
        &'b self,
        group: &'b UrlSegmentGroup,
        route: &'b Arc<Route>,
        segments: &'b [UrlSegment],
        outlet: &'b str,
    ) -> BoxFuture<'b, Step<SnapshotNode>> {
        async move {
            let result = self.match_with_checks(group, route, segments).await?;
            let child_config = self.get_child_config(route, segments).await?;

            let snapshot = ActivatedRouteSnapshot::new(
                result.consumed.clone(),
                result.parameters.clone(),
                self.url.query_params.clone(),
                self.url.fragment.clone(),
                Some(Arc::clone(route)),
                route.outlet().to_string(),
            );

            // A wildcard swallows the whole group, named children included.
            let raw = if route.path() == Some("**") {
                UrlSegmentGroup::new(group.segments.clone(), IndexMap::new())
            } else {
                group.clone()
            };
            let (split_group, sliced) = split(&raw, &result.consumed, &result.remaining, &child_config);

            if sliced.is_empty() && split_group.has_children() {
                let children = self.process_children(&child_config, &split_group).await?;
                return Ok(TreeNode::new(snapshot, children));
            }
            if child_config.is_empty() && sliced.is_empty() {
                return Ok(TreeNode::leaf(snapshot));
            }

            let child_outlet = if route.outlet() == outlet { PRIMARY_OUTLET } else { outlet };
            let child = self
                .process_segment(&child_config, &split_group, sliced, child_outlet, true)
                .await?;
            Ok(TreeNode::new(snapshot, child.into_iter().collect()))
        }
        .boxed()
    }

    async fn match_with_checks(&self, group: &UrlSegmentGroup, route: &Route, segments: &[UrlSegment]) -> Step<MatchResult> {
        let result = match_route(group, route, segments);
        if !result.matched {
            return no_match(group);
        }

        for guard in &route.can_match {
            self.checkpoint()?;
            let decision = guard.check(route, segments).await.map_err(RoutingError::from)?;
            metrics::record_guard("can_match", &decision);
            match decision {
                GuardResult::Allow => continue,
                GuardResult::Deny => {
                    tracing::debug!(route = %route.id(), path = route.display_path(), "can_match rejected route");
                    return no_match(group);
                }
                GuardResult::Redirect(tree) => return Err(RoutingError::GuardRedirect(tree).into()),
            }
        }
        Ok(result)
    }

    async fn get_child_config(&self, route: &Arc<Route>, segments: &[UrlSegment]) -> Step<Vec<Arc<Route>>> {
        if let Some(children) = route.children() {
            return Ok(children.to_vec());
        }
        if !route.has_load_children() {
            return Ok(Vec::new());
        }
        if let Some(loaded) = route.loaded_config() {
            return Ok(loaded.routes.clone());
        }

        for guard in &route.can_load {
            self.checkpoint()?;
            let decision = guard.check(route, segments).await.map_err(RoutingError::from)?;
            metrics::record_guard("can_load", &decision);
            match decision {
                GuardResult::Allow => continue,
                GuardResult::Deny => return Err(RoutingError::LoadRejected(route.display_path().to_string()).into()),
                GuardResult::Redirect(tree) => return Err(RoutingError::GuardRedirect(tree).into()),
            }
        }

        self.checkpoint()?;
        let loaded = self.loader.load_children(route).await.map_err(RoutingError::from)?;
        Ok(loaded.routes)
    }
}

fn has_empty_path_config(node: &SnapshotNode) -> bool {
    node.value.route_config.as_ref().and_then(|r| r.path()) == Some("")
}

/// Sibling empty-path matches of the same route (one per outlet) collapse into one node.
fn merge_empty_path_matches(nodes: Vec<SnapshotNode>) -> Vec<SnapshotNode> {
    let mut result: Vec<Option<SnapshotNode>> = Vec::new();
    let mut merged: Vec<usize> = Vec::new();

    for node in nodes {
        if !has_empty_path_config(&node) {
            result.push(Some(node));
            continue;
        }
        let duplicate = result.iter().position(|existing| {
            existing
                .as_ref()
                .is_some_and(|e| e.value.route_config.is_some() && e.value.same_config(&node.value))
        });
        match duplicate {
            Some(idx) => {
                if let Some(existing) = result[idx].as_mut() {
                    existing.children.extend(node.children);
                }
                if !merged.contains(&idx) {
                    merged.push(idx);
                }
            }
            None => result.push(Some(node)),
        }
    }

    let mut moved = Vec::with_capacity(merged.len());
    for idx in &merged {
        if let Some(node) = result[*idx].take() {
            moved.push(TreeNode::new(node.value, merge_empty_path_matches(node.children)));
        }
    }
    result.into_iter().flatten().chain(moved).collect()
}

fn check_outlet_name_uniqueness(nodes: &[SnapshotNode]) -> Step<()> {
    let mut seen: IndexMap<&str, &ActivatedRouteSnapshot> = IndexMap::new();
    for node in nodes {
        if let Some(existing) = seen.get(node.value.outlet.as_str()) {
            let join = |s: &ActivatedRouteSnapshot| s.url.iter().map(ToString::to_string).collect::<Vec<_>>().join("/");
            return Err(RoutingError::DuplicateOutlet(join(existing), join(&node.value)).into());
        }
        seen.insert(node.value.outlet.as_str(), &node.value);
    }
    Ok(())
}

fn group_from_snapshot(tree: &Tree<ActivatedRouteSnapshot>, id: NodeId) -> UrlSegmentGroup {
    let mut children = IndexMap::new();
    for &child in tree.children(id) {
        children.insert(tree.value(child).outlet.clone(), group_from_snapshot(tree, child));
    }
    UrlSegmentGroup::new(tree.value(id).url.clone(), children)
}

fn squash(group: &UrlSegmentGroup) -> UrlSegmentGroup {
    let mut children = IndexMap::new();
    for (outlet, child) in &group.children {
        let candidate = squash(child);
        if outlet == PRIMARY_OUTLET && candidate.segments.is_empty() && candidate.has_children() {
            children.extend(candidate.children);
        } else if !candidate.segments.is_empty() || candidate.has_children() {
            children.insert(outlet.clone(), candidate);
        }
    }

    if children.len() == 1 {
        if let Some(primary) = children.shift_remove(PRIMARY_OUTLET) {
            let mut segments = group.segments.clone();
            segments.extend(primary.segments);
            return UrlSegmentGroup::new(segments, primary.children);
        }
    }
    UrlSegmentGroup::new(group.segments.clone(), children)
}

/// The URL a recognized snapshot tree stands for.
pub(crate) fn url_tree_from_snapshot(tree: &Tree<ActivatedRouteSnapshot>, source: &UrlTree) -> UrlTree {
    let candidate = squash(&group_from_snapshot(tree, tree.root()));
    let root = if candidate.segments.is_empty() {
        candidate
    } else {
        let mut children = IndexMap::new();
        children.insert(PRIMARY_OUTLET.to_string(), candidate);
        UrlSegmentGroup::new(Vec::new(), children)
    };
    UrlTree::new(root, source.query_params.clone(), source.fragment.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::types::CanMatchGuard;
    use crate::routing::route::PathMatch;
    use crate::url::DefaultUrlSerializer;

    async fn recognize(config: Vec<Route>, url: &str) -> RoutingResult<Recognized> {
        let config: Vec<Arc<Route>> = config.into_iter().map(Arc::new).collect();
        let loader = RouterConfigLoader::new();
        let token = CancellationToken::new();
        let tree = UrlTree::parse(url).expect("url");
        Recognizer::new(&config, &loader, &DefaultUrlSerializer, ParamsInheritanceStrategy::EmptyOnly, 31, &token, tree)
            .recognize()
            .await
    }

    fn components(state: &RouterStateSnapshot) -> Vec<String> {
        state
            .tree()
            .ids()
            .skip(1)
            .map(|id| {
                let node = state.node(id);
                format!("{}:{}", node.outlet, node.component.as_ref().map(|c| c.name()).unwrap_or("-"))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_nested_match_with_params() {
        let config = vec![Route::new("team/:id")
            .with_component("Team")
            .with_children(vec![Route::new("user/:name").with_component("User")])];
        let res = recognize(config, "/team/33/user/bob").await.unwrap();

        assert_eq!(components(&res.state), vec!["primary:Team", "primary:User"]);
        assert_eq!(res.state.primary_leaf().param("name"), Some("bob"));
        assert_eq!(res.state.url, "/team/33/user/bob");
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let config = vec![
            Route::new("a").with_component("First"),
            Route::new("a").with_component("Second"),
        ];
        let res = recognize(config, "/a").await.unwrap();
        assert_eq!(components(&res.state), vec!["primary:First"]);
    }

    #[tokio::test]
    async fn test_relative_redirect() {
        let config = vec![Route::new("a").with_redirect("c"), Route::new("c").with_component("X")];
        let res = recognize(config, "/a").await.unwrap();
        assert_eq!(res.url_after_redirects.to_string(), "/c");
        assert_eq!(res.state.url, "/c");
    }

    #[tokio::test]
    async fn test_absolute_redirect_restarts() {
        let config = vec![
            Route::new("").with_redirect("/home").with_path_match(PathMatch::Full),
            Route::new("home").with_component("Home"),
        ];
        let res = recognize(config, "/").await.unwrap();
        assert_eq!(res.state.url, "/home");
        assert_eq!(res.absolute_redirects, 1);
    }

    #[tokio::test]
    async fn test_redirect_loop_is_bounded() {
        let config = vec![Route::new("a").with_redirect("/b"), Route::new("b").with_redirect("/a")];
        let err = recognize(config, "/a").await.unwrap_err();
        assert!(matches!(err, RoutingError::RedirectLoop(31)));
    }

    #[tokio::test]
    async fn test_no_match() {
        let config = vec![Route::new("a").with_component("A")];
        let err = recognize(config, "/b").await.unwrap_err();
        assert!(matches!(err, RoutingError::NoMatch(ref s) if s == "b"));
    }

    #[tokio::test]
    async fn test_prefix_route_without_children_does_not_match_leftovers() {
        let config = vec![Route::new("a").with_component("A"), Route::new("**").with_component("NotFound")];
        let res = recognize(config, "/a/b").await.unwrap();
        assert_eq!(components(&res.state), vec!["primary:NotFound"]);
    }

    #[tokio::test]
    async fn test_named_outlets() {
        let config = vec![
            Route::new("a").with_component("A"),
            Route::new("b").with_outlet("aux").with_component("B"),
        ];
        let res = recognize(config, "/a(aux:b)").await.unwrap();
        assert_eq!(components(&res.state), vec!["primary:A", "aux:B"]);
        assert_eq!(res.state.url, "/a(aux:b)");
    }

    #[tokio::test]
    async fn test_named_outlet_only_matches_declared_routes() {
        let config = vec![Route::new("b").with_component("B")];
        assert!(recognize(config, "/(aux:b)").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_path_named_outlet_sibling() {
        let config = vec![Route::new("a").with_component("A").with_children(vec![
            Route::new("").with_component("Main"),
            Route::new("").with_outlet("side").with_component("Side"),
        ])];
        let res = recognize(config, "/a").await.unwrap();
        assert_eq!(components(&res.state), vec!["primary:A", "primary:Main", "side:Side"]);
        assert_eq!(res.state.url, "/a");
    }

    #[tokio::test]
    async fn test_can_match_false_tries_next_candidate() {
        let config = vec![
            Route::new("a").with_component("Admin").with_can_match(CanMatchGuard::from_sync(|_, _| false)),
            Route::new("a").with_component("Guest"),
        ];
        let res = recognize(config, "/a").await.unwrap();
        assert_eq!(components(&res.state), vec!["primary:Guest"]);
    }

    #[tokio::test]
    async fn test_root_url_with_no_empty_route() {
        let config = vec![Route::new("a").with_component("A")];
        let res = recognize(config, "/").await.unwrap();
        assert_eq!(res.state.tree().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_guarded_match() {
        let config: Vec<Arc<Route>> = vec![Arc::new(
            Route::new("a").with_component("A").with_can_match(CanMatchGuard::from_sync(|_, _| true)),
        )];
        let loader = RouterConfigLoader::new();
        let token = CancellationToken::new();
        token.cancel();
        let res = Recognizer::new(
            &config,
            &loader,
            &DefaultUrlSerializer,
            ParamsInheritanceStrategy::EmptyOnly,
            31,
            &token,
            UrlTree::parse("/a").unwrap(),
        )
        .recognize()
        .await;
        assert!(matches!(res, Err(RoutingError::Superseded)));
    }
}
