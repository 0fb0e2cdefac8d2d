//! The navigation orchestrator.
//!
//! # Responsibilities
//! - Turn URLs, command lists and popstate events into transitions with increasing ids
//! - Drive one transition through recognition, guards, resolvers, component loading and activation
//! - Own the committed URL tree, router state and outlet contexts, and mutate them only on commit
//! - Publish the lifecycle event stream and keep the location in sync
//!
//! # Data Flow
//! ```text
//! navigate_by_url / navigate / popstate
//!     → begin (new id, previous transition's token cancelled)
//!     → same-URL check → NavigationSkipped
//!     → NavigationStart
//!     → Recognizer (redirects, lazy children) → RoutesRecognized
//!     → checks + GuardPipeline → GuardsCheckStart / GuardsCheckEnd
//!     → resolve_data → ResolveStart / ResolveEnd
//!     → lazy components
//!     → commit (id recheck, create_router_state, location, ActivateRoutes)
//!     → NavigationEnd | NavigationCancel | NavigationError
//! ```
//!
//! # Design Decisions
//! - Starting a navigation cancels the previous transition's token; the older one settles as
//!   superseded at its next await, and the commit itself rechecks the latest id under a lock
//! - The commit is synchronous, so no await point can split a half-applied state
//! - Every failure flows into one settle step, which emits the terminal event and
//!   applies the error handler; nothing escapes a transition unhandled

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;

use arc_swap::ArcSwap;
use futures_util::future::{try_join_all, BoxFuture};
use futures_util::FutureExt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::activation::activate::ActivateRoutes;
use crate::activation::host::{ComponentHost, TracingHost};
use crate::activation::outlet::ChildrenOutletContexts;
use crate::activation::reuse::{DefaultRouteReuseStrategy, RouteReuseStrategy};
use crate::config::loader::ConfigError;
use crate::config::schema::{CanceledNavigationResolution, OnSameUrlNavigation, RouterOptions, UrlUpdateStrategy};
use crate::config::validation::validate_routes;
use crate::guards::checks::{carry_over_data, get_all_route_guards};
use crate::guards::injector::Injector;
use crate::guards::pipeline::{resolve_data, GuardPipeline, PipelineError};
use crate::guards::types::GuardResult;
use crate::lifecycle::shutdown::Shutdown;
use crate::navigation::error::{
    default_error_handler, default_malformed_url_handler, ErrorHandlerOutcome, MalformedUrlHandler, NavigationError,
    NavigationErrorHandler, NavigationResult,
};
use crate::navigation::events::{NavigationCancellationCode, NavigationSkippedCode, NavigationTrigger, RouterEvent};
use crate::navigation::extras::{NavigationBehaviorOptions, NavigationExtras, UrlCreationOptions};
use crate::navigation::location::{HistoryState, Location, MemoryLocation, PopStateEvent};
use crate::navigation::transition::{Navigation, Phase, Transition};
use crate::observability::{metrics, tracing::navigation_span};
use crate::routing::error::RoutingError;
use crate::routing::loader::{LoadError, RouterConfigLoader};
use crate::routing::recognizer::Recognizer;
use crate::routing::route::Route;
use crate::state::activated::{create_router_state, RouterState};
use crate::state::snapshot::RouterStateSnapshot;
use crate::state::tree::NodeId;
use crate::url::{
    contains_tree, create_url_tree, Command, CommandError, DefaultUrlSerializer, IsActiveMatchOptions, UrlSerializer, UrlTree,
};

const EVENT_CAPACITY: usize = 256;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Why a transition stopped before committing.
enum Abort {
    Superseded,
    GuardRejected(String),
    Redirect(UrlTree),
    Failed(NavigationError),
}

impl From<RoutingError> for Abort {
    fn from(e: RoutingError) -> Self {
        match e {
            RoutingError::Superseded => Abort::Superseded,
            RoutingError::GuardRedirect(tree) => Abort::Redirect(tree),
            RoutingError::LoadRejected(path) => Abort::GuardRejected(format!("lazy loading of '{path}' was rejected")),
            other => Abort::Failed(other.into()),
        }
    }
}

impl From<PipelineError> for Abort {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Superseded => Abort::Superseded,
            PipelineError::Guard(e) => Abort::Failed(e.into()),
            PipelineError::Resolver(e) => Abort::Failed(e.into()),
        }
    }
}

impl From<LoadError> for Abort {
    fn from(e: LoadError) -> Self {
        Abort::Failed(e.into())
    }
}

/// What the router has committed.
struct Committed {
    url_tree: UrlTree,
    state: Arc<RouterState>,
    navigation_id: u64,
}

struct Inner {
    config: ArcSwap<Vec<Arc<Route>>>,
    options: RouterOptions,
    serializer: Arc<dyn UrlSerializer>,
    loader: RouterConfigLoader,
    location: Arc<dyn Location>,
    host: Arc<dyn ComponentHost>,
    reuse: Arc<dyn RouteReuseStrategy>,
    injector: Arc<Injector>,
    error_handler: NavigationErrorHandler,
    malformed_url_handler: MalformedUrlHandler,
    events: broadcast::Sender<RouterEvent>,
    contexts: Arc<ChildrenOutletContexts>,
    committed: ArcSwap<Committed>,
    commit_lock: Mutex<()>,
    navigated: AtomicBool,
    latest_id: AtomicU64,
    current: Mutex<Option<Arc<Transition>>>,
    last_successful: Mutex<Option<Navigation>>,
    shutdown: Shutdown,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// A transition that has an id but has not run yet.
struct Pending {
    transition: Arc<Transition>,
    raw_url: UrlTree,
    url: String,
    trigger: NavigationTrigger,
    restored_state: Option<HistoryState>,
    extras: NavigationBehaviorOptions,
    is_url_transition: bool,
    started: Instant,
}

/// Builder for [`Router`].
pub struct RouterBuilder {
    routes: Vec<Arc<Route>>,
    options: RouterOptions,
    location: Option<Arc<dyn Location>>,
    host: Option<Arc<dyn ComponentHost>>,
    reuse: Option<Arc<dyn RouteReuseStrategy>>,
    injector: Option<Arc<Injector>>,
    serializer: Option<Arc<dyn UrlSerializer>>,
    error_handler: Option<NavigationErrorHandler>,
    malformed_url_handler: Option<MalformedUrlHandler>,
    shutdown: Option<Shutdown>,
}

impl RouterBuilder {
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes: routes.into_iter().map(Arc::new).collect(),
            options: RouterOptions::default(),
            location: None,
            host: None,
            reuse: None,
            injector: None,
            serializer: None,
            error_handler: None,
            malformed_url_handler: None,
            shutdown: None,
        }
    }

    pub fn options(mut self, options: RouterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn location(mut self, location: Arc<dyn Location>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn host(mut self, host: Arc<dyn ComponentHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn reuse_strategy(mut self, strategy: Arc<dyn RouteReuseStrategy>) -> Self {
        self.reuse = Some(strategy);
        self
    }

    /// Root scope for components and the scope route tables were built against.
    pub fn injector(mut self, injector: Arc<Injector>) -> Self {
        self.injector = Some(injector);
        self
    }

    pub fn serializer(mut self, serializer: Arc<dyn UrlSerializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn error_handler(mut self, handler: NavigationErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn malformed_url_handler(mut self, handler: MalformedUrlHandler) -> Self {
        self.malformed_url_handler = Some(handler);
        self
    }

    /// Tear the router down when `shutdown` fires, as if `dispose` had been called.
    pub fn shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Validate the route table and create the router.
    pub fn build(self) -> Result<Router, ConfigError> {
        validate_routes(&self.routes, "").map_err(ConfigError::Validation)?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Inner {
            config: ArcSwap::from_pointee(self.routes),
            options: self.options,
            serializer: self.serializer.unwrap_or_else(|| Arc::new(DefaultUrlSerializer)),
            loader: RouterConfigLoader::new(),
            location: self.location.unwrap_or_else(|| Arc::new(MemoryLocation::default())),
            host: self.host.unwrap_or_else(|| Arc::new(TracingHost::new())),
            reuse: self.reuse.unwrap_or_else(|| Arc::new(DefaultRouteReuseStrategy)),
            injector: self.injector.unwrap_or_else(Injector::empty),
            error_handler: self.error_handler.unwrap_or_else(default_error_handler),
            malformed_url_handler: self.malformed_url_handler.unwrap_or_else(default_malformed_url_handler),
            events,
            contexts: Arc::new(ChildrenOutletContexts::new()),
            committed: ArcSwap::from_pointee(Committed {
                url_tree: UrlTree::empty(),
                state: Arc::new(RouterState::empty()),
                navigation_id: 0,
            }),
            commit_lock: Mutex::new(()),
            navigated: AtomicBool::new(false),
            latest_id: AtomicU64::new(0),
            current: Mutex::new(None),
            last_successful: Mutex::new(None),
            shutdown: self.shutdown.unwrap_or_default(),
            listener: Mutex::new(None),
        };
        Ok(Router { inner: Arc::new(inner) })
    }
}

/// Drives navigations for one route table. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Router {
    inner: Arc<Inner>,
}

impl Router {
    pub fn builder(routes: Vec<Route>) -> RouterBuilder {
        RouterBuilder::new(routes)
    }

    /// Navigate to a URL string. Unparsable input goes through the malformed-URL handler.
    pub async fn navigate_by_url(&self, url: &str, extras: NavigationBehaviorOptions) -> NavigationResult<bool> {
        let tree = match self.inner.serializer.parse(url) {
            Ok(tree) => tree,
            Err(e) => (self.inner.malformed_url_handler)(&e, url),
        };
        self.navigate_by_url_tree(tree, extras).await
    }

    pub async fn navigate_by_url_tree(&self, tree: UrlTree, extras: NavigationBehaviorOptions) -> NavigationResult<bool> {
        let pending = self.begin(tree, NavigationTrigger::Imperative, None, extras)?;
        self.drive(pending).await
    }

    /// Navigate by commands, applied to the committed tree.
    pub async fn navigate(&self, commands: &[Command], extras: NavigationExtras) -> NavigationResult<bool> {
        let tree = self.create_url_tree(commands, &extras.url)?;
        self.navigate_by_url_tree(tree, extras.behavior).await
    }

    /// Navigate to wherever the location currently points.
    pub async fn initial_navigation(&self) -> NavigationResult<bool> {
        let path = self.inner.location.path();
        let state = self.inner.location.state();
        let extras = NavigationBehaviorOptions {
            replace_url: true,
            state: state.as_ref().and_then(|s| s.extra.clone()),
            ..NavigationBehaviorOptions::default()
        };
        tracing::info!(url = %path, "Initial navigation");
        self.navigate_by_url(&path, extras).await
    }

    /// Turn location popstate events into navigations. Calling it again is a no-op.
    pub fn start_location_listener(&self) {
        let mut slot = lock(&self.inner.listener);
        if slot.is_some() || self.inner.shutdown.is_triggered() {
            return;
        }
        let mut popstate = self.inner.location.subscribe();
        let shutdown = self.inner.shutdown.clone();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        *slot = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.triggered() => break,
                    event = popstate.recv() => match event {
                        Ok(event) => {
                            let Some(inner) = weak.upgrade() else { break };
                            Router { inner }.on_popstate(event);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Location listener lagged behind popstate events");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            tracing::debug!("Location listener stopped");
        }));
        tracing::debug!("Location listener started");
    }

    fn on_popstate(&self, event: PopStateEvent) {
        let tree = match self.inner.serializer.parse(&event.url) {
            Ok(tree) => tree,
            Err(e) => (self.inner.malformed_url_handler)(&e, &event.url),
        };
        let extras = NavigationBehaviorOptions {
            replace_url: true,
            state: event.state.as_ref().and_then(|s| s.extra.clone()),
            ..NavigationBehaviorOptions::default()
        };
        // The id is taken here, in event order; only the run is spawned.
        let pending = match self.begin(tree, NavigationTrigger::Popstate, event.state, extras) {
            Ok(pending) => pending,
            Err(e) => {
                tracing::debug!(error = %e, "Popstate ignored");
                return;
            }
        };
        let router = self.clone();
        tokio::spawn(async move {
            if let Err(e) = router.drive(pending).await {
                tracing::warn!(error = %e, "Popstate navigation failed");
            }
        });
    }

    /// Cancel the in-flight navigation and stop listening to the location.
    pub fn dispose(&self) {
        if !self.inner.shutdown.trigger("dispose") {
            return;
        }
        if let Some(handle) = lock(&self.inner.listener).take() {
            handle.abort();
        }
        tracing::info!("Router disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.shutdown.is_triggered()
    }

    /// Swap the route table. The next navigation to the current URL is not skipped.
    pub fn reset_config(&self, routes: Vec<Route>) -> Result<(), ConfigError> {
        let routes: Vec<Arc<Route>> = routes.into_iter().map(Arc::new).collect();
        validate_routes(&routes, "").map_err(ConfigError::Validation)?;
        tracing::info!(routes = routes.len(), "Route table replaced");
        self.inner.config.store(Arc::new(routes));
        self.inner.navigated.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn config(&self) -> Arc<Vec<Arc<Route>>> {
        self.inner.config.load_full()
    }

    pub fn options(&self) -> &RouterOptions {
        &self.inner.options
    }

    /// The navigation in flight, if any.
    pub fn current_navigation(&self) -> Option<Navigation> {
        lock(&self.inner.current).as_ref().map(|t| t.navigation())
    }

    pub fn last_successful_navigation(&self) -> Option<Navigation> {
        lock(&self.inner.last_successful).clone()
    }

    /// Build a tree from commands, relative to the committed one.
    pub fn create_url_tree(&self, commands: &[Command], options: &UrlCreationOptions) -> Result<UrlTree, CommandError> {
        let committed = self.inner.committed.load();
        let relative = options.relative_to.as_ref().map(|route| route.snapshot().relative_position());
        let (query_params, fragment) = options.query_and_fragment(&committed.url_tree);
        create_url_tree(&committed.url_tree, relative.as_ref(), commands, query_params, fragment)
    }

    /// Whether `url` is active in the committed tree.
    pub fn is_active(&self, url: &UrlTree, options: &IsActiveMatchOptions) -> bool {
        contains_tree(&self.inner.committed.load().url_tree, url, options)
    }

    /// Like [`Router::is_active`]; a URL that does not parse is never active.
    pub fn is_active_url(&self, url: &str, options: &IsActiveMatchOptions) -> bool {
        self.inner
            .serializer
            .parse(url)
            .map(|tree| self.is_active(&tree, options))
            .unwrap_or(false)
    }

    /// Subscribe to lifecycle events emitted from now on.
    pub fn events(&self) -> broadcast::Receiver<RouterEvent> {
        self.inner.events.subscribe()
    }

    /// The committed URL.
    pub fn url(&self) -> String {
        self.serialize_url(&self.inner.committed.load().url_tree)
    }

    pub fn url_tree(&self) -> UrlTree {
        self.inner.committed.load().url_tree.clone()
    }

    pub fn router_state(&self) -> Arc<RouterState> {
        Arc::clone(&self.inner.committed.load().state)
    }

    pub fn snapshot(&self) -> Arc<RouterStateSnapshot> {
        Arc::clone(self.inner.committed.load().state.snapshot())
    }

    /// True once a navigation committed since the last route-table reset.
    pub fn navigated(&self) -> bool {
        self.inner.navigated.load(Ordering::SeqCst)
    }

    pub fn outlet_contexts(&self) -> &Arc<ChildrenOutletContexts> {
        &self.inner.contexts
    }

    pub fn location(&self) -> &Arc<dyn Location> {
        &self.inner.location
    }

    pub fn parse_url(&self, url: &str) -> UrlTree {
        match self.inner.serializer.parse(url) {
            Ok(tree) => tree,
            Err(e) => (self.inner.malformed_url_handler)(&e, url),
        }
    }

    pub fn serialize_url(&self, tree: &UrlTree) -> String {
        self.inner.serializer.serialize(tree)
    }

    fn emit(&self, event: RouterEvent) {
        tracing::trace!(event = %event, "Router event");
        let _ = self.inner.events.send(event);
    }

    /// Allocate an id and supersede whatever is in flight.
    fn begin(
        &self,
        raw_url: UrlTree,
        trigger: NavigationTrigger,
        restored_state: Option<HistoryState>,
        extras: NavigationBehaviorOptions,
    ) -> NavigationResult<Pending> {
        if self.inner.shutdown.is_triggered() {
            return Err(NavigationError::Disposed);
        }
        let url = self.serialize_url(&raw_url);

        // Id allocation and the `current` swap happen under one lock, so the
        // transition left in `current` always carries the latest id.
        let mut current = lock(&self.inner.current);
        let in_flight = current.take();
        let id = self.inner.latest_id.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = &in_flight {
            previous.token.cancel();
        }
        let in_flight_url = in_flight.as_ref().map(|t| t.extracted_url());
        let previous_navigation = in_flight
            .map(|t| t.navigation())
            .or_else(|| lock(&self.inner.last_successful).clone());

        let committed_url = self.serialize_url(&self.inner.committed.load().url_tree);
        let is_url_transition = !self.navigated()
            || url != committed_url
            || in_flight_url.is_some_and(|previous| self.serialize_url(&previous) != url);

        let transition = Transition::new(
            Navigation {
                id,
                trigger,
                extracted_url: raw_url.clone(),
                final_url: None,
                phase: Phase::Created,
                extras: extras.clone(),
                restored_state: restored_state.clone(),
                previous_navigation: previous_navigation.map(Box::new),
            },
            self.inner.shutdown.child_token(),
        );
        *current = Some(Arc::clone(&transition));
        drop(current);

        metrics::record_navigation_started(trigger);
        Ok(Pending {
            transition,
            raw_url,
            url,
            trigger,
            restored_state,
            extras,
            is_url_transition,
            started: Instant::now(),
        })
    }

    /// Run a transition to its terminal event.
    fn drive(&self, pending: Pending) -> BoxFuture<'_, NavigationResult<bool>> {
        let span = navigation_span(pending.transition.id, &pending.url, pending.trigger);
        async move {
            let t = Arc::clone(&pending.transition);
            let same_url = pending
                .extras
                .on_same_url_navigation
                .unwrap_or(self.inner.options.on_same_url_navigation);

            let result = if !pending.is_url_transition && same_url == OnSameUrlNavigation::Ignore {
                self.skip(&pending);
                Ok(false)
            } else {
                let outcome = tokio::select! {
                    biased;
                    outcome = self.run(&pending) => outcome,
                    _ = t.token.cancelled() => Err(Abort::Superseded),
                };
                self.settle(&pending, outcome).await
            };

            let mut current = lock(&self.inner.current);
            if current.as_ref().is_some_and(|c| c.id == t.id) {
                *current = None;
            }
            result
        }
        .instrument(span)
        .boxed()
    }

    fn skip(&self, pending: &Pending) {
        let t = &pending.transition;
        let reason = format!("Navigation to {} was ignored because it is the same as the current Router URL.", pending.url);
        tracing::debug!(navigation_id = t.id, url = %pending.url, "Same-URL navigation skipped");
        self.emit(RouterEvent::NavigationSkipped {
            id: t.id,
            url: pending.url.clone(),
            reason,
            code: NavigationSkippedCode::IgnoredSameUrlNavigation,
        });
        t.settle(Phase::Cancelled);
        metrics::record_navigation_outcome("skipped", pending.started.elapsed());
    }

    async fn run(&self, pending: &Pending) -> Result<(), Abort> {
        let t = &pending.transition;
        let options = &self.inner.options;
        t.advance(Phase::Started);
        self.emit(RouterEvent::NavigationStart {
            id: t.id,
            url: pending.url.clone(),
            trigger: pending.trigger,
            restored_state: pending.restored_state.clone(),
        });

        let config = self.inner.config.load_full();
        let recognized = Recognizer::new(
            &config,
            &self.inner.loader,
            &*self.inner.serializer,
            options.params_inheritance_strategy,
            options.max_redirects,
            &t.token,
            pending.raw_url.clone(),
        )
        .recognize()
        .await?;

        let url_after_redirects = recognized.url_after_redirects;
        let after = self.serialize_url(&url_after_redirects);
        t.set_final_url(url_after_redirects.clone());
        t.advance(Phase::Recognized);
        if recognized.absolute_redirects > 0 {
            tracing::debug!(navigation_id = t.id, hops = recognized.absolute_redirects, to = %after, "Redirects converged");
        }
        if options.url_update_strategy == UrlUpdateStrategy::Eager && !pending.extras.skip_location_change {
            self.set_browser_url(&url_after_redirects, t.id, &pending.extras);
        }

        let mut future = Arc::new(recognized.state);
        self.emit(RouterEvent::RoutesRecognized {
            id: t.id,
            url: pending.url.clone(),
            url_after_redirects: after.clone(),
            state: Arc::clone(&future),
        });

        let curr = Arc::clone(self.inner.committed.load().state.snapshot());
        let checks = get_all_route_guards(future.tree(), curr.tree(), &self.inner.contexts);
        carry_over_data(&mut Arc::make_mut(&mut future).tree, curr.tree(), &checks.carried);

        self.emit(RouterEvent::GuardsCheckStart {
            id: t.id,
            url: pending.url.clone(),
            url_after_redirects: after.clone(),
            state: Arc::clone(&future),
        });
        let emit = |event: RouterEvent| self.emit(event);
        let guards_result = GuardPipeline {
            future: &future,
            curr: &curr,
            token: &t.token,
            emit: &emit,
        }
        .check_guards(&checks)
        .await?;

        let should_activate = match guards_result {
            GuardResult::Redirect(tree) => return Err(Abort::Redirect(tree)),
            result => result.is_allow(),
        };
        self.emit(RouterEvent::GuardsCheckEnd {
            id: t.id,
            url: pending.url.clone(),
            url_after_redirects: after.clone(),
            state: Arc::clone(&future),
            should_activate,
        });
        if !should_activate {
            return Err(Abort::GuardRejected(String::new()));
        }
        t.advance(Phase::GuardsChecked);

        if !checks.can_activate.is_empty() {
            self.emit(RouterEvent::ResolveStart {
                id: t.id,
                url: pending.url.clone(),
                url_after_redirects: after.clone(),
                state: Arc::clone(&future),
            });
            resolve_data(&mut future, &checks, options.params_inheritance_strategy, &t.token).await?;
            self.emit(RouterEvent::ResolveEnd {
                id: t.id,
                url: pending.url.clone(),
                url_after_redirects: after.clone(),
                state: Arc::clone(&future),
            });
        }
        t.advance(Phase::Resolved);

        self.load_components(&mut future).await?;
        t.advance(Phase::ComponentsLoaded);

        if t.token.is_cancelled() {
            return Err(Abort::Superseded);
        }
        self.commit(pending, url_after_redirects, future)?;

        self.emit(RouterEvent::NavigationEnd {
            id: t.id,
            url: pending.url.clone(),
            url_after_redirects: after,
        });
        Ok(())
    }

    /// Load every not-yet-loaded component in the future tree.
    async fn load_components(&self, state: &mut Arc<RouterStateSnapshot>) -> Result<(), LoadError> {
        let wanted: Vec<(NodeId, Arc<Route>)> = state
            .tree()
            .ids()
            .filter_map(|id| {
                let node = state.node(id);
                let route = node.route_config()?;
                (node.component.is_none() && route.has_load_component()).then(|| (id, Arc::clone(route)))
            })
            .collect();
        if wanted.is_empty() {
            return Ok(());
        }

        let loader = &self.inner.loader;
        let loaded = try_join_all(wanted.iter().map(|(_, route)| loader.load_component(route))).await?;
        let tree = &mut Arc::make_mut(state).tree;
        for ((id, _), component) in wanted.iter().zip(loaded) {
            tree.value_mut(*id).component = Some(component);
        }
        Ok(())
    }

    /// Make `future` the committed state. Only the latest transition gets through.
    fn commit(&self, pending: &Pending, url_after_redirects: UrlTree, future: Arc<RouterStateSnapshot>) -> Result<(), Abort> {
        let t = &pending.transition;
        let _commit = lock(&self.inner.commit_lock);
        if self.inner.latest_id.load(Ordering::SeqCst) != t.id || t.token.is_cancelled() {
            return Err(Abort::Superseded);
        }

        let previous = self.inner.committed.load_full();
        let target = Arc::new(create_router_state(&*self.inner.reuse, future, &previous.state));
        self.inner.committed.store(Arc::new(Committed {
            url_tree: url_after_redirects.clone(),
            state: Arc::clone(&target),
            navigation_id: t.id,
        }));
        if self.inner.options.url_update_strategy == UrlUpdateStrategy::Deferred && !pending.extras.skip_location_change {
            self.set_browser_url(&url_after_redirects, t.id, &pending.extras);
        }

        let mut emit = |event: RouterEvent| self.emit(event);
        ActivateRoutes::new(
            &*self.inner.reuse,
            &*self.inner.host,
            &self.inner.injector,
            &target,
            &previous.state,
            &mut emit,
        )
        .activate(&self.inner.contexts);

        self.inner.navigated.store(true, Ordering::SeqCst);
        t.advance(Phase::Activated);
        *lock(&self.inner.last_successful) = Some(t.navigation());
        tracing::info!(navigation_id = t.id, url = %self.serialize_url(&url_after_redirects), "Navigation committed");
        Ok(())
    }

    /// Emit the terminal event and decide what the caller gets.
    async fn settle(&self, pending: &Pending, outcome: Result<(), Abort>) -> NavigationResult<bool> {
        let t = &pending.transition;
        let elapsed = pending.started.elapsed();
        // A newer transition owns the router now: whatever this one ran into,
        // it may not redirect, report an error or touch history.
        let superseded = t.token.is_cancelled() || self.inner.latest_id.load(Ordering::SeqCst) != t.id;
        let outcome = match outcome {
            Err(abort) if superseded && !matches!(abort, Abort::Superseded) => {
                tracing::debug!(navigation_id = t.id, phase = %t.phase(), "Late outcome of a superseded navigation dropped");
                Err(Abort::Superseded)
            }
            other => other,
        };
        match outcome {
            Ok(()) => {
                metrics::record_navigation_outcome("committed", elapsed);
                Ok(true)
            }
            Err(Abort::Superseded) => {
                let reason = if let Some(cause) = self.inner.shutdown.cause() {
                    format!("Navigation was cancelled because the router shut down ({cause})")
                } else {
                    format!(
                        "Navigation ID {} is not equal to the current navigation id {}",
                        t.id,
                        self.inner.latest_id.load(Ordering::SeqCst)
                    )
                };
                self.cancel(pending, reason, NavigationCancellationCode::SupersededByNewNavigation);
                Ok(false)
            }
            Err(Abort::GuardRejected(reason)) => {
                self.cancel(pending, reason, NavigationCancellationCode::GuardRejected);
                self.restore_history();
                Ok(false)
            }
            Err(Abort::Redirect(tree)) => {
                let target = self.serialize_url(&tree);
                self.emit(RouterEvent::NavigationCancel {
                    id: t.id,
                    url: pending.url.clone(),
                    reason: format!("Redirecting to \"{target}\""),
                    code: NavigationCancellationCode::Redirect,
                });
                t.settle(Phase::Redirecting);
                metrics::record_navigation_outcome("cancelled", elapsed);
                tracing::info!(navigation_id = t.id, to = %target, "Navigation redirected by a guard");

                let extras = NavigationBehaviorOptions {
                    skip_location_change: pending.extras.skip_location_change,
                    replace_url: self.inner.options.url_update_strategy == UrlUpdateStrategy::Eager
                        || pending.trigger == NavigationTrigger::Popstate,
                    ..NavigationBehaviorOptions::default()
                };
                self.follow_up(tree, extras).await
            }
            Err(Abort::Failed(error)) => {
                self.emit(RouterEvent::NavigationError {
                    id: t.id,
                    url: pending.url.clone(),
                    error: error.clone(),
                });
                t.settle(Phase::Errored);
                metrics::record_navigation_outcome("errored", elapsed);
                tracing::warn!(navigation_id = t.id, url = %pending.url, error = %error, "Navigation failed");
                self.restore_history();

                match (self.inner.error_handler)(&error) {
                    ErrorHandlerOutcome::Propagate => Err(error),
                    ErrorHandlerOutcome::ResolveFalse => Ok(false),
                    ErrorHandlerOutcome::Redirect(tree) => {
                        let extras = NavigationBehaviorOptions {
                            skip_location_change: pending.extras.skip_location_change,
                            replace_url: self.inner.options.url_update_strategy == UrlUpdateStrategy::Eager,
                            ..NavigationBehaviorOptions::default()
                        };
                        self.follow_up(tree, extras).await
                    }
                }
            }
        }
    }

    async fn follow_up(&self, tree: UrlTree, extras: NavigationBehaviorOptions) -> NavigationResult<bool> {
        let next = self.begin(tree, NavigationTrigger::Imperative, None, extras)?;
        self.drive(next).await
    }

    fn cancel(&self, pending: &Pending, reason: String, code: NavigationCancellationCode) {
        let t = &pending.transition;
        tracing::info!(navigation_id = t.id, url = %pending.url, code = ?code, "Navigation cancelled");
        self.emit(RouterEvent::NavigationCancel {
            id: t.id,
            url: pending.url.clone(),
            reason,
            code,
        });
        t.settle(Phase::Cancelled);
        metrics::record_navigation_outcome("cancelled", pending.started.elapsed());
    }

    fn set_browser_url(&self, url: &UrlTree, id: u64, extras: &NavigationBehaviorOptions) {
        let path = self.serialize_url(url);
        let state = HistoryState {
            navigation_id: id,
            extra: extras.state.clone(),
        };
        if extras.replace_url || self.inner.location.path() == path {
            self.inner.location.replace_state(&path, state);
        } else {
            self.inner.location.push_state(&path, state);
        }
    }

    /// Put the committed URL back into the location after a failed or rejected navigation.
    fn restore_history(&self) {
        if self.inner.options.canceled_navigation_resolution != CanceledNavigationResolution::Replace {
            return;
        }
        let committed = self.inner.committed.load();
        let path = self.serialize_url(&committed.url_tree);
        if self.inner.location.path() != path {
            tracing::debug!(url = %path, "Restoring location to the committed URL");
            self.inner.location.replace_state(
                &path,
                HistoryState {
                    navigation_id: committed.navigation_id,
                    extra: None,
                },
            );
        }
    }
}
