//! Lazy route-table and component loading.
//!
//! # Responsibilities
//! - Load a route's children or component the first time recognition needs them
//! - Share one in-flight load between concurrent navigations
//! - Validate a loaded table before any navigation can match against it
//!
//! # Design Decisions
//! - Completed results are stored on the `Route` itself, so they live exactly as long as the node
//! - In-flight loads are `Shared` futures in a `DashMap` keyed by `RouteId`, removed once settled
//! - A failed load is not cached; the next navigation tries again

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use thiserror::Error;

use crate::config::validation::validate_routes;
use crate::guards::injector::Injector;
use crate::observability::metrics;
use crate::routing::route::{ComponentRef, Route, RouteId};

/// A lazy load failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("failed to load module: {0}")]
    Failed(String),

    #[error("loaded route table is invalid: {0}")]
    InvalidConfig(String),

    #[error("route '{0}' has nothing to load")]
    NothingToLoad(String),
}

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        LoadError::Failed(message.into())
    }
}

/// What a `load_children` function produces.
pub struct RouteModule {
    pub routes: Vec<Route>,
    pub injector: Option<Arc<Injector>>,
}

impl RouteModule {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes, injector: None }
    }

    /// Provide a scope for the loaded subtree.
    pub fn with_injector(mut self, injector: Arc<Injector>) -> Self {
        self.injector = Some(injector);
        self
    }
}

/// A loaded child table, cached on its parent route.
#[derive(Debug, Clone)]
pub struct LoadedRouterConfig {
    pub routes: Vec<Arc<Route>>,
    pub injector: Option<Arc<Injector>>,
}

type InFlight<T> = Shared<BoxFuture<'static, Result<T, LoadError>>>;

/// Deduplicating loader shared by all transitions of one router.
#[derive(Default)]
pub struct RouterConfigLoader {
    children: DashMap<RouteId, InFlight<LoadedRouterConfig>>,
    components: DashMap<RouteId, InFlight<ComponentRef>>,
}

impl RouterConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of loads currently pending.
    pub fn in_flight(&self) -> usize {
        self.children.len() + self.components.len()
    }

    /// Children of `route`, loading them if needed.
    pub async fn load_children(&self, route: &Arc<Route>) -> Result<LoadedRouterConfig, LoadError> {
        if let Some(loaded) = route.loaded.get() {
            return Ok(loaded.clone());
        }
        let load = route
            .load_children
            .clone()
            .ok_or_else(|| LoadError::NothingToLoad(route.display_path().to_string()))?;

        let pending = self
            .children
            .entry(route.id)
            .or_insert_with(|| {
                let route = Arc::clone(route);
                async move {
                    let started = Instant::now();
                    tracing::debug!(route = %route.id, path = route.display_path(), "Loading child routes");

                    let result = load().await.and_then(|module| {
                        let routes: Vec<Arc<Route>> = module.routes.into_iter().map(Arc::new).collect();
                        validate_routes(&routes, route.display_path()).map_err(|errors| {
                            LoadError::InvalidConfig(
                                errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "),
                            )
                        })?;
                        Ok(LoadedRouterConfig {
                            routes,
                            injector: module.injector,
                        })
                    });

                    match &result {
                        Ok(config) => {
                            let _ = route.loaded.set(config.clone());
                            metrics::record_lazy_load("children", "ok", started.elapsed());
                            tracing::info!(route = %route.id, children = config.routes.len(), "Child routes loaded");
                        }
                        Err(e) => {
                            metrics::record_lazy_load("children", "error", started.elapsed());
                            tracing::warn!(route = %route.id, error = %e, "Child route load failed");
                        }
                    }
                    result
                }
                .boxed()
                .shared()
            })
            .value()
            .clone();

        let result = pending.await;
        self.children.remove(&route.id);
        result
    }

    /// Component of `route`, loading it if needed.
    pub async fn load_component(&self, route: &Arc<Route>) -> Result<ComponentRef, LoadError> {
        if let Some(component) = route.resolved_component() {
            return Ok(component);
        }
        let load = route
            .load_component
            .clone()
            .ok_or_else(|| LoadError::NothingToLoad(route.display_path().to_string()))?;

        let pending = self
            .components
            .entry(route.id)
            .or_insert_with(|| {
                let route = Arc::clone(route);
                async move {
                    let started = Instant::now();
                    let result = load().await;
                    match &result {
                        Ok(component) => {
                            let _ = route.loaded_component.set(component.clone());
                            metrics::record_lazy_load("component", "ok", started.elapsed());
                            tracing::debug!(route = %route.id, component = %component, "Component loaded");
                        }
                        Err(e) => {
                            metrics::record_lazy_load("component", "error", started.elapsed());
                            tracing::warn!(route = %route.id, error = %e, "Component load failed");
                        }
                    }
                    result
                }
                .boxed()
                .shared()
            })
            .value()
            .clone();

        let result = pending.await;
        self.components.remove(&route.id);
        result
    }
}
