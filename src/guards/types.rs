//! Guard and resolver capabilities.
//!
//! # Responsibilities
//! - Define the guard outcome (`Allow`, `Deny`, `Redirect`)
//! - Define the service traits an application implements
//! - Wrap function and service shapes in one tagged value per guard kind
//!
//! # Design Decisions
//! - The function-or-service choice is made when the guard is registered; `check` only matches
//! - Function guards return `'static` futures, so they copy what they need from the snapshot
//! - `can_activate_child` reuses the `can_activate` shape, `can_load` reuses `can_match`

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::activation::host::ComponentHandle;
use crate::routing::route::Route;
use crate::state::snapshot::{ActivatedRouteSnapshot, RouterStateSnapshot};
use crate::url::{UrlSegment, UrlTree};

/// What a guard decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardResult {
    Allow,
    Deny,
    /// Abort this navigation and start a new one to the tree.
    Redirect(UrlTree),
}

impl GuardResult {
    pub fn is_allow(&self) -> bool {
        matches!(self, GuardResult::Allow)
    }
}

impl From<bool> for GuardResult {
    fn from(value: bool) -> Self {
        if value {
            GuardResult::Allow
        } else {
            GuardResult::Deny
        }
    }
}

impl From<UrlTree> for GuardResult {
    fn from(value: UrlTree) -> Self {
        GuardResult::Redirect(value)
    }
}

/// A guard failed instead of deciding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("guard failed: {message}")]
pub struct GuardError {
    pub message: String,
}

impl GuardError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A resolver failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("resolver '{}' failed: {}", .key.as_deref().unwrap_or("<unknown>"), .message)]
pub struct ResolverError {
    pub key: Option<String>,
    pub message: String,
}

impl ResolverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            key: None,
            message: message.into(),
        }
    }

    pub(crate) fn with_key(mut self, key: &str) -> Self {
        self.key.get_or_insert_with(|| key.to_string());
        self
    }
}

pub type GuardFuture = BoxFuture<'static, Result<GuardResult, GuardError>>;
pub type ResolveFuture = BoxFuture<'static, Result<serde_json::Value, ResolverError>>;

/// Gate entering a route (and, registered as `can_activate_child`, its children).
#[async_trait]
pub trait CanActivate: Send + Sync {
    async fn can_activate(&self, route: &ActivatedRouteSnapshot, state: &RouterStateSnapshot) -> Result<GuardResult, GuardError>;
}

/// Gate leaving a route.
#[async_trait]
pub trait CanDeactivate: Send + Sync {
    async fn can_deactivate(
        &self,
        component: Option<&ComponentHandle>,
        current_route: &ActivatedRouteSnapshot,
        current_state: &RouterStateSnapshot,
        next_state: &RouterStateSnapshot,
    ) -> Result<GuardResult, GuardError>;
}

/// Gate matching (and, registered as `can_load`, lazily loading) a route.
#[async_trait]
pub trait CanMatch: Send + Sync {
    async fn can_match(&self, route: &Route, segments: &[UrlSegment]) -> Result<GuardResult, GuardError>;
}

/// Produce one data value for a route before activation.
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, route: &ActivatedRouteSnapshot, state: &RouterStateSnapshot) -> Result<serde_json::Value, ResolverError>;
}

pub type CanActivateFn = dyn Fn(&ActivatedRouteSnapshot, &RouterStateSnapshot) -> GuardFuture + Send + Sync;
pub type CanDeactivateFn = dyn Fn(Option<&ComponentHandle>, &ActivatedRouteSnapshot, &RouterStateSnapshot, &RouterStateSnapshot) -> GuardFuture
    + Send
    + Sync;
pub type CanMatchFn = dyn Fn(&Route, &[UrlSegment]) -> GuardFuture + Send + Sync;
pub type ResolveFn = dyn Fn(&ActivatedRouteSnapshot, &RouterStateSnapshot) -> ResolveFuture + Send + Sync;

#[derive(Clone)]
pub enum CanActivateGuard {
    Function(Arc<CanActivateFn>),
    Service(Arc<dyn CanActivate>),
}

impl CanActivateGuard {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&ActivatedRouteSnapshot, &RouterStateSnapshot) -> GuardFuture + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    /// A guard that decides synchronously.
    pub fn from_sync<F, R>(f: F) -> Self
    where
        F: Fn(&ActivatedRouteSnapshot, &RouterStateSnapshot) -> R + Send + Sync + 'static,
        R: Into<GuardResult>,
    {
        Self::from_fn(move |route, state| {
            let result = f(route, state).into();
            Box::pin(async move { Ok(result) })
        })
    }

    pub fn service(service: impl CanActivate + 'static) -> Self {
        Self::Service(Arc::new(service))
    }

    pub(crate) async fn check(&self, route: &ActivatedRouteSnapshot, state: &RouterStateSnapshot) -> Result<GuardResult, GuardError> {
        match self {
            Self::Function(f) => f(route, state).await,
            Self::Service(s) => s.can_activate(route, state).await,
        }
    }
}

#[derive(Clone)]
pub enum CanDeactivateGuard {
    Function(Arc<CanDeactivateFn>),
    Service(Arc<dyn CanDeactivate>),
}

impl CanDeactivateGuard {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Option<&ComponentHandle>, &ActivatedRouteSnapshot, &RouterStateSnapshot, &RouterStateSnapshot) -> GuardFuture
            + Send
            + Sync
            + 'static,
    {
        Self::Function(Arc::new(f))
    }

    pub fn from_sync<F, R>(f: F) -> Self
    where
        F: Fn(Option<&ComponentHandle>, &ActivatedRouteSnapshot) -> R + Send + Sync + 'static,
        R: Into<GuardResult>,
    {
        Self::from_fn(move |component, route, _, _| {
            let result = f(component, route).into();
            Box::pin(async move { Ok(result) })
        })
    }

    pub fn service(service: impl CanDeactivate + 'static) -> Self {
        Self::Service(Arc::new(service))
    }

    pub(crate) async fn check(
        &self,
        component: Option<&ComponentHandle>,
        route: &ActivatedRouteSnapshot,
        current: &RouterStateSnapshot,
        next: &RouterStateSnapshot,
    ) -> Result<GuardResult, GuardError> {
        match self {
            Self::Function(f) => f(component, route, current, next).await,
            Self::Service(s) => s.can_deactivate(component, route, current, next).await,
        }
    }
}

#[derive(Clone)]
pub enum CanMatchGuard {
    Function(Arc<CanMatchFn>),
    Service(Arc<dyn CanMatch>),
}

impl CanMatchGuard {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Route, &[UrlSegment]) -> GuardFuture + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    pub fn from_sync<F, R>(f: F) -> Self
    where
        F: Fn(&Route, &[UrlSegment]) -> R + Send + Sync + 'static,
        R: Into<GuardResult>,
    {
        Self::from_fn(move |route, segments| {
            let result = f(route, segments).into();
            Box::pin(async move { Ok(result) })
        })
    }

    pub fn service(service: impl CanMatch + 'static) -> Self {
        Self::Service(Arc::new(service))
    }

    pub(crate) async fn check(&self, route: &Route, segments: &[UrlSegment]) -> Result<GuardResult, GuardError> {
        match self {
            Self::Function(f) => f(route, segments).await,
            Self::Service(s) => s.can_match(route, segments).await,
        }
    }
}

#[derive(Clone)]
pub enum Resolver {
    Function(Arc<ResolveFn>),
    Service(Arc<dyn Resolve>),
}

impl Resolver {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&ActivatedRouteSnapshot, &RouterStateSnapshot) -> ResolveFuture + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    /// A resolver producing its value synchronously.
    pub fn value<F>(f: F) -> Self
    where
        F: Fn(&ActivatedRouteSnapshot) -> serde_json::Value + Send + Sync + 'static,
    {
        Self::from_fn(move |route, _| {
            let value = f(route);
            Box::pin(async move { Ok(value) })
        })
    }

    pub fn service(service: impl Resolve + 'static) -> Self {
        Self::Service(Arc::new(service))
    }

    pub(crate) async fn resolve(&self, route: &ActivatedRouteSnapshot, state: &RouterStateSnapshot) -> Result<serde_json::Value, ResolverError> {
        match self {
            Self::Function(f) => f(route, state).await,
            Self::Service(s) => s.resolve(route, state).await,
        }
    }
}

macro_rules! shape_debug {
    ($($ty:ident),*) => {
        $(impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    Self::Function(_) => write!(f, concat!(stringify!($ty), "::Function")),
                    Self::Service(_) => write!(f, concat!(stringify!($ty), "::Service")),
                }
            }
        })*
    };
}

shape_debug!(CanActivateGuard, CanDeactivateGuard, CanMatchGuard, Resolver);

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysDeny;

    #[async_trait]
    impl CanMatch for AlwaysDeny {
        async fn can_match(&self, _route: &Route, _segments: &[UrlSegment]) -> Result<GuardResult, GuardError> {
            Ok(GuardResult::Deny)
        }
    }

    #[tokio::test]
    async fn test_function_and_service_shapes() {
        let route = Route::new("a");
        let allow = CanMatchGuard::from_sync(|_, _| true);
        let deny = CanMatchGuard::service(AlwaysDeny);

        assert_eq!(allow.check(&route, &[]).await, Ok(GuardResult::Allow));
        assert_eq!(deny.check(&route, &[]).await, Ok(GuardResult::Deny));
        assert_eq!(format!("{:?}", deny), "CanMatchGuard::Service");
    }

    #[test]
    fn test_resolver_error_display() {
        let err = ResolverError::new("boom").with_key("user");
        assert_eq!(err.to_string(), "resolver 'user' failed: boom");
    }
}
