//! Navigation failures and the handlers that decide how they settle.

use std::sync::Arc;

use thiserror::Error;

use crate::guards::types::{GuardError, ResolverError};
use crate::routing::error::RoutingError;
use crate::routing::loader::LoadError;
use crate::url::{CommandError, MalformedUrlError, UrlTree};

/// Why a navigation errored (as opposed to being cancelled).
#[derive(Debug, Clone, Error)]
pub enum NavigationError {
    #[error(transparent)]
    MalformedUrl(#[from] MalformedUrlError),

    #[error(transparent)]
    Commands(#[from] CommandError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("router has been disposed")]
    Disposed,
}

pub type NavigationResult<T> = Result<T, NavigationError>;

/// What the error handler wants done with a failed navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorHandlerOutcome {
    /// Settle the navigation with the error.
    Propagate,
    /// Settle the navigation with `Ok(false)`.
    ResolveFalse,
    /// Navigate to the tree instead; the original navigation settles with that outcome.
    Redirect(UrlTree),
}

/// Decides how a navigation error settles.
pub type NavigationErrorHandler = Arc<dyn Fn(&NavigationError) -> ErrorHandlerOutcome + Send + Sync>;

/// Substitutes a tree for a URL that does not parse.
pub type MalformedUrlHandler = Arc<dyn Fn(&MalformedUrlError, &str) -> UrlTree + Send + Sync>;

pub(crate) fn default_error_handler() -> NavigationErrorHandler {
    Arc::new(|_| ErrorHandlerOutcome::Propagate)
}

pub(crate) fn default_malformed_url_handler() -> MalformedUrlHandler {
    Arc::new(|error, _| {
        tracing::warn!(error = %error, "Malformed URL, falling back to root");
        UrlTree::empty()
    })
}
