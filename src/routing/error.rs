//! Recognition failures.

use thiserror::Error;

use crate::guards::types::GuardError;
use crate::routing::loader::LoadError;
use crate::url::UrlTree;

/// Why recognition (matching plus redirects) did not produce a state.
#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    /// No route consumed a segment group that had to be consumed.
    #[error("cannot match any routes. URL segment: '{0}'")]
    NoMatch(String),

    /// Absolute redirects kept producing further redirects.
    #[error("detected a redirect loop: more than {0} absolute redirects")]
    RedirectLoop(usize),

    #[error("invalid redirect: {0}")]
    InvalidRedirect(String),

    #[error("two segments cannot have the same outlet name: '{0}' and '{1}'")]
    DuplicateOutlet(String, String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    /// A `can_load` guard said no.
    #[error("lazy loading of route '{0}' was rejected by a guard")]
    LoadRejected(String),

    /// A `can_match` or `can_load` guard asked for another URL.
    #[error("guard redirected to {0}")]
    GuardRedirect(UrlTree),

    /// The transition was superseded while matching.
    #[error("navigation was superseded")]
    Superseded,
}

pub type RoutingResult<T> = Result<T, RoutingError>;
