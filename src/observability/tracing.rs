//! Spans for navigations.
//!
//! Every navigation runs inside a span named `navigation` so that the
//! recognizer, guard and activation logs can be correlated by id.

use tracing::Span;

use crate::navigation::events::NavigationTrigger;

/// Span covering one navigation from start to its terminal event.
pub fn navigation_span(id: u64, url: &str, trigger: NavigationTrigger) -> Span {
    tracing::info_span!("navigation", id, url = %url, trigger = ?trigger)
}

/// Span for a single lazy configuration or component load.
pub fn load_span(kind: &'static str, path: &str) -> Span {
    tracing::debug_span!("lazy_load", kind, path = %path)
}
