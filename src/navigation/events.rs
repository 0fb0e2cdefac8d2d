//! Navigation lifecycle events.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::navigation::error::NavigationError;
use crate::navigation::location::HistoryState;
use crate::state::snapshot::{ActivatedRouteSnapshot, RouterStateSnapshot};

/// What started a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationTrigger {
    Imperative,
    Popstate,
}

/// Why a navigation was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationCancellationCode {
    /// A guard asked for another URL.
    Redirect,
    SupersededByNewNavigation,
    GuardRejected,
}

/// Why a navigation was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationSkippedCode {
    IgnoredSameUrlNavigation,
}

/// One event on the router's event stream, in emission order.
#[derive(Debug, Clone)]
pub enum RouterEvent {
    NavigationStart {
        id: u64,
        url: String,
        trigger: NavigationTrigger,
        restored_state: Option<HistoryState>,
    },
    RoutesRecognized {
        id: u64,
        url: String,
        url_after_redirects: String,
        state: Arc<RouterStateSnapshot>,
    },
    GuardsCheckStart {
        id: u64,
        url: String,
        url_after_redirects: String,
        state: Arc<RouterStateSnapshot>,
    },
    ChildActivationStart {
        snapshot: Arc<ActivatedRouteSnapshot>,
    },
    ActivationStart {
        snapshot: Arc<ActivatedRouteSnapshot>,
    },
    GuardsCheckEnd {
        id: u64,
        url: String,
        url_after_redirects: String,
        state: Arc<RouterStateSnapshot>,
        should_activate: bool,
    },
    ResolveStart {
        id: u64,
        url: String,
        url_after_redirects: String,
        state: Arc<RouterStateSnapshot>,
    },
    ResolveEnd {
        id: u64,
        url: String,
        url_after_redirects: String,
        state: Arc<RouterStateSnapshot>,
    },
    ActivationEnd {
        snapshot: Arc<ActivatedRouteSnapshot>,
    },
    ChildActivationEnd {
        snapshot: Arc<ActivatedRouteSnapshot>,
    },
    NavigationEnd {
        id: u64,
        url: String,
        url_after_redirects: String,
    },
    NavigationCancel {
        id: u64,
        url: String,
        reason: String,
        code: NavigationCancellationCode,
    },
    NavigationError {
        id: u64,
        url: String,
        error: NavigationError,
    },
    NavigationSkipped {
        id: u64,
        url: String,
        reason: String,
        code: NavigationSkippedCode,
    },
}

impl RouterEvent {
    /// Navigation id, for the events that carry one.
    pub fn id(&self) -> Option<u64> {
        match self {
            RouterEvent::NavigationStart { id, .. }
            | RouterEvent::RoutesRecognized { id, .. }
            | RouterEvent::GuardsCheckStart { id, .. }
            | RouterEvent::GuardsCheckEnd { id, .. }
            | RouterEvent::ResolveStart { id, .. }
            | RouterEvent::ResolveEnd { id, .. }
            | RouterEvent::NavigationEnd { id, .. }
            | RouterEvent::NavigationCancel { id, .. }
            | RouterEvent::NavigationError { id, .. }
            | RouterEvent::NavigationSkipped { id, .. } => Some(*id),
            RouterEvent::ChildActivationStart { .. }
            | RouterEvent::ActivationStart { .. }
            | RouterEvent::ActivationEnd { .. }
            | RouterEvent::ChildActivationEnd { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RouterEvent::NavigationStart { .. } => "NavigationStart",
            RouterEvent::RoutesRecognized { .. } => "RoutesRecognized",
            RouterEvent::GuardsCheckStart { .. } => "GuardsCheckStart",
            RouterEvent::ChildActivationStart { .. } => "ChildActivationStart",
            RouterEvent::ActivationStart { .. } => "ActivationStart",
            RouterEvent::GuardsCheckEnd { .. } => "GuardsCheckEnd",
            RouterEvent::ResolveStart { .. } => "ResolveStart",
            RouterEvent::ResolveEnd { .. } => "ResolveEnd",
            RouterEvent::ActivationEnd { .. } => "ActivationEnd",
            RouterEvent::ChildActivationEnd { .. } => "ChildActivationEnd",
            RouterEvent::NavigationEnd { .. } => "NavigationEnd",
            RouterEvent::NavigationCancel { .. } => "NavigationCancel",
            RouterEvent::NavigationError { .. } => "NavigationError",
            RouterEvent::NavigationSkipped { .. } => "NavigationSkipped",
        }
    }

    /// Ends a navigation (successfully or not).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RouterEvent::NavigationEnd { .. }
                | RouterEvent::NavigationCancel { .. }
                | RouterEvent::NavigationError { .. }
                | RouterEvent::NavigationSkipped { .. }
        )
    }

    /// Flat JSON form, as printed by the CLI.
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({ "type": self.kind() });
        let fields = match self {
            RouterEvent::NavigationStart {
                id,
                url,
                trigger,
                restored_state,
            } => serde_json::json!({ "id": id, "url": url, "trigger": trigger, "restored_state": restored_state }),
            RouterEvent::RoutesRecognized {
                id,
                url,
                url_after_redirects,
                ..
            }
            | RouterEvent::GuardsCheckStart {
                id,
                url,
                url_after_redirects,
                ..
            }
            | RouterEvent::ResolveStart {
                id,
                url,
                url_after_redirects,
                ..
            }
            | RouterEvent::ResolveEnd {
                id,
                url,
                url_after_redirects,
                ..
            }
            | RouterEvent::NavigationEnd {
                id,
                url,
                url_after_redirects,
            } => serde_json::json!({ "id": id, "url": url, "url_after_redirects": url_after_redirects }),
            RouterEvent::GuardsCheckEnd {
                id,
                url,
                url_after_redirects,
                should_activate,
                ..
            } => serde_json::json!({
                "id": id,
                "url": url,
                "url_after_redirects": url_after_redirects,
                "should_activate": should_activate,
            }),
            RouterEvent::ChildActivationStart { snapshot }
            | RouterEvent::ActivationStart { snapshot }
            | RouterEvent::ActivationEnd { snapshot }
            | RouterEvent::ChildActivationEnd { snapshot } => serde_json::json!({
                "path": snapshot.route_config().and_then(|r| r.path()).unwrap_or(""),
                "outlet": snapshot.outlet,
            }),
            RouterEvent::NavigationCancel { id, url, reason, code } => {
                serde_json::json!({ "id": id, "url": url, "reason": reason, "code": code })
            }
            RouterEvent::NavigationError { id, url, error } => {
                serde_json::json!({ "id": id, "url": url, "error": error.to_string() })
            }
            RouterEvent::NavigationSkipped { id, url, reason, code } => {
                serde_json::json!({ "id": id, "url": url, "reason": reason, "code": code })
            }
        };
        if let (Some(target), serde_json::Value::Object(extra)) = (value.as_object_mut(), fields) {
            target.extend(extra);
        }
        value
    }
}

impl fmt::Display for RouterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterEvent::NavigationStart { id, url, .. } => write!(f, "NavigationStart(id: {id}, url: '{url}')"),
            RouterEvent::RoutesRecognized {
                id,
                url,
                url_after_redirects,
                ..
            } => write!(
                f,
                "RoutesRecognized(id: {id}, url: '{url}', urlAfterRedirects: '{url_after_redirects}')"
            ),
            RouterEvent::GuardsCheckEnd {
                id,
                url,
                should_activate,
                ..
            } => write!(f, "GuardsCheckEnd(id: {id}, url: '{url}', shouldActivate: {should_activate})"),
            RouterEvent::NavigationEnd {
                id,
                url,
                url_after_redirects,
            } => write!(
                f,
                "NavigationEnd(id: {id}, url: '{url}', urlAfterRedirects: '{url_after_redirects}')"
            ),
            RouterEvent::NavigationCancel { id, url, .. } => write!(f, "NavigationCancel(id: {id}, url: '{url}')"),
            RouterEvent::NavigationError { id, url, error } => {
                write!(f, "NavigationError(id: {id}, url: '{url}', error: {error})")
            }
            RouterEvent::NavigationSkipped { id, url, .. } => write!(f, "NavigationSkipped(id: {id}, url: '{url}')"),
            other => match other.id() {
                Some(id) => write!(f, "{}(id: {id})", other.kind()),
                None => write!(f, "{}", other.kind()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let event = RouterEvent::NavigationCancel {
            id: 3,
            url: "/x".into(),
            reason: "superseded".into(),
            code: NavigationCancellationCode::SupersededByNewNavigation,
        };
        let json = event.to_json();
        assert_eq!(json["type"], "NavigationCancel");
        assert_eq!(json["code"], "superseded_by_new_navigation");
        assert_eq!(event.id(), Some(3));
        assert!(event.is_terminal());
    }

    #[test]
    fn test_display() {
        let event = RouterEvent::NavigationStart {
            id: 1,
            url: "/a".into(),
            trigger: NavigationTrigger::Imperative,
            restored_state: None,
        };
        assert_eq!(event.to_string(), "NavigationStart(id: 1, url: '/a')");
    }
}
