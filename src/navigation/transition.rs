//! Transition bookkeeping.
//!
//! # Responsibilities
//! - Name the phases one navigation moves through
//! - Describe the in-flight navigation to callers (`Router::current_navigation`)
//! - Hold the per-transition cancellation token and phase, shared with the orchestrator
//!
//! # Design Decisions
//! - A transition's phase only moves forward; terminal phases are `Activated`, `Redirecting`, `Cancelled`, `Errored`
//! - `Navigation` is a plain value copied out for callers; the live record stays private

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

use crate::navigation::events::NavigationTrigger;
use crate::navigation::extras::NavigationBehaviorOptions;
use crate::navigation::location::HistoryState;
use crate::url::UrlTree;

/// Where a transition is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Created,
    Started,
    Recognized,
    GuardsChecked,
    Resolved,
    ComponentsLoaded,
    Activated,
    /// A guard asked for another URL. The transition ends here and a follow-up
    /// navigation with a fresh id starts from `Created`; `redirect_to` hops are
    /// resolved inside recognition and never reach this phase.
    Redirecting,
    Cancelled,
    Errored,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Activated | Phase::Cancelled | Phase::Errored | Phase::Redirecting)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A snapshot of one navigation, as reported to callers.
#[derive(Debug, Clone)]
pub struct Navigation {
    pub id: u64,
    pub trigger: NavigationTrigger,
    /// The tree as requested, before redirects.
    pub extracted_url: UrlTree,
    /// The tree after redirects, once recognized.
    pub final_url: Option<UrlTree>,
    pub phase: Phase,
    pub extras: NavigationBehaviorOptions,
    pub restored_state: Option<HistoryState>,
    /// The navigation that was in flight (or last settled) when this one started.
    pub previous_navigation: Option<Box<Navigation>>,
}

/// The live record of one transition.
pub(crate) struct Transition {
    pub id: u64,
    pub token: CancellationToken,
    info: Mutex<Navigation>,
}

impl Transition {
    pub fn new(info: Navigation, token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            id: info.id,
            token,
            info: Mutex::new(info),
        })
    }

    fn info(&self) -> MutexGuard<'_, Navigation> {
        self.info.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn navigation(&self) -> Navigation {
        self.info().clone()
    }

    pub fn phase(&self) -> Phase {
        self.info().phase
    }

    /// Move to `next`; moving backwards or out of a terminal phase is ignored.
    pub fn advance(&self, next: Phase) {
        let mut info = self.info();
        if info.phase.is_terminal() || next <= info.phase {
            return;
        }
        tracing::debug!(navigation_id = self.id, from = %info.phase, to = %next, "Transition phase");
        info.phase = next;
    }

    /// Terminal phases may always be entered from a non-terminal one.
    pub fn settle(&self, terminal: Phase) {
        let mut info = self.info();
        if info.phase.is_terminal() {
            return;
        }
        tracing::debug!(navigation_id = self.id, from = %info.phase, to = %terminal, "Transition settled");
        info.phase = terminal;
    }

    pub fn set_final_url(&self, url: UrlTree) {
        self.info().final_url = Some(url);
    }

    pub fn extracted_url(&self) -> UrlTree {
        self.info().extracted_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition() -> Arc<Transition> {
        Transition::new(
            Navigation {
                id: 1,
                trigger: NavigationTrigger::Imperative,
                extracted_url: UrlTree::empty(),
                final_url: None,
                phase: Phase::Created,
                extras: NavigationBehaviorOptions::default(),
                restored_state: None,
                previous_navigation: None,
            },
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_phases_only_move_forward() {
        let t = transition();
        t.advance(Phase::Started);
        t.advance(Phase::GuardsChecked);
        t.advance(Phase::Recognized);
        assert_eq!(t.phase(), Phase::GuardsChecked);
    }

    #[test]
    fn test_terminal_phase_is_final() {
        let t = transition();
        t.advance(Phase::Started);
        t.settle(Phase::Cancelled);
        t.advance(Phase::Activated);
        t.settle(Phase::Errored);
        assert_eq!(t.phase(), Phase::Cancelled);
    }

    #[test]
    fn test_redirecting_ends_the_transition() {
        let t = transition();
        t.advance(Phase::GuardsChecked);
        t.settle(Phase::Redirecting);
        t.advance(Phase::Resolved);
        assert_eq!(t.phase(), Phase::Redirecting);
        assert!(Phase::Redirecting > Phase::Activated);
        assert!(Phase::Redirecting.is_terminal());
    }
}
