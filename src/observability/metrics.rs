//! Metrics definitions and recording helpers.
//!
//! # Metrics
//! - `navigation_started_total{trigger}`: navigations scheduled
//! - `navigation_finished_total{outcome}`: end, cancel, error or skipped
//! - `navigation_duration_seconds{outcome}`: start to terminal event
//! - `guard_evaluations_total{kind, result}`: every guard run
//! - `lazy_load_total{kind, outcome}` and `lazy_load_duration_seconds{kind}`
//!
//! The crate never installs a recorder, so these are free until a binary does.

use std::time::Duration;

use metrics::{counter, histogram};

use crate::guards::GuardResult;
use crate::navigation::events::NavigationTrigger;

pub fn record_navigation_started(trigger: NavigationTrigger) {
    let trigger = match trigger {
        NavigationTrigger::Imperative => "imperative",
        NavigationTrigger::Popstate => "popstate",
    };
    counter!("navigation_started_total", "trigger" => trigger).increment(1);
}

/// Record a terminal navigation event.
pub fn record_navigation_outcome(outcome: &'static str, elapsed: Duration) {
    counter!("navigation_finished_total", "outcome" => outcome).increment(1);
    histogram!("navigation_duration_seconds", "outcome" => outcome).record(elapsed.as_secs_f64());
}

pub fn record_guard(kind: &'static str, result: &GuardResult) {
    let result = match result {
        GuardResult::Allow => "allow",
        GuardResult::Deny => "deny",
        GuardResult::Redirect(_) => "redirect",
    };
    counter!("guard_evaluations_total", "kind" => kind, "result" => result).increment(1);
}

pub fn record_lazy_load(kind: &'static str, outcome: &'static str, elapsed: Duration) {
    counter!("lazy_load_total", "kind" => kind, "outcome" => outcome).increment(1);
    histogram!("lazy_load_duration_seconds", "kind" => kind).record(elapsed.as_secs_f64());
}
