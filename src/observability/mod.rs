//! Logs, metrics and spans emitted while navigating.
//!
//! # Data Flow
//! ```text
//! router / recognizer / loader / guard pipeline
//!     ├─▶ tracing events ─▶ logging.rs subscriber (pretty or JSON, on stderr)
//!     ├─▶ metrics.rs     ─▶ counters and histograms via the `metrics` facade
//!     └─▶ tracing.rs     ─▶ `navigation` span {id, url, trigger}
//! ```
//!
//! # Design Decisions
//! - Only binaries install a subscriber or a metrics recorder
//! - With no recorder installed the metric macros do nothing
//! - Log lines inside a navigation inherit its id from the span

pub mod logging;
pub mod metrics;
pub mod tracing;
