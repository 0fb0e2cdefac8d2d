//! OS signal handling for the CLI.
//!
//! # Responsibilities
//! - Turn Ctrl-C into a router teardown
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second Ctrl-C is left to the default handler once this task has returned

use crate::lifecycle::shutdown::Shutdown;

/// Trigger `shutdown` on Ctrl-C. Returns when either side fires first.
pub async fn shutdown_on_ctrl_c(shutdown: Shutdown) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => tracing::info!("Interrupt received, disposing router"),
                Err(e) => tracing::warn!(error = %e, "Cannot listen for interrupts"),
            }
            shutdown.trigger("ctrl-c");
        }
        _ = shutdown.triggered() => {}
    }
}
