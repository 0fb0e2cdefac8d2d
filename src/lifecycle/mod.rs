//! Router teardown.
//!
//! # Data Flow
//! ```text
//! Router::dispose ─┐
//! Ctrl-C (signals) ┴─▶ Shutdown::trigger(cause)
//!                         ├─▶ navigation tokens (child_token) cancelled
//!                         ├─▶ location listener leaves its loop
//!                         └─▶ REPL loop exits
//! ```
//!
//! # Design Decisions
//! - The first trigger records its cause; later ones are ignored
//! - Navigation tokens are children, so cancelling one never tears the router down

pub mod shutdown;
pub mod signals;
