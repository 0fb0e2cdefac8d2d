//! Outlet activation.
//!
//! # Data Flow
//! ```text
//! Future RouterState + current RouterState
//!     → reuse.rs (keep, detach or drop each route)
//!     → activate.rs (deactivate children-first, activate parents-first)
//!     → host.rs (create / destroy / attach / detach component instances)
//!     → outlet.rs (record what fills each outlet)
//! ```

pub(crate) mod activate;
pub mod host;
pub mod outlet;
pub mod reuse;

pub use host::{ComponentHandle, ComponentHost, TracingHost};
pub use outlet::{ChildrenOutletContexts, OutletContext, OutletSlot};
pub use reuse::{DefaultRouteReuseStrategy, DetachedRouteHandle, KeepAliveReuseStrategy, RouteReuseStrategy};
