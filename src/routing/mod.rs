//! Route table and recognition.
//!
//! # Data Flow
//! ```text
//! UrlTree
//!     → recognizer.rs (walk outlets, try candidates in order)
//!     → matcher.rs (match one route against leading segments)
//!     → redirects.rs (rewrite on redirect_to, restart if absolute)
//!     → loader.rs (lazy children, deduplicated)
//!     → Return: RouterStateSnapshot + URL after redirects, or RoutingError
//! ```
//!
//! # Design Decisions
//! - Route tables are immutable `Arc<Route>` trees; lazily loaded children are set once
//! - Deterministic: same table and URL always produce the same snapshot
//! - First match wins (table order, outlet-declaring routes first per outlet)

pub mod error;
pub mod loader;
pub mod matcher;
pub mod recognizer;
pub mod redirects;
pub mod route;

pub use error::{RoutingError, RoutingResult};
pub use loader::{LoadError, LoadedRouterConfig, RouteModule, RouterConfigLoader};
pub use matcher::default_url_matcher;
pub use recognizer::{Recognized, Recognizer};
pub use route::{ComponentRef, Data, PathMatch, Route, RouteId, RunGuardsAndResolvers, UrlMatchResult, UrlMatcher};
