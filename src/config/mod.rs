//! Route files and router options.
//!
//! A route file is TOML: a `[router]` table with [`RouterOptions`], an
//! `[observability]` table, and `[[routes]]` entries whose guards and resolvers
//! are named by token. Tokens are looked up in an
//! [`Injector`](crate::guards::Injector) when the entries are turned into
//! [`Route`](crate::routing::Route)s.
//!
//! # Data Flow
//! ```text
//! routes.toml ──parse──▶ NavigationConfig ──validate_config──▶ options ok?
//!                              │
//!                  RouteConfig::build (tokens → guards/resolvers)
//!                              │
//!                 Vec<Route> ──validate_routes──▶ Router / Router::reset_config
//!
//! watcher.rs: *.toml in the same directory changed → parse again → caller resets routes
//! ```
//!
//! # Design Decisions
//! - Every table is optional; an empty file is a router with no routes
//! - `load_children = "file.toml"` reads a sibling file lazily, through the same build path
//! - Validation collects every problem before failing

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CanceledNavigationResolution, NavigationConfig, ObservabilityConfig, OnSameUrlNavigation, RouteConfig, RouterOptions,
    UrlUpdateStrategy,
};
pub use validation::{validate_config, validate_routes, ValidationError};
