//! Client-side navigation engine.
//!
//! Turns URLs and command lists into recognized, guarded, resolved and activated route trees,
//! keeping history, the committed URL and the live route tree consistent across overlapping
//! navigations.

pub mod activation;
pub mod config;
pub mod guards;
pub mod lifecycle;
pub mod navigation;
pub mod observability;
pub mod routing;
pub mod state;
pub mod url;

pub use activation::{ComponentHost, DefaultRouteReuseStrategy, RouteReuseStrategy, TracingHost};
pub use config::{load_config, NavigationConfig, RouterOptions};
pub use guards::{CanActivateGuard, CanDeactivateGuard, CanMatchGuard, GuardResult, Injector, Resolver};
pub use lifecycle::shutdown::Shutdown;
pub use navigation::{
    MemoryLocation, NavigationBehaviorOptions, NavigationError, NavigationExtras, Router, RouterBuilder, RouterEvent,
};
pub use routing::{ComponentRef, PathMatch, Route, RouteModule};
pub use state::{ActivatedRoute, ActivatedRouteSnapshot, RouterState, RouterStateSnapshot};
pub use url::{Command, DefaultUrlSerializer, IsActiveMatchOptions, UrlSerializer, UrlTree};
