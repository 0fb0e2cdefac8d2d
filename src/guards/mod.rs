//! Guards, resolvers and the injector that provides them.
//!
//! # Data Flow
//! ```text
//! Future snapshot + committed snapshot
//!     → checks.rs (can_deactivate / can_activate checklists, rerun policy)
//!     → pipeline.rs (run guards in order, short-circuit, cancellable)
//!     → pipeline.rs (resolvers, inherited data)
//!     → Return: Allow / Deny / Redirect(UrlTree), or an error
//! ```
//!
//! # Design Decisions
//! - Guards come in two shapes, a function or a service object, chosen at registration
//! - Route tables written as data refer to guards by token; `injector.rs` maps tokens to guards

pub(crate) mod checks;
pub mod injector;
pub(crate) mod pipeline;
pub mod types;

pub use injector::{Injector, InjectorBuilder};
pub use types::{
    CanActivate, CanActivateGuard, CanDeactivate, CanDeactivateGuard, CanMatch, CanMatchGuard, GuardError, GuardFuture,
    GuardResult, Resolve, ResolveFuture, Resolver, ResolverError,
};
