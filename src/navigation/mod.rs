//! Navigation orchestration.
//!
//! # Data Flow
//! ```text
//! navigate / navigate_by_url / popstate (location.rs)
//!     → router.rs (begin: id, supersede, extras.rs)
//!     → transition.rs (phase bookkeeping)
//!     → routing + guards + activation
//!     → events.rs (lifecycle stream) / error.rs (error handler outcome)
//! ```

pub mod error;
pub mod events;
pub mod extras;
pub mod location;
pub mod router;
pub mod transition;

pub use error::{ErrorHandlerOutcome, MalformedUrlHandler, NavigationError, NavigationErrorHandler, NavigationResult};
pub use events::{NavigationCancellationCode, NavigationSkippedCode, NavigationTrigger, RouterEvent};
pub use extras::{NavigationBehaviorOptions, NavigationExtras, QueryParamsHandling, UrlCreationOptions};
pub use location::{HistoryState, Location, MemoryLocation, PopStateEvent};
pub use router::{Router, RouterBuilder};
pub use transition::{Navigation, Phase};
