//! URL model subsystem.
//!
//! # Data Flow
//! ```text
//! "/a/b;id=5(aux:c)?x=1#frag"
//!     → parser.rs (single pass, no backtracking)
//!     → UrlTree { root: UrlSegmentGroup, query_params, fragment }
//!     → serializer.rs (canonical string, percent-encoded per component)
//!
//! Imperative navigation:
//!     current UrlTree + commands (+ relative position)
//!     → commands.rs
//!     → new UrlTree
//!
//! Active checks:
//!     committed UrlTree + candidate UrlTree
//!     → contains.rs (exact / subset)
//! ```
//!
//! # Design Decisions
//! - Parse failures are values (`MalformedUrlError`), the router decides the fallback
//! - Serialization is canonical: `serialize(parse(s))` is a fixed point after one pass
//! - The `UrlSerializer` trait is the only seam; everything else is plain functions

pub mod commands;
pub mod contains;
pub(crate) mod parser;
pub mod serializer;
pub mod tree;

use thiserror::Error;

pub use commands::{create_url_tree, Command, CommandError, RelativePosition};
pub use contains::{contains_tree, FragmentMatchMode, IsActiveMatchOptions, ParamMatchMode, PathMatchMode};
pub use serializer::{DefaultUrlSerializer, UrlSerializer};
pub use tree::{Params, QueryParams, QueryValue, UrlSegment, UrlSegmentGroup, UrlTree, PRIMARY_OUTLET};

/// The input string is not a URL in the router's wire format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse url '{url}': {reason}")]
pub struct MalformedUrlError {
    pub url: String,
    pub reason: String,
}
