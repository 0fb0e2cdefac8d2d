//! Router state trees.
//!
//! # Data Flow
//! ```text
//! Recognition
//!     → snapshot.rs (ActivatedRouteSnapshot tree, params/data inheritance)
//!     → activated.rs (live ActivatedRoute tree, reusing unchanged routes)
//!     → Activation commits: future snapshots become current, watchers fire
//! ```

pub mod activated;
pub mod snapshot;
pub mod tree;

pub use activated::{ActivatedRoute, RouterState};
pub use snapshot::{ActivatedRouteSnapshot, ParamsInheritanceStrategy, RouterStateSnapshot};
pub use tree::{NodeId, Tree, TreeNode};
