//! arbor-core: Core library for a minimal local version control system.
//!
//! Arbor stores immutable, content-addressed **blobs**, **trees** and
//! **commits**, keeps named **branches** plus a movable **HEAD**, and merges
//! divergent branches with a file-granular three-way merge rooted at the
//! lowest common ancestor.

pub mod commit;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod graph;
pub mod hash;
pub mod ignore;
pub mod lock;
pub mod merge;
pub mod object;
pub mod refs;
pub mod repo;
pub mod staging;
pub mod status;
pub mod worktree;

pub use error::{ArborError, ArborResult};
pub use repo::Repository;
