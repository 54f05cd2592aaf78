//! Process snapshot data model and the pure tree/list construction algorithms.
//!
//! Nothing in this crate performs I/O: it consumes an already acquired snapshot
//! and answers structural queries about it.

mod flags;
pub mod hierarchy;
mod process;

pub use flags::ProcessDataFlags;
pub use hierarchy::{AdjacencyIndex, build_list, build_tree};
pub use process::{Pid, ProcessRecord, ProcessTreeNode};

/// Depth bound applied by the public tree/list operations when none is configured.
pub const DEFAULT_MAX_DEPTH: i32 = 10;
