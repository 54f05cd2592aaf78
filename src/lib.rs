//! Process trees and subtree listings built from whole-system process snapshots.
//!
//! Queries go through a [`RequestCoalescer`], which makes sure the snapshot
//! provider and the CPU sampler are never called concurrently while every
//! caller still gets an answer.

mod coalescer;
mod config;
mod error;
mod local_logger;
mod prelude;

pub mod cli;
pub mod logger;
pub mod snapshot;

pub use coalescer::{CoalescerConfig, CpuUsageResult, ListResult, RequestCoalescer, TreeResult};
pub use config::ProctreeConfig;
pub use error::ProcessTreeError;
pub use local_logger::clean_logger;
pub use proctree_shared::{
    DEFAULT_MAX_DEPTH, Pid, ProcessDataFlags, ProcessRecord, ProcessTreeNode, build_list,
    build_tree,
};
