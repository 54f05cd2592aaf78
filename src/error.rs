use proctree_shared::Pid;
use std::sync::Arc;
use thiserror::Error;

/// Failure modes of the coalesced process queries.
///
/// Cloneable so one collaborator failure can be handed to every request of the
/// batch it was meant to serve.
#[derive(Error, Debug, Clone)]
pub enum ProcessTreeError {
    #[error("Could not find process with pid {0}")]
    NotFound(Pid),
    #[error("Process enumeration is not supported on this platform")]
    UnsupportedPlatform,
    #[error("Process queries must be issued from within a tokio runtime")]
    NoRuntime,
    #[error("Failed to take a process snapshot: {0:#}")]
    Snapshot(Arc<anyhow::Error>),
    #[error("Failed to sample CPU usage: {0:#}")]
    CpuSample(Arc<anyhow::Error>),
    #[error("The request was dropped before it completed")]
    Abandoned,
}
