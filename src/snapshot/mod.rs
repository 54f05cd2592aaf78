//! External process enumeration and CPU sampling.
//!
//! Both collaborators are expensive and must not be called concurrently, which
//! is why every query goes through the [`RequestCoalescer`](crate::RequestCoalescer).

#[cfg(target_os = "linux")]
mod procfs_provider;
mod sysinfo_provider;

use crate::prelude::*;
use async_trait::async_trait;
use proctree_shared::{ProcessDataFlags, ProcessRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[cfg(target_os = "linux")]
pub use procfs_provider::ProcfsSnapshotProvider;
pub use sysinfo_provider::{SysinfoCpuSampler, SysinfoSnapshotProvider};

#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Whether processes can be enumerated at all on this system
    fn is_supported(&self) -> bool {
        true
    }

    /// Enumerate every process of the system.
    ///
    /// Optional attributes are only filled in for the capabilities in `flags`.
    async fn snapshot(&self, flags: ProcessDataFlags) -> Result<Vec<ProcessRecord>>;
}

#[async_trait]
pub trait CpuSampler: Send + Sync {
    fn is_supported(&self) -> bool {
        true
    }

    /// Annotate `records` with their CPU usage over a short sampling window.
    ///
    /// A process that exits during the window keeps `cpu = None`.
    async fn sample(&self, records: Vec<ProcessRecord>) -> Result<Vec<ProcessRecord>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// procfs on Linux, sysinfo everywhere else
    #[default]
    Auto,
    Sysinfo,
    /// Read /proc directly (Linux only)
    Procfs,
}

/// Instantiate the snapshot provider selected by `kind`
pub fn get_snapshot_provider(kind: ProviderKind) -> Result<Arc<dyn SnapshotProvider>> {
    match kind {
        #[cfg(target_os = "linux")]
        ProviderKind::Auto | ProviderKind::Procfs => Ok(Arc::new(ProcfsSnapshotProvider)),
        #[cfg(not(target_os = "linux"))]
        ProviderKind::Auto => Ok(Arc::new(SysinfoSnapshotProvider)),
        #[cfg(not(target_os = "linux"))]
        ProviderKind::Procfs => bail!("The procfs provider is only available on Linux"),
        ProviderKind::Sysinfo => Ok(Arc::new(SysinfoSnapshotProvider)),
    }
}

pub fn get_cpu_sampler(sample_interval: Duration) -> Arc<dyn CpuSampler> {
    Arc::new(SysinfoCpuSampler::new(sample_interval))
}
