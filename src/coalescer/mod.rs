//! Single-flight access to the snapshot provider and the CPU sampler.
//!
//! Neither collaborator tolerates overlapping calls. Every query is queued
//! behind a per-operation gate: the first query of an idle window opens a
//! fetch cycle, and every query queued before the cycle closes is served from
//! that cycle's result, including queries issued from inside a callback.
//!
//! A cycle is performed with the flags (or records, for CPU sampling) of the
//! query that opened it. Later queries joining the cycle are served from the
//! same result even when they asked for different flags.
//!
//! The guarantee only holds between callers sharing one [`RequestCoalescer`].

mod promises;
mod single_flight;

use crate::error::ProcessTreeError;
use crate::prelude::*;
use crate::snapshot::{CpuSampler, SnapshotProvider};
use futures::FutureExt;
use proctree_shared::{
    DEFAULT_MAX_DEPTH, Pid, ProcessDataFlags, ProcessRecord, ProcessTreeNode, build_list,
    build_tree,
};
use single_flight::SingleFlight;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;

pub type TreeResult = Result<Option<ProcessTreeNode>, ProcessTreeError>;
pub type ListResult = Result<Option<Vec<ProcessRecord>>, ProcessTreeError>;
pub type CpuUsageResult = Result<Vec<ProcessRecord>, ProcessTreeError>;

type Snapshot = Result<Vec<ProcessRecord>, ProcessTreeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerConfig {
    /// Depth bound of the tree and list queries
    pub max_depth: i32,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

enum SnapshotRequest {
    Tree {
        root_pid: Pid,
        callback: Box<dyn FnOnce(TreeResult) + Send>,
    },
    List {
        root_pid: Pid,
        callback: Box<dyn FnOnce(ListResult) + Send>,
    },
}

impl SnapshotRequest {
    fn complete(self, snapshot: &Snapshot, max_depth: i32) {
        match self {
            SnapshotRequest::Tree { root_pid, callback } => callback(
                snapshot
                    .as_ref()
                    .map(|records| build_tree(root_pid, records, max_depth))
                    .map_err(Clone::clone),
            ),
            SnapshotRequest::List { root_pid, callback } => callback(
                snapshot
                    .as_ref()
                    .map(|records| build_list(root_pid, records, max_depth))
                    .map_err(Clone::clone),
            ),
        }
    }
}

struct CpuRequest {
    callback: Box<dyn FnOnce(CpuUsageResult) + Send>,
}

struct Inner {
    provider: Arc<dyn SnapshotProvider>,
    sampler: Arc<dyn CpuSampler>,
    config: CoalescerConfig,
    snapshots: SingleFlight<SnapshotRequest>,
    cpu_samples: SingleFlight<CpuRequest>,
}

/// Serializes process queries into the external collaborators and fans each
/// result out to every waiting caller.
///
/// Cloning yields another handle to the same gates and queues.
#[derive(Clone)]
pub struct RequestCoalescer {
    inner: Arc<Inner>,
}

impl RequestCoalescer {
    pub fn new(
        provider: Arc<dyn SnapshotProvider>,
        sampler: Arc<dyn CpuSampler>,
        config: CoalescerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                sampler,
                config,
                snapshots: SingleFlight::new(),
                cpu_samples: SingleFlight::new(),
            }),
        }
    }

    pub fn config(&self) -> CoalescerConfig {
        self.inner.config
    }

    /// Queue a tree query rooted at `root_pid`.
    ///
    /// `callback` runs exactly once, on the runtime, with `Ok(None)` when the
    /// snapshot has no process `root_pid`. An `Err` is only returned when the
    /// query is refused before being queued, in which case `callback` never runs.
    pub fn get_process_tree<F>(
        &self,
        root_pid: Pid,
        flags: ProcessDataFlags,
        callback: F,
    ) -> Result<(), ProcessTreeError>
    where
        F: FnOnce(TreeResult) + Send + 'static,
    {
        self.enqueue_snapshot(
            SnapshotRequest::Tree {
                root_pid,
                callback: Box::new(callback),
            },
            flags,
        )
    }

    /// Queue a query for `root_pid` and its descendants, flattened in pre-order.
    ///
    /// Same delivery rules as [`get_process_tree`](Self::get_process_tree).
    pub fn get_process_list<F>(
        &self,
        root_pid: Pid,
        flags: ProcessDataFlags,
        callback: F,
    ) -> Result<(), ProcessTreeError>
    where
        F: FnOnce(ListResult) + Send + 'static,
    {
        self.enqueue_snapshot(
            SnapshotRequest::List {
                root_pid,
                callback: Box::new(callback),
            },
            flags,
        )
    }

    /// Queue a CPU usage sample of `records`.
    ///
    /// When a sample is already running, `records` is discarded and the caller
    /// receives the records of that running sample.
    pub fn get_process_cpu_usage<F>(
        &self,
        records: Vec<ProcessRecord>,
        callback: F,
    ) -> Result<(), ProcessTreeError>
    where
        F: FnOnce(CpuUsageResult) + Send + 'static,
    {
        if !self.inner.sampler.is_supported() {
            return Err(ProcessTreeError::UnsupportedPlatform);
        }
        let runtime = Handle::try_current().map_err(|_| ProcessTreeError::NoRuntime)?;

        let request = CpuRequest {
            callback: Box::new(callback),
        };
        if self.inner.cpu_samples.push(request) {
            debug!("Sampling CPU usage of {} processes", records.len());
            let cycle = CycleGuard::new(&self.inner, CycleKind::CpuSample);
            runtime.spawn(cycle.run_cpu_sample(records));
        } else {
            trace!("Joining the running CPU sample");
        }
        Ok(())
    }

    /// Whether a snapshot fetch cycle is currently open
    pub fn is_fetching(&self) -> bool {
        self.inner.snapshots.is_in_flight()
    }

    /// Number of tree and list queries waiting for the running snapshot
    pub fn pending_requests(&self) -> usize {
        self.inner.snapshots.pending()
    }

    fn enqueue_snapshot(
        &self,
        request: SnapshotRequest,
        flags: ProcessDataFlags,
    ) -> Result<(), ProcessTreeError> {
        if !self.inner.provider.is_supported() {
            return Err(ProcessTreeError::UnsupportedPlatform);
        }
        let runtime = Handle::try_current().map_err(|_| ProcessTreeError::NoRuntime)?;

        if self.inner.snapshots.push(request) {
            debug!("Opening a snapshot cycle with {flags:?}");
            let cycle = CycleGuard::new(&self.inner, CycleKind::Snapshot);
            runtime.spawn(cycle.run_snapshot(flags));
        } else {
            trace!("Joining the running snapshot cycle");
        }
        Ok(())
    }
}

/// Run one callback, keeping the rest of the batch alive if it panics
fn complete_guarded(complete: impl FnOnce()) {
    if std::panic::catch_unwind(AssertUnwindSafe(complete)).is_err() {
        error!("A process query callback panicked");
    }
}

#[derive(Debug, Clone, Copy)]
enum CycleKind {
    Snapshot,
    CpuSample,
}

/// Ownership of an open fetch cycle.
///
/// Created before the cycle task is spawned. If the task is dropped before it
/// drained its queue (runtime shutdown, or never polled at all), every pending
/// request is completed with [`ProcessTreeError::Abandoned`] and the gate
/// reopens.
struct CycleGuard {
    inner: Arc<Inner>,
    kind: CycleKind,
    drained: bool,
}

impl CycleGuard {
    fn new(inner: &Arc<Inner>, kind: CycleKind) -> Self {
        Self {
            inner: Arc::clone(inner),
            kind,
            drained: false,
        }
    }

    async fn run_snapshot(mut self, flags: ProcessDataFlags) {
        let inner = Arc::clone(&self.inner);
        let snapshot = AssertUnwindSafe(inner.provider.snapshot(flags))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(anyhow!("The snapshot provider panicked")))
            .map_err(|err| {
                warn!("Process snapshot failed: {err:#}");
                ProcessTreeError::Snapshot(Arc::new(err))
            });

        let max_depth = inner.config.max_depth;
        let served = inner.snapshots.drain(|request| {
            complete_guarded(|| request.complete(&snapshot, max_depth));
        });
        self.drained = true;
        debug!("Snapshot cycle closed after serving {served} requests");
    }

    async fn run_cpu_sample(mut self, records: Vec<ProcessRecord>) {
        let inner = Arc::clone(&self.inner);
        let sample = AssertUnwindSafe(inner.sampler.sample(records))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(anyhow!("The CPU sampler panicked")))
            .map_err(|err| {
                warn!("CPU sampling failed: {err:#}");
                ProcessTreeError::CpuSample(Arc::new(err))
            });

        let served = inner.cpu_samples.drain(|request| {
            complete_guarded(|| (request.callback)(sample.clone()));
        });
        self.drained = true;
        debug!("CPU sample cycle closed after serving {served} requests");
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        if self.drained {
            return;
        }
        let abandoned = match self.kind {
            CycleKind::Snapshot => {
                let failure: Snapshot = Err(ProcessTreeError::Abandoned);
                self.inner.snapshots.drain(|request| {
                    complete_guarded(|| request.complete(&failure, 0));
                })
            }
            CycleKind::CpuSample => self.inner.cpu_samples.drain(|request| {
                complete_guarded(|| (request.callback)(Err(ProcessTreeError::Abandoned)));
            }),
        };
        warn!(
            "{:?} cycle dropped before completing, abandoned {abandoned} requests",
            self.kind
        );
    }
}
