//! Awaitable counterparts of the callback queries.
//!
//! A missing root process becomes [`ProcessTreeError::NotFound`] instead of `None`.

use super::RequestCoalescer;
use crate::error::ProcessTreeError;
use proctree_shared::{Pid, ProcessDataFlags, ProcessRecord, ProcessTreeNode};
use tokio::sync::oneshot;

async fn settle<T>(
    receiver: oneshot::Receiver<Result<T, ProcessTreeError>>,
) -> Result<T, ProcessTreeError> {
    receiver.await.map_err(|_| ProcessTreeError::Abandoned)?
}

impl RequestCoalescer {
    pub async fn process_tree(
        &self,
        root_pid: Pid,
        flags: ProcessDataFlags,
    ) -> Result<ProcessTreeNode, ProcessTreeError> {
        let (sender, receiver) = oneshot::channel();
        self.get_process_tree(root_pid, flags, move |result| {
            let _ = sender.send(result);
        })?;
        settle(receiver)
            .await?
            .ok_or(ProcessTreeError::NotFound(root_pid))
    }

    pub async fn process_list(
        &self,
        root_pid: Pid,
        flags: ProcessDataFlags,
    ) -> Result<Vec<ProcessRecord>, ProcessTreeError> {
        let (sender, receiver) = oneshot::channel();
        self.get_process_list(root_pid, flags, move |result| {
            let _ = sender.send(result);
        })?;
        settle(receiver)
            .await?
            .ok_or(ProcessTreeError::NotFound(root_pid))
    }

    pub async fn process_cpu_usage(
        &self,
        records: Vec<ProcessRecord>,
    ) -> Result<Vec<ProcessRecord>, ProcessTreeError> {
        let (sender, receiver) = oneshot::channel();
        self.get_process_cpu_usage(records, move |result| {
            let _ = sender.send(result);
        })?;
        settle(receiver).await
    }
}
