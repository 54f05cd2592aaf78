use super::SnapshotProvider;
use crate::prelude::*;
use async_trait::async_trait;
use procfs::process::Process;
use proctree_shared::{ProcessDataFlags, ProcessRecord};

/// Enumerates processes by reading `/proc` directly, sorted by pid
pub struct ProcfsSnapshotProvider;

/// Returns `None` when the process exited while it was being read
fn read_process(
    process: &Process,
    flags: ProcessDataFlags,
    page_size: u64,
) -> Option<ProcessRecord> {
    let stat = process.stat().ok()?;
    let mut record = ProcessRecord::new(stat.pid as u32, stat.ppid as u32, stat.comm);

    if flags.contains(ProcessDataFlags::MEMORY) {
        record.memory = Some(process.statm().ok()?.resident * page_size);
    }
    if flags.contains(ProcessDataFlags::COMMAND_LINE) {
        // Kernel threads and zombies have no command line
        let command_line = process.cmdline().map(|args| args.join(" "));
        record.command_line = Some(command_line.unwrap_or_default());
    }
    Some(record)
}

impl ProcfsSnapshotProvider {
    fn snapshot_blocking(flags: ProcessDataFlags) -> Result<Vec<ProcessRecord>> {
        let page_size = procfs::page_size();
        let mut records: Vec<ProcessRecord> = procfs::process::all_processes()
            .context("Failed to list /proc")?
            .filter_map(|process| process.ok())
            .filter_map(|process| read_process(&process, flags, page_size))
            .collect();
        records.sort_by_key(|record| record.pid);
        Ok(records)
    }
}

#[async_trait]
impl SnapshotProvider for ProcfsSnapshotProvider {
    async fn snapshot(&self, flags: ProcessDataFlags) -> Result<Vec<ProcessRecord>> {
        let records = tokio::task::spawn_blocking(move || Self::snapshot_blocking(flags))
            .await
            .context("Process enumeration task failed")??;
        debug!("procfs snapshot contains {} processes", records.len());
        Ok(records)
    }
}
