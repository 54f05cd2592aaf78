use super::{CpuSampler, SnapshotProvider};
use crate::prelude::*;
use async_trait::async_trait;
use itertools::Itertools;
use proctree_shared::{ProcessDataFlags, ProcessRecord};
use std::collections::HashMap;
use std::time::Duration;
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

fn refresh_kind(flags: ProcessDataFlags) -> ProcessRefreshKind {
    let mut kind = ProcessRefreshKind::nothing();
    if flags.contains(ProcessDataFlags::MEMORY) {
        kind = kind.with_memory();
    }
    if flags.contains(ProcessDataFlags::COMMAND_LINE) {
        kind = kind.with_cmd(UpdateKind::Always);
    }
    kind
}

fn to_record(process: &Process, flags: ProcessDataFlags) -> ProcessRecord {
    let mut record = ProcessRecord::new(
        process.pid().as_u32(),
        process.parent().map(Pid::as_u32).unwrap_or(0),
        process.name().to_string_lossy(),
    );
    if flags.contains(ProcessDataFlags::MEMORY) {
        record.memory = Some(process.memory());
    }
    if flags.contains(ProcessDataFlags::COMMAND_LINE) {
        record.command_line = Some(
            process
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy())
                .join(" "),
        );
    }
    record
}

/// Enumerates processes through the `sysinfo` crate, sorted by pid
pub struct SysinfoSnapshotProvider;

impl SysinfoSnapshotProvider {
    fn snapshot_blocking(flags: ProcessDataFlags) -> Vec<ProcessRecord> {
        let mut system = System::new();
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh_kind(flags));

        let mut records: Vec<ProcessRecord> = system
            .processes()
            .values()
            // Linux tasks are reported as children of their process
            .filter(|process| process.thread_kind().is_none())
            .map(|process| to_record(process, flags))
            .collect();
        records.sort_by_key(|record| record.pid);
        records
    }
}

#[async_trait]
impl SnapshotProvider for SysinfoSnapshotProvider {
    fn is_supported(&self) -> bool {
        sysinfo::IS_SUPPORTED_SYSTEM
    }

    async fn snapshot(&self, flags: ProcessDataFlags) -> Result<Vec<ProcessRecord>> {
        let records = tokio::task::spawn_blocking(move || Self::snapshot_blocking(flags))
            .await
            .context("Process enumeration task failed")?;
        debug!("sysinfo snapshot contains {} processes", records.len());
        Ok(records)
    }
}

/// Samples CPU usage by refreshing `sysinfo` twice, `sample_interval` apart
pub struct SysinfoCpuSampler {
    sample_interval: Duration,
}

impl SysinfoCpuSampler {
    pub fn new(sample_interval: Duration) -> Self {
        Self {
            sample_interval: sample_interval.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    pub fn sample_interval(&self) -> Duration {
        self.sample_interval
    }
}

/// sysinfo reports 100% per logical CPU, bring it back to [0, 100]
fn normalize_cpu_usage(usage: f32, cpu_count: usize) -> f64 {
    (f64::from(usage) / cpu_count.max(1) as f64).clamp(0.0, 100.0)
}

#[async_trait]
impl CpuSampler for SysinfoCpuSampler {
    fn is_supported(&self) -> bool {
        sysinfo::IS_SUPPORTED_SYSTEM
    }

    async fn sample(&self, mut records: Vec<ProcessRecord>) -> Result<Vec<ProcessRecord>> {
        let pids: Vec<Pid> = records
            .iter()
            .map(|record| Pid::from_u32(record.pid))
            .collect();
        let kind = ProcessRefreshKind::nothing().with_cpu();
        let cpu_count = std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);

        let first_pids = pids.clone();
        let mut system = tokio::task::spawn_blocking(move || {
            let mut system = System::new();
            system.refresh_processes_specifics(ProcessesToUpdate::Some(&first_pids), true, kind);
            system
        })
        .await
        .context("First CPU sample failed")?;

        tokio::time::sleep(self.sample_interval).await;

        let usage: HashMap<u32, f64> = tokio::task::spawn_blocking(move || {
            system.refresh_processes_specifics(ProcessesToUpdate::Some(&pids), true, kind);
            system
                .processes()
                .iter()
                .map(|(pid, process)| {
                    (
                        pid.as_u32(),
                        normalize_cpu_usage(process.cpu_usage(), cpu_count),
                    )
                })
                .collect()
        })
        .await
        .context("Second CPU sample failed")?;

        for record in &mut records {
            record.cpu = usage.get(&record.pid).copied();
        }
        trace!(
            "Sampled CPU usage of {} processes over {:?}",
            usage.len(),
            self.sample_interval
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(50.0, 1, 50.0)]
    #[case(350.0, 4, 87.5)]
    #[case(800.0, 4, 100.0)]
    #[case(-1.0, 2, 0.0)]
    #[case(20.0, 0, 20.0)]
    fn test_normalize_cpu_usage(#[case] usage: f32, #[case] cpus: usize, #[case] expected: f64) {
        assert_eq!(normalize_cpu_usage(usage, cpus), expected);
    }

    #[test]
    fn test_interval_never_below_sysinfo_minimum() {
        let sampler = SysinfoCpuSampler::new(Duration::ZERO);
        assert_eq!(
            sampler.sample_interval(),
            sysinfo::MINIMUM_CPU_UPDATE_INTERVAL
        );
    }

    #[tokio::test]
    async fn test_snapshot_contains_current_process() {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return;
        }
        let (stop, wait) = std::sync::mpsc::channel::<()>();
        let worker = std::thread::spawn(move || wait.recv());

        let records = SysinfoSnapshotProvider
            .snapshot(ProcessDataFlags::MEMORY)
            .await
            .unwrap();
        drop(stop);
        worker.join().unwrap().unwrap_err();

        // Threads of this process, including the worker, are not processes
        assert!(
            records
                .iter()
                .all(|record| record.ppid != std::process::id())
        );
        let current = records
            .iter()
            .find(|record| record.pid == std::process::id())
            .unwrap();
        assert!(current.memory.is_some());
        assert!(current.command_line.is_none());
        assert!(records.windows(2).all(|pair| pair[0].pid <= pair[1].pid));
    }
}
