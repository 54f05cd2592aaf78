use super::display::{build_process_table, render_tree};
use crate::config::ProctreeConfig;
use crate::local_logger::{clean_logger, style_header};
use crate::prelude::*;
use crate::snapshot::{get_cpu_sampler, get_snapshot_provider};
use crate::{CoalescerConfig, RequestCoalescer};
use crate::{end_group, start_group};
use clap::Args;
use proctree_shared::{Pid, ProcessDataFlags};
use serde::Serialize;

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Root process of the query, defaults to the process that launched proctree
    pub pid: Option<Pid>,

    /// Include the resident memory of every process
    #[arg(long)]
    pub memory: bool,

    /// Include the command line of every process
    #[arg(long)]
    pub command_line: bool,

    /// Print JSON instead of a human readable rendering
    #[arg(long)]
    pub json: bool,
}

impl QueryArgs {
    /// Flags requested on the command line, or the configured ones when none is
    fn flags(&self, config: &ProctreeConfig) -> ProcessDataFlags {
        let mut flags = ProcessDataFlags::NONE;
        if self.memory {
            flags |= ProcessDataFlags::MEMORY;
        }
        if self.command_line {
            flags |= ProcessDataFlags::COMMAND_LINE;
        }
        if flags.is_empty() { config.query.flags } else { flags }
    }
}

#[derive(Args, Debug)]
pub struct CpuArgs {
    /// Root process of the query, defaults to the process that launched proctree
    pub pid: Option<Pid>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

fn default_root_pid() -> Pid {
    #[cfg(unix)]
    {
        std::os::unix::process::parent_id()
    }
    #[cfg(not(unix))]
    {
        std::process::id()
    }
}

fn build_coalescer(config: &ProctreeConfig) -> Result<RequestCoalescer> {
    let provider = get_snapshot_provider(config.provider)?;
    let sampler = get_cpu_sampler(config.sample_interval());
    Ok(RequestCoalescer::new(
        provider,
        sampler,
        CoalescerConfig {
            max_depth: config.query.max_depth,
        },
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn tree(args: QueryArgs, config: &ProctreeConfig) -> Result<()> {
    let root_pid = args.pid.unwrap_or_else(default_root_pid);
    let coalescer = build_coalescer(config)?;

    let tree = coalescer.process_tree(root_pid, args.flags(config)).await?;
    debug!("Tree of {root_pid} has {} processes", tree.node_count());

    if args.json {
        print_json(&tree)
    } else {
        println!("{}", render_tree(&tree));
        Ok(())
    }
}

pub async fn list(args: QueryArgs, config: &ProctreeConfig) -> Result<()> {
    let root_pid = args.pid.unwrap_or_else(default_root_pid);
    let coalescer = build_coalescer(config)?;

    let records = coalescer.process_list(root_pid, args.flags(config)).await?;

    if args.json {
        print_json(&records)
    } else {
        println!("{}", build_process_table(&records));
        Ok(())
    }
}

pub async fn cpu(args: CpuArgs, config: &ProctreeConfig) -> Result<()> {
    let root_pid = args.pid.unwrap_or_else(default_root_pid);
    let coalescer = build_coalescer(config)?;

    let records = coalescer
        .process_list(root_pid, ProcessDataFlags::NONE)
        .await?;

    start_group!(format!("Sampling CPU usage of {} processes", records.len()));
    let sampled = coalescer.process_cpu_usage(records).await;
    end_group!();
    // The spinner must be gone before anything is printed to stdout
    clean_logger();
    let records = sampled?;

    if args.json {
        print_json(&records)
    } else {
        println!("{}", style_header(&format!("CPU usage of {root_pid}")));
        println!("{}", build_process_table(&records));
        Ok(())
    }
}
