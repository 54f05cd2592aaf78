use crate::process::{Pid, ProcessRecord};
use std::collections::HashMap;

mod list;
mod tree;

pub use list::build_list;
pub use tree::build_tree;

/// Parent to children lookup over one snapshot, built in a single pass.
///
/// Records are borrowed from the snapshot; the index lives for one query only.
#[derive(Debug)]
pub struct AdjacencyIndex<'a> {
    root: Option<&'a ProcessRecord>,
    /// Maps a parent PID to its children, in snapshot order
    children: HashMap<Pid, Vec<&'a ProcessRecord>>,
}

impl<'a> AdjacencyIndex<'a> {
    /// Index `records` and remember the first record whose pid is `root_pid`
    pub fn build<I>(records: I, root_pid: Pid) -> Self
    where
        I: IntoIterator<Item = &'a ProcessRecord>,
    {
        let records = records.into_iter();
        let mut root = None;
        let mut children: HashMap<Pid, Vec<&'a ProcessRecord>> =
            HashMap::with_capacity(records.size_hint().0);

        for record in records {
            if root.is_none() && record.pid == root_pid {
                root = Some(record);
            }
            children.entry(record.ppid).or_default().push(record);
        }

        Self { root, children }
    }

    /// The record matching the requested root pid, if the snapshot has one
    pub fn root(&self) -> Option<&'a ProcessRecord> {
        self.root
    }

    /// Immediate children of `pid`, in snapshot order
    pub fn children_of(&self, pid: Pid) -> &[&'a ProcessRecord] {
        self.children.get(&pid).map(Vec::as_slice).unwrap_or_default()
    }
}
