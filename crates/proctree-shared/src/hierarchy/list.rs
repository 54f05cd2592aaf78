use super::AdjacencyIndex;
use crate::process::{Pid, ProcessRecord};

/// Flatten the subtree rooted at `root_pid` in pre-order, at most `max_depth` hops deep.
///
/// Returns `None` when no record has `root_pid` as its pid. A negative depth
/// yields an empty list even when the root exists, and a depth of zero yields
/// the root alone.
pub fn build_list<'a, I>(root_pid: Pid, records: I, max_depth: i32) -> Option<Vec<ProcessRecord>>
where
    I: IntoIterator<Item = &'a ProcessRecord>,
{
    let index = AdjacencyIndex::build(records, root_pid);
    let root = index.root()?;
    if max_depth < 0 {
        return Some(Vec::new());
    }

    let mut list = Vec::new();
    let mut stack = vec![(root, max_depth)];
    while let Some((record, remaining_depth)) = stack.pop() {
        list.push(record.clone());
        if remaining_depth > 0 {
            for &child in index.children_of(record.pid).iter().rev() {
                stack.push((child, remaining_depth - 1));
            }
        }
    }
    Some(list)
}
