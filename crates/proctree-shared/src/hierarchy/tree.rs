use super::AdjacencyIndex;
use crate::process::{Pid, ProcessRecord, ProcessTreeNode};

/// Build the tree rooted at `root_pid`, at most `max_depth` hops deep.
///
/// Returns `None` when no record has `root_pid` as its pid. A node at the
/// depth limit is emitted without children even if it has some. The depth
/// limit is the only cycle guard: a process that is its own parent yields a
/// chain of `max_depth + 1` nodes.
pub fn build_tree<'a, I>(root_pid: Pid, records: I, max_depth: i32) -> Option<ProcessTreeNode>
where
    I: IntoIterator<Item = &'a ProcessRecord>,
{
    let index = AdjacencyIndex::build(records, root_pid);
    let root = index.root()?;

    // Nodes in pre-order, each with the index of its parent
    let mut nodes: Vec<(ProcessTreeNode, Option<usize>)> = Vec::new();
    let mut stack: Vec<(&ProcessRecord, i32, Option<usize>)> = vec![(root, max_depth, None)];

    while let Some((record, remaining_depth, parent)) = stack.pop() {
        let position = nodes.len();
        nodes.push((ProcessTreeNode::leaf(record), parent));

        if remaining_depth > 0 {
            for &child in index.children_of(record.pid).iter().rev() {
                stack.push((child, remaining_depth - 1, Some(position)));
            }
        }
    }

    // Descendants always come after their ancestor, so attaching from the back
    // completes every subtree before its root is moved. Siblings arrive in
    // reverse order and are flipped once their parent is complete.
    let mut tree = None;
    while let Some((mut node, parent)) = nodes.pop() {
        node.children.reverse();
        match parent {
            Some(parent) => nodes[parent].0.children.push(node),
            None => tree = Some(node),
        }
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn chain(len: u32) -> Vec<ProcessRecord> {
        (1..=len)
            .map(|pid| ProcessRecord::new(pid, pid - 1, format!("p{pid}")))
            .collect()
    }

    fn depth(node: &ProcessTreeNode) -> usize {
        node.children.iter().map(|c| depth(c) + 1).max().unwrap_or(0)
    }

    #[test]
    fn test_missing_root() {
        let empty: Vec<ProcessRecord> = Vec::new();
        assert!(build_tree(10, &chain(3), 10).is_none());
        assert!(build_tree(1, &empty, 10).is_none());
    }

    #[test]
    fn test_parent_only_reference_is_not_a_root() {
        // pid 0 is referenced as a parent but never reported itself
        assert!(build_tree(0, &chain(3), 10).is_none());
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(3, 3)]
    #[case(10, 5)]
    fn test_depth_is_bounded(#[case] max_depth: i32, #[case] expected: usize) {
        let tree = build_tree(1, &chain(6), max_depth).unwrap();
        assert_eq!(depth(&tree), expected);
    }

    #[test]
    fn test_negative_depth_yields_root_only() {
        let tree = build_tree(1, &chain(3), -1).unwrap();
        assert_eq!(tree.pid, 1);
        assert!(tree.children.is_empty());
    }

    #[test]
    fn test_self_parent_chain() {
        let records = vec![ProcessRecord::new(9, 9, "loop")];
        let tree = build_tree(9, &records, 4).unwrap();

        let mut node = &tree;
        let mut nodes = 1;
        while let Some(child) = node.children.first() {
            assert_eq!(node.children.len(), 1);
            assert_eq!(child.pid, 9);
            node = child;
            nodes += 1;
        }
        assert_eq!(nodes, 5);
    }

    #[test]
    fn test_unbounded_depth_covers_whole_chain() {
        let records = chain(5_000);
        let tree = build_tree(1, &records, i32::MAX).unwrap();
        assert_eq!(tree.node_count(), 5_000);
    }

    #[test]
    fn test_attributes_are_carried_over() {
        let records = vec![ProcessRecord {
            memory: Some(4096),
            command_line: Some("init --quiet".into()),
            cpu: Some(12.5),
            ..ProcessRecord::new(1, 0, "init")
        }];
        let tree = build_tree(1, &records, 10).unwrap();
        assert_eq!(tree.memory, Some(4096));
        assert_eq!(tree.command_line.as_deref(), Some("init --quiet"));
    }
}
