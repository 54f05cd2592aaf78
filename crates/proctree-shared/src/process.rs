use serde::{Deserialize, Serialize};

pub type Pid = u32;

/// A single process as reported by one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub pid: Pid,
    /// Need not reference a process of the same snapshot, and may equal `pid`
    pub ppid: Pid,
    pub name: String,
    /// Resident memory in bytes, only set when requested with `ProcessDataFlags::MEMORY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    /// Only set when requested with `ProcessDataFlags::COMMAND_LINE`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_line: Option<String>,
    /// CPU usage percentage in [0, 100], only set by a CPU sampler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
}

impl ProcessRecord {
    pub fn new(pid: Pid, ppid: Pid, name: impl Into<String>) -> Self {
        Self {
            pid,
            ppid,
            name: name.into(),
            memory: None,
            command_line: None,
            cpu: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessTreeNode {
    pub pid: Pid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_line: Option<String>,
    /// Children in snapshot order
    pub children: Vec<ProcessTreeNode>,
}

impl ProcessTreeNode {
    /// A childless node carrying the attributes of `record`
    pub fn leaf(record: &ProcessRecord) -> Self {
        Self {
            pid: record.pid,
            name: record.name.clone(),
            memory: record.memory,
            command_line: record.command_line.clone(),
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including `self`
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Nodes of this subtree in pre-order
    pub fn iter(&self) -> impl Iterator<Item = &ProcessTreeNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}
