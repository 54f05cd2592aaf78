use itertools::Itertools;
use proctree_shared::{ProcessRecord, ProcessTreeNode};
use tabled::settings::object::{Columns, Rows};
use tabled::settings::{Alignment, Color, Modify, Style};
use tabled::{Table, Tabled};

const BASE: f64 = 1024.0;
const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Human readable size, with at most one decimal and no trailing zeros
pub(crate) fn format_memory(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let bytes = bytes as f64;
    let unit_index = ((bytes.ln() / BASE.ln()).floor() as usize).min(UNITS.len() - 1);
    let value = format!("{:.1}", bytes / BASE.powi(unit_index as i32));
    let value = value.trim_end_matches('0').trim_end_matches('.');
    format!("{value} {}", UNITS[unit_index])
}

fn format_cpu(cpu: f64) -> String {
    format!("{cpu:.1}%")
}

fn or_dash<T>(value: Option<T>, format: impl FnOnce(T) -> String) -> String {
    value.map(format).unwrap_or_else(|| "-".to_string())
}

#[derive(Tabled)]
struct ProcessRow {
    #[tabled(rename = "PID")]
    pid: u32,
    #[tabled(rename = "PPID")]
    ppid: u32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Command line")]
    command_line: String,
}

impl From<&ProcessRecord> for ProcessRow {
    fn from(record: &ProcessRecord) -> Self {
        Self {
            pid: record.pid,
            ppid: record.ppid,
            name: record.name.clone(),
            memory: or_dash(record.memory, format_memory),
            cpu: or_dash(record.cpu, format_cpu),
            command_line: or_dash(record.command_line.clone(), |command_line| command_line),
        }
    }
}

pub(crate) fn build_process_table(records: &[ProcessRecord]) -> String {
    let rows = records.iter().map(ProcessRow::from).collect_vec();
    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Color::BOLD))
        // PID, PPID, memory and CPU are numeric
        .with(Modify::new(Columns::new(0..2)).with(Alignment::right()))
        .with(Modify::new(Columns::new(3..5)).with(Alignment::right()));
    table.to_string()
}

fn describe(node: &ProcessTreeNode) -> String {
    let mut line = format!("{} {}", node.pid, node.name);
    if let Some(memory) = node.memory {
        line.push_str(&format!(" ({})", format_memory(memory)));
    }
    if let Some(command_line) = node.command_line.as_deref().filter(|c| !c.is_empty()) {
        line.push_str(&format!(" `{command_line}`"));
    }
    line
}

/// Queue the children of `node` so that they pop in snapshot order
fn push_children<'a>(
    stack: &mut Vec<(&'a ProcessTreeNode, String, bool)>,
    node: &'a ProcessTreeNode,
    indent: &str,
) {
    let last = node.children.len().saturating_sub(1);
    for (index, child) in node.children.iter().enumerate().rev() {
        stack.push((child, indent.to_string(), index == last));
    }
}

/// Render `root` as an indented tree, children in snapshot order
pub(crate) fn render_tree(root: &ProcessTreeNode) -> String {
    let mut lines = vec![describe(root)];
    // (node, indentation of its line, whether it is the last of its siblings)
    let mut stack = Vec::new();
    push_children(&mut stack, root, "");

    while let Some((node, indent, is_last)) = stack.pop() {
        let (connector, continuation) = if is_last {
            ("└─ ", "   ")
        } else {
            ("├─ ", "│  ")
        };
        lines.push(format!("{indent}{connector}{}", describe(node)));
        push_children(&mut stack, node, &format!("{indent}{continuation}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctree_shared::build_tree;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0 B")]
    #[case(100, "100 B")]
    #[case(1024, "1 KB")]
    #[case(1536, "1.5 KB")]
    #[case(3 * 1024 * 1024, "3 MB")]
    #[case(1288490189, "1.2 GB")]
    fn test_format_memory(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_memory(bytes), expected);
    }

    #[test]
    fn test_render_tree() {
        let mut records = vec![
            ProcessRecord::new(1, 0, "init"),
            ProcessRecord::new(10, 1, "sshd"),
            ProcessRecord::new(11, 10, "bash"),
            ProcessRecord::new(12, 10, "bash"),
            ProcessRecord::new(20, 1, "cron"),
        ];
        records[1].memory = Some(2048);
        records[2].command_line = Some("-bash --login".into());
        let tree = build_tree(1, &records, 10).unwrap();

        assert_eq!(
            render_tree(&tree),
            [
                "1 init",
                "├─ 10 sshd (2 KB)",
                "│  ├─ 11 bash `-bash --login`",
                "│  └─ 12 bash",
                "└─ 20 cron",
            ]
            .join("\n")
        );
    }

    #[test]
    fn test_table_marks_missing_attributes() {
        let mut record = ProcessRecord::new(42, 1, "worker");
        record.cpu = Some(12.345);
        let table = build_process_table(&[record]);

        assert!(table.contains("worker"));
        assert!(table.contains("12.3%"));
        assert!(table.contains(" - "));
    }
}
