//! Clusters threads in the last dump by identical stack-trace shape
//! (spec §4.5).

use serde::Serialize;

use crate::context::AnalysisContext;
use crate::model::{StackFrame, ThreadInfo};

#[derive(Debug, Clone, Serialize)]
pub struct StackGroup {
    pub thread_names: Vec<String>,
    pub stack: Vec<StackFrame>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StackGroupReport {
    pub groups: Vec<StackGroup>,
}

fn stacks_equal(a: &[StackFrame], b: &[StackFrame]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same_location(y))
}

/// Groups `threads` by identical stack shape, keeping only groups with at
/// least `min_size` members, sorted largest-first.
#[must_use]
pub fn group_threads(threads: &[&ThreadInfo], min_size: usize) -> Vec<StackGroup> {
    let mut groups: Vec<(Vec<StackFrame>, Vec<String>)> = Vec::new();

    for t in threads {
        match groups.iter_mut().find(|(stack, _)| stacks_equal(stack, &t.stack)) {
            Some((_, names)) => names.push(t.name.clone()),
            None => groups.push((t.stack.clone(), vec![t.name.clone()])),
        }
    }

    let mut groups: Vec<StackGroup> = groups
        .into_iter()
        .filter(|(_, names)| names.len() >= min_size)
        .map(|(stack, thread_names)| StackGroup { thread_names, stack })
        .collect();

    groups.sort_by(|a, b| b.thread_names.len().cmp(&a.thread_names.len()));
    groups
}

/// Runs the stack group analyzer over the last dump's filtered threads.
#[must_use]
pub fn analyze(ctx: &AnalysisContext) -> StackGroupReport {
    let threads = ctx.filtered_threads(ctx.last_dump());
    let groups = group_threads(&threads, ctx.options().min_stack_group_size);
    StackGroupReport { groups }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NativeId;

    fn thread_with_stack(name: &str, frame_method: &str) -> ThreadInfo {
        ThreadInfo {
            name: name.to_string(),
            java_thread_id: None,
            native_id: Some(NativeId(name.len() as u64)),
            priority: None,
            daemon: false,
            state: None,
            cpu_time_sec: None,
            elapsed_time_sec: None,
            stack: vec![StackFrame {
                class_name: "Socket".into(),
                method_name: frame_method.into(),
                file_name: None,
                line_number: None,
                native: false,
            }],
            locks: vec![],
            waiting_on_lock: None,
            extra_lines: vec![],
        }
    }

    #[test]
    fn groups_identical_stacks_and_sorts_by_size() {
        let a = thread_with_stack("a", "read");
        let b = thread_with_stack("b", "read");
        let c = thread_with_stack("c", "write");
        let d = thread_with_stack("d", "write");
        let e = thread_with_stack("e", "write");
        let refs: Vec<&ThreadInfo> = vec![&a, &b, &c, &d, &e];
        let groups = group_threads(&refs, 2);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].thread_names.len(), 3);
        assert_eq!(groups[1].thread_names.len(), 2);
    }

    #[test]
    fn singleton_groups_are_dropped_below_min_size() {
        let a = thread_with_stack("a", "unique");
        let refs: Vec<&ThreadInfo> = vec![&a];
        assert!(group_threads(&refs, 2).is_empty());
    }
}
