//! Lock-dependency-graph cycle detection, plus surfacing parser-confirmed
//! deadlocks from the `Found one Java-level deadlock:` section (spec §4.3).

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::context::AnalysisContext;
use crate::domain::LockId;
use crate::model::ThreadInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    Ok,
}

/// One maximal thread→lock→thread→… cycle, either inferred from the lock
/// graph or lifted verbatim from a parser-confirmed deadlock block.
#[derive(Debug, Clone, Serialize)]
pub struct DetectedDeadlock {
    pub thread_names: Vec<String>,
    pub jvm_confirmed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeadlockReport {
    pub severity: Severity,
    pub deadlocks: Vec<DetectedDeadlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Node<'a> {
    Thread(&'a str),
    Lock(&'a LockId),
}

/// Runs the deadlock analyzer over the last dump in `ctx`.
#[must_use]
pub fn analyze(ctx: &AnalysisContext) -> DeadlockReport {
    let dump = ctx.last_dump();

    let mut deadlocks: Vec<DetectedDeadlock> = dump
        .deadlocks
        .iter()
        .map(|d| DetectedDeadlock {
            thread_names: d.threads.iter().map(|t| t.thread_name.clone()).collect(),
            jvm_confirmed: true,
        })
        .collect();

    deadlocks.extend(infer_from_graph(&dump.threads));

    let severity = if deadlocks.is_empty() { Severity::Ok } else { Severity::Critical };
    DeadlockReport { severity, deadlocks }
}

fn infer_from_graph(threads: &[ThreadInfo]) -> Vec<DetectedDeadlock> {
    let mut adjacency: HashMap<Node, Vec<Node>> = HashMap::new();

    for t in threads {
        if let Some(waiting) = &t.waiting_on_lock {
            adjacency.entry(Node::Thread(&t.name)).or_default().push(Node::Lock(waiting));
        }
        for lock in &t.locks {
            if lock.kind == crate::domain::LockKind::Locked {
                adjacency.entry(Node::Lock(&lock.lock_id)).or_default().push(Node::Thread(&t.name));
            }
        }
    }

    let mut found: Vec<Vec<String>> = Vec::new();
    let mut globally_visited: HashSet<Node> = HashSet::new();

    for t in threads {
        let start = Node::Thread(&t.name);
        if globally_visited.contains(&start) {
            continue;
        }
        let mut stack_path: Vec<Node> = Vec::new();
        let mut on_stack: HashSet<Node> = HashSet::new();
        if let Some(cycle) = dfs(start, &adjacency, &mut stack_path, &mut on_stack, &mut globally_visited) {
            let names: Vec<String> =
                cycle.into_iter().filter_map(|n| if let Node::Thread(name) = n { Some(name.to_string()) } else { None }).collect();
            if names.len() >= 2 {
                found.push(names);
            }
        }
    }

    found
        .into_iter()
        .map(|thread_names| DetectedDeadlock { thread_names, jvm_confirmed: false })
        .collect()
}

fn dfs<'a>(
    node: Node<'a>,
    adjacency: &HashMap<Node<'a>, Vec<Node<'a>>>,
    path: &mut Vec<Node<'a>>,
    on_stack: &mut HashSet<Node<'a>>,
    globally_visited: &mut HashSet<Node<'a>>,
) -> Option<Vec<Node<'a>>> {
    path.push(node);
    on_stack.insert(node);
    globally_visited.insert(node);

    if let Some(neighbors) = adjacency.get(&node) {
        for &next in neighbors {
            if on_stack.contains(&next) {
                let start_idx = path.iter().position(|&n| n == next).unwrap();
                return Some(path[start_idx..].to_vec());
            }
            if !globally_visited.contains(&next) {
                if let Some(cycle) = dfs(next, adjacency, path, on_stack, globally_visited) {
                    return Some(cycle);
                }
            }
        }
    }

    path.pop();
    on_stack.remove(&node);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AnalysisContext, AnalysisOptions};
    use crate::domain::{LockId, LockKind, NativeId};
    use crate::model::{LockInfo, ThreadDump};

    fn thread(name: &str, locked: Option<&str>, waiting: Option<&str>) -> ThreadInfo {
        let mut locks = Vec::new();
        if let Some(l) = locked {
            locks.push(LockInfo { lock_id: LockId(l.to_string()), class_name: "java.lang.Object".into(), kind: LockKind::Locked });
        }
        ThreadInfo {
            name: name.to_string(),
            java_thread_id: None,
            native_id: Some(NativeId(name.len() as u64)),
            priority: None,
            daemon: false,
            state: Some(crate::domain::ThreadState::Blocked),
            cpu_time_sec: None,
            elapsed_time_sec: None,
            stack: vec![],
            locks,
            waiting_on_lock: waiting.map(|w| LockId(w.to_string())),
            extra_lines: vec![],
        }
    }

    fn dump(threads: Vec<ThreadInfo>) -> ThreadDump {
        ThreadDump {
            timestamp: None,
            jvm_banner: None,
            threads,
            jni_info: None,
            source_format: crate::domain::SourceFormat::Unknown,
            deadlocks: vec![],
            warnings: vec![],
            captured_at: None,
        }
    }

    #[test]
    fn two_thread_cycle_is_detected() {
        let a = thread("A", Some("0x1"), Some("0x2"));
        let b = thread("B", Some("0x2"), Some("0x1"));
        let ctx = AnalysisContext::new(vec![dump(vec![a, b])], AnalysisOptions::default()).unwrap();
        let report = analyze(&ctx);
        assert_eq!(report.severity, Severity::Critical);
        assert_eq!(report.deadlocks.len(), 1);
        assert_eq!(report.deadlocks[0].thread_names.len(), 2);
        assert!(!report.deadlocks[0].jvm_confirmed);
    }

    #[test]
    fn no_cycle_is_ok() {
        let a = thread("A", Some("0x1"), None);
        let ctx = AnalysisContext::new(vec![dump(vec![a])], AnalysisOptions::default()).unwrap();
        let report = analyze(&ctx);
        assert_eq!(report.severity, Severity::Ok);
        assert!(report.deadlocks.is_empty());
    }
}
