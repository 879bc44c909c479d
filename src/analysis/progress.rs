//! Classifies each matched thread's progress across consecutive dump pairs
//! (spec §4.4).

use log::warn;
use serde::Serialize;

use crate::context::{elapsed_decreased, AnalysisContext, ThreadIdentifier};
use crate::domain::ThreadState;
use crate::model::ThreadInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Ignored,
    Terminated,
    Active,
    RunnableNoProgress,
    BlockedOnLock,
    Stuck,
    WaitingExpected,
    TimedWaitingExpected,
    Restarted,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadProgress {
    pub thread_name: String,
    pub classifications: Vec<Classification>,
    /// The thread's state in dump B of each consecutive pair, aligned
    /// index-for-index with `classifications`; lets verdict aggregation
    /// filter by actual thread state rather than by classification label.
    pub cur_states: Vec<Option<ThreadState>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgressSummary {
    pub total: usize,
    pub active: usize,
    pub no_progress: usize,
    pub blocked: usize,
    pub stuck: usize,
    pub ignored: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    pub per_thread: Vec<ThreadProgress>,
    pub summary: ProgressSummary,
    pub cpu_time_missing: bool,
}

const BACKGROUND_NAME_PATTERNS: &[&str] =
    &["GC", "VM Thread", "VM Periodic", "Reference Handler", "Finalizer", "Common-Cleaner", "Signal Dispatcher"];

fn is_background_name(name: &str) -> bool {
    BACKGROUND_NAME_PATTERNS.iter().any(|p| name.starts_with(p) || name == *p)
}

/// Classifies one (A, B) consecutive-dump pair for a single matched thread.
fn classify_pair(prev: &ThreadInfo, cur: &ThreadInfo, epsilon_ms: f64, cpu_time_present: bool) -> Classification {
    if elapsed_decreased(prev, cur) {
        return Classification::Restarted;
    }

    let stack_unchanged = prev.stack.len() == cur.stack.len()
        && prev.stack.iter().zip(cur.stack.iter()).all(|(a, b)| a.same_location(b));

    let delta_cpu = match (prev.cpu_time_sec, cur.cpu_time_sec) {
        (Some(a), Some(b)) => Some(b - a),
        _ => None,
    };

    match cur.state {
        Some(ThreadState::New) => Classification::Ignored,
        Some(ThreadState::Terminated) => Classification::Terminated,
        Some(ThreadState::Runnable) => {
            if !cpu_time_present {
                if stack_unchanged {
                    Classification::RunnableNoProgress
                } else {
                    Classification::Active
                }
            } else if delta_cpu.map(|d| d * 1000.0 > epsilon_ms).unwrap_or(true) {
                Classification::Active
            } else if stack_unchanged {
                Classification::RunnableNoProgress
            } else {
                Classification::Active
            }
        }
        Some(ThreadState::Blocked) => {
            if prev.waiting_on_lock.is_some() && prev.waiting_on_lock == cur.waiting_on_lock {
                Classification::Stuck
            } else {
                Classification::BlockedOnLock
            }
        }
        Some(ThreadState::Waiting) => {
            if is_background_name(&cur.name) {
                Classification::WaitingExpected
            } else if stack_unchanged && delta_cpu.map(|d| d * 1000.0 <= epsilon_ms).unwrap_or(true) {
                Classification::Stuck
            } else {
                Classification::Active
            }
        }
        Some(ThreadState::TimedWaiting) => {
            if is_background_name(&cur.name) {
                Classification::TimedWaitingExpected
            } else if stack_unchanged {
                Classification::Stuck
            } else {
                Classification::Active
            }
        }
        None => Classification::Ignored,
    }
}

/// Runs the thread progress analyzer over every consecutive dump pair.
#[must_use]
pub fn analyze(ctx: &AnalysisContext) -> ProgressReport {
    let epsilon_ms = ctx.options().cpu_epsilon_ms;
    let dumps = ctx.dumps();
    let mut cpu_time_present = true;
    for d in dumps {
        if d.threads.iter().any(|t| t.cpu_time_sec.is_none()) {
            cpu_time_present = false;
        }
    }
    if !cpu_time_present {
        warn!("CPU time absent from at least one dump; progress classification degrades to stack-identity only");
    }

    let matched = ctx.matched_threads();
    let mut per_thread = Vec::new();
    let mut summary = ProgressSummary::default();

    for (key, appearances) in &matched {
        let name = match &key.0 {
            ThreadIdentifier::Name(n) => n.clone(),
            _ => appearances.first().map(|(_, t)| t.name.clone()).unwrap_or_default(),
        };
        let mut classifications = Vec::new();
        let mut cur_states = Vec::new();
        for window in appearances.windows(2) {
            let (_, prev) = window[0];
            let (_, cur) = window[1];
            classifications.push(classify_pair(prev, cur, epsilon_ms, cpu_time_present));
            cur_states.push(cur.state);
        }
        for c in &classifications {
            summary.total += 1;
            match c {
                Classification::Active => summary.active += 1,
                Classification::RunnableNoProgress => summary.no_progress += 1,
                Classification::BlockedOnLock => summary.blocked += 1,
                Classification::Stuck => summary.stuck += 1,
                Classification::Ignored => summary.ignored += 1,
                _ => {}
            }
        }
        per_thread.push(ThreadProgress { thread_name: name, classifications, cur_states });
    }
    per_thread.sort_by(|a, b| a.thread_name.cmp(&b.thread_name));

    ProgressReport { per_thread, summary, cpu_time_missing: !cpu_time_present }
}
