//! Per-lock owner/waiter summary over the last dump (spec §4.6).

use serde::Serialize;

use crate::context::AnalysisContext;
use crate::domain::{LockId, LockKind};
use crate::model::ThreadInfo;

#[derive(Debug, Clone, Serialize)]
pub struct LockContention {
    pub lock_id: LockId,
    pub owner: Option<String>,
    pub waiters: Vec<String>,
    pub hold_duration_sec: Option<f64>,
    pub long_held: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LockContentionSummary {
    pub total_contended_locks: usize,
    pub total_waiters: usize,
    pub long_held_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LockContentionReport {
    pub contentions: Vec<LockContention>,
    pub summary: LockContentionSummary,
}

/// Runs the lock contention analyzer over the last dump in `ctx`.
#[must_use]
pub fn analyze(ctx: &AnalysisContext) -> LockContentionReport {
    let dump = ctx.last_dump();
    let threshold = ctx.options().long_held_lock_threshold_seconds;

    let mut contentions = Vec::new();
    let mut seen_ids: Vec<&LockId> = Vec::new();

    for t in &dump.threads {
        for lock in &t.locks {
            if seen_ids.contains(&&lock.lock_id) {
                continue;
            }
            seen_ids.push(&lock.lock_id);

            let owner = owner_of(&dump.threads, &lock.lock_id);
            let waiters = waiters_of(&dump.threads, &lock.lock_id);
            if waiters.is_empty() {
                continue;
            }

            let hold_duration_sec = owner.and_then(|name| {
                dump.find_thread_by_name(name).and_then(|owner_thread| owner_thread.elapsed_time_sec)
            });
            let long_held = hold_duration_sec.map(|d| d >= threshold).unwrap_or(false);

            contentions.push(LockContention {
                lock_id: lock.lock_id.clone(),
                owner: owner.map(str::to_string),
                waiters: waiters.iter().map(|s| (*s).to_string()).collect(),
                hold_duration_sec,
                long_held,
            });
        }
    }

    let summary = LockContentionSummary {
        total_contended_locks: contentions.len(),
        total_waiters: contentions.iter().map(|c| c.waiters.len()).sum(),
        long_held_count: contentions.iter().filter(|c| c.long_held).count(),
    };

    LockContentionReport { contentions, summary }
}

fn owner_of<'a>(threads: &'a [ThreadInfo], lock_id: &LockId) -> Option<&'a str> {
    threads
        .iter()
        .find(|t| t.locks.iter().any(|l| l.kind == LockKind::Locked && &l.lock_id == lock_id))
        .map(|t| t.name.as_str())
}

fn waiters_of<'a>(threads: &'a [ThreadInfo], lock_id: &LockId) -> Vec<&'a str> {
    threads
        .iter()
        .filter(|t| t.waiting_on_lock.as_ref() == Some(lock_id))
        .map(|t| t.name.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AnalysisOptions;
    use crate::domain::NativeId;
    use crate::model::{LockInfo, ThreadDump};

    fn thread(name: &str, locked: Option<&str>, waiting: Option<&str>, elapsed: Option<f64>) -> ThreadInfo {
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
            state: None,
            cpu_time_sec: None,
            elapsed_time_sec: elapsed,
            stack: vec![],
            locks,
            waiting_on_lock: waiting.map(|w| LockId(w.to_string())),
            extra_lines: vec![],
        }
    }

    #[test]
    fn long_held_lock_is_flagged() {
        let owner = thread("owner", Some("0x1"), None, Some(30.0));
        let waiter = thread("waiter", None, Some("0x1"), None);
        let dump = ThreadDump {
            timestamp: None,
            jvm_banner: None,
            threads: vec![owner, waiter],
            jni_info: None,
            source_format: crate::domain::SourceFormat::Unknown,
            deadlocks: vec![],
            warnings: vec![],
            captured_at: None,
        };
        let ctx = AnalysisContext::new(vec![dump], AnalysisOptions::default()).unwrap();
        let report = analyze(&ctx);
        assert_eq!(report.contentions.len(), 1);
        assert!(report.contentions[0].long_held);
        assert_eq!(report.summary.long_held_count, 1);
    }

    #[test]
    fn lock_with_no_waiters_is_not_reported() {
        let owner = thread("owner", Some("0x1"), None, Some(5.0));
        let dump = ThreadDump {
            timestamp: None,
            jvm_banner: None,
            threads: vec![owner],
            jni_info: None,
            source_format: crate::domain::SourceFormat::Unknown,
            deadlocks: vec![],
            warnings: vec![],
            captured_at: None,
        };
        let ctx = AnalysisContext::new(vec![dump], AnalysisOptions::default()).unwrap();
        assert!(analyze(&ctx).contentions.is_empty());
    }
}
