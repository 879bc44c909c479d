//! Aggregates every analyzer's output into a single stall verdict (spec §4.9).

use serde::Serialize;

use crate::analysis::churn::ChurnReport;
use crate::analysis::deadlock::{DeadlockReport, Severity};
use crate::analysis::gc::GcActivityReport;
use crate::analysis::lock_contention::LockContentionReport;
use crate::analysis::progress::{Classification, ProgressReport};
use crate::analysis::stack_groups::StackGroupReport;
use crate::context::AnalysisContext;
use crate::domain::ThreadState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Ok,
    SuspectedStall,
    Deadlock,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct StallVerdict {
    pub verdict: Verdict,
    pub confidence: Confidence,
    pub reasons: Vec<String>,
}

impl Verdict {
    /// Maps to the live-mode exit code table (spec §6).
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Ok => 0,
            Verdict::SuspectedStall => 1,
            Verdict::Deadlock => 2,
            Verdict::Error => 3,
        }
    }
}

fn is_stall_classification(c: Classification) -> bool {
    matches!(c, Classification::RunnableNoProgress | Classification::BlockedOnLock | Classification::Stuck)
}

/// Aggregates the deadlock, progress, stack group, lock contention, churn,
/// and GC analyzer outputs into one verdict.
#[must_use]
pub fn aggregate(
    ctx: &AnalysisContext,
    deadlock: &DeadlockReport,
    progress: &ProgressReport,
    stack_groups: &StackGroupReport,
    lock_contention: &LockContentionReport,
    churn: &ChurnReport,
    _gc: &GcActivityReport,
) -> StallVerdict {
    let mut reasons = Vec::new();

    if deadlock.severity == Severity::Critical {
        for dl in &deadlock.deadlocks {
            reasons.push(format!(
                "deadlock among threads: {}{}",
                dl.thread_names.join(", "),
                if dl.jvm_confirmed { " (JVM-confirmed)" } else { " (inferred from lock graph)" }
            ));
        }
        return StallVerdict { verdict: Verdict::Deadlock, confidence: Confidence::High, reasons };
    }

    let non_ignored: Vec<Classification> =
        progress.per_thread.iter().flat_map(|p| p.classifications.iter().copied()).filter(|c| *c != Classification::Ignored).collect();

    let stall_fraction = if non_ignored.is_empty() {
        0.0
    } else {
        non_ignored.iter().filter(|c| is_stall_classification(**c)).count() as f64 / non_ignored.len() as f64
    };

    if let Some(group) = stack_groups.groups.first() {
        reasons.push(format!("largest identical-stack group: {} threads", group.thread_names.len()));
    }
    if let Some(longest) = lock_contention.contentions.iter().filter(|c| c.long_held).max_by(|a, b| {
        a.hold_duration_sec.partial_cmp(&b.hold_duration_sec).unwrap_or(std::cmp::Ordering::Equal)
    }) {
        reasons.push(format!(
            "long-held lock {} blocking {} waiter(s)",
            longest.lock_id,
            longest.waiters.len()
        ));
    }
    if churn.potential_leak {
        reasons.push(format!("thread count grew from {} to {} (potential leak)", churn.first_count, churn.last_count));
    }

    if !ctx.is_single_dump() && non_ignored.len() >= 2 && stall_fraction * 100.0 >= ctx.options().stall_threshold_percent
    {
        reasons.insert(0, format!("{:.0}% of matched threads show no progress", stall_fraction * 100.0));
        return StallVerdict { verdict: Verdict::SuspectedStall, confidence: Confidence::High, reasons };
    }

    if !ctx.is_single_dump() {
        let runnable_classifications: Vec<Classification> = progress
            .per_thread
            .iter()
            .flat_map(|p| p.classifications.iter().copied().zip(p.cur_states.iter().copied()))
            .filter(|(_, state)| *state == Some(ThreadState::Runnable))
            .map(|(c, _)| c)
            .collect();
        let all_no_progress = !runnable_classifications.is_empty()
            && runnable_classifications.iter().all(|c| *c == Classification::RunnableNoProgress);
        if all_no_progress {
            reasons.insert(0, "every runnable thread shows no CPU progress".to_string());
            return StallVerdict { verdict: Verdict::SuspectedStall, confidence: Confidence::Medium, reasons };
        }
    }

    StallVerdict { verdict: Verdict::Ok, confidence: Confidence::Low, reasons }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_spec_table() {
        assert_eq!(Verdict::Ok.exit_code(), 0);
        assert_eq!(Verdict::SuspectedStall.exit_code(), 1);
        assert_eq!(Verdict::Deadlock.exit_code(), 2);
        assert_eq!(Verdict::Error.exit_code(), 3);
    }
}
