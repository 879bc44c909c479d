//! The seven pure analyzers that read an [`crate::context::AnalysisContext`]
//! and produce a diagnostic report each (spec §4.3–§4.9).

pub mod churn;
pub mod deadlock;
pub mod gc;
pub mod lock_contention;
pub mod progress;
pub mod stack_groups;
pub mod verdict;

use crate::context::AnalysisContext;

/// Every analyzer's report plus the aggregated verdict, computed together
/// since the verdict reads all of the others.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FullAnalysis {
    pub deadlock: deadlock::DeadlockReport,
    pub progress: progress::ProgressReport,
    pub stack_groups: stack_groups::StackGroupReport,
    pub lock_contention: lock_contention::LockContentionReport,
    pub churn: churn::ChurnReport,
    pub gc: gc::GcActivityReport,
    pub verdict: verdict::StallVerdict,
}

/// Runs every analyzer over `ctx` and aggregates the final verdict.
#[must_use]
pub fn run_all(ctx: &AnalysisContext) -> FullAnalysis {
    let deadlock_report = deadlock::analyze(ctx);
    let progress_report = progress::analyze(ctx);
    let stack_group_report = stack_groups::analyze(ctx);
    let lock_contention_report = lock_contention::analyze(ctx);
    let churn_report = churn::analyze(ctx);
    let gc_report = gc::analyze(ctx);

    let verdict = verdict::aggregate(
        ctx,
        &deadlock_report,
        &progress_report,
        &stack_group_report,
        &lock_contention_report,
        &churn_report,
        &gc_report,
    );

    FullAnalysis {
        deadlock: deadlock_report,
        progress: progress_report,
        stack_groups: stack_group_report,
        lock_contention: lock_contention_report,
        churn: churn_report,
        gc: gc_report,
        verdict,
    }
}
