//! GC-thread activity summary, usable on a single dump (spec §4.8).

use serde::Serialize;

use crate::context::AnalysisContext;
use crate::model::ThreadDump;

#[derive(Debug, Clone, Serialize)]
pub struct GcActivity {
    pub gc_thread_count: usize,
    pub gc_cpu_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GcActivityReport {
    pub per_dump: Vec<GcActivity>,
}

fn activity_for(dump: &ThreadDump) -> GcActivity {
    let gc_threads: Vec<_> = dump.threads.iter().filter(|t| t.is_gc_background()).collect();
    let total_cpu = dump.total_cpu_time_sec();
    let gc_cpu: f64 = gc_threads.iter().filter_map(|t| t.cpu_time_sec).sum();

    GcActivity {
        gc_thread_count: gc_threads.len(),
        gc_cpu_percentage: if total_cpu > 0.0 { gc_cpu / total_cpu } else { 0.0 },
    }
}

/// Runs the GC activity analyzer over every dump in `ctx`.
#[must_use]
pub fn analyze(ctx: &AnalysisContext) -> GcActivityReport {
    GcActivityReport { per_dump: ctx.dumps().iter().map(activity_for).collect() }
}
