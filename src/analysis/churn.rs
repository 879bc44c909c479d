//! Thread creation/destruction across consecutive dumps (spec §4.7).
//! Requires at least two dumps; a single-dump context reports empty churn.

use serde::Serialize;

use crate::context::{AnalysisContext, ThreadIdentifier};
use crate::model::ThreadDump;

#[derive(Debug, Clone, Serialize)]
pub struct ChurnReport {
    pub total_created: usize,
    pub total_destroyed: usize,
    pub first_count: usize,
    pub last_count: usize,
    pub net_growth: i64,
    pub potential_leak: bool,
    pub high_churn: bool,
}

impl ChurnReport {
    fn empty() -> Self {
        ChurnReport {
            total_created: 0,
            total_destroyed: 0,
            first_count: 0,
            last_count: 0,
            net_growth: 0,
            potential_leak: false,
            high_churn: false,
        }
    }
}

fn identities(dump: &ThreadDump) -> Vec<ThreadIdentifier> {
    dump.threads.iter().map(ThreadIdentifier::for_thread).collect()
}

/// Runs the thread churn analyzer over every consecutive dump pair.
#[must_use]
pub fn analyze(ctx: &AnalysisContext) -> ChurnReport {
    let dumps = ctx.dumps();
    if dumps.len() < 2 {
        return ChurnReport::empty();
    }

    let mut total_created = 0usize;
    let mut total_destroyed = 0usize;
    let mut counts: Vec<usize> = vec![dumps[0].threads.len()];
    let mut non_decreasing = true;

    for window in dumps.windows(2) {
        let before = identities(&window[0]);
        let after = identities(&window[1]);

        let created = after.iter().filter(|id| !before.contains(id)).count();
        let destroyed = before.iter().filter(|id| !after.contains(id)).count();

        total_created += created;
        total_destroyed += destroyed;
        counts.push(window[1].threads.len());

        if after.len() < before.len() {
            non_decreasing = false;
        }
    }

    let first_count = dumps[0].threads.len();
    let last_count = dumps[dumps.len() - 1].threads.len();
    let net_growth = last_count as i64 - first_count as i64;

    let mean_count = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
    let high_churn = (total_created + total_destroyed) as f64 > 2.0 * mean_count;
    let potential_leak = net_growth > 0 && non_decreasing;

    ChurnReport { total_created, total_destroyed, first_count, last_count, net_growth, potential_leak, high_churn }
}
