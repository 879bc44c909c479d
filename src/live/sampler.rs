//! Live sampling loop: periodically captures dumps from a running JVM and
//! returns the final verdict once enough evidence has accumulated or the
//! overall timeout elapses (spec §4.10).

use std::thread;
use std::time::{Duration, Instant};

use crate::analysis::{self, FullAnalysis};
use crate::context::{AnalysisContext, AnalysisOptions};
use crate::domain::CaptureError;
use crate::live::capture::DumpCapture;
use crate::model::ThreadDump;

/// Configuration for one live sampling run.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub pid: u32,
    pub interval: Duration,
    pub overall_timeout: Duration,
    pub per_capture_timeout: Duration,
}

/// The outcome of a live run: either a completed analysis, or a terminal
/// capture failure (spec §7 `CAPTURE_*` maps to the ERROR verdict).
pub enum SamplerOutcome {
    Analysis(FullAnalysis),
    Error(CaptureError),
}

/// Runs the sampling loop described in spec §4.10: capture, analyze, and
/// stop early once at least two dumps are in and the verdict is already
/// DEADLOCK, or once the overall timeout elapses.
pub fn run(
    config: &SamplerConfig,
    capture: &dyn DumpCapture,
    options: AnalysisOptions,
) -> SamplerOutcome {
    if !capture.process_exists(config.pid) {
        return SamplerOutcome::Error(CaptureError::ProcessNotFound(config.pid));
    }

    let started = Instant::now();
    let mut dumps: Vec<ThreadDump> = Vec::new();

    loop {
        let remaining = config.overall_timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() && !dumps.is_empty() {
            break;
        }

        let capture_timeout = config.per_capture_timeout.min(remaining.max(Duration::from_millis(1)));
        match capture.capture(config.pid, capture_timeout) {
            Ok(text) => match crate::parser::parse(&text) {
                Ok(mut dump) => {
                    dump.captured_at = Some(std::time::SystemTime::now());
                    dumps.push(dump);
                }
                Err(_) => continue,
            },
            Err(err) => {
                if dumps.is_empty() {
                    return SamplerOutcome::Error(err);
                }
                break;
            }
        }

        if dumps.len() >= 2 {
            if let Ok(ctx) = AnalysisContext::new(dumps.clone(), options.clone()) {
                let analysis = analysis::run_all(&ctx);
                if analysis.verdict.verdict == analysis::verdict::Verdict::Deadlock {
                    return SamplerOutcome::Analysis(analysis);
                }
            }
        }

        if started.elapsed() >= config.overall_timeout {
            break;
        }
        thread::sleep(config.interval.min(config.overall_timeout.saturating_sub(started.elapsed())));
    }

    if dumps.is_empty() {
        return SamplerOutcome::Error(CaptureError::Interrupted(config.pid));
    }

    match AnalysisContext::new(dumps, options) {
        Ok(ctx) => SamplerOutcome::Analysis(analysis::run_all(&ctx)),
        Err(_) => SamplerOutcome::Error(CaptureError::Interrupted(config.pid)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct ScriptedCapture {
        dumps: RefCell<Vec<String>>,
    }

    impl DumpCapture for ScriptedCapture {
        fn capture(&self, _pid: u32, _timeout: Duration) -> Result<String, CaptureError> {
            let mut dumps = self.dumps.borrow_mut();
            if dumps.is_empty() {
                Err(CaptureError::Timeout(1, Duration::from_secs(1)))
            } else {
                Ok(dumps.remove(0))
            }
        }

        fn process_exists(&self, _pid: u32) -> bool {
            true
        }
    }

    const SIMPLE_DUMP: &str = "\"main\" #1 tid=0x1 nid=0x1\n   java.lang.Thread.State: RUNNABLE\n\tat A.a(A.java:1)\n";

    #[test]
    fn missing_process_is_an_error() {
        struct AbsentCapture;
        impl DumpCapture for AbsentCapture {
            fn capture(&self, _pid: u32, _timeout: Duration) -> Result<String, CaptureError> {
                unreachable!()
            }
            fn process_exists(&self, _pid: u32) -> bool {
                false
            }
        }
        let config = SamplerConfig {
            pid: 1,
            interval: Duration::from_millis(1),
            overall_timeout: Duration::from_millis(10),
            per_capture_timeout: Duration::from_millis(5),
        };
        let outcome = run(&config, &AbsentCapture, AnalysisOptions::default());
        assert!(matches!(outcome, SamplerOutcome::Error(CaptureError::ProcessNotFound(1))));
    }

    #[test]
    fn two_captures_produce_an_analysis() {
        let capture = ScriptedCapture { dumps: RefCell::new(vec![SIMPLE_DUMP.to_string(), SIMPLE_DUMP.to_string()]) };
        let config = SamplerConfig {
            pid: 1,
            interval: Duration::from_millis(1),
            overall_timeout: Duration::from_millis(50),
            per_capture_timeout: Duration::from_millis(20),
        };
        let outcome = run(&config, &capture, AnalysisOptions::default());
        assert!(matches!(outcome, SamplerOutcome::Analysis(_)));
    }
}
