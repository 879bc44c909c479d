//! The cross-dump analysis context: holds an ordered sequence of
//! [`ThreadDump`]s plus [`AnalysisOptions`], and exposes thread matching and
//! filtering to the analyzers in [`crate::analysis`].

use std::collections::HashMap;

use regex::Regex;

use crate::domain::{ContextError, ContextWarning, JavaThreadId, NativeId};
use crate::model::{ThreadDump, ThreadInfo};

/// Configuration surface for every analyzer (spec §6 "Analysis options").
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub include_daemon: bool,
    pub include_gc: bool,
    pub include_vm: bool,
    pub ignore_patterns: Vec<Regex>,
    pub focus_patterns: Vec<Regex>,
    pub cpu_epsilon_ms: f64,
    pub min_stack_group_size: usize,
    pub long_held_lock_threshold_seconds: f64,
    pub stall_threshold_percent: f64,
    /// High-CPU carve-out (spec §4.2): a daemon/noise thread is kept anyway
    /// if its CPU share exceeds this fraction of total CPU.
    pub high_cpu_carveout_fraction: f64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            include_daemon: false,
            include_gc: false,
            include_vm: false,
            ignore_patterns: Vec::new(),
            focus_patterns: Vec::new(),
            cpu_epsilon_ms: 2.0,
            min_stack_group_size: 2,
            long_held_lock_threshold_seconds: 20.0,
            stall_threshold_percent: 90.0,
            high_cpu_carveout_fraction: 0.20,
        }
    }
}

impl AnalysisOptions {
    /// Builds options from raw regex source strings, compiling them once
    /// here rather than per-thread at filter time.
    pub fn new(
        ignore_patterns: &[String],
        focus_patterns: &[String],
        overrides: AnalysisOptionsOverrides,
    ) -> Result<Self, ContextError> {
        let compile = |pats: &[String]| -> Result<Vec<Regex>, ContextError> {
            pats.iter()
                .map(|p| Regex::new(p).map_err(|e| ContextError::InvalidOptions(format!("bad regex {p:?}: {e}"))))
                .collect()
        };

        let mut opts = AnalysisOptions {
            ignore_patterns: compile(ignore_patterns)?,
            focus_patterns: compile(focus_patterns)?,
            ..AnalysisOptions::default()
        };
        overrides.apply(&mut opts);

        if opts.cpu_epsilon_ms < 0.0 {
            return Err(ContextError::InvalidOptions("cpu_epsilon_ms must be >= 0".into()));
        }
        if opts.min_stack_group_size == 0 {
            return Err(ContextError::InvalidOptions("min_stack_group_size must be >= 1".into()));
        }
        Ok(opts)
    }
}

/// Optional field overrides for [`AnalysisOptions::new`]; any field left
/// `None` keeps the corresponding [`AnalysisOptions::default`] value.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptionsOverrides {
    pub include_daemon: Option<bool>,
    pub include_gc: Option<bool>,
    pub include_vm: Option<bool>,
    pub cpu_epsilon_ms: Option<f64>,
    pub min_stack_group_size: Option<usize>,
    pub long_held_lock_threshold_seconds: Option<f64>,
    pub stall_threshold_percent: Option<f64>,
}

impl AnalysisOptionsOverrides {
    fn apply(self, opts: &mut AnalysisOptions) {
        if let Some(v) = self.include_daemon {
            opts.include_daemon = v;
        }
        if let Some(v) = self.include_gc {
            opts.include_gc = v;
        }
        if let Some(v) = self.include_vm {
            opts.include_vm = v;
        }
        if let Some(v) = self.cpu_epsilon_ms {
            opts.cpu_epsilon_ms = v;
        }
        if let Some(v) = self.min_stack_group_size {
            opts.min_stack_group_size = v;
        }
        if let Some(v) = self.long_held_lock_threshold_seconds {
            opts.long_held_lock_threshold_seconds = v;
        }
        if let Some(v) = self.stall_threshold_percent {
            opts.stall_threshold_percent = v;
        }
    }
}

/// Identifies one logical thread across dumps, with equality/hash that
/// respects the matching priority from spec §4.2: native id first, then
/// java thread id, then name.
#[derive(Debug, Clone)]
pub enum ThreadIdentifier {
    Native(NativeId),
    Java(JavaThreadId),
    Name(String),
}

impl ThreadIdentifier {
    #[must_use]
    pub fn for_thread(thread: &ThreadInfo) -> Self {
        if let Some(id) = thread.native_id {
            ThreadIdentifier::Native(id)
        } else if let Some(id) = thread.java_thread_id {
            ThreadIdentifier::Java(id)
        } else {
            ThreadIdentifier::Name(thread.name.clone())
        }
    }
}

impl PartialEq for ThreadIdentifier {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ThreadIdentifier::Native(a), ThreadIdentifier::Native(b)) => a == b,
            (ThreadIdentifier::Java(a), ThreadIdentifier::Java(b)) => a == b,
            (ThreadIdentifier::Name(a), ThreadIdentifier::Name(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ThreadIdentifier {}

impl std::hash::Hash for ThreadIdentifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            ThreadIdentifier::Native(id) => {
                0u8.hash(state);
                id.hash(state);
            }
            ThreadIdentifier::Java(id) => {
                1u8.hash(state);
                id.hash(state);
            }
            ThreadIdentifier::Name(name) => {
                2u8.hash(state);
                name.hash(state);
            }
        }
    }
}

/// Holds the ordered dump sequence and compiled options; the shared
/// foundation every analyzer in [`crate::analysis`] reads from.
pub struct AnalysisContext {
    dumps: Vec<ThreadDump>,
    options: AnalysisOptions,
    warnings: Vec<ContextWarning>,
}

impl AnalysisContext {
    /// Builds a context from a non-empty, chronologically ordered dump
    /// sequence. Runs the sanity checks (§4.2) between consecutive dumps
    /// up front and records the resulting warnings.
    pub fn new(dumps: Vec<ThreadDump>, options: AnalysisOptions) -> Result<Self, ContextError> {
        if dumps.is_empty() {
            return Err(ContextError::InvalidOptions("at least one dump is required".into()));
        }
        let mut ctx = AnalysisContext { dumps, options, warnings: Vec::new() };
        ctx.run_sanity_checks();
        Ok(ctx)
    }

    #[must_use]
    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    #[must_use]
    pub fn warnings(&self) -> &[ContextWarning] {
        &self.warnings
    }

    #[must_use]
    pub fn is_single_dump(&self) -> bool {
        self.dumps.len() == 1
    }

    #[must_use]
    pub fn dump_count(&self) -> usize {
        self.dumps.len()
    }

    #[must_use]
    pub fn dumps(&self) -> &[ThreadDump] {
        &self.dumps
    }

    #[must_use]
    pub fn first_dump(&self) -> &ThreadDump {
        &self.dumps[0]
    }

    #[must_use]
    pub fn last_dump(&self) -> &ThreadDump {
        &self.dumps[self.dumps.len() - 1]
    }

    #[must_use]
    pub fn find_thread_by_native_id(&self, dump: &ThreadDump, id: NativeId) -> Option<&ThreadInfo> {
        dump.find_thread_by_native_id(id)
    }

    #[must_use]
    pub fn find_thread_by_name<'a>(&self, dump: &'a ThreadDump, name: &str) -> Option<&'a ThreadInfo> {
        dump.find_thread_by_name(name)
    }

    /// Finds `thread`'s counterpart in `target_dump`, by the priority order
    /// from spec §4.2: native id, then java thread id, then name. A
    /// lower-priority field is only consulted when the higher-priority one
    /// is absent on `thread` itself — a present native id that fails to
    /// find a candidate does not fall through to java-id/name matching.
    #[must_use]
    pub fn match_thread<'a>(&self, thread: &ThreadInfo, target_dump: &'a ThreadDump) -> Option<&'a ThreadInfo> {
        self.match_thread_by_name_fallback(thread, target_dump).0
    }

    /// Same lookup as [`Self::match_thread`], plus whether the match (if
    /// any) was made via the name fallback — i.e. both higher-priority
    /// fields were absent on `thread` — which is the condition spec §7's
    /// `THREAD_NAME_COLLISION` warning exists to flag.
    fn match_thread_by_name_fallback<'a>(
        &self,
        thread: &ThreadInfo,
        target_dump: &'a ThreadDump,
    ) -> (Option<&'a ThreadInfo>, bool) {
        if let Some(id) = thread.native_id {
            return (target_dump.find_thread_by_native_id(id), false);
        }
        if let Some(id) = thread.java_thread_id {
            return (target_dump.threads.iter().find(|t| t.java_thread_id == Some(id)), false);
        }
        (target_dump.find_thread_by_name(&thread.name), true)
    }

    /// Maps every logical thread identity to its ordered appearances across
    /// dumps (one entry per dump it appears in, in dump order).
    #[must_use]
    pub fn matched_threads(&self) -> HashMap<IdentifierKey, Vec<(usize, &ThreadInfo)>> {
        let mut out: HashMap<IdentifierKey, Vec<(usize, &ThreadInfo)>> = HashMap::new();
        for (dump_index, dump) in self.dumps.iter().enumerate() {
            for thread in &dump.threads {
                let key = IdentifierKey(ThreadIdentifier::for_thread(thread));
                out.entry(key).or_default().push((dump_index, thread));
            }
        }
        out
    }

    /// Threads in `dump` surviving the filter pipeline (spec §4.2).
    #[must_use]
    pub fn filtered_threads<'a>(&self, dump: &'a ThreadDump) -> Vec<&'a ThreadInfo> {
        let total_cpu = dump.total_cpu_time_sec();
        let carveout_threshold = total_cpu * self.options.high_cpu_carveout_fraction;

        dump.threads
            .iter()
            .filter(|t| {
                let high_cpu = t.cpu_time_sec.map(|c| c > carveout_threshold).unwrap_or(false) && total_cpu > 0.0;
                let focus_match = self.options.focus_patterns.iter().any(|re| re.is_match(&t.name));
                let carved_out = high_cpu || focus_match;

                if !self.options.include_daemon && t.daemon && !carved_out {
                    return false;
                }
                if !self.options.include_gc && t.is_gc_background() && !carved_out {
                    return false;
                }
                if !self.options.include_vm && t.is_vm_background() && !carved_out {
                    return false;
                }
                true
            })
            .filter(|t| !self.options.ignore_patterns.iter().any(|re| re.is_match(&t.name)))
            .filter(|t| {
                self.options.focus_patterns.is_empty()
                    || self.options.focus_patterns.iter().any(|re| re.is_match(&t.name))
            })
            .collect()
    }

    fn run_sanity_checks(&mut self) {
        let mut warnings = Vec::new();
        let mut collisions_seen = std::collections::HashSet::new();
        for i in 1..self.dumps.len() {
            let (before, after) = self.dumps.split_at(i);
            let prev = &before[before.len() - 1];
            let cur = &after[0];
            for thread in &cur.threads {
                let (matched, by_name_fallback) = self.match_thread_by_name_fallback(thread, prev);
                let Some(prev_thread) = matched else { continue };
                if by_name_fallback && collisions_seen.insert(thread.name.clone()) {
                    warnings.push(ContextWarning::ThreadNameCollision(thread.name.clone()));
                }
                let (Some(prev_elapsed), Some(cur_elapsed)) = (prev_thread.elapsed_time_sec, thread.elapsed_time_sec)
                else {
                    continue;
                };
                if cur_elapsed == prev_elapsed {
                    let distinct_capture_times = match (prev.captured_at, cur.captured_at) {
                        (Some(a), Some(b)) => a != b,
                        _ => false,
                    };
                    if distinct_capture_times {
                        warnings.push(ContextWarning::DuplicateDump {
                            first: i - 1,
                            second: i,
                            thread: thread.name.clone(),
                        });
                    }
                }
            }
        }
        self.warnings = warnings;
    }
}

/// A hashable wrapper so [`ThreadIdentifier`] can key a `HashMap` directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentifierKey(pub ThreadIdentifier);

/// Compares `elapsed_time_sec` across two dumps for the same logical thread;
/// a decrease means the native/java ids were reused by a new OS thread
/// (spec §4.2 "RESTARTED").
#[must_use]
pub fn elapsed_decreased(prev: &ThreadInfo, cur: &ThreadInfo) -> bool {
    match (prev.elapsed_time_sec, cur.elapsed_time_sec) {
        (Some(a), Some(b)) => b < a,
        _ => false,
    }
}
