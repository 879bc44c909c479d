//! The lenient dump parser state machine (spec §4.1, design note §9: "Model
//! parse position as an explicit mode value ... do not rely on method
//! polymorphism").

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{LockId, ParseWarning, SourceFormat, ThreadState};
use crate::model::{DeadlockInfo, DeadlockedThread, JniInfo, LockInfo, StackFrame, ThreadDump, ThreadInfo};

use super::lines::{
    build_stack_frame, lock_kind_from_verb, lock_kind_is_waiting, parse_header_tokens, parse_lenient,
    parse_thread_state, DEADLOCK_HELD_BY, DEADLOCK_STACK_MARKER, DEADLOCK_THREAD_NAME, DEADLOCK_TRIGGER,
    DEADLOCK_WAITING_TO_LOCK, JNI_MEMORY, JNI_REFS, LOCK_LINE, STACK_FRAME, THREAD_HEADER, THREAD_STATE,
};

static DATE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseMode {
    TopLevel,
    InDeadlockDesc,
    InDeadlockStack,
}

/// A single line's worth of thread-body content, buffered when no thread is
/// currently open so it can be attached to the next header (spec "Reverse
/// order tolerance").
#[derive(Debug, Clone)]
enum BodyLine {
    State(ThreadState),
    UnknownState(String),
    Frame(StackFrame),
    Lock(LockInfo, bool),
    Extra(String),
}

/// Accumulates one thread's fields while its block is open.
#[derive(Debug, Default)]
struct ThreadAccumulator {
    name: String,
    java_thread_id: Option<u64>,
    native_id: Option<String>,
    priority: Option<u32>,
    daemon: bool,
    cpu_time_sec: Option<f64>,
    elapsed_time_sec: Option<f64>,
    state: Option<ThreadState>,
    stack: Vec<StackFrame>,
    locks: Vec<LockInfo>,
    waiting_on_lock: Option<LockId>,
    extra_lines: Vec<String>,
}

impl ThreadAccumulator {
    /// Applies one body line, returning a warning when the line degraded
    /// something (currently only an unrecognized thread state).
    fn apply(&mut self, body: BodyLine) -> Option<ParseWarning> {
        match body {
            BodyLine::State(state) => {
                self.state = Some(state);
                None
            }
            BodyLine::UnknownState(raw) => {
                self.state = Some(ThreadState::Runnable);
                Some(ParseWarning::UnknownThreadState { thread: self.name.clone(), raw })
            }
            BodyLine::Frame(frame) => {
                self.stack.push(frame);
                None
            }
            BodyLine::Lock(lock, is_waiting) => {
                if is_waiting {
                    self.waiting_on_lock = Some(lock.lock_id.clone());
                }
                self.locks.push(lock);
                None
            }
            BodyLine::Extra(line) => {
                self.extra_lines.push(line);
                None
            }
        }
    }

    fn finish(self) -> ThreadInfo {
        ThreadInfo {
            name: self.name,
            java_thread_id: self.java_thread_id.map(crate::domain::JavaThreadId),
            native_id: self
                .native_id
                .and_then(|s| parse_native_id(&s))
                .map(crate::domain::NativeId),
            priority: self.priority,
            daemon: self.daemon,
            state: self.state,
            cpu_time_sec: self.cpu_time_sec,
            elapsed_time_sec: self.elapsed_time_sec,
            stack: self.stack,
            locks: self.locks,
            waiting_on_lock: self.waiting_on_lock,
            extra_lines: self.extra_lines,
        }
    }
}

fn parse_native_id(raw: &str) -> Option<u64> {
    let raw = raw.trim_start_matches("0x");
    u64::from_str_radix(raw, 16).ok()
}

/// Classifies a body line as state/frame/lock/extra; returns `None` only
/// when the line is blank (blank lines are handled by the caller, never
/// passed here).
fn classify_body_line(line: &str) -> BodyLine {
    if let Some(caps) = THREAD_STATE.captures(line) {
        return match parse_thread_state(&caps[1]) {
            Ok(state) => BodyLine::State(state),
            Err(raw) => BodyLine::UnknownState(raw),
        };
    }
    if let Some(caps) = STACK_FRAME.captures(line) {
        return BodyLine::Frame(build_stack_frame(&caps[1], &caps[2]));
    }
    if let Some(caps) = LOCK_LINE.captures(line) {
        let kind = lock_kind_from_verb(&caps[1]);
        let lock = LockInfo { lock_id: LockId(caps[2].to_string()), class_name: caps[3].to_string(), kind };
        return BodyLine::Lock(lock, lock_kind_is_waiting(kind));
    }
    BodyLine::Extra(line.to_string())
}

/// Parses a thread dump's raw text into a [`ThreadDump`].
///
/// Fails only on an I/O fault in the underlying reader (spec §4.1); here the
/// input is already an in-memory string, so this never actually returns
/// `Err` — it exists to keep the contract explicit and to match the
/// signature callers expect when wrapping a streaming reader.
pub fn parse(text: &str) -> Result<ThreadDump, crate::domain::ParseError> {
    Ok(parse_str(text))
}

#[allow(clippy::too_many_lines)]
fn parse_str(text: &str) -> ThreadDump {
    let source_format = detect_format(text);
    let jvm_banner = detect_banner(text);
    let timestamp = detect_timestamp(text);

    let mut mode = ParseMode::TopLevel;
    let mut threads: Vec<ThreadInfo> = Vec::new();
    let mut current: Option<ThreadAccumulator> = None;
    let mut pending: Vec<BodyLine> = Vec::new();
    let mut saw_pending_attach = false;
    let mut warnings: Vec<ParseWarning> = Vec::new();

    let mut jni_refs: Option<(u64, u64)> = None;
    let mut jni_memory: Option<(u64, u64)> = None;

    let mut deadlocks: Vec<DeadlockInfo> = Vec::new();
    let mut pass1: Vec<DeadlockedThread> = Vec::new();
    let mut pass2_current: Option<DeadlockedThread> = None;

    for (offset, raw_line) in text.lines().enumerate() {
        let line = raw_line;
        let trimmed = line.trim_end();

        match mode {
            ParseMode::TopLevel => {
                if trimmed.trim() == DEADLOCK_TRIGGER {
                    if let Some(acc) = current.take() {
                        threads.push(acc.finish());
                    }
                    mode = ParseMode::InDeadlockDesc;
                    pass1.clear();
                    continue;
                }

                if let Some(caps) = JNI_REFS.captures(trimmed) {
                    let global = parse_lenient(&caps[1]).unwrap_or(0);
                    let weak = parse_lenient(&caps[2]).unwrap_or(0);
                    jni_refs = Some((global, weak));
                    continue;
                }
                if let Some(caps) = JNI_MEMORY.captures(trimmed) {
                    let global = parse_lenient(&caps[1]).unwrap_or(0);
                    let weak = parse_lenient(&caps[2]).unwrap_or(0);
                    jni_memory = Some((global, weak));
                    continue;
                }

                if let Some(caps) = THREAD_HEADER.captures(trimmed) {
                    if let Some(acc) = current.take() {
                        threads.push(acc.finish());
                    }
                    let name = caps[1].to_string();
                    let rest = &trimmed[caps.get(0).unwrap().end()..];
                    let tokens = parse_header_tokens(rest);

                    let mut acc = ThreadAccumulator {
                        name,
                        java_thread_id: tokens.java_thread_id,
                        native_id: tokens.native_id,
                        priority: tokens.priority,
                        daemon: tokens.daemon,
                        cpu_time_sec: tokens.cpu_time_sec,
                        elapsed_time_sec: tokens.elapsed_time_sec,
                        ..ThreadAccumulator::default()
                    };

                    if !pending.is_empty() {
                        saw_pending_attach = true;
                        for body in pending.drain(..).rev() {
                            if let Some(w) = acc.apply(body) {
                                warn!("{w}");
                                warnings.push(w);
                            }
                        }
                    }
                    current = Some(acc);
                    continue;
                }

                if trimmed.trim().is_empty() {
                    if let Some(acc) = current.take() {
                        threads.push(acc.finish());
                    }
                    continue;
                }

                let body = classify_body_line(trimmed);
                match current.as_mut() {
                    Some(acc) => {
                        if let Some(w) = acc.apply(body) {
                            warn!("{w}");
                            warnings.push(w);
                        }
                    }
                    None => {
                        if matches!(body, BodyLine::Extra(_)) {
                            let w = ParseWarning::MalformedLine { offset, line: trimmed.to_string() };
                            warn!("{w}");
                            warnings.push(w);
                        } else {
                            pending.push(body);
                        }
                    }
                }
            }

            ParseMode::InDeadlockDesc => {
                if trimmed == DEADLOCK_STACK_MARKER {
                    mode = ParseMode::InDeadlockStack;
                    pass2_current = None;
                    continue;
                }
                if let Some(caps) = DEADLOCK_THREAD_NAME.captures(trimmed) {
                    pass1.push(DeadlockedThread {
                        thread_name: caps[1].to_string(),
                        waiting_for_monitor: None,
                        waiting_for_object: None,
                        waiting_for_object_type: None,
                        held_by_thread: None,
                        stack: Vec::new(),
                        locks: Vec::new(),
                    });
                    continue;
                }
                if let Some(caps) = DEADLOCK_WAITING_TO_LOCK.captures(trimmed) {
                    if let Some(t) = pass1.last_mut() {
                        t.waiting_for_monitor = Some(caps[1].to_string());
                        t.waiting_for_object = Some(caps[2].to_string());
                        t.waiting_for_object_type = Some(caps[3].trim_end_matches(',').trim().to_string());
                    }
                    continue;
                }
                if let Some(caps) = DEADLOCK_HELD_BY.captures(trimmed) {
                    if let Some(t) = pass1.last_mut() {
                        t.held_by_thread = Some(caps[1].to_string());
                    }
                }
                // other lines (blank, `===` separators) are ignored here.
            }

            ParseMode::InDeadlockStack => {
                if trimmed.starts_with("Found") && trimmed.contains("deadlock") {
                    // "Found N deadlocks." summary: ignored, not a terminator.
                    continue;
                }
                if trimmed.trim() == DEADLOCK_TRIGGER {
                    finish_deadlock_block(&mut pass1, &mut pass2_current, &mut deadlocks);
                    mode = ParseMode::InDeadlockDesc;
                    continue;
                }
                if let Some(caps) = DEADLOCK_THREAD_NAME.captures(trimmed) {
                    if let Some(finished) = pass2_current.take() {
                        merge_pass2(&mut pass1, finished);
                    }
                    let name = caps[1].to_string();
                    let template = pass1
                        .iter()
                        .find(|t| t.thread_name == name)
                        .cloned()
                        .unwrap_or_else(|| DeadlockedThread {
                            thread_name: name.clone(),
                            waiting_for_monitor: None,
                            waiting_for_object: None,
                            waiting_for_object_type: None,
                            held_by_thread: None,
                            stack: Vec::new(),
                            locks: Vec::new(),
                        });
                    pass2_current = Some(DeadlockedThread { stack: Vec::new(), locks: Vec::new(), ..template });
                    continue;
                }
                if trimmed.trim().is_empty() {
                    if let Some(finished) = pass2_current.take() {
                        merge_pass2(&mut pass1, finished);
                    }
                    continue;
                }
                if let Some(t) = pass2_current.as_mut() {
                    if let Some(caps) = STACK_FRAME.captures(trimmed) {
                        t.stack.push(build_stack_frame(&caps[1], &caps[2]));
                    } else if let Some(caps) = LOCK_LINE.captures(trimmed) {
                        let kind = lock_kind_from_verb(&caps[1]);
                        t.locks.push(LockInfo {
                            lock_id: LockId(caps[2].to_string()),
                            class_name: caps[3].to_string(),
                            kind,
                        });
                    }
                }
            }
        }
    }

    // Flush trailing open state at EOF.
    if let Some(acc) = current.take() {
        threads.push(acc.finish());
    }
    if let Some(finished) = pass2_current.take() {
        merge_pass2(&mut pass1, finished);
    }
    if !pass1.is_empty() {
        deadlocks.push(DeadlockInfo { threads: pass1 });
    }

    if saw_pending_attach {
        threads.reverse();
    }

    let jni_info = match (jni_refs, jni_memory) {
        (None, None) => None,
        (refs, memory) => Some(JniInfo {
            global_ref_count: refs.map(|(g, _)| g),
            weak_ref_count: refs.map(|(_, w)| w),
            global_ref_memory_bytes: memory.map(|(g, _)| g),
            weak_ref_memory_bytes: memory.map(|(_, w)| w),
        }),
    };


    ThreadDump {
        timestamp,
        jvm_banner,
        threads,
        jni_info,
        source_format,
        deadlocks,
        warnings,
        captured_at: None,
    }
}

fn finish_deadlock_block(
    pass1: &mut Vec<DeadlockedThread>,
    pass2_current: &mut Option<DeadlockedThread>,
    deadlocks: &mut Vec<DeadlockInfo>,
) {
    if let Some(finished) = pass2_current.take() {
        merge_pass2(pass1, finished);
    }
    if !pass1.is_empty() {
        deadlocks.push(DeadlockInfo { threads: std::mem::take(pass1) });
    }
}

fn merge_pass2(pass1: &mut [DeadlockedThread], finished: DeadlockedThread) {
    if let Some(slot) = pass1.iter_mut().find(|t| t.thread_name == finished.thread_name) {
        slot.stack = finished.stack;
        slot.locks = finished.locks;
    }
}

fn detect_format(text: &str) -> SourceFormat {
    if text.contains("jcmd") || text.contains("Thread.print") {
        SourceFormat::Jcmd
    } else if text.contains("Full thread dump") || text.contains("Thread dump") {
        SourceFormat::Jstack
    } else {
        SourceFormat::Unknown
    }
}

fn detect_banner(text: &str) -> Option<String> {
    text.lines().find(|l| l.contains("Full thread dump") || l.contains("Thread dump")).map(str::to_string)
}

fn detect_timestamp(text: &str) -> Option<String> {
    text.lines().find(|l| DATE_LINE.is_match(l.trim())).map(|l| l.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = concat!(
        "2024-01-15 10:23:45\n",
        "Full thread dump OpenJDK 64-Bit Server VM (25.302-b08 mixed mode):\n",
        "\n",
        "\"main\" #1 prio=5 tid=0x1 nid=0x2 runnable\n",
        "   java.lang.Thread.State: RUNNABLE\n",
        "\tat A.m(A.java:1)\n",
        "\n",
        "\"Worker-0\" #2 daemon prio=5 tid=0x3 nid=0x4 waiting on condition\n",
        "   java.lang.Thread.State: WAITING\n",
    );

    #[test]
    fn parses_two_simple_threads() {
        let dump = parse_str(SIMPLE);
        assert_eq!(dump.threads.len(), 2);
        assert_eq!(dump.threads[0].name, "main");
        assert!(!dump.threads[0].daemon);
        assert_eq!(dump.threads[1].name, "Worker-0");
        assert!(dump.threads[1].daemon);
        assert_eq!(dump.source_format, SourceFormat::Jstack);
        assert_eq!(dump.timestamp.as_deref(), Some("2024-01-15 10:23:45"));
        assert!(dump.jvm_banner.is_some());
    }

    #[test]
    fn determinism() {
        assert_eq!(parse_str(SIMPLE).threads.len(), parse_str(SIMPLE).threads.len());
        let a = serde_json::to_string(&parse_str(SIMPLE)).unwrap();
        let b = serde_json::to_string(&parse_str(SIMPLE)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_state_degrades_and_is_lenient() {
        let text = "\"t\" #1 tid=0x1 nid=0x2\n   java.lang.Thread.State: SOMETHING_WEIRD\n";
        let dump = parse_str(text);
        assert_eq!(dump.threads[0].state, Some(ThreadState::Runnable));
    }

    #[test]
    fn unknown_state_records_warning() {
        let text = "\"t\" #1 tid=0x1 nid=0x2\n   java.lang.Thread.State: SOMETHING_WEIRD\n";
        let dump = parse_str(text);
        assert!(dump.warnings.iter().any(|w| matches!(
            w,
            ParseWarning::UnknownThreadState { thread, raw } if thread == "t" && raw == "SOMETHING_WEIRD"
        )));
    }

    #[test]
    fn reverse_order_thread_is_reattached_and_whole_list_reversed() {
        // Body lines for "second" appear before its header; "first" is
        // fully normal. Per spec, this causes the whole dump to flip so
        // callers still see source order top-to-bottom.
        let text = concat!(
            "\"first\" #1 tid=0x1 nid=0x1\n",
            "   java.lang.Thread.State: RUNNABLE\n",
            "\tat A.a(A.java:1)\n",
            "\n",
            "   java.lang.Thread.State: WAITING\n",
            "\tat B.b(B.java:2)\n",
            "\tat B.c(B.java:3)\n",
            "\"second\" #2 tid=0x2 nid=0x2\n",
        );
        let dump = parse_str(text);
        assert_eq!(dump.threads.len(), 2);
        // whole-list reversal: "second" (which triggered the attach) now first
        assert_eq!(dump.threads[0].name, "second");
        assert_eq!(dump.threads[1].name, "first");
        let second = &dump.threads[0];
        assert_eq!(second.state, Some(ThreadState::Waiting));
        // intra-thread order restored: B.b before B.c
        assert_eq!(second.stack[0].method_name, "b");
        assert_eq!(second.stack[1].method_name, "c");
    }

    #[test]
    fn pure_forward_input_is_never_reversed() {
        let dump = parse_str(SIMPLE);
        assert_eq!(dump.threads[0].name, "main");
    }

    #[test]
    fn jni_lines_merge_into_single_info() {
        let text = concat!(
            "\"t\" #1 tid=0x1 nid=0x1\n",
            "   java.lang.Thread.State: RUNNABLE\n",
            "\n",
            "JNI global refs: 17, weak refs: 3\n",
            "JNI global refs memory usage: 1024 bytes, weak refs: 64 bytes\n",
        );
        let dump = parse_str(text);
        let jni = dump.jni_info.unwrap();
        assert_eq!(jni.global_ref_count, Some(17));
        assert_eq!(jni.weak_ref_count, Some(3));
        assert_eq!(jni.global_ref_memory_bytes, Some(1024));
        assert_eq!(jni.weak_ref_memory_bytes, Some(64));
    }

    #[test]
    fn deadlock_section_parses_two_threads_both_passes() {
        let text = concat!(
            "Found one Java-level deadlock:\n",
            "=============================\n",
            "\"Thread-1\":\n",
            "  waiting to lock monitor 0x00007f1 (object 0x00000000d601, a java.lang.Object),\n",
            "  which is held by \"Thread-0\"\n",
            "\"Thread-0\":\n",
            "  waiting to lock monitor 0x00007f2 (object 0x00000000d602, a java.lang.Object),\n",
            "  which is held by \"Thread-1\"\n",
            "\n",
            "Java stack information for the threads listed above:\n",
            "===================================================\n",
            "\"Thread-1\":\n",
            "\tat Deadlock$1.run(Deadlock.java:16)\n",
            "\t- waiting to lock <0x00000000d601> (a java.lang.Object)\n",
            "\t- locked <0x00000000d602> (a java.lang.Object)\n",
            "\"Thread-0\":\n",
            "\tat Deadlock$2.run(Deadlock.java:31)\n",
            "\t- waiting to lock <0x00000000d602> (a java.lang.Object)\n",
            "\t- locked <0x00000000d601> (a java.lang.Object)\n",
            "\n",
            "Found 1 deadlock.\n",
        );
        let dump = parse_str(text);
        assert_eq!(dump.deadlocks.len(), 1);
        let dl = &dump.deadlocks[0];
        assert_eq!(dl.threads.len(), 2);
        assert_eq!(dl.threads[0].thread_name, "Thread-1");
        assert_eq!(dl.threads[0].held_by_thread.as_deref(), Some("Thread-0"));
        assert_eq!(dl.threads[0].stack.len(), 1);
        assert_eq!(dl.threads[0].locks.len(), 2);
    }

    #[test]
    fn jcmd_fixture_file_is_detected_and_parsed() {
        use std::io::Write;

        let mut fixture = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            fixture,
            "{}",
            concat!(
                "1234: Thread.print\n",
                "\"main\" #1 tid=0x1 nid=0x2 runnable\n",
                "   java.lang.Thread.State: RUNNABLE\n",
                "\tat A.m(A.java:1)\n",
            )
        )
        .unwrap();

        let text = std::fs::read_to_string(fixture.path()).unwrap();
        let dump = super::parse(&text).unwrap();
        assert_eq!(dump.source_format, SourceFormat::Jcmd);
        assert_eq!(dump.threads.len(), 1);
    }
}
