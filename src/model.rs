//! The structured value types the parser reconstructs from thread-dump text,
//! and that the analyzers read back out.
//!
//! Everything here is an immutable value: built once by [`crate::parser`] (or,
//! for [`DeadlockInfo`], by the parser's deadlock-section pass) and never
//! mutated afterward. Analyzer results hold shared references back into these
//! values rather than copying them (spec §3: "Ownership").

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::domain::{JavaThreadId, LockId, LockKind, NativeId, ParseWarning, SourceFormat, ThreadState};

/// One frame of a thread's call stack.
///
/// A frame whose location is literally `Native Method` has `native = true`
/// and `file`/`line` both `None`. `Unknown Source` clears `file` only. A
/// leading Java 9+ module prefix (`foo@1.2.3/`) is stripped from the class
/// name before storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub class_name: String,
    pub method_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    pub native: bool,
}

impl StackFrame {
    /// Equality used by the progress analyzer's stack-identity check:
    /// class, method, file, and line — deliberately ignoring nothing else,
    /// since a thread dump never carries pointer-y addresses in a frame.
    #[must_use]
    pub fn same_location(&self, other: &StackFrame) -> bool {
        self.class_name == other.class_name
            && self.method_name == other.method_name
            && self.file_name == other.file_name
            && self.line_number == other.line_number
    }
}

/// A `- locked`/`- waiting on`/`- waiting to lock`/`- parking` entry under a
/// thread's stack.
///
/// Lock ids are opaque strings preserved verbatim (including the `0x`
/// prefix and case); equality comparisons that want to ignore lock identity
/// must do so explicitly rather than relying on [`LockInfo`]'s `PartialEq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub lock_id: LockId,
    pub class_name: String,
    pub kind: LockKind,
}

/// JNI reference counters, assembled by merging the `JNI global refs:` line
/// with the following `JNI global refs memory usage:` line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JniInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_ref_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weak_ref_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_ref_memory_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weak_ref_memory_bytes: Option<u64>,
}

impl JniInfo {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.global_ref_count.is_none()
            && self.weak_ref_count.is_none()
            && self.global_ref_memory_bytes.is_none()
            && self.weak_ref_memory_bytes.is_none()
    }
}

/// One thread as it appears in a single dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_thread_id: Option<JavaThreadId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_id: Option<NativeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    pub daemon: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ThreadState>,
    /// Fractional seconds. `None` if the dump never carried a `cpu=` token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_time_sec: Option<f64>,
    /// Fractional seconds. `None` if the dump never carried an `elapsed=` token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_time_sec: Option<f64>,
    pub stack: Vec<StackFrame>,
    pub locks: Vec<LockInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_on_lock: Option<LockId>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub extra_lines: Vec<String>,
}

impl ThreadInfo {
    /// Matches the GC-thread name patterns (spec §4.8's `includeGc` filter
    /// carve-out and the GC activity analyzer's own thread detection).
    #[must_use]
    pub fn is_gc_background(&self) -> bool {
        const PREFIXES: &[&str] = &["GC", "G1", "Parallel GC", "ConcurrentMarkSweep", "ZGC", "Shenandoah"];
        PREFIXES.iter().any(|p| self.name.starts_with(p))
    }

    /// Matches VM-internal background thread name patterns (spec §6's
    /// `includeVm` filter carve-out), distinct from GC threads.
    #[must_use]
    pub fn is_vm_background(&self) -> bool {
        const PREFIXES: &[&str] = &["VM"];
        const EXACT: &[&str] = &["Finalizer", "Reference Handler", "Common-Cleaner", "Signal Dispatcher"];
        PREFIXES.iter().any(|p| self.name.starts_with(p)) || EXACT.contains(&self.name.as_str())
    }
}

/// One thread's participation in a JVM-confirmed deadlock, as printed in the
/// `Found one Java-level deadlock:` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlockedThread {
    pub thread_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_for_monitor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_for_object: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_for_object_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub held_by_thread: Option<String>,
    pub stack: Vec<StackFrame>,
    pub locks: Vec<LockInfo>,
}

/// One `Found one Java-level deadlock:` block. Always has at least two
/// threads when constructed by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlockInfo {
    pub threads: Vec<DeadlockedThread>,
}

/// A single parsed thread dump.
///
/// Threads appear in original source order after any reverse-order
/// normalization (see [`crate::parser`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadDump {
    /// The banner date line jstack/jcmd sometimes prints before "Full thread
    /// dump" (e.g. `2024-01-15 10:23:45`), kept as raw text. `None` if the
    /// input didn't carry one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jvm_banner: Option<String>,
    pub threads: Vec<ThreadInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jni_info: Option<JniInfo>,
    pub source_format: SourceFormat,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub deadlocks: Vec<DeadlockInfo>,
    /// Non-fatal conditions observed while parsing (spec §7: malformed
    /// lines / unknown states never abort the parse, they're recorded here).
    #[serde(skip, default)]
    pub warnings: Vec<ParseWarning>,
    /// Wall-clock time this dump was captured, set by the live sampler
    /// (spec §4.2 "Sanity checks" needs this to detect `DUPLICATE_DUMP`).
    /// `None` for dumps parsed directly from a file with no known capture
    /// time.
    #[serde(skip, default)]
    pub captured_at: Option<SystemTime>,
}

impl ThreadDump {
    #[must_use]
    pub fn find_thread_by_native_id(&self, id: NativeId) -> Option<&ThreadInfo> {
        self.threads.iter().find(|t| t.native_id == Some(id))
    }

    #[must_use]
    pub fn find_thread_by_name(&self, name: &str) -> Option<&ThreadInfo> {
        self.threads.iter().find(|t| t.name == name)
    }

    #[must_use]
    pub fn total_cpu_time_sec(&self) -> f64 {
        self.threads.iter().filter_map(|t| t.cpu_time_sec).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jni_info_is_empty_when_all_fields_absent() {
        assert!(JniInfo::default().is_empty());
        let info = JniInfo { global_ref_count: Some(3), ..Default::default() };
        assert!(!info.is_empty());
    }

    #[test]
    fn stack_frame_same_location_ignores_native_flag() {
        let a = StackFrame {
            class_name: "A".into(),
            method_name: "m".into(),
            file_name: Some("A.java".into()),
            line_number: Some(10),
            native: false,
        };
        let mut b = a.clone();
        b.native = true;
        assert!(a.same_location(&b));
        b.line_number = Some(11);
        assert!(!a.same_location(&b));
    }

    #[test]
    fn is_gc_background_and_is_vm_background_are_disjoint() {
        let mut t = ThreadInfo {
            name: "GC Thread#0".into(),
            java_thread_id: None,
            native_id: None,
            priority: None,
            daemon: true,
            state: None,
            cpu_time_sec: None,
            elapsed_time_sec: None,
            stack: vec![],
            locks: vec![],
            waiting_on_lock: None,
            extra_lines: vec![],
        };
        assert!(t.is_gc_background());
        assert!(!t.is_vm_background());

        t.name = "Finalizer".into();
        assert!(!t.is_gc_background());
        assert!(t.is_vm_background());

        t.name = "VM Thread".into();
        assert!(!t.is_gc_background());
        assert!(t.is_vm_background());

        t.name = "main".into();
        assert!(!t.is_gc_background());
        assert!(!t.is_vm_background());
    }
}
