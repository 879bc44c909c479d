//! Line-level regexes and small leaf parsers used by [`super::dump_parser`].
//!
//! Grounded in the same style as the closest reference jcmd/jstack parser in
//! this codebase family: static [`Regex`]es built once via [`Lazy`], matched
//! per line rather than parsed with a general grammar.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{LockKind, ThreadState};
use crate::model::StackFrame;

pub static THREAD_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^"((?:[^"\\]|\\.)*)""#).unwrap());

static HEADER_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\d+)").unwrap());
static HEADER_PRIO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bprio=(\d+)").unwrap());
static HEADER_TID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\btid=(0x[0-9a-fA-F]+)").unwrap());
static HEADER_NID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnid=(0x[0-9a-fA-F]+)").unwrap());
static HEADER_CPU: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bcpu=([0-9]+(?:\.[0-9]+)?)(s|ms|us|ns)?\b").unwrap());
static HEADER_ELAPSED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\belapsed=([0-9]+(?:\.[0-9]+)?)(s|ms|us|ns)?\b").unwrap());
static HEADER_DAEMON: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bdaemon\b").unwrap());

pub static THREAD_STATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"java\.lang\.Thread\.State:\s*(\S+)").unwrap());

pub static STACK_FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*at\s+(\S+)\((.*)\)\s*$").unwrap());

pub static LOCK_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^\s*-\s*(waiting on|waiting to lock|locked|parking to wait for)\s+<?([^>\s]+)>?\s*\(a\s+([^)]+)\)"#,
    )
    .unwrap()
});

pub static JNI_REFS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"JNI global refs:\s*(\d+),\s*weak refs:\s*(\d+)").unwrap());
pub static JNI_MEMORY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"JNI global refs memory usage:\s*(\d+)(?:\s*bytes)?,\s*weak refs:\s*(\d+)(?:\s*bytes)?")
        .unwrap()
});

pub static DEADLOCK_TRIGGER: &str = "Found one Java-level deadlock:";
pub static DEADLOCK_STACK_MARKER: &str = "Java stack information for the threads listed above:";

pub static DEADLOCK_THREAD_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^"(.+)":\s*$"#).unwrap());
pub static DEADLOCK_WAITING_TO_LOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"waiting to lock monitor\s+(\S+)\s+\(object\s+(\S+),\s*a\s+([^)]+?)\)?\s*,?\s*$"#)
        .unwrap()
});
pub static DEADLOCK_HELD_BY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"which is held by "(.+)""#).unwrap());

/// Module-qualified class name prefix stripped per spec ("Module prefix
/// `foo@ver/` is stripped"), e.g. `java.base@17.0.1/java.lang.Thread` or
/// `java.base/java.lang.Thread` both become `java.lang.Thread`.
static MODULE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.]+(?:@[\w.+-]+)?/").unwrap());

/// Parsed header tokens, all optional so a maximally lenient header (just a
/// quoted name) still parses.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HeaderTokens {
    pub java_thread_id: Option<u64>,
    pub priority: Option<u32>,
    pub native_id: Option<String>,
    pub daemon: bool,
    pub cpu_time_sec: Option<f64>,
    pub elapsed_time_sec: Option<f64>,
}

/// Permissive numeric parse: unparsable numbers become `None` rather than
/// failing the whole thread (spec §4.1 "Numeric parsing").
#[must_use]
pub fn parse_lenient<T: std::str::FromStr>(raw: &str) -> Option<T> {
    raw.parse().ok()
}

/// Converts a `cpu=`/`elapsed=` token's numeric value + unit into fractional
/// seconds. An absent unit means seconds, per spec.
#[must_use]
pub fn unit_to_seconds(value: f64, unit: Option<&str>) -> f64 {
    match unit {
        Some("ms") => value / 1_000.0,
        Some("us") => value / 1_000_000.0,
        Some("ns") => value / 1_000_000_000.0,
        Some("s") | None => value,
        Some(_) => value,
    }
}

/// Extracts the recognized optional tokens from a thread header line (the
/// part after the closing quote of the thread name).
#[must_use]
pub fn parse_header_tokens(rest: &str) -> HeaderTokens {
    let java_thread_id = HEADER_ID.captures(rest).and_then(|c| parse_lenient(&c[1]));
    let priority = HEADER_PRIO.captures(rest).and_then(|c| parse_lenient(&c[1]));
    let native_id = HEADER_TID.captures(rest).map(|c| c[1].to_string());
    // nid is the OS thread id; tid= is the internal VM handle. Prefer nid for
    // NativeId, falling back to tid if nid is absent (some jcmd variants omit nid).
    let native_id = HEADER_NID.captures(rest).map(|c| c[1].to_string()).or(native_id);
    let daemon = HEADER_DAEMON.is_match(rest);
    let cpu_time_sec = HEADER_CPU
        .captures(rest)
        .and_then(|c| parse_lenient::<f64>(&c[1]).map(|v| unit_to_seconds(v, c.get(2).map(|m| m.as_str()))));
    let elapsed_time_sec = HEADER_ELAPSED
        .captures(rest)
        .and_then(|c| parse_lenient::<f64>(&c[1]).map(|v| unit_to_seconds(v, c.get(2).map(|m| m.as_str()))));

    HeaderTokens { java_thread_id, priority, native_id, daemon, cpu_time_sec, elapsed_time_sec }
}

/// Splits a `at Class.method(location)` match into a [`StackFrame`].
#[must_use]
pub fn build_stack_frame(qualified: &str, location: &str) -> StackFrame {
    let qualified = MODULE_PREFIX.replace(qualified, "");
    let (class_name, method_name) = match qualified.rfind('.') {
        Some(idx) => (qualified[..idx].to_string(), qualified[idx + 1..].to_string()),
        None => (String::new(), qualified.to_string()),
    };

    if location == "Native Method" {
        return StackFrame { class_name, method_name, file_name: None, line_number: None, native: true };
    }
    if location == "Unknown Source" {
        return StackFrame { class_name, method_name, file_name: None, line_number: None, native: false };
    }
    match location.rsplit_once(':') {
        Some((file, line)) => StackFrame {
            class_name,
            method_name,
            file_name: Some(file.to_string()),
            line_number: parse_lenient(line),
            native: false,
        },
        None => StackFrame {
            class_name,
            method_name,
            file_name: if location.is_empty() { None } else { Some(location.to_string()) },
            line_number: None,
            native: false,
        },
    }
}

/// Maps the lock-line verb phrase to its [`LockKind`].
#[must_use]
pub fn lock_kind_from_verb(verb: &str) -> LockKind {
    match verb {
        "locked" => LockKind::Locked,
        "waiting on" => LockKind::WaitingOn,
        "waiting to lock" => LockKind::WaitingToLock,
        "parking to wait for" => LockKind::Parking,
        _ => LockKind::Locked,
    }
}

/// A lock kind sets the thread's `waitingOnLock` when it represents the
/// thread actually blocking on something, as opposed to holding it.
#[must_use]
pub fn lock_kind_is_waiting(kind: LockKind) -> bool {
    matches!(kind, LockKind::WaitingOn | LockKind::WaitingToLock | LockKind::Parking)
}

/// Parses a `java.lang.Thread.State:` value; `Err` carries the raw string
/// back to the caller so it can record `UNKNOWN_THREAD_STATE` (spec §7)
/// while still degrading to RUNNABLE for the thread itself.
pub fn parse_thread_state(raw: &str) -> Result<ThreadState, String> {
    ThreadState::try_parse(raw).ok_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_tokens_parses_all_fields() {
        let rest = r#" #12 daemon prio=5 os_prio=0 tid=0x00007f2b24013800 nid=0x2a07 cpu=123.45ms elapsed=10.5s [0x1234]"#;
        let tokens = parse_header_tokens(rest);
        assert_eq!(tokens.java_thread_id, Some(12));
        assert_eq!(tokens.priority, Some(5));
        assert_eq!(tokens.native_id.as_deref(), Some("0x2a07"));
        assert!(tokens.daemon);
        assert!((tokens.cpu_time_sec.unwrap() - 0.12345).abs() < 1e-9);
        assert!((tokens.elapsed_time_sec.unwrap() - 10.5).abs() < 1e-9);
    }

    #[test]
    fn header_tokens_tolerates_missing_fields() {
        let tokens = parse_header_tokens(" runnable");
        assert_eq!(tokens, HeaderTokens::default());
    }

    #[test]
    fn build_stack_frame_strips_module_prefix() {
        let frame = build_stack_frame("java.base@17.0.1/java.lang.Thread.run", "Thread.java:840");
        assert_eq!(frame.class_name, "java.lang.Thread");
        assert_eq!(frame.method_name, "run");
        assert_eq!(frame.file_name.as_deref(), Some("Thread.java"));
        assert_eq!(frame.line_number, Some(840));
    }

    #[test]
    fn build_stack_frame_native_method() {
        let frame = build_stack_frame("java.lang.Thread.sleep", "Native Method");
        assert!(frame.native);
        assert!(frame.file_name.is_none());
        assert!(frame.line_number.is_none());
    }

    #[test]
    fn build_stack_frame_unknown_source() {
        let frame = build_stack_frame("Foo.bar", "Unknown Source");
        assert!(!frame.native);
        assert!(frame.file_name.is_none());
    }

    #[test]
    fn lock_line_matches_angle_bracket_id() {
        let caps = LOCK_LINE.captures("\t- locked <0x00000000d6018f88> (a java.lang.Object)").unwrap();
        assert_eq!(&caps[1], "locked");
        assert_eq!(&caps[2], "0x00000000d6018f88");
        assert_eq!(&caps[3], "java.lang.Object");
    }

    #[test]
    fn unit_conversion() {
        assert!((unit_to_seconds(1500.0, Some("ms")) - 1.5).abs() < 1e-9);
        assert!((unit_to_seconds(1_000_000.0, Some("us")) - 1.0).abs() < 1e-9);
        assert!((unit_to_seconds(5.0, None) - 5.0).abs() < 1e-9);
    }
}
