//! Domain newtypes and small enums shared across the parser, context, and
//! analyzers.
//!
//! These wrappers exist so a native thread id is never accidentally compared
//! against a java thread id, and so lock ids keep their `0x` prefix and case
//! verbatim (spec: "Lock ids are opaque identifiers").

use std::fmt;

use serde::{Deserialize, Serialize};

/// The OS-level thread id (`nid=` in jstack output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeId(pub u64);

impl fmt::Display for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// The JVM-internal thread id (`#<id>` in jstack output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JavaThreadId(pub u64);

impl fmt::Display for JavaThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An opaque lock identifier, preserved verbatim (including `0x` prefix and
/// case) as it appeared in the source dump.
///
/// Equality of [`LockId`] is a pure string comparison; analyzers that want to
/// ignore lock identity (e.g. comparing two `LockInfo`s for test purposes
/// while disregarding the id) must explicitly opt out, per spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockId(pub String);

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LockId {
    fn from(s: &str) -> Self {
        LockId(s.to_string())
    }
}

/// Canonical thread state. Any unrecognized state string from the dump
/// degrades to [`ThreadState::Runnable`] (spec: "Unknown state string =>
/// RUNNABLE (lenient)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadState {
    New,
    Runnable,
    Blocked,
    Waiting,
    TimedWaiting,
    Terminated,
}

impl ThreadState {
    /// Parses a `java.lang.Thread.State:` value, returning `None` for a
    /// string outside the six canonical values.
    #[must_use]
    pub fn try_parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "NEW" => Some(ThreadState::New),
            "RUNNABLE" => Some(ThreadState::Runnable),
            "BLOCKED" => Some(ThreadState::Blocked),
            "WAITING" => Some(ThreadState::Waiting),
            "TIMED_WAITING" => Some(ThreadState::TimedWaiting),
            "TERMINATED" => Some(ThreadState::Terminated),
            _ => None,
        }
    }

    /// Parses a `java.lang.Thread.State:` value leniently; unknown strings
    /// degrade to [`ThreadState::Runnable`] rather than failing the parse.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        Self::try_parse(raw).unwrap_or(ThreadState::Runnable)
    }
}

/// The kind of a `-` lock line under a thread's stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockKind {
    Locked,
    WaitingOn,
    WaitingToLock,
    Parking,
}

/// Which tool produced the dump, as detected from banner text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Jstack,
    Jcmd,
    #[default]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_state_degrades_to_runnable() {
        assert_eq!(ThreadState::parse_lenient("SOMETHING_NEW"), ThreadState::Runnable);
        assert_eq!(ThreadState::parse_lenient("BLOCKED"), ThreadState::Blocked);
    }

    #[test]
    fn native_id_displays_with_hex_prefix() {
        assert_eq!(NativeId(0x1a).to_string(), "0x1a");
    }

    #[test]
    fn lock_id_preserves_case_and_prefix() {
        let id = LockId::from("0x00000007aBcDef12");
        assert_eq!(id.to_string(), "0x00000007aBcDef12");
    }
}
