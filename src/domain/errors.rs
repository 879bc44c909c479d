//! Structured error types for jstall.
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Per spec §7, most parser conditions are local and recoverable — they set
//! a flag or get logged rather than aborting. Only a handful of kinds here
//! are actually returned as `Err`; the rest exist so warnings have a stable
//! vocabulary (`ParseWarning`, surfaced on `ThreadDump::warnings`).

use thiserror::Error;

/// Hard failures from the dump parser. Per spec, the only one that can
/// actually arise is an I/O fault in the underlying reader — malformed
/// thread-dump content is always absorbed as a [`ParseWarning`] instead.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to read thread dump input: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal conditions recorded while parsing a single dump. These never
/// abort the parse; they accumulate on `ThreadDump::warnings` for callers
/// who want to surface them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    #[error("malformed line at offset {offset}: {line:?}")]
    MalformedLine { offset: usize, line: String },

    #[error("unknown thread state {raw:?} for thread {thread}, degraded to RUNNABLE")]
    UnknownThreadState { thread: String, raw: String },
}

/// Construction-time failure for [`crate::context::AnalysisContext`].
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("invalid analysis options: {0}")]
    InvalidOptions(String),
}

/// Non-fatal warnings accumulated while building or querying an
/// [`crate::context::AnalysisContext`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextWarning {
    #[error("dumps at indices {first} and {second} report identical elapsed time for thread {thread} despite distinct capture times")]
    DuplicateDump { first: usize, second: usize, thread: String },

    #[error("thread name {0:?} matched across dumps by name only (native/java ids unavailable); name may have been reused")]
    ThreadNameCollision(String),
}

/// Failures from the live-mode dump-capture collaborator (spec §6, §4.10).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("process {0} not found")]
    ProcessNotFound(u32),

    #[error("capture of process {0} timed out after {1:?}")]
    Timeout(u32, std::time::Duration),

    #[error("capture subprocess for process {0} exited with status {1}")]
    NonzeroExit(u32, i32),

    #[error("capture of process {0} was interrupted")]
    Interrupted(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_not_found_display() {
        let err = CaptureError::ProcessNotFound(1234);
        assert_eq!(err.to_string(), "process 1234 not found");
    }

    #[test]
    fn invalid_options_display_includes_reason() {
        let err = ContextError::InvalidOptions("cpu_epsilon_ms must be >= 0".into());
        assert!(err.to_string().contains("cpu_epsilon_ms"));
    }
}
