//! Domain model for jstall
//!
//! This module contains the newtypes, small enums, and structured error
//! types shared by the parser, the analysis context, and the analyzers.

pub mod errors;
pub mod types;

pub use errors::{CaptureError, ContextError, ContextWarning, ParseError, ParseWarning};
pub use types::{JavaThreadId, LockId, LockKind, NativeId, SourceFormat, ThreadState};
