//! Live JVM attachment: periodic dump capture plus the sampling loop that
//! turns a sequence of captures into a verdict (spec §4.10, §6).

pub mod capture;
pub mod sampler;

pub use capture::{DumpCapture, ProcessDumpCapture};
pub use sampler::{SamplerConfig, SamplerOutcome};
