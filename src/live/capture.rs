//! The dump-capture collaborator interface (spec §6) and a reference
//! implementation that shells out to `jstack`/`jcmd`.
//!
//! Modeled as a trait so the sampler in [`super::sampler`] stays free of
//! `std::process` details and tests can inject a fake capturer, mirroring
//! how the profiling core this crate is adapted from passes in a stack
//! resolver rather than constructing one itself.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::domain::CaptureError;

/// Captures one thread dump from a running JVM.
pub trait DumpCapture {
    /// Captures a single dump from `pid`, returning combined stdout+stderr
    /// as text. Must enforce `timeout` itself.
    fn capture(&self, pid: u32, timeout: Duration) -> Result<String, CaptureError>;

    /// Probes whether `pid` refers to a live process.
    fn process_exists(&self, pid: u32) -> bool;
}

/// Shells out to `jstack <pid>` or `jcmd <pid> Thread.print -l`, enforcing
/// the timeout with a watcher thread rather than an async runtime (spec
/// §5: "single timer loop", no other parallelism required).
pub struct ProcessDumpCapture {
    pub use_jcmd: bool,
}

impl DumpCapture for ProcessDumpCapture {
    fn capture(&self, pid: u32, timeout: Duration) -> Result<String, CaptureError> {
        if !self.process_exists(pid) {
            return Err(CaptureError::ProcessNotFound(pid));
        }

        let mut command = if self.use_jcmd {
            let mut c = Command::new("jcmd");
            c.arg(pid.to_string()).arg("Thread.print").arg("-l");
            c
        } else {
            let mut c = Command::new("jstack");
            c.arg("-l").arg(pid.to_string());
            c
        };
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|_| CaptureError::ProcessNotFound(pid))?;
        let (tx, rx) = mpsc::channel();

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let handle = thread::spawn(move || {
            let mut out = String::new();
            if let Some(s) = stdout.as_mut() {
                let _ = s.read_to_string(&mut out);
            }
            if let Some(s) = stderr.as_mut() {
                let _ = s.read_to_string(&mut out);
            }
            let _ = tx.send(out);
        });

        match rx.recv_timeout(timeout) {
            Ok(text) => {
                let status = child.wait().map_err(|_| CaptureError::Interrupted(pid))?;
                let _ = handle.join();
                if status.success() {
                    Ok(text)
                } else {
                    Err(CaptureError::NonzeroExit(pid, status.code().unwrap_or(-1)))
                }
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(CaptureError::Timeout(pid, timeout))
            }
        }
    }

    fn process_exists(&self, pid: u32) -> bool {
        std::path::Path::new(&format!("/proc/{pid}")).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeCapture {
        responses: RefCell<Vec<Result<String, CaptureError>>>,
        exists: bool,
    }

    impl DumpCapture for FakeCapture {
        fn capture(&self, _pid: u32, _timeout: Duration) -> Result<String, CaptureError> {
            self.responses.borrow_mut().remove(0)
        }

        fn process_exists(&self, _pid: u32) -> bool {
            self.exists
        }
    }

    #[test]
    fn fake_capture_returns_injected_responses_in_order() {
        let fake = FakeCapture {
            responses: RefCell::new(vec![Ok("dump one".to_string()), Ok("dump two".to_string())]),
            exists: true,
        };
        assert_eq!(fake.capture(1, Duration::from_secs(1)).unwrap(), "dump one");
        assert_eq!(fake.capture(1, Duration::from_secs(1)).unwrap(), "dump two");
    }

    #[test]
    fn fake_capture_surfaces_process_not_found() {
        let fake = FakeCapture { responses: RefCell::new(vec![Err(CaptureError::ProcessNotFound(42))]), exists: false };
        assert!(!fake.process_exists(42));
        assert!(matches!(fake.capture(42, Duration::from_secs(1)), Err(CaptureError::ProcessNotFound(42))));
    }
}
