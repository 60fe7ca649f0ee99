//! External tool invocation
//!
//! Every external program (`svd2rust`, `form`, `rustfmt`, `svdtools`, `cargo`,
//! `git`) is run through the [`ToolInvoker`] trait so that operations can be
//! exercised against a fake in tests.
//!
//! [`SystemInvoker`] spawns real processes. Each invocation is bounded by a
//! timeout and observes the run's [`CancelToken`]; a child that outlives
//! either is killed together with every process it started.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

#[cfg(test)]
pub mod fake;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long output is still collected after the process is gone
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// One external command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: &Path) -> Self {
        self.cwd = Some(cwd.to_path_buf());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Diagnostics worth showing to a user: stderr, or stdout if stderr is empty
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Reasons a process did not run to completion
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("failed to start `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    #[error("`{program}` timed out after {}s", .after.as_secs())]
    TimedOut { program: String, after: Duration },

    #[error("`{program}` was cancelled")]
    Cancelled { program: String },
}

/// Why a step of a target did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepFailure {
    Cancelled,
    /// Non-zero exit, timeout or spawn failure; `exit_code` is `None` unless
    /// the process actually exited
    Failed {
        exit_code: Option<i32>,
        diagnostics: String,
    },
}

/// Capability to run external commands
pub trait ToolInvoker: Send + Sync {
    /// Run a command to completion, capturing its output
    ///
    /// A non-zero exit status is not an error at this level; callers decide
    /// what a failure means for their target.
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError>;

    /// Run a command that must exit successfully
    fn run_step(&self, invocation: &Invocation) -> Result<ToolOutput, StepFailure> {
        match self.run(invocation) {
            Ok(output) if output.is_success() => Ok(output),
            Ok(output) => Err(StepFailure::Failed {
                exit_code: output.exit_code,
                diagnostics: output.diagnostics(),
            }),
            Err(ToolError::Cancelled { .. }) => Err(StepFailure::Cancelled),
            Err(e) => Err(StepFailure::Failed {
                exit_code: None,
                diagnostics: e.to_string(),
            }),
        }
    }
}

/// Cancellation flag shared by a run
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on cancellation
    ///
    /// Returns `false` if the sleep was interrupted.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            if self.is_cancelled() {
                return false;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            thread::sleep(left.min(POLL_INTERVAL));
        }
        !self.is_cancelled()
    }
}

/// Runs commands as real child processes
#[derive(Debug, Clone)]
pub struct SystemInvoker {
    cancel: CancelToken,
}

impl SystemInvoker {
    pub fn new(cancel: CancelToken) -> Self {
        Self { cancel }
    }

    fn wait_bounded(
        &self,
        child: &mut Child,
        invocation: &Invocation,
    ) -> Result<Option<i32>, ToolError> {
        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status.code()),
                Ok(None) => {}
                Err(e) => {
                    return Err(ToolError::Spawn {
                        program: invocation.program.clone(),
                        reason: e.to_string(),
                    });
                }
            }

            if self.cancel.is_cancelled() {
                kill(child);
                return Err(ToolError::Cancelled {
                    program: invocation.program.clone(),
                });
            }

            if started.elapsed() >= invocation.timeout {
                kill(child);
                return Err(ToolError::TimedOut {
                    program: invocation.program.clone(),
                    after: invocation.timeout,
                });
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl ToolInvoker for SystemInvoker {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        if self.cancel.is_cancelled() {
            return Err(ToolError::Cancelled {
                program: invocation.program.clone(),
            });
        }

        debug!(cwd = ?invocation.cwd, "running {}", invocation);

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }
        // Own process group, so a kill reaches grandchildren holding our pipes
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|e| ToolError::Spawn {
            program: invocation.program.clone(),
            reason: e.to_string(),
        })?;

        // Pipes are drained on their own threads so a chatty child cannot
        // block on a full pipe while we poll for its exit.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let exit_code = self.wait_bounded(&mut child, invocation);

        let deadline = Instant::now() + DRAIN_GRACE;
        let stdout = stdout.map(|d| d.finish(deadline)).unwrap_or_default();
        let stderr = stderr.map(|d| d.finish(deadline)).unwrap_or_default();
        let exit_code = exit_code?;

        debug!(
            exit_code = ?exit_code,
            "finished {}",
            invocation.program
        );

        Ok(ToolOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

/// Kill the child's whole process group, then reap the child
fn kill(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Ok(pid) = i32::try_from(child.id()) {
            if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                debug!("killing process group {}: {}", pid, e);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Output of one pipe, read on its own thread
struct Drain {
    buffer: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

impl Drain {
    /// Output read so far, waiting until `deadline` for the pipe to close
    ///
    /// A process that escaped the kill can keep the pipe open; its reader
    /// thread is then left behind.
    fn finish(self, deadline: Instant) -> String {
        if self
            .done
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            .is_err()
        {
            debug!("pipe still open after the process ended, output may be incomplete");
        }
        let buffer = self.buffer.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> Drain {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done) = mpsc::channel();
    let shared = Arc::clone(&buffer);
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    if let Ok(mut buffer) = shared.lock() {
                        buffer.extend_from_slice(&chunk[..n]);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
        let _ = done_tx.send(());
    });
    Drain { buffer, done }
}
