//! Child process execution with streamed output and cooperative cancellation.
//!
//! A command runs to completion or until its [`CancellationToken`] fires, in
//! which case the child is killed. Output lines are sent to an [`OutputSink`]
//! as they arrive; only the terminal [`ProcessOutcome`] carries state.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Time allowed for draining stdout/stderr after the child exits.
const IO_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A command to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Stream an output line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of child output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

/// Receiver side of streamed output.
pub type OutputSink = mpsc::UnboundedSender<OutputLine>;

/// Terminal result of a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Exit code 0.
    Success,
    /// Non-zero exit code.
    Failed { code: i32 },
    /// Terminated by a signal it did not ask for.
    Signaled { signal: i32 },
    /// The process could not be started.
    SpawnError(String),
    /// Killed, or never started, because of a cancellation request.
    Cancelled,
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Success)
    }

    fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            return ProcessOutcome::Success;
        }
        if let Some(code) = status.code() {
            return ProcessOutcome::Failed { code };
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ProcessOutcome::Signaled { signal };
            }
        }
        ProcessOutcome::Failed { code: -1 }
    }
}

impl std::fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "exited successfully"),
            Self::Failed { code } => write!(f, "exited with code {code}"),
            Self::Signaled { signal } => write!(f, "terminated by signal {signal}"),
            Self::SpawnError(message) => write!(f, "failed to start: {message}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Runs commands on behalf of the run orchestrator.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion, streaming its output into `output`.
    ///
    /// A command whose token is already cancelled is never started.
    async fn run(
        &self,
        command: &CommandSpec,
        cancel: CancellationToken,
        output: OutputSink,
    ) -> ProcessOutcome;
}

/// [`CommandRunner`] spawning real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        command: &CommandSpec,
        cancel: CancellationToken,
        output: OutputSink,
    ) -> ProcessOutcome {
        if cancel.is_cancelled() {
            return ProcessOutcome::Cancelled;
        }

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &command.cwd {
            cmd.current_dir(cwd);
        }

        debug!(command = %command.display(), "spawning process");

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %command.display(), error = %e, "failed to spawn process");
                return ProcessOutcome::SpawnError(e.to_string());
            }
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return ProcessOutcome::SpawnError("child output was not captured".to_string());
        };

        let mut pumps = [
            pump_lines(stdout, OutputStream::Stdout, output.clone()),
            pump_lines(stderr, OutputStream::Stderr, output),
        ];

        let outcome = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => ProcessOutcome::from_status(status),
                Err(e) => ProcessOutcome::SpawnError(e.to_string()),
            },
            () = cancel.cancelled() => {
                info!(command = %command.display(), "cancellation requested; killing process");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill cancelled process");
                }
                ProcessOutcome::Cancelled
            }
        };

        let drained = timeout(IO_DRAIN_TIMEOUT, async {
            for pump in pumps.iter_mut() {
                let _ = pump.await;
            }
        })
        .await;
        if drained.is_err() {
            warn!(command = %command.display(), "output capture timed out");
            for pump in &pumps {
                pump.abort();
            }
        }

        debug!(command = %command.display(), outcome = %outcome, "process finished");
        outcome
    }
}

/// Forward every line of `reader` to `output` until EOF.
fn pump_lines<R>(reader: R, stream: OutputStream, output: OutputSink) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                // Receiver gone means nobody listens; keep draining.
                Ok(Some(text)) => {
                    let _ = output.send(OutputLine { stream, text });
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "failed to read process output");
                    break;
                }
            }
        }
    })
}
