//! External process execution.
//!
//! Stages never touch `tokio::process` directly; they go through a
//! [`ProcessRunner`] so tests can substitute a recording fake. Both modes are
//! cancellation-aware: when the run's token fires, the child is killed before
//! the call returns.

use crate::cancellation::CancellationToken;
use crate::errors::DebugflowError;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Number of output lines kept when reporting a failed process.
const FAILURE_TAIL_LINES: usize = 40;

/// A command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// The executable.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Working directory, if not inherited.
    pub cwd: Option<PathBuf>,
}

impl ProcessSpec {
    /// Creates a spec for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Builds a spec from an argv list. Returns `None` for an empty list.
    #[must_use]
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone()).args(args.iter().cloned()))
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        command
    }

    fn spawn_error(&self, source: std::io::Error) -> DebugflowError {
        DebugflowError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ProcessOutput {
    /// Creates a successful output with the given stdout.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Creates a failed output.
    #[must_use]
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the process exited with code zero.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns the last lines of stderr, or of stdout when stderr is empty.
    #[must_use]
    pub fn tail(&self, lines: usize) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let all: Vec<&str> = source.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }

    /// Converts a non-zero exit into [`DebugflowError::ProcessFailed`].
    pub fn into_result(self, program: &str) -> Result<Self, DebugflowError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(DebugflowError::ProcessFailed {
                program: program.to_string(),
                code: self.code,
                output: self.tail(FAILURE_TAIL_LINES),
            })
        }
    }
}

impl From<std::process::Output> for ProcessOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Trait for running external processes.
#[async_trait]
pub trait ProcessRunner: Send + Sync + fmt::Debug {
    /// Runs a process to completion with output captured.
    ///
    /// Returns the output regardless of exit code; callers decide what a
    /// failure means. Fails with [`DebugflowError::Cancelled`] if the token
    /// fires first, in which case the child has been killed.
    async fn run(
        &self,
        spec: &ProcessSpec,
        token: &CancellationToken,
    ) -> Result<ProcessOutput, DebugflowError>;

    /// Runs a process in the foreground with the console attached.
    ///
    /// Standard input, output and error are inherited so an operator can
    /// interact with the process. Blocks until it exits and returns the exit
    /// code.
    async fn run_interactive(
        &self,
        spec: &ProcessSpec,
        token: &CancellationToken,
    ) -> Result<Option<i32>, DebugflowError>;
}

/// Production runner backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    /// Creates a new system runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn cancelled(token: &CancellationToken) -> DebugflowError {
    DebugflowError::Cancelled(token.reason().unwrap_or_else(|| "cancelled".to_string()))
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(
        &self,
        spec: &ProcessSpec,
        token: &CancellationToken,
    ) -> Result<ProcessOutput, DebugflowError> {
        debug!(command = %spec, cwd = ?spec.cwd, "Running process");

        let child = spec
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spec.spawn_error(e))?;

        // Dropping the wait future drops the child, which kills it.
        tokio::select! {
            output = child.wait_with_output() => {
                let output = ProcessOutput::from(output?);
                debug!(program = %spec.program, code = ?output.code, "Process exited");
                Ok(output)
            }
            () = token.cancelled() => {
                warn!(program = %spec.program, "Process killed by cancellation");
                Err(cancelled(token))
            }
        }
    }

    async fn run_interactive(
        &self,
        spec: &ProcessSpec,
        token: &CancellationToken,
    ) -> Result<Option<i32>, DebugflowError> {
        info!(command = %spec, cwd = ?spec.cwd, "Starting foreground process");

        let mut child = spec
            .command()
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| spec.spawn_error(e))?;

        let status = tokio::select! {
            status = child.wait() => Some(status?),
            () = token.cancelled() => None,
        };

        match status {
            Some(status) => {
                info!(program = %spec.program, code = ?status.code(), "Foreground process exited");
                Ok(status.code())
            }
            None => {
                warn!(program = %spec.program, "Stopping foreground process after cancellation");
                if let Err(e) = child.start_kill() {
                    warn!(error = %e, "Failed to signal foreground process");
                }
                let _ = child.wait().await;
                Err(cancelled(token))
            }
        }
    }
}
