//! Fakes for stages and process execution.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::context::StageContext;
use crate::errors::DebugflowError;
use crate::process::{ProcessOutput, ProcessRunner, ProcessSpec};
use crate::stages::Stage;

type Hook = Box<dyn Fn(&ProcessSpec) + Send + Sync>;

/// A [`ProcessRunner`] that records every command instead of running it.
///
/// Captured runs return scripted outputs in order, then succeed with empty
/// output. Interactive runs return the configured exit code, or block until
/// cancellation when [`block_interactive`](Self::block_interactive) is set.
#[derive(Default)]
pub struct RecordingProcessRunner {
    calls: Mutex<Vec<ProcessSpec>>,
    outputs: Mutex<VecDeque<ProcessOutput>>,
    exit_code: Option<Option<i32>>,
    block_interactive: bool,
    hook: Option<Hook>,
}

impl RecordingProcessRunner {
    /// Creates a runner where every process succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the output returned by the next captured run.
    #[must_use]
    pub fn with_output(self, output: ProcessOutput) -> Self {
        self.outputs.lock().push_back(output);
        self
    }

    /// Sets the exit code returned by interactive runs.
    #[must_use]
    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Makes interactive runs wait for cancellation, like a server that
    /// never stops on its own.
    #[must_use]
    pub fn block_interactive(mut self) -> Self {
        self.block_interactive = true;
        self
    }

    /// Calls `hook` with each command before it "runs".
    #[must_use]
    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ProcessSpec) + Send + Sync + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Returns every recorded command, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<ProcessSpec> {
        self.calls.lock().clone()
    }

    fn record(&self, spec: &ProcessSpec) {
        if let Some(hook) = &self.hook {
            hook(spec);
        }
        self.calls.lock().push(spec.clone());
    }
}

impl fmt::Debug for RecordingProcessRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingProcessRunner")
            .field("calls", &self.calls.lock().len())
            .field("exit_code", &self.exit_code)
            .field("block_interactive", &self.block_interactive)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ProcessRunner for RecordingProcessRunner {
    async fn run(
        &self,
        spec: &ProcessSpec,
        token: &CancellationToken,
    ) -> Result<ProcessOutput, DebugflowError> {
        if token.is_cancelled() {
            return Err(DebugflowError::Cancelled(token.reason().unwrap_or_default()));
        }
        self.record(spec);
        Ok(self
            .outputs
            .lock()
            .pop_front()
            .unwrap_or_else(|| ProcessOutput::success("")))
    }

    async fn run_interactive(
        &self,
        spec: &ProcessSpec,
        token: &CancellationToken,
    ) -> Result<Option<i32>, DebugflowError> {
        self.record(spec);
        if self.block_interactive {
            token.cancelled().await;
            return Err(DebugflowError::Cancelled(token.reason().unwrap_or_default()));
        }
        Ok(self.exit_code.unwrap_or(Some(0)))
    }
}

/// Shared log of stage executions, in the order they started.
pub type ExecutionLog = Arc<Mutex<Vec<String>>>;

/// A configurable stage that appends its name to an [`ExecutionLog`].
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    log: ExecutionLog,
    delay: Duration,
    error: Option<String>,
    skip: Option<String>,
}

impl RecordingStage {
    /// Creates a stage that succeeds immediately.
    #[must_use]
    pub fn new(name: impl Into<String>, log: ExecutionLog) -> Self {
        Self {
            name: name.into(),
            log,
            delay: Duration::ZERO,
            error: None,
            skip: None,
        }
    }

    /// Sleeps before finishing. The sleep ends early on cancellation.
    #[must_use]
    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    /// Fails with an internal error carrying `message`.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Reports a skip reason, so the stage never runs.
    #[must_use]
    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.skip = Some(reason.into());
        self
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.name
    }

    fn skip_reason(&self) -> Option<String> {
        self.skip.clone()
    }

    async fn execute(&self, ctx: &StageContext) -> Result<(), DebugflowError> {
        self.log.lock().push(self.name.clone());

        if !self.delay.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(self.delay) => {}
                () = ctx.token().cancelled() => {}
            }
        }
        ctx.ensure_not_cancelled()?;

        match &self.error {
            Some(message) => Err(DebugflowError::Internal(message.clone())),
            None => Ok(()),
        }
    }
}
