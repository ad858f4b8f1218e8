//! Error types for debugflow.
//!
//! Every failure of a debug run ends up as a [`DebugflowError`]. Errors raised
//! by a stage are wrapped in [`DebugflowError::StageFailed`] by the executor so
//! the operator can see which stage broke.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// URL of the Minecraft EULA the server launcher asks the operator to accept.
pub const EULA_URL: &str = "https://account.mojang.com/documents/minecraft_eula";

/// The main error type for debugflow operations.
#[derive(Debug, Error)]
pub enum DebugflowError {
    /// The operator has not accepted the EULA.
    #[error(
        "The Minecraft EULA has not been accepted. If you agree to it ({}), set \
         `eula = true` in the [debug] table of debugflow.toml, set DEBUGFLOW_EULA=true, \
         or pass --eula.",
        EULA_URL
    )]
    EulaNotAccepted,

    /// The BuildTools metadata file is missing or malformed.
    #[error("Error while reading buildVersion in {}: {reason}", path.display())]
    BuildInfo {
        /// Path of the metadata file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// An expected artifact was not found on disk.
    #[error("{0}")]
    ArtifactNotFound(String),

    /// A subprocess exited unsuccessfully.
    #[error("'{program}' exited with {}{}", describe_code(*code), describe_output(output))]
    ProcessFailed {
        /// The program that was run.
        program: String,
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Tail of the captured output.
        output: String,
    },

    /// A subprocess could not be started.
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        /// The program that was run.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Downloading a remote artifact failed.
    #[error("Failed to download {url}: {reason}")]
    Download {
        /// The source URL.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A requested stage does not exist in the graph.
    #[error("Stage '{0}' not found in pipeline")]
    UnknownStage(String),

    /// The pipeline graph is invalid.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A stage failed; wraps the stage's own error.
    #[error("Execution failed for stage '{stage}' ({description}): {source}")]
    StageFailed {
        /// The stage name.
        stage: String,
        /// The stage description.
        description: String,
        /// The underlying error.
        #[source]
        source: Box<DebugflowError>,
    },

    /// The run was cancelled.
    #[error("Pipeline cancelled: {0}")]
    Cancelled(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_code(code: Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}"))
}

fn describe_output(output: &str) -> String {
    if output.trim().is_empty() {
        String::new()
    } else {
        format!("\n{output}")
    }
}

impl DebugflowError {
    /// Wraps an error with the stage that produced it.
    #[must_use]
    pub fn in_stage(self, stage: impl Into<String>, description: impl Into<String>) -> Self {
        Self::StageFailed {
            stage: stage.into(),
            description: description.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, unwrapping any stage context.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the name of the failing stage, if known.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::StageFailed { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Returns true if the error is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled(_))
    }
}

/// Metadata about a graph contract violation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "GRAPH-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when a cycle is detected in the stage graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in pipeline: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stages forming the cycle.
    pub cycle_path: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = ContractErrorInfo::new(
            "GRAPH-CYCLE",
            format!("Pipeline contains an ordering cycle: {}", cycle_path.join(" -> ")),
        )
        .with_fix_hint("Remove one of the depends-on or must-run-after edges in the cycle.");

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

impl From<CycleDetectedError> for PipelineValidationError {
    fn from(err: CycleDetectedError) -> Self {
        Self {
            message: err.to_string(),
            stages: err.cycle_path.clone(),
            error_info: Some(err.error_info),
        }
    }
}
