//! Stage status and group enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The group a stage is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageGroup {
    /// Stages that build the consumer's own project.
    Build,
    /// Stages that provision or run the debug server.
    #[default]
    Debug,
    /// Aggregate stages that only exist to pull others in.
    Lifecycle,
}

impl fmt::Display for StageGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Debug => write!(f, "debug"),
            Self::Lifecycle => write!(f, "lifecycle"),
        }
    }
}

/// The execution status of a stage within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage is scheduled but has not started.
    #[default]
    Pending,
    /// Stage is currently running.
    Running,
    /// Stage ran to completion.
    Ok,
    /// Stage's skip predicate held; it did nothing.
    Skip,
    /// Stage failed.
    Fail,
    /// Stage was cancelled before or while running.
    Cancel,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Ok => write!(f, "ok"),
            Self::Skip => write!(f, "skip"),
            Self::Fail => write!(f, "fail"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}
