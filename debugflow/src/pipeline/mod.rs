//! Pipeline building and execution.
//!
//! This module provides:
//! - Stage specifications with depends-on and must-run-after edges
//! - A builder that validates the graph
//! - The scheduler that runs a set of targets on a bounded worker pool
//! - The wired debug-server pipeline

mod builder;
mod dag;
mod debug;
mod spec;

pub use builder::{PipelineBuilder, DEFAULT_MAX_PARALLEL};
pub use dag::{GraphExecutionResult, StageGraph};
pub use debug::{DebugPipeline, DEBUG_STAGE};
pub use spec::StageSpec;
