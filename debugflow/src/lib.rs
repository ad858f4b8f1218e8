//! # Debugflow
//!
//! Provisions and runs a local Spigot server for debugging a plugin project.
//!
//! A debug run is a small graph of stages:
//!
//! - **Fetch**: download BuildTools once
//! - **Build**: run BuildTools for the configured revision
//! - **Stage**: copy the built server jar to its canonical path
//! - **Inject**: copy the freshly built plugin jar into `plugins/`
//! - **Launch**: accept the EULA and run the server in the foreground
//!
//! Stages are connected by depends-on edges (requesting a stage schedules its
//! dependencies) and must-run-after edges (ordering only, when both stages
//! are scheduled). Stages with nothing to do are skipped right before they
//! would run.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use debugflow::prelude::*;
//!
//! let options = Arc::new(DebugSettings::load_or_default(path)?.apply_env()?.resolve(project_dir)?);
//! let pipeline = DebugPipeline::new(options.clone())?;
//!
//! let targets = DebugPipeline::default_targets(&options);
//! let result = pipeline.run(&targets, Arc::new(PipelineContext::new())).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod process;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{DebugOptions, DebugSettings};
    pub use crate::context::{PipelineContext, StageContext};
    pub use crate::core::{StageGroup, StageRecord, StageStatus};
    pub use crate::errors::{DebugflowError, PipelineValidationError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        DebugPipeline, GraphExecutionResult, PipelineBuilder, StageGraph, StageSpec,
    };
    pub use crate::process::{ProcessRunner, ProcessSpec, SystemProcessRunner};
    pub use crate::stages::Stage;
}
