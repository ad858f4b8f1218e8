//! Execution contexts.

mod execution;

pub use execution::{PipelineContext, StageContext};
