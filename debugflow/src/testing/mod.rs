//! Testing utilities for debug pipelines.
//!
//! This module provides:
//! - A recording process runner that never spawns anything
//! - Recording stages for scheduler tests
//! - Temporary project fixtures

mod fixtures;
mod mocks;

pub use fixtures::{fake_build_tools, TestProject};
pub use mocks::{ExecutionLog, RecordingProcessRunner, RecordingStage};
