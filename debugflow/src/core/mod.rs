//! Core domain model types for debugflow.
//!
//! This module contains:
//! - Stage status and group enums
//! - Per-stage execution records

mod record;
mod status;

pub use record::StageRecord;
pub use status::{StageGroup, StageStatus};
