//! Per-stage execution records.

use super::StageStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to one stage during a run.
///
/// Records are final once the stage reaches a terminal status; nothing is
/// rolled back when a later stage fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage name.
    pub name: String,

    /// Final (or current) status.
    pub status: StageStatus,

    /// Why the stage was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,

    /// Error message for failed stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the stage started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the stage reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Wall-clock duration in milliseconds.
    #[serde(default)]
    pub duration_ms: f64,
}

impl StageRecord {
    /// Creates a pending record.
    #[must_use]
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StageStatus::Pending,
            skip_reason: None,
            error: None,
            started_at: None,
            finished_at: None,
            duration_ms: 0.0,
        }
    }

    /// Marks the record as started now.
    pub fn start(&mut self) {
        self.status = StageStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Moves the record to a terminal status.
    pub fn finish(&mut self, status: StageStatus) {
        let now = Utc::now();
        self.status = status;
        self.finished_at = Some(now);
        if let Some(started) = self.started_at {
            self.duration_ms = (now - started).num_microseconds().unwrap_or(0) as f64 / 1000.0;
        }
    }

    /// Records a skip.
    pub fn skip(&mut self, reason: impl Into<String>) {
        self.skip_reason = Some(reason.into());
        self.finish(StageStatus::Skip);
    }

    /// Records a failure.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.finish(StageStatus::Fail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lifecycle() {
        let mut record = StageRecord::pending("prepare-spigot");
        assert_eq!(record.status, StageStatus::Pending);

        record.start();
        assert_eq!(record.status, StageStatus::Running);
        assert!(record.started_at.is_some());

        record.finish(StageStatus::Ok);
        assert_eq!(record.status, StageStatus::Ok);
        assert!(record.finished_at >= record.started_at);
    }

    #[test]
    fn test_record_skip_keeps_reason() {
        let mut record = StageRecord::pending("prepare-spigot");
        record.skip("already staged");

        assert_eq!(record.status, StageStatus::Skip);
        assert_eq!(record.skip_reason.as_deref(), Some("already staged"));
        assert!(record.started_at.is_none());
    }

    #[test]
    fn test_record_serialization_omits_empty_fields() {
        let record = StageRecord::pending("x");
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["status"], "pending");
    }
}
