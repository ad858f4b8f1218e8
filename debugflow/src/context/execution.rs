//! Execution contexts for pipeline and stage execution.

use crate::cancellation::CancellationToken;
use crate::errors::DebugflowError;
use crate::events::{EventSink, NoOpEventSink};
use std::sync::Arc;
use uuid::Uuid;

/// The context shared by every stage of one pipeline run.
pub struct PipelineContext {
    /// Unique ID of this run.
    run_id: Uuid,
    /// Event sink for emitting lifecycle events.
    event_sink: Arc<dyn EventSink>,
    /// Cancellation token shared with subprocesses.
    token: Arc<CancellationToken>,
}

impl PipelineContext {
    /// Creates a new pipeline context with a fresh run ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            event_sink: Arc::new(NoOpEventSink),
            token: Arc::new(CancellationToken::new()),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_token(mut self, token: Arc<CancellationToken>) -> Self {
        self.token = token;
        self
    }

    /// Returns the run ID.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn token(&self) -> &Arc<CancellationToken> {
        &self.token
    }

    /// Checks if the run is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Tries to emit an event, tagging it with the run ID.
    pub fn try_emit_event(&self, event_type: &str, data: Option<serde_json::Value>) {
        let data = match data {
            Some(serde_json::Value::Object(mut map)) => {
                map.insert("run_id".into(), serde_json::json!(self.run_id.to_string()));
                serde_json::Value::Object(map)
            }
            Some(other) => serde_json::json!({ "run_id": self.run_id.to_string(), "data": other }),
            None => serde_json::json!({ "run_id": self.run_id.to_string() }),
        };
        self.event_sink.try_emit(event_type, Some(data));
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("run_id", &self.run_id)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// The context handed to a single stage.
#[derive(Debug, Clone)]
pub struct StageContext {
    pipeline: Arc<PipelineContext>,
    stage_name: String,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(pipeline: Arc<PipelineContext>, stage_name: impl Into<String>) -> Self {
        Self {
            pipeline,
            stage_name: stage_name.into(),
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Returns the owning pipeline context.
    #[must_use]
    pub fn pipeline(&self) -> &Arc<PipelineContext> {
        &self.pipeline
    }

    /// Returns the run's cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        self.pipeline.token()
    }

    /// Fails with [`DebugflowError::Cancelled`] if the run has been cancelled.
    pub fn ensure_not_cancelled(&self) -> Result<(), DebugflowError> {
        if self.pipeline.is_cancelled() {
            let reason = self
                .pipeline
                .token()
                .reason()
                .unwrap_or_else(|| "cancelled".to_string());
            return Err(DebugflowError::Cancelled(reason));
        }
        Ok(())
    }

    /// Emits an event on behalf of this stage.
    pub fn emit(&self, event_type: &str, mut data: serde_json::Value) {
        if let serde_json::Value::Object(map) = &mut data {
            map.insert("stage".into(), serde_json::json!(self.stage_name));
        }
        self.pipeline.try_emit_event(event_type, Some(data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;

    #[test]
    fn test_events_carry_run_id_and_stage() {
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = Arc::new(PipelineContext::new().with_event_sink(sink.clone()));
        let stage = StageContext::new(ctx.clone(), "prepare-spigot");

        stage.emit("stage.note", serde_json::json!({"path": "/tmp/x"}));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        let data = events[0].1.as_ref().unwrap();
        assert_eq!(data["stage"], "prepare-spigot");
        assert_eq!(data["run_id"], ctx.run_id().to_string());
    }

    #[test]
    fn test_ensure_not_cancelled() {
        let ctx = Arc::new(PipelineContext::new());
        let stage = StageContext::new(ctx.clone(), "run-spigot");
        assert!(stage.ensure_not_cancelled().is_ok());

        ctx.token().cancel("Ctrl-C");
        let err = stage.ensure_not_cancelled().unwrap_err();
        assert!(matches!(err, DebugflowError::Cancelled(ref r) if r == "Ctrl-C"));
    }
}
