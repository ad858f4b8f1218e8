//! Stage graph scheduling and execution.
//!
//! A run starts from a set of target stages. The scheduled set is the targets
//! plus everything they transitively depend on. Must-run-after edges only
//! order stages that are both scheduled. Ready stages run on a bounded worker
//! pool; the first failure cancels the run.

use super::StageSpec;
use crate::context::{PipelineContext, StageContext};
use crate::core::{StageRecord, StageStatus};
use crate::errors::DebugflowError;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct GraphExecutionResult {
    /// The run ID.
    pub run_id: Uuid,
    /// One record per scheduled stage, in scheduling order.
    pub records: Vec<StageRecord>,
    /// Stage names in the order they finished (ran or skipped).
    pub completion_order: Vec<String>,
    /// Total execution time in milliseconds.
    pub duration_ms: f64,
}

impl GraphExecutionResult {
    /// Returns the record for a stage, if it was scheduled.
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&StageRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Names of stages that actually ran.
    #[must_use]
    pub fn executed(&self) -> Vec<&str> {
        self.with_status(StageStatus::Ok)
    }

    /// Names of stages whose skip predicate held.
    #[must_use]
    pub fn skipped(&self) -> Vec<&str> {
        self.with_status(StageStatus::Skip)
    }

    fn with_status(&self, status: StageStatus) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.name.as_str())
            .collect()
    }
}

/// What a worker reports back for one stage.
enum Outcome {
    Finished(StageRecord),
    Failed(StageRecord, DebugflowError),
}

/// A validated graph of stages. Built by
/// [`PipelineBuilder`](super::PipelineBuilder).
#[derive(Debug)]
pub struct StageGraph {
    /// The pipeline name.
    name: String,
    /// Stage specifications.
    stages: HashMap<String, StageSpec>,
    /// Registration order, used to break ties deterministically.
    stage_order: Vec<String>,
    max_parallel: usize,
}

impl StageGraph {
    pub(super) fn new(
        name: String,
        stages: HashMap<String, StageSpec>,
        stage_order: Vec<String>,
        max_parallel: usize,
    ) -> Self {
        Self {
            name,
            stages,
            stage_order,
            max_parallel,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Maximum number of stages running at once.
    #[must_use]
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Looks up a stage by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StageSpec> {
        self.stages.get(name)
    }

    /// Iterates over the stages in registration order.
    pub fn stages(&self) -> impl Iterator<Item = &StageSpec> {
        self.stage_order.iter().filter_map(|name| self.stages.get(name))
    }

    /// Computes the scheduled set for `targets`, in a valid execution order.
    ///
    /// # Errors
    ///
    /// Returns [`DebugflowError::UnknownStage`] if a target is not in the graph.
    pub fn plan<S: AsRef<str>>(&self, targets: &[S]) -> Result<Vec<String>, DebugflowError> {
        let scheduled = self.closure(targets)?;
        let preds = self.predecessors(&scheduled);

        let mut remaining: HashMap<&str, usize> = preds
            .iter()
            .map(|(name, p)| (name.as_str(), p.len()))
            .collect();
        let mut order = Vec::with_capacity(scheduled.len());
        while order.len() < scheduled.len() {
            let next = self
                .stage_order
                .iter()
                .find(|name| remaining.get(name.as_str()) == Some(&0))
                .ok_or_else(|| DebugflowError::Internal("stage graph has a cycle".into()))?;
            remaining.remove(next.as_str());
            for (name, p) in &preds {
                if p.contains(next) {
                    if let Some(count) = remaining.get_mut(name.as_str()) {
                        *count -= 1;
                    }
                }
            }
            order.push(next.clone());
        }
        Ok(order)
    }

    fn closure<S: AsRef<str>>(&self, targets: &[S]) -> Result<HashSet<String>, DebugflowError> {
        let mut scheduled = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        for target in targets {
            let target = target.as_ref();
            if !self.stages.contains_key(target) {
                return Err(DebugflowError::UnknownStage(target.to_string()));
            }
            queue.push_back(target.to_string());
        }

        while let Some(name) = queue.pop_front() {
            if !scheduled.insert(name.clone()) {
                continue;
            }
            if let Some(spec) = self.stages.get(&name) {
                queue.extend(spec.depends_on.iter().cloned());
            }
        }
        Ok(scheduled)
    }

    /// Effective predecessors: depends-on, plus must-run-after edges whose
    /// target is also scheduled.
    fn predecessors(&self, scheduled: &HashSet<String>) -> HashMap<String, BTreeSet<String>> {
        scheduled
            .iter()
            .filter_map(|name| self.stages.get(name))
            .map(|spec| {
                let mut preds = spec.depends_on.clone();
                preds.extend(
                    spec.must_run_after
                        .iter()
                        .filter(|edge| scheduled.contains(*edge))
                        .cloned(),
                );
                (spec.name.clone(), preds)
            })
            .collect()
    }

    /// Runs `targets` and everything they depend on.
    ///
    /// Stages with no pending predecessor are dispatched onto a worker pool
    /// bounded by [`max_parallel`](Self::max_parallel). A stage's skip
    /// predicate is evaluated right before it would run; a skipped stage
    /// counts as complete for its successors.
    ///
    /// # Errors
    ///
    /// - [`DebugflowError::UnknownStage`] for an unknown target, before
    ///   anything runs.
    /// - [`DebugflowError::StageFailed`] for the first stage that fails. The
    ///   run's token is cancelled and in-flight stages are aborted.
    /// - [`DebugflowError::Cancelled`] if the token is cancelled from outside.
    pub async fn execute<S: AsRef<str>>(
        &self,
        targets: &[S],
        ctx: Arc<PipelineContext>,
    ) -> Result<GraphExecutionResult, DebugflowError> {
        let start = Instant::now();
        let plan = self.plan(targets)?;
        let scheduled: HashSet<String> = plan.iter().cloned().collect();
        let preds = self.predecessors(&scheduled);

        let mut pending: HashMap<String, usize> =
            preds.iter().map(|(name, p)| (name.clone(), p.len())).collect();
        let mut records: HashMap<String, StageRecord> = plan
            .iter()
            .map(|name| (name.clone(), StageRecord::pending(name)))
            .collect();
        let mut completion_order = Vec::with_capacity(plan.len());

        info!(
            pipeline = %self.name,
            run_id = %ctx.run_id(),
            stages = ?plan,
            "Starting pipeline"
        );
        ctx.try_emit_event(
            "pipeline.started",
            Some(serde_json::json!({ "pipeline": self.name, "stages": plan })),
        );

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut workers: JoinSet<Outcome> = JoinSet::new();
        let mut running: HashSet<String> = HashSet::new();

        let mut ready: VecDeque<String> = plan
            .iter()
            .filter(|name| pending.get(*name) == Some(&0))
            .cloned()
            .collect();

        while completion_order.len() < plan.len() {
            if ctx.is_cancelled() {
                return Err(self
                    .abort(&mut workers, &running, &mut records, &ctx)
                    .await);
            }

            while let Some(name) = ready.pop_front() {
                if let Some(spec) = self.stages.get(&name) {
                    running.insert(name.clone());
                    workers.spawn(run_stage(spec.clone(), ctx.clone(), semaphore.clone()));
                }
            }

            let joined = tokio::select! {
                joined = workers.join_next() => joined,
                () = ctx.token().cancelled() => continue,
            };

            let outcome = match joined {
                Some(Ok(outcome)) => outcome,
                Some(Err(e)) => {
                    ctx.token().cancel("stage task panicked");
                    self.abort(&mut workers, &running, &mut records, &ctx).await;
                    return Err(DebugflowError::Internal(format!("stage task failed: {e}")));
                }
                None => {
                    let stuck: Vec<_> = plan
                        .iter()
                        .filter(|name| !completion_order.contains(*name))
                        .cloned()
                        .collect();
                    return Err(DebugflowError::Internal(format!(
                        "Deadlocked stage graph; remaining stages: {stuck:?}"
                    )));
                }
            };

            match outcome {
                Outcome::Finished(record) => {
                    let name = record.name.clone();
                    running.remove(&name);
                    self.emit_finished(&ctx, &record);
                    records.insert(name.clone(), record);
                    completion_order.push(name.clone());

                    for (successor, p) in &preds {
                        if p.contains(&name) {
                            if let Some(count) = pending.get_mut(successor) {
                                *count -= 1;
                                if *count == 0 {
                                    ready.push_back(successor.clone());
                                }
                            }
                        }
                    }
                }
                Outcome::Failed(record, error) => {
                    let name = record.name.clone();
                    if error.is_cancelled() && ctx.is_cancelled() {
                        records.insert(name, record);
                        return Err(self
                            .abort(&mut workers, &running, &mut records, &ctx)
                            .await);
                    }
                    running.remove(&name);

                    warn!(stage = %name, error = %error, "Stage failed, stopping pipeline");
                    ctx.try_emit_event(
                        "stage.failed",
                        Some(serde_json::json!({
                            "stage": name,
                            "error": error.to_string(),
                            "duration_ms": record.duration_ms,
                        })),
                    );
                    records.insert(name.clone(), record);

                    ctx.token().cancel(format!("stage '{name}' failed"));
                    self.abort(&mut workers, &running, &mut records, &ctx).await;

                    let description = self
                        .stages
                        .get(&name)
                        .map(|spec| spec.description().to_string())
                        .unwrap_or_default();
                    return Err(error.in_stage(name, description));
                }
            }
        }

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(pipeline = %self.name, duration_ms, "Pipeline completed");
        ctx.try_emit_event(
            "pipeline.completed",
            Some(serde_json::json!({
                "pipeline": self.name,
                "success": true,
                "duration_ms": duration_ms,
            })),
        );

        Ok(GraphExecutionResult {
            run_id: ctx.run_id(),
            records: plan
                .iter()
                .filter_map(|name| records.remove(name))
                .collect(),
            completion_order,
            duration_ms,
        })
    }

    fn emit_finished(&self, ctx: &PipelineContext, record: &StageRecord) {
        match record.status {
            StageStatus::Skip => {
                info!(stage = %record.name, reason = ?record.skip_reason, "Stage skipped");
                ctx.try_emit_event(
                    "stage.skipped",
                    Some(serde_json::json!({
                        "stage": record.name,
                        "reason": record.skip_reason,
                    })),
                );
            }
            _ => {
                debug!(stage = %record.name, duration_ms = record.duration_ms, "Stage completed");
                ctx.try_emit_event(
                    "stage.completed",
                    Some(serde_json::json!({
                        "stage": record.name,
                        "duration_ms": record.duration_ms,
                    })),
                );
            }
        }
    }

    /// Stops every in-flight stage and returns the cancellation error.
    async fn abort(
        &self,
        workers: &mut JoinSet<Outcome>,
        running: &HashSet<String>,
        records: &mut HashMap<String, StageRecord>,
        ctx: &PipelineContext,
    ) -> DebugflowError {
        workers.abort_all();
        while workers.join_next().await.is_some() {}

        for name in running {
            if let Some(record) = records.get_mut(name) {
                record.finish(StageStatus::Cancel);
            }
            ctx.try_emit_event(
                "stage.cancelled",
                Some(serde_json::json!({ "stage": name })),
            );
        }

        let reason = ctx
            .token()
            .reason()
            .unwrap_or_else(|| "cancelled".to_string());
        warn!(pipeline = %self.name, reason = %reason, "Pipeline stopped");
        ctx.try_emit_event(
            "pipeline.completed",
            Some(serde_json::json!({
                "pipeline": self.name,
                "success": false,
                "reason": reason,
            })),
        );
        DebugflowError::Cancelled(reason)
    }
}

/// Worker body for one stage: waits for a pool slot, evaluates the skip
/// predicate, then runs the stage.
async fn run_stage(
    spec: StageSpec,
    ctx: Arc<PipelineContext>,
    semaphore: Arc<Semaphore>,
) -> Outcome {
    let mut record = StageRecord::pending(&spec.name);

    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            record.fail(e.to_string());
            return Outcome::Failed(record, DebugflowError::Internal(e.to_string()));
        }
    };

    let stage_ctx = StageContext::new(ctx.clone(), &spec.name);
    if let Err(e) = stage_ctx.ensure_not_cancelled() {
        record.finish(StageStatus::Cancel);
        return Outcome::Failed(record, e);
    }

    if let Some(reason) = spec.runner.skip_reason() {
        record.skip(reason);
        return Outcome::Finished(record);
    }

    record.start();
    info!(stage = %spec.name, "{}", spec.description());
    ctx.try_emit_event(
        "stage.started",
        Some(serde_json::json!({ "stage": spec.name })),
    );

    match spec.runner.execute(&stage_ctx).await {
        Ok(()) => {
            record.finish(StageStatus::Ok);
            Outcome::Finished(record)
        }
        Err(e) => {
            if e.is_cancelled() {
                record.finish(StageStatus::Cancel);
            } else {
                record.fail(e.to_string());
            }
            Outcome::Failed(record, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::events::CollectingEventSink;
    use crate::pipeline::PipelineBuilder;
    use crate::testing::{ExecutionLog, RecordingStage};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn stage(name: &str, log: &ExecutionLog) -> RecordingStage {
        RecordingStage::new(name, log.clone())
    }

    fn spec(stage: RecordingStage) -> StageSpec {
        StageSpec::new(Arc::new(stage))
    }

    fn context() -> (Arc<PipelineContext>, Arc<CollectingEventSink>) {
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = PipelineContext::new().with_event_sink(sink.clone());
        (Arc::new(ctx), sink)
    }

    /// fetch <- build (mra), stage (mra fetch, build), inject (dep build-plugin),
    /// launch (mra stage, inject), debug (dep everything).
    fn debug_like(log: &ExecutionLog) -> StageGraph {
        PipelineBuilder::new("debug")
            .stage(spec(stage("fetch", log)))
            .unwrap()
            .stage(spec(stage("build", log)).must_run_after(["fetch"]))
            .unwrap()
            .stage(spec(stage("stage", log)).must_run_after(["fetch", "build"]))
            .unwrap()
            .stage(spec(stage("compile", log)))
            .unwrap()
            .stage(spec(stage("inject", log)).depends_on(["compile"]))
            .unwrap()
            .stage(spec(stage("launch", log)).must_run_after(["stage", "inject"]))
            .unwrap()
            .stage(
                spec(stage("debug", log))
                    .depends_on(["inject", "fetch", "stage", "launch"]),
            )
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_plan_includes_transitive_dependencies_only() {
        let log = ExecutionLog::default();
        let graph = debug_like(&log);

        let plan = graph.plan(&["debug"]).unwrap();
        assert!(!plan.contains(&"build".to_string()));
        assert_eq!(plan.last().map(String::as_str), Some("debug"));

        let pos = |n: &str| plan.iter().position(|p| p == n).unwrap();
        assert!(pos("fetch") < pos("stage"));
        assert!(pos("stage") < pos("launch"));
        assert!(pos("compile") < pos("inject"));
        assert!(pos("inject") < pos("launch"));
    }

    #[test]
    fn test_plan_unknown_target() {
        let graph = debug_like(&ExecutionLog::default());
        let err = graph.plan(&["nope"]).unwrap_err();
        assert!(matches!(err, DebugflowError::UnknownStage(ref name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_single_stage_runs_alone() {
        let log = ExecutionLog::default();
        let graph = debug_like(&log);
        let (ctx, _) = context();

        let result = graph.execute(&["stage"], ctx).await.unwrap();

        assert_eq!(log.lock().clone(), vec!["stage"]);
        assert_eq!(result.executed(), vec!["stage"]);
    }

    #[tokio::test]
    async fn test_must_run_after_orders_scheduled_stages() {
        let log = ExecutionLog::default();
        let graph = debug_like(&log);
        let (ctx, sink) = context();

        graph.execute(&["build", "debug"], ctx).await.unwrap();

        let order = log.lock().clone();
        let pos = |n: &str| order.iter().position(|p| p == n).unwrap();
        assert_eq!(order.len(), 7);
        assert!(pos("fetch") < pos("build"));
        assert!(pos("build") < pos("stage"));
        assert!(pos("stage") < pos("launch"));
        assert!(pos("inject") < pos("launch"));
        assert!(pos("launch") < pos("debug"));

        let launch_started = sink.position("stage.started", "launch").unwrap();
        assert!(sink.position("stage.completed", "stage").unwrap() < launch_started);
        assert!(sink.position("stage.completed", "inject").unwrap() < launch_started);
    }

    #[tokio::test]
    async fn test_skipped_stage_unblocks_successors() {
        let log = ExecutionLog::default();
        let graph = PipelineBuilder::new("skip")
            .stage(spec(stage("stage", &log).skipped("already staged")))
            .unwrap()
            .stage(spec(stage("launch", &log)).must_run_after(["stage"]))
            .unwrap()
            .build()
            .unwrap();
        let (ctx, sink) = context();

        let result = graph.execute(&["stage", "launch"], ctx).await.unwrap();

        assert_eq!(log.lock().clone(), vec!["launch"]);
        assert_eq!(result.skipped(), vec!["stage"]);
        assert_eq!(
            result.record("stage").unwrap().skip_reason.as_deref(),
            Some("already staged")
        );
        assert_eq!(result.completion_order, vec!["stage", "launch"]);
        assert!(
            sink.position("stage.skipped", "stage").unwrap()
                < sink.position("stage.started", "launch").unwrap()
        );
    }

    #[tokio::test]
    async fn test_failure_stops_dependents_and_names_stage() {
        let log = ExecutionLog::default();
        let graph = PipelineBuilder::new("fail")
            .stage(spec(stage("compile", &log).failing("compilation failed")))
            .unwrap()
            .stage(spec(stage("inject", &log)).depends_on(["compile"]))
            .unwrap()
            .build()
            .unwrap();
        let (ctx, sink) = context();

        let err = graph.execute(&["inject"], ctx.clone()).await.unwrap_err();

        assert_eq!(err.stage(), Some("compile"));
        assert!(err.to_string().contains("compilation failed"));
        assert_eq!(log.lock().clone(), vec!["compile"]);
        assert!(ctx.is_cancelled());
        assert_eq!(sink.stages_with("stage.failed"), vec!["compile"]);
        assert!(sink.stages_with("stage.started").iter().all(|s| s != "inject"));
    }

    #[tokio::test]
    async fn test_failure_aborts_in_flight_stages() {
        let log = ExecutionLog::default();
        let graph = PipelineBuilder::new("fail")
            .stage(spec(stage("slow", &log).with_delay_ms(10_000)))
            .unwrap()
            .stage(spec(stage("broken", &log).with_delay_ms(20).failing("boom")))
            .unwrap()
            .build()
            .unwrap();
        let (ctx, sink) = context();

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            graph.execute(&["slow", "broken"], ctx),
        )
        .await
        .unwrap()
        .unwrap_err();

        assert_eq!(err.stage(), Some("broken"));
        assert_eq!(sink.stages_with("stage.cancelled"), vec!["slow"]);
    }

    #[tokio::test]
    async fn test_external_cancellation() {
        let log = ExecutionLog::default();
        let graph = PipelineBuilder::new("cancel")
            .stage(spec(stage("server", &log).with_delay_ms(10_000)))
            .unwrap()
            .stage(spec(stage("after", &log)).depends_on(["server"]))
            .unwrap()
            .build()
            .unwrap();
        let token = Arc::new(CancellationToken::new());
        let ctx = Arc::new(PipelineContext::new().with_token(token.clone()));

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel("interrupted");
        });

        let err = tokio::time::timeout(Duration::from_secs(5), graph.execute(&["after"], ctx))
            .await
            .unwrap()
            .unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, DebugflowError::Cancelled(ref r) if r == "interrupted"));
        assert_eq!(log.lock().clone(), vec!["server"]);
    }

    #[tokio::test]
    async fn test_already_cancelled_runs_nothing() {
        let log = ExecutionLog::default();
        let graph = debug_like(&log);
        let ctx = PipelineContext::new();
        ctx.token().cancel("early");

        let err = graph.execute(&["debug"], Arc::new(ctx)).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_worker_pool_bound() {
        let log = ExecutionLog::default();
        let mut builder = PipelineBuilder::new("pool").max_parallel(1);
        for name in ["a", "b", "c"] {
            builder = builder
                .stage(spec(stage(name, &log).with_delay_ms(30)))
                .unwrap();
        }
        let graph = builder.build().unwrap();
        let (ctx, _) = context();

        let started = Instant::now();
        graph.execute(&["a", "b", "c"], ctx).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(90));
        assert_eq!(log.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_pipeline_events_bracket_run() {
        let log = ExecutionLog::default();
        let graph = debug_like(&log);
        let (ctx, sink) = context();

        let result = graph.execute(&["debug"], ctx.clone()).await.unwrap();

        let events = sink.events();
        assert_eq!(events.first().map(|e| e.0.as_str()), Some("pipeline.started"));
        assert_eq!(events.last().map(|e| e.0.as_str()), Some("pipeline.completed"));
        assert_eq!(result.run_id, ctx.run_id());
        assert_eq!(result.records.len(), 6);
    }
}
