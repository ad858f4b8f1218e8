//! The debug-server pipeline: stage registration and edges.

use super::{GraphExecutionResult, PipelineBuilder, StageGraph, StageSpec};
use crate::config::DebugOptions;
use crate::context::PipelineContext;
use crate::errors::DebugflowError;
use crate::process::{ProcessRunner, SystemProcessRunner};
use crate::stages::{
    BuildInfoSource, BuildPluginStage, BuildSpigotStage, Downloader, FetchBuildToolsStage,
    HttpDownloader, JsonBuildInfo, LifecycleStage, PreparePluginStage, PrepareSpigotStage,
    RunSpigotStage,
};
use std::sync::Arc;

/// Name of the aggregate stage that provisions and starts the server with
/// the plugin installed.
pub const DEBUG_STAGE: &str = "debug-spigot";

/// The wired debug pipeline.
///
/// | stage | edges |
/// |---|---|
/// | `download-build-tools` | |
/// | `build-spigot` | must run after `download-build-tools` |
/// | `prepare-spigot` | must run after `download-build-tools`, `build-spigot` |
/// | `build-plugin` | |
/// | `prepare-plugin` | depends on `build-plugin` |
/// | `run-spigot` | must run after `prepare-spigot`, `prepare-plugin` |
/// | `debug-spigot` | depends on `prepare-plugin`, `download-build-tools`, `prepare-spigot`, `run-spigot` |
#[derive(Debug)]
pub struct DebugPipeline {
    graph: StageGraph,
    options: Arc<DebugOptions>,
}

impl DebugPipeline {
    /// Wires the pipeline with the production process runner, HTTP
    /// downloader and `info.json` reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph fails validation.
    pub fn new(options: Arc<DebugOptions>) -> Result<Self, DebugflowError> {
        Self::with_components(
            options,
            Arc::new(SystemProcessRunner::new()),
            Arc::new(HttpDownloader::new()),
            Arc::new(JsonBuildInfo),
        )
    }

    /// Wires the pipeline with explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph fails validation.
    pub fn with_components(
        options: Arc<DebugOptions>,
        runner: Arc<dyn ProcessRunner>,
        downloader: Arc<dyn Downloader>,
        build_info: Arc<dyn BuildInfoSource>,
    ) -> Result<Self, DebugflowError> {
        let fetch = FetchBuildToolsStage::NAME;
        let build = BuildSpigotStage::NAME;
        let stage = PrepareSpigotStage::NAME;
        let launch = RunSpigotStage::NAME;
        let compile = BuildPluginStage::NAME;
        let inject = PreparePluginStage::NAME;

        let graph = PipelineBuilder::new("debug")
            .max_parallel(options.max_parallel_tasks())
            .stage(StageSpec::new(Arc::new(FetchBuildToolsStage::new(
                options.clone(),
                downloader,
            ))))?
            .stage(
                StageSpec::new(Arc::new(BuildSpigotStage::new(options.clone(), runner.clone())))
                    .must_run_after([fetch]),
            )?
            .stage(
                StageSpec::new(Arc::new(PrepareSpigotStage::new(options.clone(), build_info)))
                    .must_run_after([fetch, build]),
            )?
            .stage(StageSpec::new(Arc::new(BuildPluginStage::new(
                options.clone(),
                runner.clone(),
            ))))?
            .stage(StageSpec::new(Arc::new(PreparePluginStage::new(options.clone()))).depends_on([compile]))?
            .stage(
                StageSpec::new(Arc::new(RunSpigotStage::new(options.clone(), runner)))
                    .must_run_after([stage, inject]),
            )?
            .stage(
                StageSpec::new(Arc::new(LifecycleStage::new(
                    DEBUG_STAGE,
                    "Startup the spigot server with the plugin jar.",
                )))
                .depends_on([inject, fetch, stage, launch]),
            )?
            .build()?;

        Ok(Self { graph, options })
    }

    /// The underlying stage graph.
    #[must_use]
    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    /// The options every stage was built with.
    #[must_use]
    pub fn options(&self) -> &Arc<DebugOptions> {
        &self.options
    }

    /// Targets for a plain `debug` invocation.
    ///
    /// Always `debug-spigot`; prefixed by `build-spigot` while no server jar
    /// has been staged, since nothing else schedules the build.
    #[must_use]
    pub fn default_targets(options: &DebugOptions) -> Vec<String> {
        let mut targets = Vec::with_capacity(2);
        if !options.server_jar().is_file() {
            targets.push(BuildSpigotStage::NAME.to_string());
        }
        targets.push(DEBUG_STAGE.to_string());
        targets
    }

    /// Runs `targets` with their dependencies.
    ///
    /// # Errors
    ///
    /// See [`StageGraph::execute`].
    pub async fn run<S: AsRef<str>>(
        &self,
        targets: &[S],
        ctx: Arc<PipelineContext>,
    ) -> Result<GraphExecutionResult, DebugflowError> {
        self.graph.execute(targets, ctx).await
    }
}
