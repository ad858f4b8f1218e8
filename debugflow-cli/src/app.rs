//! Command handlers.

use crate::cli::{CliArgs, Commands, OverrideArgs};
use anyhow::{bail, Context, Result};
use debugflow::config::{DebugOptions, DebugSettings, DEFAULT_CONFIG_FILE};
use debugflow::context::PipelineContext;
use debugflow::errors::DebugflowError;
use debugflow::events::LoggingEventSink;
use debugflow::pipeline::{DebugPipeline, GraphExecutionResult, StageGraph};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;

/// Runs the parsed command line and returns the process exit code.
pub async fn execute(args: CliArgs) -> i32 {
    let overrides = match &args.command {
        Commands::Debug(overrides) => overrides.clone(),
        Commands::Run(run) => run.overrides.clone(),
        Commands::Tasks => OverrideArgs::default(),
    };

    let options = match load_options(&args, &overrides, |key| std::env::var(key).ok()) {
        Ok(options) => Arc::new(options),
        Err(e) => {
            error!("{e:#}");
            return EXIT_FAILURE;
        }
    };

    let pipeline = match DebugPipeline::new(options.clone()) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("Invalid pipeline: {e}");
            return EXIT_FAILURE;
        }
    };

    match &args.command {
        Commands::Tasks => {
            print!("{}", format_task_listing(pipeline.graph()));
            EXIT_SUCCESS
        }
        Commands::Debug(_) => {
            let targets = DebugPipeline::default_targets(&options);
            run_targets(&pipeline, &targets).await
        }
        Commands::Run(run) => run_targets(&pipeline, &run.tasks).await,
    }
}

/// Loads the configuration file, then environment overrides, then flags.
///
/// An explicitly given `--config` file must exist; the default one is
/// optional.
pub fn load_options<F>(args: &CliArgs, overrides: &OverrideArgs, env: F) -> Result<DebugOptions>
where
    F: Fn(&str) -> Option<String>,
{
    let project_dir = match &args.project_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    if !project_dir.is_dir() {
        bail!("Project directory does not exist: {}", project_dir.display());
    }

    let settings = match &args.config {
        Some(path) => {
            let path = absolute(&project_dir, path);
            debug!(path = %path.display(), "Loading configuration");
            DebugSettings::load(&path)?
        }
        None => DebugSettings::load_or_default(&project_dir.join(DEFAULT_CONFIG_FILE))?,
    };

    let options = settings
        .apply_env_from(env)?
        .resolve(&project_dir)
        .context("Invalid configuration")?;
    Ok(overrides.apply(options))
}

fn absolute(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

async fn run_targets<S: AsRef<str>>(pipeline: &DebugPipeline, targets: &[S]) -> i32 {
    let ctx = Arc::new(PipelineContext::new().with_event_sink(Arc::new(LoggingEventSink)));

    let token = ctx.token().clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            token.cancel("interrupted");
        }
    });

    let result = pipeline.run(targets, ctx).await;
    interrupt.abort();

    report(&result);
    exit_code(&result)
}

fn report(result: &Result<GraphExecutionResult, DebugflowError>) {
    match result {
        Ok(result) => {
            for record in &result.records {
                debug!(stage = %record.name, status = %record.status, duration_ms = record.duration_ms, "Stage record");
            }
            info!(
                run_id = %result.run_id,
                executed = result.executed().len(),
                skipped = result.skipped().len(),
                duration_ms = result.duration_ms,
                "Done"
            );
        }
        Err(e) if e.is_cancelled() => warn!("{e}"),
        Err(e) => error!("{e}"),
    }
}

/// Maps a run result to the process exit code.
pub fn exit_code(result: &Result<GraphExecutionResult, DebugflowError>) -> i32 {
    match result {
        Ok(_) => EXIT_SUCCESS,
        Err(e) if e.is_cancelled() => EXIT_INTERRUPTED,
        Err(_) => EXIT_FAILURE,
    }
}

/// Renders the `tasks` listing: one line per stage plus its edges.
pub fn format_task_listing(graph: &StageGraph) -> String {
    let width = graph.stages().map(|s| s.name.len()).max().unwrap_or(0);
    let mut out = String::new();

    for spec in graph.stages() {
        let _ = writeln!(
            out,
            "{:<width$}  [{}] {}",
            spec.name,
            spec.runner.group(),
            spec.description()
        );
        if !spec.depends_on.is_empty() {
            let names: Vec<&str> = spec.depends_on.iter().map(String::as_str).collect();
            let _ = writeln!(out, "{:<width$}    depends on: {}", "", names.join(", "));
        }
        if !spec.must_run_after.is_empty() {
            let names: Vec<&str> = spec.must_run_after.iter().map(String::as_str).collect();
            let _ = writeln!(out, "{:<width$}    must run after: {}", "", names.join(", "));
        }
    }
    out
}
