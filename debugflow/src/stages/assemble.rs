//! Runs the plugin project's own build command.

use super::Stage;
use crate::config::DebugOptions;
use crate::context::StageContext;
use crate::core::StageGroup;
use crate::errors::DebugflowError;
use crate::process::{ProcessRunner, ProcessSpec};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Builds the plugin artifact with the configured `build_command`.
///
/// Skipped when no command is configured, in which case the artifact is
/// expected to have been built beforehand.
#[derive(Debug)]
pub struct BuildPluginStage {
    options: Arc<DebugOptions>,
    runner: Arc<dyn ProcessRunner>,
}

impl BuildPluginStage {
    /// Stage name.
    pub const NAME: &'static str = "build-plugin";

    /// Creates the stage.
    #[must_use]
    pub fn new(options: Arc<DebugOptions>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { options, runner }
    }
}

#[async_trait]
impl Stage for BuildPluginStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Build the plugin artifact with the project build command."
    }

    fn group(&self) -> StageGroup {
        StageGroup::Build
    }

    fn skip_reason(&self) -> Option<String> {
        self.options
            .build_command()
            .is_empty()
            .then(|| "no build command configured".to_string())
    }

    async fn execute(&self, ctx: &StageContext) -> Result<(), DebugflowError> {
        ctx.ensure_not_cancelled()?;
        let Some(spec) = ProcessSpec::from_argv(self.options.build_command()) else {
            return Ok(());
        };
        let spec = spec.current_dir(self.options.project_dir());

        info!(command = %spec, "Building plugin");
        self.runner
            .run(&spec, ctx.token())
            .await?
            .into_result(&spec.program)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DebugSettings;
    use crate::context::PipelineContext;
    use crate::process::ProcessOutput;
    use crate::testing::RecordingProcessRunner;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn options(dir: &Path, command: &[&str]) -> Arc<DebugOptions> {
        let settings = DebugSettings {
            build_command: command.iter().map(ToString::to_string).collect(),
            ..DebugSettings::default()
        };
        Arc::new(settings.resolve(dir).unwrap())
    }

    fn ctx() -> StageContext {
        StageContext::new(Arc::new(PipelineContext::new()), BuildPluginStage::NAME)
    }

    #[test]
    fn test_skipped_without_command() {
        let dir = tempfile::tempdir().unwrap();
        let stage = BuildPluginStage::new(
            options(dir.path(), &[]),
            Arc::new(RecordingProcessRunner::new()),
        );
        assert_eq!(stage.skip_reason().as_deref(), Some("no build command configured"));
        assert_eq!(stage.group(), StageGroup::Build);
    }

    #[tokio::test]
    async fn test_runs_command_in_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingProcessRunner::new());
        let stage = BuildPluginStage::new(options(dir.path(), &["./gradlew", "jar"]), runner.clone());

        assert!(stage.skip_reason().is_none());
        stage.execute(&ctx()).await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to_string(), "./gradlew jar");
        assert_eq!(calls[0].cwd.as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_failed_build_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            RecordingProcessRunner::new().with_output(ProcessOutput::failure(1, "compilation failed")),
        );
        let stage = BuildPluginStage::new(options(dir.path(), &["mvn", "package"]), runner);

        let err = stage.execute(&ctx()).await.unwrap_err();
        assert!(matches!(err, DebugflowError::ProcessFailed { .. }));
        assert!(err.to_string().contains("compilation failed"));
    }
}
