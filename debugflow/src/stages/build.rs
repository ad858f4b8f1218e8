//! Builder invoker: runs BuildTools to produce the server jar.

use super::Stage;
use crate::config::DebugOptions;
use crate::context::StageContext;
use crate::errors::DebugflowError;
use crate::process::{ProcessRunner, ProcessSpec};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs `java -jar BuildTools.jar --rev <version> --output-dir <dir>`.
///
/// Always runs when scheduled; callers decide whether to schedule it.
#[derive(Debug)]
pub struct BuildSpigotStage {
    options: Arc<DebugOptions>,
    runner: Arc<dyn ProcessRunner>,
}

impl BuildSpigotStage {
    /// Stage name.
    pub const NAME: &'static str = "build-spigot";

    /// Creates the stage.
    #[must_use]
    pub fn new(options: Arc<DebugOptions>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { options, runner }
    }

    /// The BuildTools command line for the configured version.
    #[must_use]
    pub fn command(&self) -> ProcessSpec {
        let output_dir = self.options.build_tool_dir();
        ProcessSpec::new(self.options.java())
            .arg("-jar")
            .arg(self.options.build_tool_jar().display().to_string())
            .arg("--rev")
            .arg(self.options.build_version())
            .arg("--output-dir")
            .arg(output_dir.display().to_string())
            .current_dir(output_dir)
    }
}

#[async_trait]
impl Stage for BuildSpigotStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Build the spigot.jar using the BuildTools."
    }

    async fn execute(&self, ctx: &StageContext) -> Result<(), DebugflowError> {
        ctx.ensure_not_cancelled()?;
        tokio::fs::create_dir_all(self.options.build_tool_dir()).await?;

        let command = self.command();
        info!(version = %self.options.build_version(), "Building spigot with BuildTools");

        let output = self
            .runner
            .run(&command, ctx.token())
            .await?
            .into_result(&command.program)?;

        debug!(tail = %output.tail(5), "BuildTools finished");
        Ok(())
    }
}
