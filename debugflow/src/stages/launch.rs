//! Server launcher: EULA gate, marker file and the foreground server process.

use super::Stage;
use crate::config::DebugOptions;
use crate::context::StageContext;
use crate::errors::DebugflowError;
use crate::process::{ProcessRunner, ProcessSpec};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Contents of the EULA marker file.
pub const EULA_ACCEPTED: &str = "eula=true";

/// Starts the server with the console attached and waits for it to exit.
#[derive(Debug)]
pub struct RunSpigotStage {
    options: Arc<DebugOptions>,
    runner: Arc<dyn ProcessRunner>,
}

impl RunSpigotStage {
    /// Stage name.
    pub const NAME: &'static str = "run-spigot";

    /// Creates the stage.
    #[must_use]
    pub fn new(options: Arc<DebugOptions>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { options, runner }
    }

    /// `java <jvm args> -cp <server jar> <main class> <server args>`, run in
    /// the server directory.
    #[must_use]
    pub fn command(&self) -> ProcessSpec {
        ProcessSpec::new(self.options.java())
            .args(self.options.jvm_args().iter().cloned())
            .arg("-cp")
            .arg(self.options.server_jar().display().to_string())
            .arg(self.options.server_main_class())
            .args(self.options.server_args().iter().cloned())
            .current_dir(self.options.server_dir())
    }
}

#[async_trait]
impl Stage for RunSpigotStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Startup the spigot server."
    }

    async fn execute(&self, ctx: &StageContext) -> Result<(), DebugflowError> {
        if !self.options.eula() {
            return Err(DebugflowError::EulaNotAccepted);
        }
        ctx.ensure_not_cancelled()?;

        tokio::fs::create_dir_all(self.options.server_dir()).await?;
        tokio::fs::write(self.options.eula_file(), EULA_ACCEPTED).await?;

        let command = self.command();
        ctx.emit(
            "server.starting",
            serde_json::json!({ "command": command.to_string() }),
        );

        match self.runner.run_interactive(&command, ctx.token()).await? {
            Some(0) => {
                info!("Server stopped");
                Ok(())
            }
            code => {
                warn!(code = ?code, "Server exited abnormally");
                Err(DebugflowError::ProcessFailed {
                    program: command.program,
                    code,
                    output: String::new(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DebugSettings;
    use crate::context::PipelineContext;
    use crate::testing::RecordingProcessRunner;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn options(dir: &Path, eula: bool) -> Arc<DebugOptions> {
        let settings = DebugSettings {
            eula,
            jvm_args: vec!["-Xmx1G".into()],
            server_args: vec!["nogui".into()],
            ..DebugSettings::default()
        };
        Arc::new(settings.resolve(dir).unwrap())
    }

    fn ctx() -> StageContext {
        StageContext::new(Arc::new(PipelineContext::new()), RunSpigotStage::NAME)
    }

    #[tokio::test]
    async fn test_refuses_without_eula() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path(), false);
        let runner = Arc::new(RecordingProcessRunner::new());
        let stage = RunSpigotStage::new(options.clone(), runner.clone());

        let err = stage.execute(&ctx()).await.unwrap_err();

        assert!(matches!(err, DebugflowError::EulaNotAccepted));
        assert!(err.to_string().contains("eula"));
        assert!(!options.eula_file().exists());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_writes_marker_before_starting_server() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path(), true);
        let marker_seen = Arc::new(AtomicBool::new(false));
        let runner = {
            let marker = options.eula_file();
            let seen = marker_seen.clone();
            Arc::new(RecordingProcessRunner::new().with_hook(move |_| {
                let text = std::fs::read_to_string(&marker).unwrap_or_default();
                seen.store(text == EULA_ACCEPTED, Ordering::SeqCst);
            }))
        };
        let stage = RunSpigotStage::new(options.clone(), runner.clone());

        stage.execute(&ctx()).await.unwrap();

        assert!(marker_seen.load(Ordering::SeqCst));
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].args,
            vec![
                "-Xmx1G".to_string(),
                "-cp".to_string(),
                options.server_jar().display().to_string(),
                "org.bukkit.craftbukkit.Main".to_string(),
                "nogui".to_string(),
            ]
        );
        assert_eq!(calls[0].cwd.as_deref(), Some(options.server_dir()));
    }

    #[tokio::test]
    async fn test_abnormal_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingProcessRunner::new().with_exit_code(Some(1)));
        let stage = RunSpigotStage::new(options(dir.path(), true), runner);

        let err = stage.execute(&ctx()).await.unwrap_err();
        assert!(matches!(err, DebugflowError::ProcessFailed { code: Some(1), .. }));
    }
}
