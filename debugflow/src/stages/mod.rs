//! Stage trait and the debug-server stages.
//!
//! Stages are the units of work in a debug pipeline. Each one owns a single
//! write target on disk (or a single process) and receives the shared
//! [`DebugOptions`](crate::config::DebugOptions) at construction.

mod assemble;
mod build;
mod fetch;
mod inject;
mod launch;
mod prepare;

pub use assemble::BuildPluginStage;
pub use build::BuildSpigotStage;
pub use fetch::{fetch_artifact, Downloader, FetchBuildToolsStage, HttpDownloader};
#[cfg(test)]
pub use fetch::MockDownloader;
pub use inject::{discover_plugin_candidates, select_plugin_artifact, PreparePluginStage};
pub use launch::{RunSpigotStage, EULA_ACCEPTED};
pub use prepare::{BuildInfoSource, JsonBuildInfo, PrepareSpigotStage};

use crate::context::StageContext;
use crate::core::StageGroup;
use crate::errors::DebugflowError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Human-readable description, used in listings and error messages.
    fn description(&self) -> &str;

    /// The group the stage is listed under.
    fn group(&self) -> StageGroup {
        StageGroup::Debug
    }

    /// Skip predicate, evaluated right before the stage would run.
    ///
    /// Returns the reason to skip, or `None` to run.
    fn skip_reason(&self) -> Option<String> {
        None
    }

    /// Executes the stage.
    async fn execute(&self, ctx: &StageContext) -> Result<(), DebugflowError>;
}

/// An aggregate stage that does nothing itself; it only pulls its
/// dependencies into a run.
#[derive(Debug, Clone)]
pub struct LifecycleStage {
    name: String,
    description: String,
}

impl LifecycleStage {
    /// Creates a new lifecycle stage.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

#[async_trait]
impl Stage for LifecycleStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn group(&self) -> StageGroup {
        StageGroup::Lifecycle
    }

    async fn execute(&self, _ctx: &StageContext) -> Result<(), DebugflowError> {
        Ok(())
    }
}

/// Copies `source` to `dest` through a temporary file next to `dest`.
///
/// `dest` either keeps its previous content or gets the complete copy; an
/// interrupted copy never leaves a partial file behind. Returns the number of
/// bytes copied.
pub(crate) async fn copy_atomic(source: &Path, dest: &Path) -> Result<u64, DebugflowError> {
    let parent = dest
        .parent()
        .ok_or_else(|| {
            DebugflowError::Internal(format!("{} has no parent directory", dest.display()))
        })?
        .to_path_buf();
    tokio::fs::create_dir_all(&parent).await?;

    let source = source.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<u64, DebugflowError> {
        let mut temp = tempfile::Builder::new()
            .prefix(".copy-")
            .tempfile_in(&parent)?;
        let mut input = std::fs::File::open(&source)?;
        let bytes = std::io::copy(&mut input, &mut temp)?;
        temp.as_file().sync_all()?;
        temp.persist(&dest).map_err(|e| e.error)?;
        Ok(bytes)
    })
    .await
    .map_err(|e| DebugflowError::Internal(format!("copy task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PipelineContext;
    use std::sync::Arc;

    fn test_stage_context(name: &str) -> StageContext {
        StageContext::new(Arc::new(PipelineContext::new()), name)
    }

    #[tokio::test]
    async fn test_lifecycle_stage() {
        let stage = LifecycleStage::new("debug-spigot", "Startup the spigot server with the plugin jar.");

        assert_eq!(stage.group(), StageGroup::Lifecycle);
        assert_eq!(stage.description(), "Startup the spigot server with the plugin jar.");
        assert!(stage.execute(&test_stage_context("debug-spigot")).await.is_ok());
    }

    #[tokio::test]
    async fn test_copy_atomic_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("spigot-1.16.1.jar");
        let dest = dir.path().join("server").join("spigot.jar");
        std::fs::write(&source, b"server").unwrap();

        assert_eq!(copy_atomic(&source, &dest).await.unwrap(), 6);
        std::fs::write(&source, b"newer server").unwrap();
        copy_atomic(&source, &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"newer server");
        let names: Vec<String> = std::fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["spigot.jar"]);
    }

    #[tokio::test]
    async fn test_copy_atomic_failure_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory opens fine but fails on the first read.
        let unreadable = dir.path().join("not-a-jar");
        std::fs::create_dir_all(&unreadable).unwrap();
        let dest = dir.path().join("server").join("spigot.jar");

        let err = copy_atomic(&unreadable, &dest).await.unwrap_err();

        assert!(matches!(err, DebugflowError::Io(_)));
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dest.parent().unwrap()).unwrap().count(), 0);
    }
}
