//! Artifact stager: copies the built server jar to its canonical location.

use super::{copy_atomic, Stage};
use crate::config::DebugOptions;
use crate::context::StageContext;
use crate::errors::DebugflowError;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Resolves which game version a BuildTools run produced.
pub trait BuildInfoSource: Send + Sync + std::fmt::Debug {
    /// Reads the built version from the BuildTools metadata file.
    fn resolve_built_version(&self, info_file: &Path) -> Result<String, DebugflowError>;
}

/// Reads `minecraftVersion` from the `BuildData/info.json` JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBuildInfo;

#[derive(Deserialize)]
struct BuildInfo {
    #[serde(rename = "minecraftVersion")]
    minecraft_version: Option<serde_json::Value>,
}

impl BuildInfoSource for JsonBuildInfo {
    fn resolve_built_version(&self, info_file: &Path) -> Result<String, DebugflowError> {
        let error = |reason: String| DebugflowError::BuildInfo {
            path: info_file.to_path_buf(),
            reason,
        };

        let text = std::fs::read_to_string(info_file).map_err(|e| error(e.to_string()))?;
        let info: BuildInfo = serde_json::from_str(&text).map_err(|e| error(e.to_string()))?;

        match info.minecraft_version {
            Some(serde_json::Value::String(version)) if !version.trim().is_empty() => Ok(version),
            Some(_) => Err(error("minecraftVersion is not a version string".into())),
            None => Err(error("minecraftVersion is missing".into())),
        }
    }
}

/// Copies `spigot-<version>.jar` from the BuildTools directory to the
/// configured server jar path.
#[derive(Debug)]
pub struct PrepareSpigotStage {
    options: Arc<DebugOptions>,
    build_info: Arc<dyn BuildInfoSource>,
}

impl PrepareSpigotStage {
    /// Stage name.
    pub const NAME: &'static str = "prepare-spigot";

    /// Creates the stage.
    #[must_use]
    pub fn new(options: Arc<DebugOptions>, build_info: Arc<dyn BuildInfoSource>) -> Self {
        Self {
            options,
            build_info,
        }
    }
}

#[async_trait]
impl Stage for PrepareSpigotStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Copy the spigot.jar generated by BuildTools into the given path."
    }

    fn skip_reason(&self) -> Option<String> {
        let jar = self.options.server_jar();
        jar.is_file()
            .then(|| format!("{} already staged", jar.display()))
    }

    async fn execute(&self, ctx: &StageContext) -> Result<(), DebugflowError> {
        ctx.ensure_not_cancelled()?;

        let version = self
            .build_info
            .resolve_built_version(&self.options.build_info_file())?;
        let source = self.options.built_server_jar(&version);
        if !source.is_file() {
            return Err(DebugflowError::ArtifactNotFound(format!(
                "BuildTools output {} does not exist",
                source.display()
            )));
        }

        let dest = self.options.server_jar();
        let bytes = copy_atomic(&source, dest).await?;

        info!(version = %version, from = %source.display(), to = %dest.display(), bytes, "Staged server jar");
        ctx.emit(
            "artifact.staged",
            serde_json::json!({ "version": version, "path": dest.display().to_string() }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DebugSettings, BUILD_INFO_FILE};
    use crate::context::PipelineContext;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn write_info(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(BUILD_INFO_FILE);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, body).unwrap();
        path
    }

    fn ctx() -> StageContext {
        StageContext::new(Arc::new(PipelineContext::new()), PrepareSpigotStage::NAME)
    }

    #[derive(Debug, Default)]
    struct CountingBuildInfo {
        calls: AtomicUsize,
    }

    impl BuildInfoSource for CountingBuildInfo {
        fn resolve_built_version(&self, _info_file: &Path) -> Result<String, DebugflowError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("1.16.1".into())
        }
    }

    #[test]
    fn test_json_build_info_reads_version() {
        let dir = tempfile::tempdir().unwrap();
        let info = write_info(
            dir.path(),
            r#"{"name":"1.16.1","minecraftVersion":"1.16.1","spigotVersion":"x"}"#,
        );

        assert_eq!(JsonBuildInfo.resolve_built_version(&info).unwrap(), "1.16.1");
    }

    #[test]
    fn test_json_build_info_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonBuildInfo
            .resolve_built_version(&dir.path().join(BUILD_INFO_FILE))
            .unwrap_err();
        assert!(matches!(err, DebugflowError::BuildInfo { .. }));
    }

    #[test]
    fn test_json_build_info_missing_or_bad_field() {
        let dir = tempfile::tempdir().unwrap();

        let info = write_info(dir.path(), r#"{"name":"1.16.1"}"#);
        assert!(matches!(
            JsonBuildInfo.resolve_built_version(&info),
            Err(DebugflowError::BuildInfo { .. })
        ));

        write_info(dir.path(), r#"{"minecraftVersion":116}"#);
        assert!(matches!(
            JsonBuildInfo.resolve_built_version(&info),
            Err(DebugflowError::BuildInfo { .. })
        ));

        write_info(dir.path(), "not json");
        assert!(matches!(
            JsonBuildInfo.resolve_built_version(&info),
            Err(DebugflowError::BuildInfo { .. })
        ));
    }

    #[tokio::test]
    async fn test_stages_versioned_jar() {
        let dir = tempfile::tempdir().unwrap();
        let options = Arc::new(DebugSettings::default().resolve(dir.path()).unwrap());
        write_info(options.build_tool_dir(), r#"{"minecraftVersion":"1.16.1"}"#);
        std::fs::write(options.built_server_jar("1.16.1"), b"server").unwrap();

        let stage = PrepareSpigotStage::new(options.clone(), Arc::new(JsonBuildInfo));
        assert!(stage.skip_reason().is_none());
        stage.execute(&ctx()).await.unwrap();

        assert_eq!(std::fs::read(options.server_jar()).unwrap(), b"server");
        assert!(stage.skip_reason().is_some());
    }

    #[tokio::test]
    async fn test_missing_built_jar_is_artifact_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let options = Arc::new(DebugSettings::default().resolve(dir.path()).unwrap());
        write_info(options.build_tool_dir(), r#"{"minecraftVersion":"1.16.1"}"#);

        let stage = PrepareSpigotStage::new(options.clone(), Arc::new(JsonBuildInfo));
        let err = stage.execute(&ctx()).await.unwrap_err();

        assert!(matches!(err, DebugflowError::ArtifactNotFound(_)));
        assert!(err.to_string().contains("spigot-1.16.1.jar"), "{err}");
        assert!(!options.server_jar().exists());
    }

    #[tokio::test]
    async fn test_already_staged_jar_is_skipped_without_reading_build_info() {
        let dir = tempfile::tempdir().unwrap();
        let options = Arc::new(DebugSettings::default().resolve(dir.path()).unwrap());
        std::fs::create_dir_all(options.server_dir()).unwrap();
        std::fs::write(options.server_jar(), b"old").unwrap();

        let info = Arc::new(CountingBuildInfo::default());
        let stage = PrepareSpigotStage::new(options.clone(), info.clone());

        assert!(stage.skip_reason().unwrap().contains("already staged"));
        assert_eq!(info.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read(options.server_jar()).unwrap(), b"old");
    }
}
