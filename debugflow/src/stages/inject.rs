//! Plugin injector: picks the plugin jar and copies it into the server.

use super::{copy_atomic, Stage};
use crate::config::DebugOptions;
use crate::context::StageContext;
use crate::errors::DebugflowError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Jar classifiers that never hold the runnable plugin.
const SECONDARY_CLASSIFIERS: [&str; 4] = ["sources", "javadoc", "tests", "test"];

/// True for `name-<classifier>.jar` artifacts such as sources or javadoc jars.
fn is_secondary_jar(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.rsplit_once('-'))
        .is_some_and(|(_, classifier)| {
            SECONDARY_CLASSIFIERS
                .iter()
                .any(|c| classifier.eq_ignore_ascii_case(c))
        })
}

/// Lists plugin artifact candidates in priority order.
///
/// Explicitly configured artifacts win. Otherwise every `*.jar` in the plugin
/// output directory is a candidate: main jars first, then sources, javadoc and
/// test jars, each group ordered by file name. A missing output directory
/// yields no candidates.
pub fn discover_plugin_candidates(options: &DebugOptions) -> Result<Vec<PathBuf>, DebugflowError> {
    if !options.plugin_artifacts().is_empty() {
        return Ok(options.plugin_artifacts().to_vec());
    }

    let dir = options.plugin_output_dir();
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "Plugin output directory does not exist");
        return Ok(Vec::new());
    }

    let mut jars: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"))
        })
        .collect();
    jars.sort_by(|a, b| {
        is_secondary_jar(a)
            .cmp(&is_secondary_jar(b))
            .then_with(|| a.file_name().cmp(&b.file_name()))
    });
    Ok(jars)
}

/// Returns the first candidate that exists as a file.
pub fn select_plugin_artifact(candidates: &[PathBuf]) -> Result<PathBuf, DebugflowError> {
    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or_else(|| DebugflowError::ArtifactNotFound("couldn't find a plugin artifact".into()))
}

/// Copies the selected plugin jar into `{server_dir}/plugins/`.
#[derive(Debug)]
pub struct PreparePluginStage {
    options: Arc<DebugOptions>,
}

impl PreparePluginStage {
    /// Stage name.
    pub const NAME: &'static str = "prepare-plugin";

    /// Creates the stage.
    #[must_use]
    pub fn new(options: Arc<DebugOptions>) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Stage for PreparePluginStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Copy the plugin jars into the server."
    }

    async fn execute(&self, ctx: &StageContext) -> Result<(), DebugflowError> {
        ctx.ensure_not_cancelled()?;

        let candidates = discover_plugin_candidates(&self.options)?;
        let artifact = select_plugin_artifact(&candidates)?;
        let file_name = artifact.file_name().ok_or_else(|| {
            DebugflowError::ArtifactNotFound(format!("{} has no file name", artifact.display()))
        })?;

        let dest = self.options.plugin_dir().join(file_name);
        copy_atomic(&artifact, &dest).await?;

        info!(from = %artifact.display(), to = %dest.display(), "Installed plugin");
        ctx.emit(
            "plugin.installed",
            serde_json::json!({ "path": dest.display().to_string() }),
        );
        Ok(())
    }
}
