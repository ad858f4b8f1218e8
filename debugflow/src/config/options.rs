//! Resolved debug options shared by every stage.

use std::path::{Path, PathBuf};

/// Fixed location of the BuildTools metadata file, relative to its directory.
pub const BUILD_INFO_FILE: &str = "BuildData/info.json";

/// Name of the EULA marker written into the server directory.
pub const EULA_FILE: &str = "eula.txt";

/// Name of the server's plugin directory.
pub const PLUGINS_DIR: &str = "plugins";

/// Configuration for one debug run.
///
/// Only produced by [`DebugSettings::resolve`](super::DebugSettings::resolve),
/// so every path is absolute. Stages receive it as `Arc<DebugOptions>` and
/// never mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugOptions {
    pub(super) eula: bool,
    pub(super) build_version: String,
    pub(super) build_tool_url: String,
    pub(super) build_tool_jar: PathBuf,
    pub(super) build_tool_dir: PathBuf,
    pub(super) server_dir: PathBuf,
    pub(super) server_jar: PathBuf,
    pub(super) java: String,
    pub(super) server_main_class: String,
    pub(super) jvm_args: Vec<String>,
    pub(super) server_args: Vec<String>,
    pub(super) project_dir: PathBuf,
    pub(super) build_command: Vec<String>,
    pub(super) plugin_artifacts: Vec<PathBuf>,
    pub(super) plugin_output_dir: PathBuf,
    pub(super) max_parallel_tasks: usize,
}

impl DebugOptions {
    /// Whether the operator accepted the EULA.
    #[must_use]
    pub fn eula(&self) -> bool {
        self.eula
    }

    /// BuildTools revision to build.
    #[must_use]
    pub fn build_version(&self) -> &str {
        &self.build_version
    }

    /// Download URL of BuildTools.
    #[must_use]
    pub fn build_tool_url(&self) -> &str {
        &self.build_tool_url
    }

    /// Path of the downloaded BuildTools jar.
    #[must_use]
    pub fn build_tool_jar(&self) -> &Path {
        &self.build_tool_jar
    }

    /// BuildTools working and output directory.
    #[must_use]
    pub fn build_tool_dir(&self) -> &Path {
        &self.build_tool_dir
    }

    /// Server run directory.
    #[must_use]
    pub fn server_dir(&self) -> &Path {
        &self.server_dir
    }

    /// Canonical staged server jar.
    #[must_use]
    pub fn server_jar(&self) -> &Path {
        &self.server_jar
    }

    /// Java executable.
    #[must_use]
    pub fn java(&self) -> &str {
        &self.java
    }

    /// Server main class.
    #[must_use]
    pub fn server_main_class(&self) -> &str {
        &self.server_main_class
    }

    /// Extra JVM arguments.
    #[must_use]
    pub fn jvm_args(&self) -> &[String] {
        &self.jvm_args
    }

    /// Extra server arguments.
    #[must_use]
    pub fn server_args(&self) -> &[String] {
        &self.server_args
    }

    /// The plugin project directory.
    #[must_use]
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Plugin build command; empty when the build is done elsewhere.
    #[must_use]
    pub fn build_command(&self) -> &[String] {
        &self.build_command
    }

    /// Explicit plugin artifact candidates.
    #[must_use]
    pub fn plugin_artifacts(&self) -> &[PathBuf] {
        &self.plugin_artifacts
    }

    /// Directory scanned for plugin jars.
    #[must_use]
    pub fn plugin_output_dir(&self) -> &Path {
        &self.plugin_output_dir
    }

    /// Worker pool size.
    #[must_use]
    pub fn max_parallel_tasks(&self) -> usize {
        self.max_parallel_tasks
    }

    /// `{build_tool_dir}/BuildData/info.json`.
    #[must_use]
    pub fn build_info_file(&self) -> PathBuf {
        self.build_tool_dir.join(BUILD_INFO_FILE)
    }

    /// `{server_dir}/eula.txt`.
    #[must_use]
    pub fn eula_file(&self) -> PathBuf {
        self.server_dir.join(EULA_FILE)
    }

    /// `{server_dir}/plugins`.
    #[must_use]
    pub fn plugin_dir(&self) -> PathBuf {
        self.server_dir.join(PLUGINS_DIR)
    }

    /// Jar produced by BuildTools for `version`.
    #[must_use]
    pub fn built_server_jar(&self, version: &str) -> PathBuf {
        self.build_tool_dir.join(format!("spigot-{version}.jar"))
    }

    /// Returns a copy with the EULA flag overridden.
    #[must_use]
    pub fn with_eula(mut self, eula: bool) -> Self {
        self.eula = eula;
        self
    }

    /// Returns a copy with a different build version.
    #[must_use]
    pub fn with_build_version(mut self, version: impl Into<String>) -> Self {
        self.build_version = version.into();
        self
    }

    /// Returns a copy whose explicit plugin candidates are `artifacts`.
    ///
    /// Relative paths are resolved against the project directory.
    #[must_use]
    pub fn with_plugin_artifacts(mut self, artifacts: Vec<PathBuf>) -> Self {
        self.plugin_artifacts = artifacts
            .into_iter()
            .map(|p| if p.is_absolute() { p } else { self.project_dir.join(p) })
            .collect();
        self
    }
}
