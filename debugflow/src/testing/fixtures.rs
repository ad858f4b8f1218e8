//! On-disk project fixtures.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{DebugOptions, DebugSettings, BUILD_INFO_FILE};
use crate::errors::DebugflowError;
use crate::process::ProcessSpec;

/// A temporary plugin project directory with helpers to lay out the files
/// each stage looks for.
#[derive(Debug)]
pub struct TestProject {
    dir: tempfile::TempDir,
}

impl TestProject {
    /// Creates an empty project in a fresh temporary directory.
    pub fn new() -> Result<Self, DebugflowError> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// The project root.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Resolves `settings` against the project root.
    pub fn options(&self, settings: DebugSettings) -> Result<Arc<DebugOptions>, DebugflowError> {
        Ok(Arc::new(settings.resolve(self.path())?))
    }

    /// Writes a file relative to the project root, creating parent directories.
    pub fn write(&self, relative: impl AsRef<Path>, contents: &[u8]) -> Result<PathBuf, DebugflowError> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}

/// Simulates a BuildTools run: if `spec` is a `--rev` invocation, writes
/// `BuildData/info.json` and `spigot-<version>.jar` into its output directory.
///
/// Intended as a [`RecordingProcessRunner`](super::RecordingProcessRunner) hook.
pub fn fake_build_tools(spec: &ProcessSpec) {
    let arg_after = |flag: &str| {
        spec.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| spec.args.get(i + 1))
    };
    let (Some(version), Some(output_dir)) = (arg_after("--rev"), arg_after("--output-dir")) else {
        return;
    };

    let output_dir = PathBuf::from(output_dir);
    let info = output_dir.join(BUILD_INFO_FILE);
    if let Some(parent) = info.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(
        &info,
        serde_json::json!({ "name": version, "minecraftVersion": version }).to_string(),
    );
    let _ = std::fs::write(output_dir.join(format!("spigot-{version}.jar")), b"spigot");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{BuildInfoSource, JsonBuildInfo};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fake_build_tools_lays_out_outputs() {
        let project = TestProject::new().unwrap();
        let out = project.path().join("tools");
        std::fs::create_dir_all(&out).unwrap();
        let spec = ProcessSpec::new("java").args([
            "-jar",
            "BuildTools.jar",
            "--rev",
            "1.16.1",
            "--output-dir",
            out.to_str().unwrap(),
        ]);

        fake_build_tools(&spec);

        assert_eq!(JsonBuildInfo.resolve_built_version(&out.join(BUILD_INFO_FILE)).unwrap(), "1.16.1");
        assert!(out.join("spigot-1.16.1.jar").is_file());
    }

    #[test]
    fn test_fake_build_tools_ignores_other_commands() {
        let project = TestProject::new().unwrap();
        fake_build_tools(&ProcessSpec::new("./gradlew").arg("jar"));
        assert_eq!(std::fs::read_dir(project.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_project_write() {
        let project = TestProject::new().unwrap();
        let path = project.write("build/libs/plugin.jar", b"jar").unwrap();
        assert_eq!(path, project.path().join("build/libs/plugin.jar"));
        assert!(path.is_file());
    }
}
