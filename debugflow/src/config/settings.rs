//! Unresolved debug settings as read from `debugflow.toml`.

use super::{DebugOptions, BUILD_TOOLS_URL};
use crate::errors::DebugflowError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding [`DebugSettings::eula`].
pub const ENV_EULA: &str = "DEBUGFLOW_EULA";

/// Environment variable overriding [`DebugSettings::build_version`].
pub const ENV_BUILD_VERSION: &str = "DEBUGFLOW_BUILD_VERSION";

/// The `[debug]` table of the configuration file.
///
/// Relative paths are interpreted against the project directory when the
/// settings are resolved into [`DebugOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    /// Whether the operator accepts the Minecraft EULA.
    pub eula: bool,
    /// BuildTools `--rev` argument.
    pub build_version: String,
    /// Where BuildTools is downloaded from.
    pub build_tool_url: String,
    /// BuildTools jar location; defaults to `{build_tool_dir}/BuildTools.jar`.
    pub build_tool_jar: Option<PathBuf>,
    /// BuildTools working and output directory.
    pub build_tool_dir: PathBuf,
    /// Server run directory.
    pub server_dir: PathBuf,
    /// Staged server jar; defaults to `{server_dir}/spigot.jar`.
    pub server_jar: Option<PathBuf>,
    /// Java executable.
    pub java: String,
    /// Main class started from the server jar.
    pub server_main_class: String,
    /// Extra JVM arguments for the server.
    pub jvm_args: Vec<String>,
    /// Extra arguments passed to the server itself.
    pub server_args: Vec<String>,
    /// Command that builds the plugin, as an argv list.
    pub build_command: Vec<String>,
    /// Explicit plugin artifact candidates, in priority order.
    pub plugin_artifacts: Vec<PathBuf>,
    /// Directory scanned for `*.jar` candidates when none are listed.
    pub plugin_output_dir: PathBuf,
    /// Upper bound on concurrently running stages.
    pub max_parallel_tasks: usize,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            eula: false,
            build_version: "latest".to_string(),
            build_tool_url: BUILD_TOOLS_URL.to_string(),
            build_tool_jar: None,
            build_tool_dir: PathBuf::from("debug/buildtools"),
            server_dir: PathBuf::from("debug/spigot"),
            server_jar: None,
            java: "java".to_string(),
            server_main_class: "org.bukkit.craftbukkit.Main".to_string(),
            jvm_args: Vec::new(),
            server_args: Vec::new(),
            build_command: Vec::new(),
            plugin_artifacts: Vec::new(),
            plugin_output_dir: PathBuf::from("build/libs"),
            max_parallel_tasks: 4,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    debug: DebugSettings,
}

impl DebugSettings {
    /// Parses settings from TOML text containing a `[debug]` table.
    pub fn from_toml(text: &str) -> Result<Self, DebugflowError> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| DebugflowError::Config(e.to_string()))?;
        Ok(file.debug)
    }

    /// Loads settings from a file.
    pub fn load(path: &Path) -> Result<Self, DebugflowError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DebugflowError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
            .map_err(|e| DebugflowError::Config(format!("{}: {e}", path.display())))
    }

    /// Loads settings from a file, falling back to defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, DebugflowError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, DebugflowError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, DebugflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_EULA) {
            self.eula = parse_bool(&value).ok_or_else(|| {
                DebugflowError::Config(format!("{ENV_EULA} must be true or false, got '{value}'"))
            })?;
        }
        if let Some(value) = lookup(ENV_BUILD_VERSION) {
            self.build_version = value;
        }
        Ok(self)
    }

    /// Resolves every path against `base_dir` and validates the result.
    ///
    /// A relative `base_dir` is itself resolved against the current directory,
    /// so every path in the returned options is absolute.
    pub fn resolve(self, base_dir: &Path) -> Result<DebugOptions, DebugflowError> {
        if self.build_version.trim().is_empty() {
            return Err(DebugflowError::Config("build_version must not be empty".into()));
        }
        if self.java.trim().is_empty() {
            return Err(DebugflowError::Config("java must not be empty".into()));
        }
        if self.max_parallel_tasks == 0 {
            return Err(DebugflowError::Config(
                "max_parallel_tasks must be at least 1".into(),
            ));
        }

        let base = if base_dir.is_absolute() {
            base_dir.to_path_buf()
        } else {
            std::env::current_dir()?.join(base_dir)
        };
        let absolute = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                base.join(path)
            }
        };

        let build_tool_dir = absolute(&self.build_tool_dir);
        let server_dir = absolute(&self.server_dir);
        let build_tool_jar = self
            .build_tool_jar
            .as_deref()
            .map_or_else(|| build_tool_dir.join("BuildTools.jar"), absolute);
        let server_jar = self
            .server_jar
            .as_deref()
            .map_or_else(|| server_dir.join("spigot.jar"), absolute);
        let plugin_artifacts = self.plugin_artifacts.iter().map(|p| absolute(p)).collect();
        let plugin_output_dir = absolute(&self.plugin_output_dir);

        Ok(DebugOptions {
            eula: self.eula,
            build_version: self.build_version,
            build_tool_url: self.build_tool_url,
            build_tool_jar,
            build_tool_dir,
            server_dir,
            server_jar,
            java: self.java,
            server_main_class: self.server_main_class,
            jvm_args: self.jvm_args,
            server_args: self.server_args,
            project_dir: base.clone(),
            build_command: self.build_command,
            plugin_artifacts,
            plugin_output_dir,
            max_parallel_tasks: self.max_parallel_tasks,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = DebugSettings::default();
        assert!(!settings.eula);
        assert_eq!(settings.build_version, "latest");
        assert_eq!(settings.build_tool_url, BUILD_TOOLS_URL);
        assert_eq!(settings.max_parallel_tasks, 4);
    }

    #[test]
    fn test_from_toml_partial() {
        let settings = DebugSettings::from_toml(
            r#"
            [debug]
            eula = true
            build_version = "1.16.1"
            build_command = ["./gradlew", "jar"]
            "#,
        )
        .unwrap();

        assert!(settings.eula);
        assert_eq!(settings.build_version, "1.16.1");
        assert_eq!(settings.build_command, vec!["./gradlew", "jar"]);
        assert_eq!(settings.server_dir, PathBuf::from("debug/spigot"));
    }

    #[test]
    fn test_from_toml_without_debug_table() {
        let settings = DebugSettings::from_toml("").unwrap();
        assert_eq!(settings, DebugSettings::default());
    }

    #[test]
    fn test_from_toml_rejects_bad_types() {
        let err = DebugSettings::from_toml("[debug]\neula = \"maybe\"").unwrap_err();
        assert!(matches!(err, DebugflowError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = DebugSettings::load_or_default(&dir.path().join("debugflow.toml")).unwrap();
        assert_eq!(settings, DebugSettings::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debugflow.toml");
        std::fs::write(&path, "[debug]\nserver_dir = \"run\"\n").unwrap();

        let settings = DebugSettings::load(&path).unwrap();
        assert_eq!(settings.server_dir, PathBuf::from("run"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_EULA, "TRUE"), (ENV_BUILD_VERSION, "1.16.5")]);
        let settings = DebugSettings::default()
            .apply_env_from(|key| env.get(key).map(ToString::to_string))
            .unwrap();

        assert!(settings.eula);
        assert_eq!(settings.build_version, "1.16.5");
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let result = DebugSettings::default()
            .apply_env_from(|key| (key == ENV_EULA).then(|| "sure".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_makes_paths_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let settings = DebugSettings {
            plugin_artifacts: vec![PathBuf::from("out/plugin.jar")],
            ..DebugSettings::default()
        };

        let options = settings.resolve(dir.path()).unwrap();

        assert_eq!(options.project_dir(), dir.path());
        assert_eq!(options.build_tool_dir(), dir.path().join("debug/buildtools"));
        assert_eq!(
            options.build_tool_jar(),
            dir.path().join("debug/buildtools/BuildTools.jar")
        );
        assert_eq!(options.server_jar(), dir.path().join("debug/spigot/spigot.jar"));
        assert_eq!(options.plugin_artifacts(), &[dir.path().join("out/plugin.jar")]);
        for path in [
            options.build_tool_jar(),
            options.build_tool_dir(),
            options.server_dir(),
            options.server_jar(),
            options.plugin_output_dir(),
        ] {
            assert!(path.is_absolute(), "{} is not absolute", path.display());
        }
    }

    #[test]
    fn test_resolve_keeps_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let settings = DebugSettings {
            server_jar: Some(elsewhere.path().join("paper.jar")),
            ..DebugSettings::default()
        };

        let options = settings.resolve(dir.path()).unwrap();
        assert_eq!(options.server_jar(), elsewhere.path().join("paper.jar"));
    }

    #[test]
    fn test_resolve_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let zero_workers = DebugSettings {
            max_parallel_tasks: 0,
            ..DebugSettings::default()
        };
        assert!(zero_workers.resolve(dir.path()).is_err());

        let no_version = DebugSettings {
            build_version: "  ".into(),
            ..DebugSettings::default()
        };
        assert!(no_version.resolve(dir.path()).is_err());
    }
}
