//! Configuration.
//!
//! Settings are read from the `[debug]` table of `debugflow.toml`, overridden
//! by `DEBUGFLOW_*` environment variables, and resolved against the project
//! directory into an immutable [`DebugOptions`].

mod options;
mod settings;

pub use options::{DebugOptions, BUILD_INFO_FILE, EULA_FILE, PLUGINS_DIR};
pub use settings::{DebugSettings, ENV_BUILD_VERSION, ENV_EULA};

/// Default configuration file name, looked up in the project directory.
pub const DEFAULT_CONFIG_FILE: &str = "debugflow.toml";

/// Where BuildTools is downloaded from by default.
pub const BUILD_TOOLS_URL: &str =
    "https://hub.spigotmc.org/jenkins/job/BuildTools/lastSuccessfulBuild/artifact/target/BuildTools.jar";
