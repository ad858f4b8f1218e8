use clap::{Args, Parser, Subcommand};
use debugflow::config::DebugOptions;
use std::path::PathBuf;

/// Provision and run a local Spigot server for plugin debugging
#[derive(Parser, Debug)]
#[command(
    name = "debugflow",
    about = "Provision and run a local Spigot server for plugin debugging",
    version,
    long_about = "debugflow downloads BuildTools, builds and stages the Spigot server jar, \
                  copies your freshly built plugin into it and starts the server in the \
                  foreground. Artifacts that already exist are reused."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Configuration file (defaults to debugflow.toml in the project directory)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "DIR",
        help = "Plugin project directory (defaults to the current directory)"
    )]
    pub project_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Build, stage and start the server with the plugin installed",
        long_about = "Runs debug-spigot and everything it needs. BuildTools is only run \
                      when no server jar has been staged yet.\n\n\
                      Examples:\n  \
                      debugflow debug --eula\n  \
                      debugflow debug --build-version 1.16.5 --plugin build/libs/my-plugin.jar"
    )]
    Debug(OverrideArgs),

    #[command(
        about = "Run specific tasks",
        long_about = "Runs the named tasks plus everything they depend on.\n\n\
                      Examples:\n  \
                      debugflow run build-spigot prepare-spigot\n  \
                      debugflow run run-spigot --eula"
    )]
    Run(RunArgs),

    #[command(about = "List available tasks")]
    Tasks,
}

/// Per-invocation overrides of the configuration file.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideArgs {
    #[arg(long, help = "Accept the Minecraft EULA for this run")]
    pub eula: bool,

    #[arg(
        long,
        value_name = "VERSION",
        value_parser = parse_build_version,
        help = "BuildTools revision to build"
    )]
    pub build_version: Option<String>,

    #[arg(
        long = "plugin",
        value_name = "PATH",
        help = "Plugin jar to install (repeatable, first existing wins)"
    )]
    pub plugins: Vec<PathBuf>,
}

impl OverrideArgs {
    /// Applies the overrides on top of resolved options.
    pub fn apply(&self, mut options: DebugOptions) -> DebugOptions {
        if self.eula {
            options = options.with_eula(true);
        }
        if let Some(version) = &self.build_version {
            options = options.with_build_version(version.clone());
        }
        if !self.plugins.is_empty() {
            options = options.with_plugin_artifacts(self.plugins.clone());
        }
        options
    }
}

fn parse_build_version(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        Err("build version must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(required = true, value_name = "TASK", help = "Tasks to run")]
    pub tasks: Vec<String>,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}
