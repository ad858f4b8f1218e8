//! Command-line front end for debugflow.

pub mod app;
pub mod cli;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable consulted when no level flag is given.
pub const ENV_LOG_LEVEL: &str = "DEBUGFLOW_LOG_LEVEL";

/// Picks the log level from `--log-level`, then `-v`/`-q`, then the
/// environment, falling back to INFO.
pub fn resolve_level(log_level: Option<&str>, verbose: bool, quiet: bool, env_level: Option<&str>) -> Level {
    if let Some(level) = log_level {
        parse_level(level)
    } else if verbose {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else {
        env_level.map_or(Level::INFO, parse_level)
    }
}

pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{level_str}', defaulting to INFO. Valid levels: trace, debug, info, warn, error"
            );
            Level::INFO
        }
    }
}

/// Installs the stderr subscriber once. `RUST_LOG` wins over `level`.
pub fn init_logging(level: Level) {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let mut filter = EnvFilter::from_default_env();

        if std::env::var("RUST_LOG").is_err() {
            for directive in [
                format!("debugflow={level}"),
                format!("debugflow_cli={level}"),
                "hyper=warn".to_string(),
                "reqwest=warn".to_string(),
            ] {
                if let Ok(directive) = directive.parse() {
                    filter = filter.add_directive(directive);
                }
            }
        }

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_beats_verbosity() {
        assert_eq!(resolve_level(Some("warn"), true, false, None), Level::WARN);
    }

    #[test]
    fn test_verbose_and_quiet() {
        assert_eq!(resolve_level(None, true, false, Some("error")), Level::DEBUG);
        assert_eq!(resolve_level(None, false, true, None), Level::ERROR);
    }

    #[test]
    fn test_env_level_and_default() {
        assert_eq!(resolve_level(None, false, false, Some("TRACE")), Level::TRACE);
        assert_eq!(resolve_level(None, false, false, None), Level::INFO);
        assert_eq!(parse_level("loud"), Level::INFO);
    }
}
