use clap::Parser;
use debugflow_cli::cli::CliArgs;
use debugflow_cli::{app, init_logging, resolve_level, ENV_LOG_LEVEL, NAME, VERSION};
use std::env;
use std::process;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let env_level = env::var(ENV_LOG_LEVEL).ok();
    init_logging(resolve_level(
        args.log_level.as_deref(),
        args.verbose,
        args.quiet,
        env_level.as_deref(),
    ));

    debug!("{} v{} starting", NAME, VERSION);
    debug!("Arguments: {:?}", args);

    process::exit(app::execute(args).await);
}
