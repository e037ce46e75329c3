use triagebox::cli::commands::{CliArgs, Commands};
use triagebox::cli::handlers::{handle_analyze, handle_cache};
use triagebox::util::logging;
use triagebox::VERSION;

use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("triagebox v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Analyze(analyze_args) => handle_analyze(analyze_args, args.quiet).await,
        Commands::Cache(cache_args) => handle_cache(cache_args),
    };

    std::process::exit(exit_code);
}

/// Flags win over `TRIAGEBOX_LOG_LEVEL` / `TRIAGEBOX_LOG_JSON`
fn init_logging_from_args(args: &CliArgs) {
    let config = logging::config_from_env().with_cli_flags(
        args.log_level.as_deref(),
        args.verbose,
        args.quiet,
        args.log_json,
    );
    logging::init_logging(config);
}
