use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tunemirror_core::config::Config;

mod app;

#[derive(Parser, Debug)]
#[command(author, version, about = "tunemirror - local mirror of a remote music catalog", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Open the cache and report its schema level
    Check,
    /// Print row counts of the cache
    Stats,
    /// Delete the cache file and start from an empty one
    Reset,
    /// Keep the cache open with housekeeping until Ctrl-C (default)
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = if let Some(config_path) = args.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_default()
    };

    // Initialize logging
    let log_level = if args.verbose {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    info!("Starting tunemirror v{}", env!("CARGO_PKG_VERSION"));
    info!("Cache file: {}", config.cache_file());

    match args.command.unwrap_or(Command::Run) {
        Command::Check => app::check(&config),
        Command::Stats => app::stats(&config),
        Command::Reset => app::reset(&config),
        Command::Run => app::run(config).await,
    }
}
