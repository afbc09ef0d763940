//! Memoir CLI - Command-line interface for Memoir user memory.

use clap::Parser;
use memoir_cli::commands;
use memoir_cli::config::API_KEY_ENV;
use memoir_cli::repl;
use memoir_cli::{Cli, Command, Formatter, MemoirConfig, Session};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> memoir_cli::Result<()> {
    let cli = Cli::parse();

    let path = match cli.config.clone() {
        Some(path) => path,
        None => MemoirConfig::default_path()?,
    };
    let loaded = MemoirConfig::load(&path)?;
    let found = loaded.is_some();
    let config = loaded
        .unwrap_or_default()
        .with_env_api_key(std::env::var(API_KEY_ENV).ok());

    init_logging(&config.log_level);
    if found {
        info!("Loaded configuration from {}", path.display());
    } else {
        warn!("No configuration at {}, using defaults", path.display());
    }

    let session = Session::build(&config)?;
    let formatter = Formatter::new(cli.format, !cli.no_color);

    match cli.command {
        None | Some(Command::Repl) => {
            repl::run_repl(&session, &formatter).await?;
        }
        Some(Command::Ingest(args)) => {
            commands::execute_ingest(args, &session, &formatter).await?;
        }
        Some(Command::Profile(args)) => {
            commands::execute_profile(args, &session, &formatter).await?;
        }
        Some(Command::Forget(args)) => {
            commands::execute_forget(args, &session, &formatter).await?;
        }
    }

    Ok(())
}

/// Logs go to stderr; `RUST_LOG` wins over the configured level.
fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
