mod cli;
mod commands;
mod config;
mod error;

use std::process;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, Commands},
    commands::CommandExecutor,
    config::AppConfig,
    error::{AppError, Result},
};

const DEFAULT_FILTER: &str = "ksr=info,ksr_ingest=info";

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet)?;

    let mut config = AppConfig::load(args.config.as_deref())?;
    config.override_proxy(args.proxy, args.proxy_username, args.proxy_password);
    debug!(projects = %config.storage.projects_path.display(), "Configuration ready");

    let executor = CommandExecutor::new(config);

    match args.command {
        Commands::Scrape { pages } => executor.scrape(&pages).await?,
        Commands::Update { pages } => executor.update(&pages).await?,
        Commands::Enrich { limit, batch_size } => executor.enrich(limit, batch_size).await?,
        Commands::FilterActive { output } => executor.filter_active(output.as_deref()).await?,
        Commands::Currencies => executor.currencies().await?,
        Commands::Auth => executor.auth().await?,
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("ksr=debug,ksr_ingest=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(verbose))
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}
