use clap::Parser;
use owo_colors::OwoColorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use commands::*;

const DEFAULT_FILTER: &str = "medmatch_cli=info,medmatch_core=warn";
const VERBOSE_FILTER: &str = "medmatch_cli=debug,medmatch_core=debug";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over -v.
    let default_filter = if cli.verbose > 0 {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match &cli.command {
        Commands::Search { target } => search::run(&cli, target).await,
        Commands::Contact(args) => contact::run(&cli, args).await,
        Commands::Admin { action } => admin::run(&cli, action).await,
        Commands::Orcid { action } => orcid::run(&cli, action).await,
        Commands::Ai { action } => ai::run(&cli, action).await,
        Commands::Seed { file } => seed::run(&cli, file).await,
        Commands::Sources => sources::run(&cli).await,
        Commands::Config { action } => config::run(&cli, *action).await,
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        process::exit(1);
    }
}
