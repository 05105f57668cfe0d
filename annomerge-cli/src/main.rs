//! annomerge: consolidate annotation projects from the command line

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;
mod commands;
mod config;
mod context;
mod output;

use cli::{Cli, Commands};
use context::Context;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = Context::new(&cli)?;

    match cli.command {
        Commands::Projects(cmd) => commands::projects::execute(&ctx, cmd).await,
        Commands::Check(args) => commands::check::execute(&ctx, args).await,
        Commands::Export(args) => commands::export::execute(&ctx, args).await,
        Commands::Merge(args) => commands::merge::execute(&ctx, args).await,
        Commands::Config(cmd) => commands::config::execute(&ctx, cmd).await,
    }
}

/// Logs go to stderr so JSON artifacts on stdout stay parseable.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "annomerge=debug,annomerge_sdk=debug,annomerge_core=debug"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
