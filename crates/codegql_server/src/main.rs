//! Main entry point for the codegql server.

use clap::Parser;
use codegql_server::Cli;
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| codegql_server::default_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match codegql_server::run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}
