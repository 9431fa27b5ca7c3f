//! HTTP server and command-line interface for codegql.
//!
//! # Usage
//!
//! ```bash
//! # Serve the demo data
//! codegql serve --seed crates/codegql_server/demo-seed.json
//!
//! # Validate a seed file
//! codegql check-seed data.json
//! ```

pub mod config;
pub mod http;

use clap::{Parser, Subcommand};
use codegql_backend::{Seed, SeedError};
use codegql_resolvers::{Schema, Services};
use colored::Colorize;
use crate::config::{ConfigError, ServerConfig};
use crate::http::AppState;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Seed { path: PathBuf, source: SeedError },

    #[error("binding {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("accepting connection: {0}")]
    Accept(std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "codegql")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the GraphQL API over HTTP
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// JSON seed for the in-memory backends
        #[arg(long)]
        seed: Option<PathBuf>,

        /// Maximum page size of connections
        #[arg(long)]
        max_page_size: Option<usize>,

        /// Disable the usage page at GET /graphql
        #[arg(long)]
        no_playground: bool,
    },

    /// Validate a seed file
    CheckSeed {
        #[arg(required = true)]
        file: PathBuf,
    },
}

/// The tracing filter used when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "codegql=debug"
    } else {
        "codegql=info"
    }
}

/// Reads and validates a seed file.
pub fn load_seed(path: &Path) -> Result<Seed, ServerError> {
    let text = std::fs::read_to_string(path).map_err(|source| ServerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Seed::from_json(&text).map_err(|source| ServerError::Seed {
        path: path.to_path_buf(),
        source,
    })
}

/// Builds the schema over in-memory backends populated from `seed`.
pub fn build_state(config: ServerConfig, seed: &Seed) -> AppState {
    let services = Services::memory(seed).with_settings(config.schema_settings());
    AppState {
        schema: Schema::new(services),
        config,
    }
}

/// Flags override the environment.
fn serve_config(
    host: Option<String>,
    port: Option<u16>,
    max_page_size: Option<usize>,
    no_playground: bool,
) -> Result<ServerConfig, ServerError> {
    let mut config = ServerConfig::from_env()?;
    if let Some(host) = host {
        config = config.host(host);
    }
    if let Some(port) = port {
        config = config.port(port);
    }
    if let Some(max) = max_page_size {
        config = config.max_page_size(max);
    }
    if no_playground {
        config = config.no_playground();
    }
    config.validate()?;
    Ok(config)
}

fn check_seed(file: &Path, verbose: bool) -> i32 {
    match load_seed(file) {
        Ok(seed) => {
            if verbose {
                println!(
                    "  {} users, {} teams, {} repos, {} git repos",
                    seed.users.len(),
                    seed.teams.len(),
                    seed.repos.len(),
                    seed.git.len()
                );
            }
            println!("{} {}", "OK".green(), file.display());
            0
        }
        Err(err) => {
            eprintln!("{} {}", "Error:".red().bold(), err);
            1
        }
    }
}

pub async fn run(cli: Cli) -> Result<i32, ServerError> {
    match cli.command {
        Commands::Serve {
            host,
            port,
            seed,
            max_page_size,
            no_playground,
        } => {
            let config = serve_config(host, port, max_page_size, no_playground)?;
            let seed = match seed {
                Some(path) => {
                    let seed = load_seed(&path)?;
                    info!(path = %path.display(), users = seed.users.len(), "seed loaded");
                    seed
                }
                None => Seed::default(),
            };
            println!("{}", "codegql".green().bold());
            crate::http::run_server(Arc::new(build_state(config, &seed))).await?;
            Ok(0)
        }
        Commands::CheckSeed { file } => Ok(check_seed(&file, cli.verbose)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_flags() {
        let cli = Cli::parse_from(["codegql", "serve", "--port", "4000", "--no-playground"]);
        match cli.command {
            Commands::Serve {
                port,
                no_playground,
                seed,
                ..
            } => {
                assert_eq!(port, Some(4000));
                assert!(no_playground);
                assert!(seed.is_none());
            }
            Commands::CheckSeed { .. } => panic!("expected serve"),
        }
    }

    #[test]
    fn test_verbose_raises_filter() {
        let cli = Cli::parse_from(["codegql", "--verbose", "check-seed", "seed.json"]);
        assert!(cli.verbose);
        assert_eq!(default_filter(cli.verbose), "codegql=debug");
        assert_eq!(default_filter(false), "codegql=info");
    }

    #[test]
    fn test_missing_seed_file() {
        let err = load_seed(Path::new("/nonexistent/seed.json")).unwrap_err();
        assert!(matches!(err, ServerError::Io { .. }));
    }
}
