//! vault-init CLI
//!
//! Bootstraps a Vault-compatible server: initialization, rekey and root
//! token rotation, with the generated material persisted to a file, a
//! Kubernetes secret or a second server's KV store.

mod cli;
mod commands;
mod output;
mod version;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any TLS connection is made
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet, cli.log_format);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Version(args) => commands::version::run(args),
        Commands::Init(args) => {
            commands::init::run(args, config_path, &cli.connection, &cli.save).await
        }
        Commands::Rekey(args) => {
            commands::rekey::run(args, config_path, &cli.connection, &cli.save).await
        }
        Commands::RotateRoot => {
            commands::rotate_root::run(config_path, &cli.connection, &cli.save).await
        }
        Commands::Rotate(args) => {
            commands::rotate::run(args, config_path, &cli.connection, &cli.save).await
        }
    }
}

/// Initialize tracing with appropriate verbosity and format
fn init_tracing(verbose: u8, quiet: bool, format: LogFormat) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer().with_target(false)).init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .init(),
    }
}
