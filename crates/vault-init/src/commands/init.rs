//! Init command

use super::{bootstrapper, load_config};
use crate::cli::{ConnectionArgs, InitArgs, SaveArgs};
use crate::output;
use anyhow::{Context, Result};
use camino::Utf8Path;
use tracing::info;
use vault_init_core::VaultInitConfig;
use vault_init_sealops::InitOutcome;

pub async fn run(
    args: InitArgs,
    config_path: Option<&Utf8Path>,
    connection: &ConnectionArgs,
    save: &SaveArgs,
) -> Result<()> {
    let mut config = load_config(config_path, connection, save)?;
    apply(&mut config, &args);
    let bootstrapper = bootstrapper(&config)?;

    info!(address = %config.vault.address, "Waiting for server to accept initialization");
    let outcome = bootstrapper
        .initialize()
        .await
        .context("Initialization failed")?;

    match outcome {
        InitOutcome::AlreadyInitialized => {
            output::info("Server is already initialized; nothing was saved");
        }
        InitOutcome::Initialized(saved) => {
            output::success("Server initialized");
            output::saved(&saved);
        }
    }
    Ok(())
}

fn apply(config: &mut VaultInitConfig, args: &InitArgs) {
    let init = &mut config.init;
    if let Some(shares) = args.secret_shares {
        init.secret_shares = shares;
    }
    if let Some(threshold) = args.secret_threshold {
        init.secret_threshold = threshold;
    }
    if let Some(shares) = args.recovery_shares {
        init.recovery_shares = Some(shares);
    }
    if let Some(threshold) = args.recovery_threshold {
        init.recovery_threshold = Some(threshold);
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
}
