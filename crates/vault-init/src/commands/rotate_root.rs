//! Rotate-root command

use super::{bootstrapper, load_config};
use crate::cli::{ConnectionArgs, SaveArgs};
use crate::output;
use anyhow::{Context, Result};
use camino::Utf8Path;
use vault_init_sealops::RotateRootOutcome;

pub async fn run(
    config_path: Option<&Utf8Path>,
    connection: &ConnectionArgs,
    save: &SaveArgs,
) -> Result<()> {
    let config = load_config(config_path, connection, save)?;
    let bootstrapper = bootstrapper(&config)?;

    let outcome = bootstrapper
        .rotate_root()
        .await
        .context("Root token rotation failed")?;

    report(&outcome);
    Ok(())
}

pub(super) fn report(outcome: &RotateRootOutcome) {
    output::success(&format!(
        "Generated a new root token with the {} shares",
        outcome.authorized_by
    ));
    output::saved(&outcome.saved);
    if !outcome.revoked {
        output::warning("The previous root token was not revoked; revoke it manually");
    }
}
