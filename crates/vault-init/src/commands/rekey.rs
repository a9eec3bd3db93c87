//! Rekey command

use super::{bootstrapper, load_config};
use crate::cli::{ConnectionArgs, RekeyArgs, SaveArgs};
use crate::output;
use anyhow::{Context, Result};
use camino::Utf8Path;
use vault_init_core::{KeyKind, VaultInitConfig};
use vault_init_sealops::RekeyOutcome;

pub async fn run(
    args: RekeyArgs,
    config_path: Option<&Utf8Path>,
    connection: &ConnectionArgs,
    save: &SaveArgs,
) -> Result<()> {
    let mut config = load_config(config_path, connection, save)?;
    apply(&mut config, &args);
    let bootstrapper = bootstrapper(&config)?;

    let kind = config.rekey.target;
    let outcome = bootstrapper
        .rekey(kind)
        .await
        .with_context(|| format!("Rekey of the {} shares failed", kind))?;

    report(&outcome);
    Ok(())
}

/// Fold the rekey flags into the configuration
pub(super) fn apply(config: &mut VaultInitConfig, args: &RekeyArgs) {
    if args.recovery {
        config.rekey.target = KeyKind::Recovery;
    }
    if args.verify {
        config.rekey.require_verification = true;
    }
    if args.backup {
        config.rekey.backup = true;
    }
}

pub(super) fn report(outcome: &RekeyOutcome) {
    output::success(&format!(
        "Replaced {} shares ({} new shares{})",
        outcome.kind,
        outcome.shares,
        if outcome.verified { ", verified" } else { "" }
    ));
    output::saved(&outcome.saved);
}
