//! Rotate command: rekey, then rotate the root token

use super::{bootstrapper, load_config, rekey, rotate_root};
use crate::cli::{ConnectionArgs, RekeyArgs, SaveArgs};
use anyhow::{Context, Result};
use camino::Utf8Path;

pub async fn run(
    args: RekeyArgs,
    config_path: Option<&Utf8Path>,
    connection: &ConnectionArgs,
    save: &SaveArgs,
) -> Result<()> {
    let mut config = load_config(config_path, connection, save)?;
    rekey::apply(&mut config, &args);
    let bootstrapper = bootstrapper(&config)?;

    let (rekeyed, rotated) = bootstrapper.rotate().await.context("Rotation failed")?;

    rekey::report(&rekeyed);
    rotate_root::report(&rotated);
    Ok(())
}
