//! CLI command implementations

pub mod init;
pub mod rekey;
pub mod rotate;
pub mod rotate_root;
pub mod version;

use crate::cli::{ConnectionArgs, SaveArgs};
use anyhow::{Context, Result};
use camino::Utf8Path;
use tracing::debug;
use vault_init_core::VaultInitConfig;
use vault_init_save::SaveChain;
use vault_init_sealops::{BootstrapOptions, Bootstrapper, VaultSysClient};

/// Load the config file (or defaults) and apply the global flags on top
pub fn load_config(
    path: Option<&Utf8Path>,
    connection: &ConnectionArgs,
    save: &SaveArgs,
) -> Result<VaultInitConfig> {
    let mut config = VaultInitConfig::load(path).context("Failed to load configuration")?;
    apply_connection(&mut config, connection);
    apply_save(&mut config, save);
    Ok(config)
}

fn apply_connection(config: &mut VaultInitConfig, args: &ConnectionArgs) {
    let vault = &mut config.vault;
    if let Some(address) = &args.address {
        vault.address = address.clone();
    }
    if let Some(token) = &args.token {
        vault.token = Some(token.clone());
    }
    if let Some(namespace) = &args.namespace {
        vault.namespace = Some(namespace.clone());
    }
}

fn apply_save(config: &mut VaultInitConfig, args: &SaveArgs) {
    let save = &mut config.save;
    if let Some(method) = args.method {
        save.method = method;
    }
    if args.overwrite {
        save.overwrite = true;
    }
    if let Some(path) = &args.fallback_path {
        save.fallback_path = path.clone();
    }
    if let Some(path) = &args.file_path {
        save.file.path = path.clone();
    }

    let kube = &mut save.kube_secret;
    if let Some(name) = &args.kube_secret_name {
        kube.name = name.clone();
    }
    if let Some(namespace) = &args.kube_secret_namespace {
        kube.namespace = Some(namespace.clone());
    }
    if let Some(kubeconfig) = &args.kubeconfig {
        kube.kubeconfig = Some(kubeconfig.clone());
    }

    let kv = &mut save.vault_kv;
    if let Some(address) = &args.vault_kv_addr {
        kv.address = Some(address.clone());
    }
    if let Some(token) = &args.vault_kv_token {
        kv.token = Some(token.clone());
    }
    if let Some(mount) = &args.vault_kv_mount {
        kv.mount_path = mount.clone();
    }
    if let Some(path) = &args.vault_kv_path {
        kv.secret_path = Some(path.clone());
    }
}

/// Validate the final configuration and wire up client, save chain and
/// controller
pub fn bootstrapper(config: &VaultInitConfig) -> Result<Bootstrapper<VaultSysClient>> {
    config.validate().context("Invalid configuration")?;
    debug!(?config, "Resolved configuration");

    let client = VaultSysClient::new(&config.vault)
        .with_context(|| format!("Failed to create client for {}", config.vault.address))?;
    let store = SaveChain::from_config(&config.save).with_context(|| {
        format!("Failed to set up the {} save backend", config.save.method)
    })?;

    Ok(Bootstrapper::new(
        client,
        store,
        BootstrapOptions::from(config),
    ))
}
