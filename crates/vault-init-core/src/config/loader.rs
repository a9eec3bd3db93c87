//! Configuration file loading and validation

use super::types::{SaveMethodKind, VaultInitConfig};
use crate::error::{Error, Result};
use crate::types::KeyKind;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tracing::debug;

/// Configuration file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["vault-init.yaml", "vault-init.yml"];

impl VaultInitConfig {
    /// Load configuration from the specified path, or from a config file in
    /// the current directory. No file at all yields the defaults.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let found = match path {
            Some(p) => {
                let content = fs::read_to_string(p).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        Error::config_not_found(p.as_str())
                    } else {
                        Error::Io(e)
                    }
                })?;
                Some((p.to_owned(), content))
            }
            None => {
                let cwd = std::env::current_dir()?;
                let cwd = Utf8PathBuf::try_from(cwd).map_err(|_| {
                    Error::invalid_config("Current directory path is not valid UTF-8")
                })?;
                Self::find_config_in(&cwd)?
            }
        };

        match found {
            Some((config_path, content)) => {
                debug!(path = %config_path, "Loading configuration file");
                Self::from_yaml_str(&content)
            }
            None => {
                debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse configuration from YAML
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    /// Find a configuration file directly inside `dir`
    fn find_config_in(dir: &Utf8Path) -> Result<Option<(Utf8PathBuf, String)>> {
        for name in CONFIG_FILE_NAMES {
            let path = dir.join(name);
            if path.exists() {
                let content = fs::read_to_string(&path)?;
                return Ok(Some((path, content)));
            }
        }
        Ok(None)
    }

    /// Check the configuration for values the server would reject or that
    /// would make a run unrecoverable
    pub fn validate(&self) -> Result<()> {
        let init = &self.init;

        check_threshold("secret", init.secret_shares, init.secret_threshold)?;
        if let (Some(shares), Some(threshold)) = (init.recovery_shares, init.recovery_threshold) {
            check_threshold("recovery", shares, threshold)?;
        }

        if !init.pgp_keys.is_empty() && init.pgp_keys.len() != usize::from(init.secret_shares) {
            return Err(Error::invalid_config(format!(
                "pgpKeys has {} entries but secretShares is {}",
                init.pgp_keys.len(),
                init.secret_shares
            )));
        }
        if !init.recovery_pgp_keys.is_empty() {
            let (shares, _) = init.shares_for(KeyKind::Recovery);
            if init.recovery_pgp_keys.len() != usize::from(shares) {
                return Err(Error::invalid_config(format!(
                    "recoveryPgpKeys has {} entries but recoveryShares is {}",
                    init.recovery_pgp_keys.len(),
                    shares
                )));
            }
        }

        if self.rekey.require_verification && !init.pgp_keys_for(self.rekey.target).is_empty() {
            return Err(Error::invalid_config(
                "rekey verification cannot be combined with PGP-encrypted shares",
            ));
        }

        if self.timeout_secs == 0 {
            return Err(Error::invalid_config("timeoutSecs must be greater than 0"));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::invalid_config(
                "pollIntervalSecs must be greater than 0",
            ));
        }

        self.validate_save()
    }

    fn validate_save(&self) -> Result<()> {
        let save = &self.save;
        match save.method {
            SaveMethodKind::File => {
                if save.file.path.as_str().is_empty() {
                    return Err(Error::missing_field("save.file.path"));
                }
            }
            SaveMethodKind::KubeSecret => {
                if save.kube_secret.name.is_empty() {
                    return Err(Error::missing_field("save.kubeSecret.name"));
                }
                if save.kube_secret.key == save.kube_secret.root_token_key {
                    return Err(Error::invalid_config(
                        "save.kubeSecret.key and rootTokenKey must differ",
                    ));
                }
            }
            SaveMethodKind::VaultKv => {
                let kv = &save.vault_kv;
                if kv.address.as_deref().unwrap_or_default().is_empty() {
                    return Err(Error::missing_field("save.vaultKv.address"));
                }
                if kv.secret_path.as_deref().unwrap_or_default().is_empty() {
                    return Err(Error::missing_field("save.vaultKv.secretPath"));
                }
                if kv.init_response_key == kv.root_token_key {
                    return Err(Error::invalid_config(
                        "save.vaultKv.initResponseKey and rootTokenKey must differ",
                    ));
                }
            }
        }

        if save.fallback_path.as_str().is_empty() {
            return Err(Error::missing_field("save.fallbackPath"));
        }
        Ok(())
    }
}

fn check_threshold(kind: &str, shares: u8, threshold: u8) -> Result<()> {
    if shares == 0 {
        return Err(Error::invalid_config(format!(
            "{} shares must be at least 1",
            kind
        )));
    }
    if threshold == 0 || threshold > shares {
        return Err(Error::invalid_config(format!(
            "{} threshold must be between 1 and {} (got {})",
            kind, shares, threshold
        )));
    }
    Ok(())
}
