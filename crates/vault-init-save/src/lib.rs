//! Persistence for vault-init bootstrap results
//!
//! A [`SaveMethod`] stores and reloads one [`BootstrapResult`]. Every backend
//! writes the same JSON document so results move freely between them.
//! [`SaveChain`] pairs the configured backend with a local fallback file.

pub mod chain;
pub mod error;
pub mod file;
pub mod kube_secret;
pub mod memory;
pub mod vault_kv;

use async_trait::async_trait;
use vault_init_core::config::{SaveConfig, SaveMethodKind};
use vault_init_core::{BootstrapResult, SaveLocation};

pub use chain::{DataLossRisk, SaveChain, Saved};
pub use error::SaveError;
pub use file::FileSaveMethod;
pub use kube_secret::KubeSecretSaveMethod;
pub use memory::MemorySaveMethod;
pub use vault_kv::VaultKvSaveMethod;

/// Whether a save may replace a stored result that differs from the new one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overwrite {
    /// Fail with [`SaveError::AlreadyExists`] unless the stored result is identical
    Never,
    Always,
}

impl From<bool> for Overwrite {
    fn from(overwrite: bool) -> Self {
        if overwrite {
            Overwrite::Always
        } else {
            Overwrite::Never
        }
    }
}

/// Trait for save backends
#[async_trait]
pub trait SaveMethod: Send + Sync {
    /// Persist `result`, returning where it was written
    async fn save(
        &self,
        result: &BootstrapResult,
        overwrite: Overwrite,
    ) -> Result<SaveLocation, SaveError>;

    /// Load the previously saved result
    ///
    /// Returns [`SaveError::NotFound`] if nothing has been saved yet
    async fn load(&self) -> Result<BootstrapResult, SaveError>;

    /// Backend name for log lines and error messages
    fn name(&self) -> &'static str;

    /// Fail with [`SaveError::AlreadyExists`] if any result is stored.
    ///
    /// Checked before the server generates material that may only be saved
    /// with [`Overwrite::Never`]. Backends override this to report their
    /// real location.
    async fn ensure_vacant(&self) -> Result<(), SaveError> {
        vacant(self.load().await, self.name())
    }
}

/// Build the backend selected by `config.method`
pub fn from_config(config: &SaveConfig) -> Result<Box<dyn SaveMethod>, SaveError> {
    let method: Box<dyn SaveMethod> = match config.method {
        SaveMethodKind::File => Box::new(FileSaveMethod::new(config.file.path.clone())),
        SaveMethodKind::KubeSecret => {
            Box::new(KubeSecretSaveMethod::new(config.kube_secret.clone()))
        }
        SaveMethodKind::VaultKv => Box::new(VaultKvSaveMethod::new(&config.vault_kv)?),
    };
    Ok(method)
}

/// Outcome of an existing-result check for [`Overwrite::Never`] saves
pub(crate) enum Existing {
    /// Nothing stored, or the caller may replace what is there
    Writable,
    /// The stored result equals the new one
    Identical,
}

/// Apply the overwrite policy to whatever `stored` holds
pub(crate) fn check_existing(
    stored: Result<BootstrapResult, SaveError>,
    result: &BootstrapResult,
    overwrite: Overwrite,
    location: &str,
) -> Result<Existing, SaveError> {
    if overwrite == Overwrite::Always {
        return Ok(Existing::Writable);
    }
    match stored {
        Ok(existing) if existing == *result => Ok(Existing::Identical),
        Ok(_) | Err(SaveError::Corrupt { .. }) => Err(SaveError::already_exists(location)),
        Err(SaveError::NotFound { .. }) => Ok(Existing::Writable),
        Err(e) => Err(e),
    }
}

/// Map a load outcome to the [`SaveMethod::ensure_vacant`] contract
pub(crate) fn vacant(
    stored: Result<BootstrapResult, SaveError>,
    location: &str,
) -> Result<(), SaveError> {
    match stored {
        Err(SaveError::NotFound { .. }) => Ok(()),
        Ok(_) | Err(SaveError::Corrupt { .. }) => Err(SaveError::already_exists(location)),
        Err(e) => Err(e),
    }
}
