//! Initialize, rekey and root token rotation protocols
//!
//! A [`Bootstrapper`] drives each protocol against a [`SysApi`] and hands
//! the generated material to a [`SaveChain`]. Calls are strictly sequential.
//! A session that fails part way is cancelled on the server before the
//! error is returned.

mod init;
mod rekey;
mod rotate_root;

use crate::api::SysApi;
use crate::error::{ApiError, SealOpsError};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};
use vault_init_core::config::{InitParams, RekeyParams, VaultInitConfig};
use vault_init_core::BootstrapResult;
use vault_init_save::{Overwrite, SaveChain, Saved};

pub use init::InitOutcome;
pub use rekey::RekeyOutcome;
pub use rotate_root::RotateRootOutcome;

/// Everything the protocols need from the configuration
#[derive(Clone)]
pub struct BootstrapOptions {
    pub init: InitParams,
    pub rekey: RekeyParams,
    /// Deadline for the initialize loop
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Policy for the initial save
    pub init_overwrite: Overwrite,
    /// Token revoked after a root rotation; the previous root token when unset
    pub admin_token: Option<String>,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self::from(&VaultInitConfig::default())
    }
}

impl From<&VaultInitConfig> for BootstrapOptions {
    fn from(config: &VaultInitConfig) -> Self {
        Self {
            init: config.init.clone(),
            rekey: config.rekey.clone(),
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
            init_overwrite: Overwrite::from(config.save.overwrite),
            admin_token: config.vault.token.clone(),
        }
    }
}

impl fmt::Debug for BootstrapOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapOptions")
            .field("init", &self.init)
            .field("rekey", &self.rekey)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("init_overwrite", &self.init_overwrite)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Drives the bootstrap protocols against one server
pub struct Bootstrapper<A> {
    api: A,
    store: SaveChain,
    options: BootstrapOptions,
}

impl<A: SysApi> Bootstrapper<A> {
    pub fn new(api: A, store: SaveChain, options: BootstrapOptions) -> Self {
        Self {
            api,
            store,
            options,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn store(&self) -> &SaveChain {
        &self.store
    }

    pub fn options(&self) -> &BootstrapOptions {
        &self.options
    }

    /// Rekey the configured share kind, then rotate the root token with the
    /// rekeyed result, wherever it was saved
    pub async fn rotate(&self) -> Result<(RekeyOutcome, RotateRootOutcome), SealOpsError> {
        let (rekeyed, result) = self.rekey_inner(self.options.rekey.target).await?;
        let rotated = self.rotate_root_from(Some(result)).await?;
        Ok((rekeyed, rotated))
    }

    /// Cancel a failed session and return the error to surface: `failure`
    /// itself, or [`SealOpsError::CancelFailed`] if the cancel call failed too
    async fn abort<F>(
        &self,
        phase: &'static str,
        nonce: &str,
        failure: SealOpsError,
        cancel: F,
    ) -> SealOpsError
    where
        F: Future<Output = Result<(), ApiError>>,
    {
        warn!(phase, nonce, error = %failure, "Cancelling session");
        match cancel.await {
            Ok(()) => failure,
            Err(source) => {
                error!(phase, nonce, error = %source, "Failed to cancel session; server state may be inconsistent");
                SealOpsError::CancelFailed {
                    phase,
                    nonce: nonce.to_string(),
                    reason: failure.to_string(),
                    source,
                }
            }
        }
    }
}

/// Protocol step names used in logs and errors
pub(crate) mod phase {
    use vault_init_core::KeyKind;

    pub const INIT: &str = "init";
    pub const GENERATE_ROOT: &str = "generate root";
    pub const REVOKE_SELF: &str = "revoke self";

    pub fn rekey(kind: KeyKind) -> &'static str {
        match kind {
            KeyKind::Unseal => "rekey",
            KeyKind::Recovery => "recovery rekey",
        }
    }

    pub fn rekey_verification(kind: KeyKind) -> &'static str {
        match kind {
            KeyKind::Unseal => "rekey verification",
            KeyKind::Recovery => "recovery rekey verification",
        }
    }
}

/// Save after a rotation, which replaces the stored result by definition
async fn save_rotated(
    store: &SaveChain,
    result: &BootstrapResult,
) -> Result<Saved, SealOpsError> {
    Ok(store.save(result, Overwrite::Always).await?)
}
