//! Admin API seam used by the bootstrap protocols

use crate::error::ApiError;
use crate::models::{
    GenerateRootInitRequest, GenerateRootStatus, InitRequest, InitStatus, RekeyInitRequest,
    RekeyStatus, RekeyUpdateResponse, RekeyVerifyResponse,
};
use async_trait::async_trait;
use vault_init_core::{BootstrapResult, KeyKind};

/// Administrative endpoints of the server being bootstrapped.
///
/// Rekey calls take the [`KeyKind`] whose shares are rotated: unseal shares
/// live under `sys/rekey`, recovery shares under `sys/rekey-recovery-key`.
#[async_trait]
pub trait SysApi: Send + Sync {
    async fn init_status(&self) -> Result<InitStatus, ApiError>;

    async fn init(&self, request: &InitRequest) -> Result<BootstrapResult, ApiError>;

    async fn rekey_status(&self, kind: KeyKind) -> Result<RekeyStatus, ApiError>;

    async fn rekey_init(
        &self,
        kind: KeyKind,
        request: &RekeyInitRequest,
    ) -> Result<RekeyStatus, ApiError>;

    async fn rekey_update(
        &self,
        kind: KeyKind,
        key: &str,
        nonce: &str,
    ) -> Result<RekeyUpdateResponse, ApiError>;

    async fn rekey_cancel(&self, kind: KeyKind) -> Result<(), ApiError>;

    async fn rekey_verify_update(
        &self,
        kind: KeyKind,
        key: &str,
        nonce: &str,
    ) -> Result<RekeyVerifyResponse, ApiError>;

    async fn rekey_verify_cancel(&self, kind: KeyKind) -> Result<(), ApiError>;

    async fn generate_root_status(&self) -> Result<GenerateRootStatus, ApiError>;

    async fn generate_root_init(
        &self,
        request: &GenerateRootInitRequest,
    ) -> Result<GenerateRootStatus, ApiError>;

    async fn generate_root_update(
        &self,
        key: &str,
        nonce: &str,
    ) -> Result<GenerateRootStatus, ApiError>;

    async fn generate_root_cancel(&self) -> Result<(), ApiError>;

    /// Revoke `token`, authenticating with the token itself
    async fn revoke_self(&self, token: &str) -> Result<(), ApiError>;
}

/// Endpoint prefix for rekeying shares of `kind`
pub fn rekey_prefix(kind: KeyKind) -> &'static str {
    match kind {
        KeyKind::Unseal => "sys/rekey",
        KeyKind::Recovery => "sys/rekey-recovery-key",
    }
}
