use super::{phase, save_rotated, Bootstrapper};
use crate::api::SysApi;
use crate::error::{ApiError, SealOpsError};
use crate::models::{GenerateRootInitRequest, GenerateRootStatus};
use tracing::{debug, info, warn};
use vault_init_core::otp::{self, DEFAULT_OTP_LENGTH};
use vault_init_core::{BootstrapResult, KeyKind};
use vault_init_save::Saved;
use zeroize::Zeroizing;

/// Result of [`Bootstrapper::rotate_root`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotateRootOutcome {
    pub saved: Saved,
    /// Shares that authorized the generation
    pub authorized_by: KeyKind,
    /// The token used for this run was revoked
    pub revoked: bool,
}

impl<A: SysApi> Bootstrapper<A> {
    /// Generate a new root token, save it, then revoke the old credential.
    ///
    /// Revocation happens only once the new token is saved, so a failed save
    /// leaves the previous token usable.
    pub async fn rotate_root(&self) -> Result<RotateRootOutcome, SealOpsError> {
        self.rotate_root_from(None).await
    }

    /// [`Self::rotate_root`] starting from `current` instead of the stored
    /// result when given
    pub(super) async fn rotate_root_from(
        &self,
        current: Option<BootstrapResult>,
    ) -> Result<RotateRootOutcome, SealOpsError> {
        let phase = phase::GENERATE_ROOT;

        let status = self
            .api
            .generate_root_status()
            .await
            .map_err(SealOpsError::api(phase))?;
        if status.started {
            return Err(SealOpsError::Conflict { phase });
        }

        let mut result = match current {
            Some(result) => result,
            None => self.store.load().await?,
        };
        let (kind, shares) = match result.authorizing_shares() {
            Some((kind, shares)) => (kind, Zeroizing::new(shares.to_vec())),
            None => return Err(SealOpsError::NoShares { phase }),
        };
        if kind == KeyKind::Recovery {
            warn!(phase, "No unseal shares stored, authorizing with recovery shares");
        }

        let pgp_key = self.options.init.root_token_pgp_key.clone();
        let mut pad = Zeroizing::new(String::new());
        if pgp_key.is_none() {
            let length = match status.otp_length {
                0 => DEFAULT_OTP_LENGTH,
                n => n as usize,
            };
            *pad = otp::generate_pad(length);
        }
        let request = GenerateRootInitRequest {
            otp: pgp_key.is_none().then(|| pad.to_string()),
            pgp_key: pgp_key.clone(),
        };

        let mut session = self
            .api
            .generate_root_init(&request)
            .await
            .map_err(SealOpsError::api(phase))?;
        if !session.otp.is_empty() {
            *pad = std::mem::take(&mut session.otp);
        }
        let nonce = std::mem::take(&mut session.nonce);
        if session.pgp_fingerprint.is_empty() {
            info!(phase, nonce = %nonce, "Root token generation started");
        } else {
            info!(phase, nonce = %nonce, pgp_fingerprint = %session.pgp_fingerprint, "Root token generation started");
        }

        let mut completed = self
            .submit_root_shares(&nonce, &shares, session.required)
            .await?;
        let encoded = Zeroizing::new(completed.take_encoded_token());
        if encoded.is_empty() {
            return Err(SealOpsError::Api {
                phase,
                source: ApiError::unexpected(
                    "sys/generate-root/update",
                    "generation completed without an encoded token",
                ),
            });
        }

        let new_token = if pgp_key.is_some() {
            // Encrypted for the PGP recipient; stored as returned
            encoded.to_string()
        } else {
            otp::decode(&encoded, &pad).map_err(|source| SealOpsError::Decode {
                nonce: nonce.clone(),
                source,
            })?
        };

        let previous_token = Zeroizing::new(result.root_token.clone());
        result.replace_root_token(new_token);
        let saved = save_rotated(&self.store, &result).await?;
        info!(phase, nonce = %nonce, location = %saved.location, "New root token saved");

        let revoked = self.revoke_previous(&previous_token, pgp_key.is_some()).await?;

        Ok(RotateRootOutcome {
            saved,
            authorized_by: kind,
            revoked,
        })
    }

    async fn submit_root_shares(
        &self,
        nonce: &str,
        shares: &[String],
        required: u32,
    ) -> Result<GenerateRootStatus, SealOpsError> {
        let phase = phase::GENERATE_ROOT;
        let (mut progress, mut required) = (0, required);

        for key in shares {
            match self.api.generate_root_update(key, nonce).await {
                Ok(update) if update.complete => return Ok(update),
                Ok(update) => {
                    progress = update.progress;
                    required = update.required;
                    debug!(phase, nonce, progress, required, "Share accepted");
                }
                Err(source) => {
                    let failure = SealOpsError::Rejected {
                        phase,
                        nonce: nonce.to_string(),
                        source,
                    };
                    return Err(self
                        .abort(phase, nonce, failure, self.api.generate_root_cancel())
                        .await);
                }
            }
        }

        let failure = SealOpsError::Incomplete {
            phase,
            nonce: nonce.to_string(),
            progress,
            required,
        };
        Err(self
            .abort(phase, nonce, failure, self.api.generate_root_cancel())
            .await)
    }

    /// Revoke the token this run authenticated with: the configured admin
    /// token, or else the previous root token
    async fn revoke_previous(
        &self,
        previous_root: &str,
        root_is_encrypted: bool,
    ) -> Result<bool, SealOpsError> {
        let token = match &self.options.admin_token {
            Some(token) => token.as_str(),
            None if root_is_encrypted || previous_root.is_empty() => {
                warn!("Previous root token is not available in plaintext; revoke it manually");
                return Ok(false);
            }
            None => previous_root,
        };

        self.api
            .revoke_self(token)
            .await
            .map_err(SealOpsError::api(phase::REVOKE_SELF))?;
        info!("Previous token revoked");
        Ok(true)
    }
}
