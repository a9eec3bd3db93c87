use super::{phase, save_rotated, Bootstrapper};
use crate::api::SysApi;
use crate::error::SealOpsError;
use crate::models::{RekeyInitRequest, RekeyUpdateResponse};
use tracing::{debug, info};
use vault_init_core::{BootstrapResult, KeyKind};
use vault_init_save::Saved;
use zeroize::Zeroizing;

/// Result of [`Bootstrapper::rekey`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RekeyOutcome {
    pub kind: KeyKind,
    pub saved: Saved,
    /// Number of new shares
    pub shares: usize,
    /// The new shares were submitted back and confirmed
    pub verified: bool,
}

impl<A: SysApi> Bootstrapper<A> {
    /// Replace the stored shares of `kind` with freshly generated ones.
    ///
    /// The stored shares authorize the session one at a time. New shares
    /// are saved as soon as the server hands them out, before any
    /// verification round.
    pub async fn rekey(&self, kind: KeyKind) -> Result<RekeyOutcome, SealOpsError> {
        let (outcome, _) = self.rekey_inner(kind).await?;
        Ok(outcome)
    }

    /// Rekey and also return the updated result as saved
    pub(super) async fn rekey_inner(
        &self,
        kind: KeyKind,
    ) -> Result<(RekeyOutcome, BootstrapResult), SealOpsError> {
        let phase = phase::rekey(kind);
        let params = &self.options.init;
        let pgp_keys = params.pgp_keys_for(kind);
        let require_verification = self.options.rekey.require_verification;

        if require_verification && !pgp_keys.is_empty() {
            return Err(SealOpsError::invalid_config(
                "rekey verification cannot be combined with PGP-encrypted shares",
            ));
        }

        let status = self
            .api
            .rekey_status(kind)
            .await
            .map_err(SealOpsError::api(phase))?;
        if status.started {
            return Err(SealOpsError::Conflict { phase });
        }

        let mut result = self.store.load().await?;
        let shares = Zeroizing::new(result.shares(kind).to_vec());
        if shares.is_empty() {
            return Err(SealOpsError::NoShares { phase });
        }

        let (secret_shares, secret_threshold) = params.shares_for(kind);
        let request = RekeyInitRequest {
            secret_shares,
            secret_threshold,
            pgp_keys: pgp_keys.to_vec(),
            backup: self.options.rekey.backup,
            require_verification,
        };
        let session = self
            .api
            .rekey_init(kind, &request)
            .await
            .map_err(SealOpsError::api(phase))?;
        let nonce = session.nonce;
        info!(phase, nonce = %nonce, secret_shares, secret_threshold, "Rekey started");

        let mut completed = self.submit_rekey_shares(kind, &nonce, &shares, session.required).await?;

        let new_keys = std::mem::take(&mut completed.keys);
        let new_keys_base64 = Zeroizing::new(std::mem::take(&mut completed.keys_base64));
        let share_count = new_keys_base64.len();
        result.replace_shares(kind, new_keys, new_keys_base64.to_vec());

        let saved = save_rotated(&self.store, &result).await?;
        info!(phase, nonce = %nonce, location = %saved.location, "New shares saved");

        let verified = if completed.verification_required {
            self.verify_rekey(kind, &completed.verification_nonce, &new_keys_base64)
                .await?;
            true
        } else {
            false
        };

        let outcome = RekeyOutcome {
            kind,
            saved,
            shares: share_count,
            verified,
        };
        Ok((outcome, result))
    }

    async fn submit_rekey_shares(
        &self,
        kind: KeyKind,
        nonce: &str,
        shares: &[String],
        required: u32,
    ) -> Result<RekeyUpdateResponse, SealOpsError> {
        let phase = phase::rekey(kind);
        let (mut progress, mut required) = (0, required);

        for key in shares {
            match self.api.rekey_update(kind, key, nonce).await {
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
                        .abort(phase, nonce, failure, self.api.rekey_cancel(kind))
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
            .abort(phase, nonce, failure, self.api.rekey_cancel(kind))
            .await)
    }

    /// Submit the new shares to the verification endpoint until the server
    /// confirms them
    async fn verify_rekey(
        &self,
        kind: KeyKind,
        nonce: &str,
        new_shares: &[String],
    ) -> Result<(), SealOpsError> {
        let phase = phase::rekey_verification(kind);
        info!(phase, nonce, "Verifying new shares");
        let (_, threshold) = self.options.init.shares_for(kind);
        let (mut progress, mut required) = (0, u32::from(threshold));

        for key in new_shares {
            match self.api.rekey_verify_update(kind, key, nonce).await {
                Ok(update) if update.complete => {
                    info!(phase, nonce, "New shares verified");
                    return Ok(());
                }
                Ok(update) => {
                    progress = update.progress;
                    if update.t > 0 {
                        required = update.t;
                    }
                    debug!(phase, nonce, progress, required, "Share verified");
                }
                Err(source) => {
                    let failure = SealOpsError::Rejected {
                        phase,
                        nonce: nonce.to_string(),
                        source,
                    };
                    return Err(self
                        .abort(phase, nonce, failure, self.api.rekey_verify_cancel(kind))
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
            .abort(phase, nonce, failure, self.api.rekey_verify_cancel(kind))
            .await)
    }
}
