use super::{phase, Bootstrapper};
use crate::api::SysApi;
use crate::error::SealOpsError;
use crate::models::InitRequest;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use vault_init_core::config::InitParams;
use vault_init_core::BootstrapResult;
use vault_init_save::Saved;

/// Result of [`Bootstrapper::initialize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// The server was initialized before this run; nothing was saved
    AlreadyInitialized,
    Initialized(Saved),
}

impl From<&InitParams> for InitRequest {
    fn from(params: &InitParams) -> Self {
        Self {
            secret_shares: params.secret_shares,
            secret_threshold: params.secret_threshold,
            stored_shares: params.stored_shares,
            pgp_keys: params.pgp_keys.clone(),
            root_token_pgp_key: params.root_token_pgp_key.clone(),
            recovery_shares: params.recovery_shares,
            recovery_threshold: params.recovery_threshold,
            recovery_pgp_keys: params.recovery_pgp_keys.clone(),
        }
    }
}

impl<A: SysApi> Bootstrapper<A> {
    /// Initialize the server unless it already is, and save the result.
    ///
    /// Status checks and init requests that fail are retried every poll
    /// interval until the deadline. A failed save is not retried: the
    /// server is initialized at that point and cannot produce the keys again.
    /// For the same reason a result already stored in the primary backend
    /// fails the run before init unless overwriting is allowed.
    pub async fn initialize(&self) -> Result<InitOutcome, SealOpsError> {
        let deadline = Instant::now() + self.options.timeout;
        let request = InitRequest::from(&self.options.init);

        loop {
            match self.api.init_status().await {
                Ok(status) if status.initialized => {
                    info!("Server is already initialized");
                    return Ok(InitOutcome::AlreadyInitialized);
                }
                Ok(_) => {
                    self.store.ensure_vacant(self.options.init_overwrite).await?;
                    info!(
                        secret_shares = request.secret_shares,
                        secret_threshold = request.secret_threshold,
                        "Initializing server"
                    );
                    match self.api.init(&request).await {
                        Ok(result) => return self.save_initial(result).await,
                        Err(e) => warn!(phase = phase::INIT, error = %e, "Init request failed"),
                    }
                }
                Err(e) => warn!(error = %e, "Init status check failed"),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(SealOpsError::Timeout(self.options.timeout));
            }
            let wait = self.options.poll_interval.min(deadline - now);
            debug!(wait_secs = wait.as_secs(), "Retrying");
            sleep(wait).await;
        }
    }

    async fn save_initial(&self, result: BootstrapResult) -> Result<InitOutcome, SealOpsError> {
        info!(
            unseal_keys = result.keys.len(),
            recovery_keys = result.recovery_keys.len(),
            "Server initialized"
        );
        let saved = self
            .store
            .save(&result, self.options.init_overwrite)
            .await?;
        info!(location = %saved.location, method = saved.method, "Bootstrap result saved");
        Ok(InitOutcome::Initialized(saved))
    }
}
