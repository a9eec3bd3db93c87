//! KV v2 backend on a second Vault server

use crate::{check_existing, vacant, Existing, Overwrite, SaveError, SaveMethod};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};
use vault_init_core::config::VaultKvConfig;
use vault_init_core::{BootstrapResult, SaveLocation};
use vaultrs::client::{Client, VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::kv2;
use zeroize::Zeroizing;

/// Stores the result as a KV v2 secret with two keys: the JSON document and
/// the bare root token.
pub struct VaultKvSaveMethod {
    client: VaultClient,
    mount: String,
    path: String,
    init_response_key: String,
    root_token_key: String,
}

impl VaultKvSaveMethod {
    pub fn new(config: &VaultKvConfig) -> Result<Self, SaveError> {
        let address = config
            .address
            .as_deref()
            .ok_or_else(|| SaveError::unavailable("vault-kv", "no address configured"))?;
        let path = config
            .secret_path
            .as_deref()
            .ok_or_else(|| SaveError::unavailable("vault-kv", "no secret path configured"))?;

        let mut settings = VaultClientSettingsBuilder::default();
        settings.address(address);
        if let Some(ns) = &config.namespace {
            settings.namespace(Some(ns.clone()));
        }
        let settings = settings
            .build()
            .map_err(|e| SaveError::unavailable("vault-kv", e.to_string()))?;

        let mut client = VaultClient::new(settings)
            .map_err(|e| SaveError::unavailable("vault-kv", e.to_string()))?;
        if let Some(token) = &config.token {
            client.set_token(token);
        }

        Ok(Self {
            client,
            mount: config.mount_path.trim_matches('/').to_string(),
            path: path.trim_matches('/').to_string(),
            init_response_key: config.init_response_key.clone(),
            root_token_key: config.root_token_key.clone(),
        })
    }

    fn location(&self) -> String {
        format!("{}/data/{}", self.mount, self.path)
    }

    fn request_error(&self, source: ClientError) -> SaveError {
        match source {
            ClientError::APIError { code: 404, .. } => SaveError::not_found(self.location()),
            source => SaveError::Vault {
                location: self.location(),
                source,
            },
        }
    }
}

#[async_trait]
impl SaveMethod for VaultKvSaveMethod {
    async fn save(
        &self,
        result: &BootstrapResult,
        overwrite: Overwrite,
    ) -> Result<SaveLocation, SaveError> {
        let location = self.location();

        let stored = match overwrite {
            Overwrite::Never => self.load().await,
            Overwrite::Always => Err(SaveError::not_found(location.as_str())),
        };
        if let Existing::Identical = check_existing(stored, result, overwrite, &location)? {
            debug!(path = %location, "Identical bootstrap result already saved");
            return Ok(SaveLocation::new(location));
        }

        let document = Zeroizing::new(result.to_json().map_err(SaveError::Serialize)?);
        let mut data = HashMap::new();
        data.insert(self.init_response_key.as_str(), document.as_str());
        data.insert(self.root_token_key.as_str(), result.root_token.as_str());

        kv2::set(&self.client, &self.mount, &self.path, &data)
            .await
            .map_err(|e| self.request_error(e))?;

        info!(path = %location, "Saved bootstrap result to Vault KV");
        Ok(SaveLocation::new(location))
    }

    async fn load(&self) -> Result<BootstrapResult, SaveError> {
        let data: HashMap<String, Value> = kv2::read(&self.client, &self.mount, &self.path)
            .await
            .map_err(|e| self.request_error(e))?;

        let document = data
            .get(&self.init_response_key)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SaveError::corrupt(
                    self.location(),
                    format!("missing string key {}", self.init_response_key),
                )
            })?;

        debug!(path = %self.location(), "Loaded bootstrap result from Vault KV");
        BootstrapResult::from_json(document)
            .map_err(|e| SaveError::corrupt_json(self.location(), &e))
    }

    fn name(&self) -> &'static str {
        "vault-kv"
    }

    async fn ensure_vacant(&self) -> Result<(), SaveError> {
        vacant(self.load().await, &self.location())
    }
}
