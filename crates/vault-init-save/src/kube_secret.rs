//! Kubernetes Secret backend

use crate::{check_existing, vacant, Existing, Overwrite, SaveError, SaveMethod};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use vault_init_core::config::KubeSecretConfig;
use vault_init_core::{BootstrapResult, SaveLocation};
use zeroize::Zeroizing;

/// Stores the result in an Opaque Secret: the JSON document under
/// `config.key` and the bare root token under `config.root_token_key`.
#[derive(Debug, Clone)]
pub struct KubeSecretSaveMethod {
    config: KubeSecretConfig,
}

impl KubeSecretSaveMethod {
    pub fn new(config: KubeSecretConfig) -> Self {
        Self { config }
    }

    async fn client(&self) -> Result<Client, SaveError> {
        let config = match &self.config.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    SaveError::unavailable(
                        "kube-secret",
                        format!("failed to read kubeconfig {}: {}", path, e),
                    )
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| {
                        SaveError::unavailable(
                            "kube-secret",
                            format!("failed to load kubeconfig: {}", e),
                        )
                    })?
            }
            None => Config::infer().await.map_err(|e| {
                SaveError::unavailable("kube-secret", format!("failed to infer config: {}", e))
            })?,
        };

        Client::try_from(config).map_err(|e| {
            SaveError::unavailable("kube-secret", format!("failed to create client: {}", e))
        })
    }

    /// Secrets API for the configured namespace, plus the `namespace/name`
    /// location string
    async fn api(&self) -> Result<(Api<Secret>, String), SaveError> {
        let client = self.client().await?;
        let namespace = self
            .config
            .namespace
            .clone()
            .unwrap_or_else(|| client.default_namespace().to_string());
        let location = format!("{}/{}", namespace, self.config.name);
        Ok((Api::namespaced(client, &namespace), location))
    }

    /// Secret object holding `result`
    pub fn build_secret(&self, result: &BootstrapResult) -> Result<Secret, SaveError> {
        let document = Zeroizing::new(result.to_json().map_err(SaveError::Serialize)?);

        let mut string_data = BTreeMap::new();
        string_data.insert(self.config.key.clone(), document.to_string());
        string_data.insert(
            self.config.root_token_key.clone(),
            result.root_token.clone(),
        );

        let non_empty = |map: &BTreeMap<String, String>| {
            if map.is_empty() {
                None
            } else {
                Some(map.clone())
            }
        };

        Ok(Secret {
            metadata: ObjectMeta {
                name: Some(self.config.name.clone()),
                namespace: self.config.namespace.clone(),
                labels: non_empty(&self.config.labels),
                annotations: non_empty(&self.config.annotations),
                ..Default::default()
            },
            string_data: Some(string_data),
            type_: Some("Opaque".to_string()),
            ..Default::default()
        })
    }

    /// Bootstrap result stored in `secret`. Reads `data` as returned by the
    /// API server, and `stringData` for objects that were never submitted.
    pub fn parse_secret(&self, secret: &Secret, location: &str) -> Result<BootstrapResult, SaveError> {
        let key = &self.config.key;
        let bytes = secret
            .data
            .as_ref()
            .and_then(|d| d.get(key))
            .map(|v| v.0.as_slice())
            .or_else(|| {
                secret
                    .string_data
                    .as_ref()
                    .and_then(|d| d.get(key))
                    .map(|v| v.as_bytes())
            })
            .ok_or_else(|| SaveError::corrupt(location, format!("missing key {}", key)))?;

        let document = std::str::from_utf8(bytes)
            .map_err(|_| SaveError::corrupt(location, format!("key {} is not valid UTF-8", key)))?;
        BootstrapResult::from_json(document).map_err(|e| SaveError::corrupt_json(location, &e))
    }

    async fn read(&self, secrets: &Api<Secret>, location: &str) -> Result<BootstrapResult, SaveError> {
        match secrets.get_opt(&self.config.name).await {
            Ok(Some(secret)) => {
                debug!(secret = %location, "Loaded bootstrap result from Kubernetes secret");
                self.parse_secret(&secret, location)
            }
            Ok(None) => Err(SaveError::not_found(location)),
            Err(source) => Err(SaveError::Kube {
                location: location.to_string(),
                source,
            }),
        }
    }
}

#[async_trait]
impl SaveMethod for KubeSecretSaveMethod {
    async fn save(
        &self,
        result: &BootstrapResult,
        overwrite: Overwrite,
    ) -> Result<SaveLocation, SaveError> {
        let (secrets, location) = self.api().await?;
        let mut secret = self.build_secret(result)?;
        let kube_err = |source| SaveError::Kube {
            location: location.clone(),
            source,
        };

        let existing = secrets.get_opt(&self.config.name).await.map_err(kube_err)?;
        match existing {
            Some(existing) => {
                let stored = self.parse_secret(&existing, &location);
                if let Existing::Identical = check_existing(stored, result, overwrite, &location)? {
                    debug!(secret = %location, "Identical bootstrap result already saved");
                    return Ok(SaveLocation::new(location));
                }

                warn!(secret = %location, "Replacing existing secret");
                secret.metadata.resource_version = existing.resource_version();
                secrets
                    .replace(&self.config.name, &PostParams::default(), &secret)
                    .await
                    .map_err(kube_err)?;
            }
            None => {
                secrets
                    .create(&PostParams::default(), &secret)
                    .await
                    .map_err(kube_err)?;
            }
        }

        info!(secret = %location, "Saved bootstrap result to Kubernetes secret");
        Ok(SaveLocation::new(location))
    }

    async fn load(&self) -> Result<BootstrapResult, SaveError> {
        let (secrets, location) = self.api().await?;
        self.read(&secrets, &location).await
    }

    fn name(&self) -> &'static str {
        "kube-secret"
    }

    async fn ensure_vacant(&self) -> Result<(), SaveError> {
        let (secrets, location) = self.api().await?;
        vacant(self.read(&secrets, &location).await, &location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;

    fn sample() -> BootstrapResult {
        let mut result = BootstrapResult::default();
        result.recovery_keys = vec!["7265636f76657279".to_string()];
        result.recovery_keys_base64 = vec!["cmVjb3Zlcnk=".to_string()];
        result.root_token = "hvs.kube".to_string();
        result
    }

    fn method() -> KubeSecretSaveMethod {
        let mut config = KubeSecretConfig::default();
        config.namespace = Some("vault".to_string());
        config
            .labels
            .insert("app.kubernetes.io/name".to_string(), "vault".to_string());
        KubeSecretSaveMethod::new(config)
    }

    #[test]
    fn test_build_secret_layout() {
        let secret = method().build_secret(&sample()).unwrap();

        assert_eq!(secret.metadata.name.as_deref(), Some("vault-init"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("vault"));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        assert!(secret.metadata.annotations.is_none());
        assert_eq!(
            secret
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get("app.kubernetes.io/name"))
                .map(String::as_str),
            Some("vault")
        );

        let data = secret.string_data.as_ref().unwrap();
        assert_eq!(data.get("root_token").map(String::as_str), Some("hvs.kube"));
        assert_eq!(
            BootstrapResult::from_json(data.get("vault-init.json").unwrap()).unwrap(),
            sample()
        );
    }

    #[test]
    fn test_parse_secret_from_string_data() {
        let method = method();
        let secret = method.build_secret(&sample()).unwrap();
        assert_eq!(method.parse_secret(&secret, "vault/vault-init").unwrap(), sample());
    }

    #[test]
    fn test_parse_secret_from_server_data() {
        let method = method();
        let mut data = BTreeMap::new();
        data.insert(
            "vault-init.json".to_string(),
            ByteString(sample().to_json().unwrap().into_bytes()),
        );
        let secret = Secret {
            data: Some(data),
            ..Default::default()
        };
        assert_eq!(method.parse_secret(&secret, "vault/vault-init").unwrap(), sample());
    }

    #[test]
    fn test_parse_secret_missing_key() {
        let err = method()
            .parse_secret(&Secret::default(), "vault/vault-init")
            .unwrap_err();
        assert!(matches!(err, SaveError::Corrupt { .. }));
        assert!(err.to_string().contains("vault-init.json"));
    }
}
