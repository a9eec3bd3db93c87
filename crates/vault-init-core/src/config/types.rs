//! Configuration file types (vault-init.yaml)

use crate::types::KeyKind;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Default address of the server being bootstrapped
pub const DEFAULT_VAULT_ADDR: &str = "http://127.0.0.1:8200";

/// Default file the bootstrap result is written to
pub const DEFAULT_FILE_PATH: &str = "vault-init.json";

/// Default key holding the serialized result in secret-style backends
pub const DEFAULT_INIT_RESPONSE_KEY: &str = "vault-init.json";

/// Default key holding the bare root token in secret-style backends
pub const DEFAULT_ROOT_TOKEN_KEY: &str = "root_token";

/// Default Kubernetes secret name
pub const DEFAULT_KUBE_SECRET_NAME: &str = "vault-init";

/// Default KV v2 mount on the backup server
pub const DEFAULT_KV_MOUNT: &str = "secret";

/// Root of the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VaultInitConfig {
    /// Server being bootstrapped
    pub vault: VaultConnection,

    /// Initialization parameters, also the target share counts for rekey
    pub init: InitParams,

    /// Rekey behaviour
    pub rekey: RekeyParams,

    /// Overall deadline for the initialize loop, in seconds
    pub timeout_secs: u64,

    /// Delay between init status checks, in seconds
    pub poll_interval_secs: u64,

    /// Where the bootstrap result is persisted
    pub save: SaveConfig,
}

impl Default for VaultInitConfig {
    fn default() -> Self {
        Self {
            vault: VaultConnection::default(),
            init: InitParams::default(),
            rekey: RekeyParams::default(),
            timeout_secs: 600,
            poll_interval_secs: 10,
            save: SaveConfig::default(),
        }
    }
}

impl VaultInitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Connection to a Vault server
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VaultConnection {
    pub address: String,

    /// Token used for authenticated calls (revoke-self after root rotation)
    pub token: Option<String>,

    /// Enterprise namespace
    pub namespace: Option<String>,

    /// Per-request timeout, in seconds
    pub request_timeout_secs: u64,
}

impl Default for VaultConnection {
    fn default() -> Self {
        Self {
            address: DEFAULT_VAULT_ADDR.to_string(),
            token: None,
            namespace: None,
            request_timeout_secs: 30,
        }
    }
}

impl VaultConnection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl fmt::Debug for VaultConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConnection")
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("namespace", &self.namespace)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Parameters of the init call. PGP keys are base64-encoded public keys and
/// are passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InitParams {
    pub secret_shares: u8,
    pub secret_threshold: u8,
    pub stored_shares: Option<u8>,
    pub pgp_keys: Vec<String>,
    pub root_token_pgp_key: Option<String>,
    pub recovery_shares: Option<u8>,
    pub recovery_threshold: Option<u8>,
    pub recovery_pgp_keys: Vec<String>,
}

impl Default for InitParams {
    fn default() -> Self {
        Self {
            secret_shares: 1,
            secret_threshold: 1,
            stored_shares: None,
            pgp_keys: Vec::new(),
            root_token_pgp_key: None,
            recovery_shares: None,
            recovery_threshold: None,
            recovery_pgp_keys: Vec::new(),
        }
    }
}

impl InitParams {
    /// Share count and threshold for the given key kind
    pub fn shares_for(&self, kind: KeyKind) -> (u8, u8) {
        match kind {
            KeyKind::Unseal => (self.secret_shares, self.secret_threshold),
            KeyKind::Recovery => (
                self.recovery_shares.unwrap_or(1),
                self.recovery_threshold.unwrap_or(1),
            ),
        }
    }

    /// PGP keys the new shares of the given kind are encrypted for
    pub fn pgp_keys_for(&self, kind: KeyKind) -> &[String] {
        match kind {
            KeyKind::Unseal => &self.pgp_keys,
            KeyKind::Recovery => &self.recovery_pgp_keys,
        }
    }
}

/// Rekey behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RekeyParams {
    /// Which shares `rekey` rotates
    pub target: KeyKind,

    /// Ask the server to keep a plaintext backup of PGP-encrypted shares
    pub backup: bool,

    /// Require the new shares to be submitted back before they take effect
    pub require_verification: bool,
}

/// Available save backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SaveMethodKind {
    #[default]
    File,
    KubeSecret,
    VaultKv,
}

impl fmt::Display for SaveMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveMethodKind::File => write!(f, "file"),
            SaveMethodKind::KubeSecret => write!(f, "kube-secret"),
            SaveMethodKind::VaultKv => write!(f, "vault-kv"),
        }
    }
}

impl std::str::FromStr for SaveMethodKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(SaveMethodKind::File),
            "kube-secret" | "kube_secret" => Ok(SaveMethodKind::KubeSecret),
            "vault-kv" | "vaultkv" => Ok(SaveMethodKind::VaultKv),
            other => Err(format!(
                "unsupported save method '{}', expected one of: file, kube-secret, vault-kv",
                other
            )),
        }
    }
}

/// Save backend selection and parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaveConfig {
    pub method: SaveMethodKind,

    /// Replace an existing, different result when initializing
    pub overwrite: bool,

    /// File written when the configured backend fails
    pub fallback_path: Utf8PathBuf,

    pub file: FileSaveConfig,
    pub kube_secret: KubeSecretConfig,
    pub vault_kv: VaultKvConfig,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            method: SaveMethodKind::File,
            overwrite: false,
            fallback_path: Utf8PathBuf::from(DEFAULT_FILE_PATH),
            file: FileSaveConfig::default(),
            kube_secret: KubeSecretConfig::default(),
            vault_kv: VaultKvConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileSaveConfig {
    pub path: Utf8PathBuf,
}

impl Default for FileSaveConfig {
    fn default() -> Self {
        Self {
            path: Utf8PathBuf::from(DEFAULT_FILE_PATH),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KubeSecretConfig {
    pub name: String,

    /// Defaults to the client's namespace
    pub namespace: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub key: String,
    pub root_token_key: String,

    /// Defaults to in-cluster config or KUBECONFIG
    pub kubeconfig: Option<Utf8PathBuf>,
}

impl Default for KubeSecretConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_KUBE_SECRET_NAME.to_string(),
            namespace: None,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            key: DEFAULT_INIT_RESPONSE_KEY.to_string(),
            root_token_key: DEFAULT_ROOT_TOKEN_KEY.to_string(),
            kubeconfig: None,
        }
    }
}

/// KV v2 secret on a second Vault server
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VaultKvConfig {
    pub address: Option<String>,
    pub token: Option<String>,
    pub namespace: Option<String>,
    pub mount_path: String,
    pub secret_path: Option<String>,
    pub init_response_key: String,
    pub root_token_key: String,
}

impl Default for VaultKvConfig {
    fn default() -> Self {
        Self {
            address: None,
            token: None,
            namespace: None,
            mount_path: DEFAULT_KV_MOUNT.to_string(),
            secret_path: None,
            init_response_key: DEFAULT_INIT_RESPONSE_KEY.to_string(),
            root_token_key: DEFAULT_ROOT_TOKEN_KEY.to_string(),
        }
    }
}

impl fmt::Debug for VaultKvConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultKvConfig")
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("namespace", &self.namespace)
            .field("mount_path", &self.mount_path)
            .field("secret_path", &self.secret_path)
            .field("init_response_key", &self.init_response_key)
            .field("root_token_key", &self.root_token_key)
            .finish()
    }
}
