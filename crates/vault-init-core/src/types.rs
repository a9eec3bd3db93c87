//! Core types for the bootstrap result and where it ends up

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Which family of key shares an operation works on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    /// Unseal (barrier) key shares
    #[default]
    Unseal,
    /// Recovery key shares, used when the server auto-unseals
    Recovery,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Unseal => write!(f, "unseal"),
            KeyKind::Recovery => write!(f, "recovery"),
        }
    }
}

/// Output of a successful initialization: key shares and the root token.
///
/// The serialized form is shared by every save backend, so a document written
/// by one backend can be loaded by any other. Lists written as `null` (older
/// tooling did this for empty recovery keys) load as empty lists.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct BootstrapResult {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub keys: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub keys_base64: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub recovery_keys: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub recovery_keys_base64: Vec<String>,
    #[serde(default)]
    pub root_token: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl BootstrapResult {
    /// Base64 shares of the given kind
    pub fn shares(&self, kind: KeyKind) -> &[String] {
        match kind {
            KeyKind::Unseal => &self.keys_base64,
            KeyKind::Recovery => &self.recovery_keys_base64,
        }
    }

    /// Shares to authorize a root token generation with.
    ///
    /// Unseal shares are preferred. Servers using auto-unseal have none, in
    /// which case the recovery shares authorize the operation instead.
    pub fn authorizing_shares(&self) -> Option<(KeyKind, &[String])> {
        if !self.keys_base64.is_empty() {
            Some((KeyKind::Unseal, &self.keys_base64))
        } else if !self.recovery_keys_base64.is_empty() {
            Some((KeyKind::Recovery, &self.recovery_keys_base64))
        } else {
            None
        }
    }

    /// Replace the shares of one kind after a completed rekey
    pub fn replace_shares(&mut self, kind: KeyKind, keys: Vec<String>, keys_base64: Vec<String>) {
        match kind {
            KeyKind::Unseal => {
                self.keys.zeroize();
                self.keys_base64.zeroize();
                self.keys = keys;
                self.keys_base64 = keys_base64;
            }
            KeyKind::Recovery => {
                self.recovery_keys.zeroize();
                self.recovery_keys_base64.zeroize();
                self.recovery_keys = keys;
                self.recovery_keys_base64 = keys_base64;
            }
        }
    }

    /// Replace the root token after a completed root rotation
    pub fn replace_root_token(&mut self, token: String) {
        self.root_token.zeroize();
        self.root_token = token;
    }

    /// Serialize to the persisted document format
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse the persisted document format
    pub fn from_json(document: &str) -> serde_json::Result<Self> {
        serde_json::from_str(document)
    }
}

impl fmt::Debug for BootstrapResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BootstrapResult(keys=[REDACTED x{}], recovery_keys=[REDACTED x{}], root_token=[REDACTED {} bytes])",
            self.keys.len(),
            self.recovery_keys.len(),
            self.root_token.len()
        )
    }
}

/// Where a bootstrap result was persisted. Used for logging, never as a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SaveLocation(String);

impl SaveLocation {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SaveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
