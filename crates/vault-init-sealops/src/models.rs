//! Request and response bodies of the admin API

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// `GET sys/init`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitStatus {
    pub initialized: bool,
}

/// `PUT sys/init`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitRequest {
    pub secret_shares: u8,
    pub secret_threshold: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_shares: Option<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub pgp_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_token_pgp_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_shares: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_threshold: Option<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub recovery_pgp_keys: Vec<String>,
}

/// Rekey progress as reported by `GET sys/rekey/init` and returned when a
/// session is started
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RekeyStatus {
    pub nonce: String,
    pub started: bool,
    /// New threshold
    pub t: u32,
    /// New share count
    pub n: u32,
    pub progress: u32,
    /// Current shares needed to authorize the rekey
    pub required: u32,
    #[serde(deserialize_with = "null_as_empty")]
    pub pgp_fingerprints: Vec<String>,
    pub backup: bool,
    pub verification_required: bool,
}

/// `PUT sys/rekey/init`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RekeyInitRequest {
    pub secret_shares: u8,
    pub secret_threshold: u8,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub pgp_keys: Vec<String>,
    pub backup: bool,
    pub require_verification: bool,
}

/// One share bound to a session nonce, for every `.../update` endpoint
#[derive(Clone, Serialize)]
pub struct ShareSubmission<'a> {
    pub key: &'a str,
    pub nonce: &'a str,
}

impl fmt::Debug for ShareSubmission<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareSubmission")
            .field("key", &"[REDACTED]")
            .field("nonce", &self.nonce)
            .finish()
    }
}

/// `PUT sys/rekey/update`. Carries the new shares once `complete` is set.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RekeyUpdateResponse {
    pub nonce: String,
    pub complete: bool,
    pub progress: u32,
    pub required: u32,
    #[serde(deserialize_with = "null_as_empty")]
    pub keys: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub keys_base64: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub pgp_fingerprints: Vec<String>,
    pub backup: bool,
    pub verification_required: bool,
    pub verification_nonce: String,
}

impl fmt::Debug for RekeyUpdateResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RekeyUpdateResponse")
            .field("nonce", &self.nonce)
            .field("complete", &self.complete)
            .field("progress", &self.progress)
            .field("required", &self.required)
            .field("keys", &format_args!("[REDACTED x{}]", self.keys.len()))
            .field("verification_required", &self.verification_required)
            .field("verification_nonce", &self.verification_nonce)
            .finish()
    }
}

/// `PUT sys/rekey/verify`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RekeyVerifyResponse {
    pub nonce: String,
    pub complete: bool,
    pub progress: u32,
    /// New threshold
    pub t: u32,
}

/// Root token generation progress: `GET sys/generate-root/attempt` and the
/// responses of starting and updating an attempt
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateRootStatus {
    pub nonce: String,
    pub started: bool,
    pub progress: u32,
    pub required: u32,
    pub complete: bool,
    pub encoded_token: String,
    /// Older servers name the encoded token this way
    pub encoded_root_token: String,
    pub pgp_fingerprint: String,
    pub otp_length: u32,
    /// Pad generated by the server when none was supplied
    pub otp: String,
}

impl GenerateRootStatus {
    /// Encoded token under whichever name the server used
    pub fn take_encoded_token(&mut self) -> String {
        if self.encoded_token.is_empty() {
            std::mem::take(&mut self.encoded_root_token)
        } else {
            std::mem::take(&mut self.encoded_token)
        }
    }
}

impl fmt::Debug for GenerateRootStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerateRootStatus")
            .field("nonce", &self.nonce)
            .field("started", &self.started)
            .field("progress", &self.progress)
            .field("required", &self.required)
            .field("complete", &self.complete)
            .field("pgp_fingerprint", &self.pgp_fingerprint)
            .field("otp_length", &self.otp_length)
            .finish_non_exhaustive()
    }
}

/// `PUT sys/generate-root/attempt`. Exactly one of the two is set.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRootInitRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pgp_key: Option<String>,
}

impl fmt::Debug for GenerateRootInitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerateRootInitRequest")
            .field("otp", &self.otp.as_ref().map(|_| "[REDACTED]"))
            .field("pgp_key", &self.pgp_key.is_some())
            .finish()
    }
}

/// `{"errors": [...]}` body of a failed request
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub errors: Vec<String>,
}
