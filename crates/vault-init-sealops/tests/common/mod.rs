//! Common test infrastructure for vault-init-sealops tests
//!
//! - `FakeVault`: in-memory admin API that records every call and enforces
//!   nonces, thresholds and share validity like a real server
//! - `FailingSave`: save backend that always fails
//! - helpers to assemble a `Bootstrapper` over a memory store

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vault_init_core::otp;
use vault_init_core::{BootstrapResult, KeyKind, SaveLocation};
use vault_init_save::{MemorySaveMethod, Overwrite, SaveChain, SaveError, SaveMethod};
use vault_init_sealops::models::{
    GenerateRootInitRequest, GenerateRootStatus, InitRequest, InitStatus, RekeyInitRequest,
    RekeyStatus, RekeyUpdateResponse, RekeyVerifyResponse,
};
use vault_init_sealops::{ApiError, BootstrapOptions, Bootstrapper, SysApi};

/// A set of valid shares and the number needed to authorize an operation
#[derive(Debug, Clone, Default)]
pub struct ShareSet {
    pub keys_base64: Vec<String>,
    pub threshold: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RekeySession {
    pub nonce: String,
    pub request: RekeyInitRequest,
    pub accepted: Vec<String>,
    /// New shares awaiting verification
    pub pending: Option<ShareSet>,
    pub verification_nonce: String,
    pub verified: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RootSession {
    pub nonce: String,
    pub otp: String,
    pub pgp: bool,
    pub accepted: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub calls: Vec<String>,
    pub initialized: bool,
    /// Init generates recovery shares only, like a server with auto-unseal
    pub auto_unseal: bool,
    pub unseal: ShareSet,
    pub recovery: ShareSet,
    pub root_tokens: Vec<String>,
    pub revoked: Vec<String>,
    pub last_init_request: Option<InitRequest>,
    pub unseal_rekey: Option<RekeySession>,
    pub recovery_rekey: Option<RekeySession>,
    pub generate_root: Option<RootSession>,
    /// Fail this many upcoming status checks with a 503
    pub init_status_failures: usize,
    /// Fail this many upcoming init calls with a 500
    pub init_failures: usize,
    pub fail_cancel: bool,
    pub fail_revoke: bool,
    /// Refuse every share submitted for rekey verification
    pub reject_verification: bool,
    /// Verification threshold announced for new shares, instead of the
    /// threshold they were generated with
    pub verification_threshold: Option<u32>,
    pub otp_length: u32,
    /// Pad the server hands out instead of using the client's
    pub server_otp: Option<String>,
    pub generation: u32,
}

impl FakeState {
    fn shares(&self, kind: KeyKind) -> &ShareSet {
        match kind {
            KeyKind::Unseal => &self.unseal,
            KeyKind::Recovery => &self.recovery,
        }
    }

    fn shares_mut(&mut self, kind: KeyKind) -> &mut ShareSet {
        match kind {
            KeyKind::Unseal => &mut self.unseal,
            KeyKind::Recovery => &mut self.recovery,
        }
    }

    fn rekey_session(&mut self, kind: KeyKind) -> &mut Option<RekeySession> {
        match kind {
            KeyKind::Unseal => &mut self.unseal_rekey,
            KeyKind::Recovery => &mut self.recovery_rekey,
        }
    }

    fn authorizing(&self) -> &ShareSet {
        if self.auto_unseal {
            &self.recovery
        } else {
            &self.unseal
        }
    }

    fn next_generation(&mut self) -> u32 {
        self.generation += 1;
        self.generation
    }
}

fn rejected(path: &str, message: &str) -> ApiError {
    ApiError::status(path, 400, vec![message.to_string()])
}

/// Generate `n` distinct share strings for one key generation
pub fn make_shares(label: &str, generation: u32, n: u32) -> (Vec<String>, Vec<String>) {
    (0..n)
        .map(|i| {
            (
                format!("{}-{}-{}", label, generation, i),
                format!("{}b64-{}-{}", label, generation, i),
            )
        })
        .unzip()
}

/// In-memory admin API. Clones share state, so a test can keep one handle
/// while the bootstrapper owns another.
#[derive(Clone, Default)]
pub struct FakeVault {
    state: Arc<Mutex<FakeState>>,
}

impl FakeVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_unseal() -> Self {
        let fake = Self::new();
        fake.with_state(|s| s.auto_unseal = true);
        fake
    }

    /// A server that was initialized with `result`, whose shares authorize
    /// operations with the given thresholds
    pub fn initialized_with(result: &BootstrapResult, threshold: u32) -> Self {
        let fake = Self::new();
        fake.with_state(|s| {
            s.initialized = true;
            s.auto_unseal = result.keys_base64.is_empty();
            s.unseal = ShareSet {
                keys_base64: result.keys_base64.clone(),
                threshold,
            };
            s.recovery = ShareSet {
                keys_base64: result.recovery_keys_base64.clone(),
                threshold,
            };
            s.root_tokens.push(result.root_token.clone());
        });
        fake
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn calls(&self) -> Vec<String> {
        self.with_state(|s| s.calls.clone())
    }

    /// Number of recorded calls whose name starts with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.with_state(|s| s.calls.iter().filter(|c| c.starts_with(prefix)).count())
    }

    pub fn revoked(&self) -> Vec<String> {
        self.with_state(|s| s.revoked.clone())
    }

    pub fn valid_shares(&self, kind: KeyKind) -> Vec<String> {
        self.with_state(|s| s.shares(kind).keys_base64.clone())
    }

    fn record(&self, call: impl Into<String>) {
        self.with_state(|s| s.calls.push(call.into()));
    }
}

#[async_trait]
impl SysApi for FakeVault {
    async fn init_status(&self) -> Result<InitStatus, ApiError> {
        self.record("init_status");
        self.with_state(|s| {
            if s.init_status_failures > 0 {
                s.init_status_failures -= 1;
                return Err(ApiError::status("sys/init", 503, vec!["Vault is sealed".to_string()]));
            }
            Ok(InitStatus {
                initialized: s.initialized,
            })
        })
    }

    async fn init(&self, request: &InitRequest) -> Result<BootstrapResult, ApiError> {
        self.record("init");
        self.with_state(|s| {
            s.last_init_request = Some(request.clone());
            if s.init_failures > 0 {
                s.init_failures -= 1;
                return Err(ApiError::status("sys/init", 500, vec!["internal error".to_string()]));
            }
            if s.initialized {
                return Err(rejected("sys/init", "Vault is already initialized"));
            }

            let generation = s.next_generation();
            let (keys, keys_base64) = if s.auto_unseal {
                (Vec::new(), Vec::new())
            } else {
                make_shares("unseal", generation, u32::from(request.secret_shares))
            };
            let (recovery_keys, recovery_keys_base64) = if s.auto_unseal {
                make_shares(
                    "recovery",
                    generation,
                    u32::from(request.recovery_shares.unwrap_or(1)),
                )
            } else {
                (Vec::new(), Vec::new())
            };
            let root_token = format!("s.root-{}", generation);

            s.initialized = true;
            s.unseal = ShareSet {
                keys_base64: keys_base64.clone(),
                threshold: u32::from(request.secret_threshold),
            };
            s.recovery = ShareSet {
                keys_base64: recovery_keys_base64.clone(),
                threshold: u32::from(request.recovery_threshold.unwrap_or(1)),
            };
            s.root_tokens.push(root_token.clone());

            Ok(BootstrapResult {
                keys,
                keys_base64,
                recovery_keys,
                recovery_keys_base64,
                root_token,
            })
        })
    }

    async fn rekey_status(&self, kind: KeyKind) -> Result<RekeyStatus, ApiError> {
        self.record(format!("rekey_status:{}", kind));
        self.with_state(|s| {
            let required = s.shares(kind).threshold;
            Ok(match s.rekey_session(kind) {
                Some(session) => RekeyStatus {
                    nonce: session.nonce.clone(),
                    started: true,
                    t: u32::from(session.request.secret_threshold),
                    n: u32::from(session.request.secret_shares),
                    progress: session.accepted.len() as u32,
                    required,
                    ..Default::default()
                },
                None => RekeyStatus {
                    required,
                    ..Default::default()
                },
            })
        })
    }

    async fn rekey_init(
        &self,
        kind: KeyKind,
        request: &RekeyInitRequest,
    ) -> Result<RekeyStatus, ApiError> {
        self.record(format!("rekey_init:{}", kind));
        self.with_state(|s| {
            if s.rekey_session(kind).is_some() {
                return Err(rejected("sys/rekey/init", "rekey already in progress"));
            }
            let nonce = format!("rekey-nonce-{}", s.next_generation());
            let required = s.shares(kind).threshold;
            *s.rekey_session(kind) = Some(RekeySession {
                nonce: nonce.clone(),
                request: request.clone(),
                ..Default::default()
            });
            Ok(RekeyStatus {
                nonce,
                started: true,
                t: u32::from(request.secret_threshold),
                n: u32::from(request.secret_shares),
                required,
                verification_required: request.require_verification,
                ..Default::default()
            })
        })
    }

    async fn rekey_update(
        &self,
        kind: KeyKind,
        key: &str,
        nonce: &str,
    ) -> Result<RekeyUpdateResponse, ApiError> {
        self.record(format!("rekey_update:{}", kind));
        self.with_state(|s| {
            let path = "sys/rekey/update";
            let valid = s.shares(kind).clone();
            let generation = s.next_generation();
            let verification_threshold = s.verification_threshold;
            let session = s
                .rekey_session(kind)
                .as_mut()
                .ok_or_else(|| rejected(path, "no rekey in progress"))?;
            if session.nonce != nonce {
                return Err(rejected(path, "incorrect nonce"));
            }
            if !valid.keys_base64.iter().any(|k| k == key) {
                return Err(rejected(path, "invalid key"));
            }
            if session.accepted.iter().any(|k| k == key) {
                return Err(rejected(path, "given key has already been provided"));
            }
            session.accepted.push(key.to_string());

            let progress = session.accepted.len() as u32;
            if progress < valid.threshold {
                return Ok(RekeyUpdateResponse {
                    nonce: nonce.to_string(),
                    progress,
                    required: valid.threshold,
                    ..Default::default()
                });
            }

            let (keys, keys_base64) = make_shares(
                &format!("{}-rekeyed", kind),
                generation,
                u32::from(session.request.secret_shares),
            );
            let new_set = ShareSet {
                keys_base64: keys_base64.clone(),
                threshold: u32::from(session.request.secret_threshold),
            };
            let verification_required = session.request.require_verification;
            let mut verification_nonce = String::new();
            if verification_required {
                verification_nonce = format!("verify-nonce-{}", generation);
                session.pending = Some(ShareSet {
                    threshold: verification_threshold.unwrap_or(new_set.threshold),
                    ..new_set
                });
                session.verification_nonce = verification_nonce.clone();
            } else {
                *s.rekey_session(kind) = None;
                *s.shares_mut(kind) = new_set;
            }

            Ok(RekeyUpdateResponse {
                nonce: nonce.to_string(),
                complete: true,
                keys,
                keys_base64,
                verification_required,
                verification_nonce,
                ..Default::default()
            })
        })
    }

    async fn rekey_cancel(&self, kind: KeyKind) -> Result<(), ApiError> {
        self.record(format!("rekey_cancel:{}", kind));
        self.with_state(|s| {
            if s.fail_cancel {
                return Err(ApiError::status("sys/rekey/init", 500, vec!["storage unavailable".to_string()]));
            }
            *s.rekey_session(kind) = None;
            Ok(())
        })
    }

    async fn rekey_verify_update(
        &self,
        kind: KeyKind,
        key: &str,
        nonce: &str,
    ) -> Result<RekeyVerifyResponse, ApiError> {
        self.record(format!("rekey_verify_update:{}", kind));
        self.with_state(|s| {
            let path = "sys/rekey/verify";
            if s.reject_verification {
                return Err(rejected(path, "invalid key"));
            }
            let session = s
                .rekey_session(kind)
                .as_mut()
                .ok_or_else(|| rejected(path, "no rekey in progress"))?;
            let pending = session
                .pending
                .clone()
                .ok_or_else(|| rejected(path, "no verification in progress"))?;
            if session.verification_nonce != nonce {
                return Err(rejected(path, "incorrect verification nonce"));
            }
            if !pending.keys_base64.iter().any(|k| k == key) {
                return Err(rejected(path, "invalid key"));
            }
            session.verified.push(key.to_string());

            let progress = session.verified.len() as u32;
            if progress < pending.threshold {
                return Ok(RekeyVerifyResponse {
                    nonce: nonce.to_string(),
                    progress,
                    t: pending.threshold,
                    ..Default::default()
                });
            }

            *s.rekey_session(kind) = None;
            *s.shares_mut(kind) = pending;
            Ok(RekeyVerifyResponse {
                nonce: nonce.to_string(),
                complete: true,
                ..Default::default()
            })
        })
    }

    async fn rekey_verify_cancel(&self, kind: KeyKind) -> Result<(), ApiError> {
        self.record(format!("rekey_verify_cancel:{}", kind));
        self.with_state(|s| {
            if s.fail_cancel {
                return Err(ApiError::status("sys/rekey/verify", 500, Vec::new()));
            }
            if let Some(session) = s.rekey_session(kind).as_mut() {
                session.verified.clear();
            }
            Ok(())
        })
    }

    async fn generate_root_status(&self) -> Result<GenerateRootStatus, ApiError> {
        self.record("generate_root_status");
        self.with_state(|s| {
            let required = s.authorizing().threshold;
            Ok(GenerateRootStatus {
                nonce: s
                    .generate_root
                    .as_ref()
                    .map(|r| r.nonce.clone())
                    .unwrap_or_default(),
                started: s.generate_root.is_some(),
                required,
                otp_length: s.otp_length,
                ..Default::default()
            })
        })
    }

    async fn generate_root_init(
        &self,
        request: &GenerateRootInitRequest,
    ) -> Result<GenerateRootStatus, ApiError> {
        self.record("generate_root_init");
        self.with_state(|s| {
            let path = "sys/generate-root/attempt";
            if s.generate_root.is_some() {
                return Err(rejected(path, "root generation already in progress"));
            }
            let pgp = request.pgp_key.is_some();
            let (otp, returned_otp) = match (&s.server_otp, &request.otp) {
                (_, _) if pgp => (String::new(), String::new()),
                (Some(server), _) => (server.clone(), server.clone()),
                (None, Some(client)) => (client.clone(), String::new()),
                (None, None) => return Err(rejected(path, "otp or pgp_key required")),
            };
            let nonce = format!("root-nonce-{}", s.next_generation());
            s.generate_root = Some(RootSession {
                nonce: nonce.clone(),
                otp,
                pgp,
                accepted: Vec::new(),
            });
            Ok(GenerateRootStatus {
                nonce,
                started: true,
                required: s.authorizing().threshold,
                otp: returned_otp,
                pgp_fingerprint: if pgp {
                    "816938b8a29146fbe245dd29e7cbaf8e011db793".to_string()
                } else {
                    String::new()
                },
                ..Default::default()
            })
        })
    }

    async fn generate_root_update(
        &self,
        key: &str,
        nonce: &str,
    ) -> Result<GenerateRootStatus, ApiError> {
        self.record("generate_root_update");
        self.with_state(|s| {
            let path = "sys/generate-root/update";
            let valid = s.authorizing().clone();
            let generation = s.next_generation();
            let session = s
                .generate_root
                .as_mut()
                .ok_or_else(|| rejected(path, "no root generation in progress"))?;
            if session.nonce != nonce {
                return Err(rejected(path, "incorrect nonce"));
            }
            if !valid.keys_base64.iter().any(|k| k == key) {
                return Err(rejected(path, "invalid key"));
            }
            session.accepted.push(key.to_string());

            let progress = session.accepted.len() as u32;
            if progress < valid.threshold {
                return Ok(GenerateRootStatus {
                    nonce: nonce.to_string(),
                    started: true,
                    progress,
                    required: valid.threshold,
                    ..Default::default()
                });
            }

            let token = format!("hvs.rotated-{}", generation);
            let encoded = if session.pgp {
                format!("pgp-encrypted:{}", token)
            } else {
                otp::encode(&token, &session.otp).unwrap()
            };
            s.generate_root = None;
            s.root_tokens.push(token);

            Ok(GenerateRootStatus {
                nonce: nonce.to_string(),
                progress,
                required: valid.threshold,
                complete: true,
                encoded_token: encoded,
                ..Default::default()
            })
        })
    }

    async fn generate_root_cancel(&self) -> Result<(), ApiError> {
        self.record("generate_root_cancel");
        self.with_state(|s| {
            if s.fail_cancel {
                return Err(ApiError::status("sys/generate-root/attempt", 500, Vec::new()));
            }
            s.generate_root = None;
            Ok(())
        })
    }

    async fn revoke_self(&self, token: &str) -> Result<(), ApiError> {
        self.record("revoke_self");
        self.with_state(|s| {
            if s.fail_revoke {
                return Err(ApiError::status("auth/token/revoke-self", 403, vec!["permission denied".to_string()]));
            }
            s.root_tokens.retain(|t| t != token);
            s.revoked.push(token.to_string());
            Ok(())
        })
    }
}

/// Save backend that always fails
pub struct FailingSave;

#[async_trait]
impl SaveMethod for FailingSave {
    async fn save(&self, _: &BootstrapResult, _: Overwrite) -> Result<SaveLocation, SaveError> {
        Err(SaveError::unavailable("failing", "storage offline"))
    }

    async fn load(&self) -> Result<BootstrapResult, SaveError> {
        Err(SaveError::unavailable("failing", "storage offline"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Stored result as produced by a 5/3 initialization of `FakeVault`
pub fn stored_result() -> BootstrapResult {
    let (keys, keys_base64) = make_shares("unseal", 0, 5);
    BootstrapResult {
        keys,
        keys_base64,
        recovery_keys: Vec::new(),
        recovery_keys_base64: Vec::new(),
        root_token: "s.root-0".to_string(),
    }
}

/// Stored result of a server using auto-unseal: recovery shares only
pub fn stored_recovery_result() -> BootstrapResult {
    let (recovery_keys, recovery_keys_base64) = make_shares("recovery", 0, 5);
    BootstrapResult {
        keys: Vec::new(),
        keys_base64: Vec::new(),
        recovery_keys,
        recovery_keys_base64,
        root_token: "s.root-0".to_string(),
    }
}

pub fn options() -> BootstrapOptions {
    let mut options = BootstrapOptions::default();
    options.init.secret_shares = 5;
    options.init.secret_threshold = 3;
    options.timeout = Duration::from_secs(60);
    options.poll_interval = Duration::from_secs(10);
    options
}

pub fn bootstrapper(
    fake: &FakeVault,
    store: &MemorySaveMethod,
    options: BootstrapOptions,
) -> Bootstrapper<FakeVault> {
    Bootstrapper::new(
        fake.clone(),
        SaveChain::new(Box::new(store.clone())),
        options,
    )
}
