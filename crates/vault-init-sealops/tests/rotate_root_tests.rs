//! Root token rotation against the fake admin API

mod common;

use common::*;
use vault_init_core::KeyKind;
use vault_init_save::{MemorySaveMethod, SaveChain};
use vault_init_sealops::{Bootstrapper, SealOpsError};

#[tokio::test]
async fn test_rotate_root_saves_decoded_token_and_revokes_old() {
    let stored = stored_result();
    let fake = FakeVault::initialized_with(&stored, 3);
    fake.with_state(|s| s.otp_length = 28);
    let store = MemorySaveMethod::with_result(stored.clone());

    let outcome = bootstrapper(&fake, &store, options())
        .rotate_root()
        .await
        .unwrap();
    assert_eq!(outcome.authorized_by, KeyKind::Unseal);
    assert!(outcome.revoked);

    let updated = store.snapshot().unwrap();
    assert!(updated.root_token.starts_with("hvs.rotated-"));
    assert!(fake.with_state(|s| s.root_tokens.contains(&updated.root_token)));
    assert_eq!(updated.keys_base64, stored.keys_base64);
    assert_eq!(fake.revoked(), vec![stored.root_token.clone()]);
    assert_eq!(fake.count("generate_root_update"), 3);
}

#[tokio::test]
async fn test_default_otp_length_when_server_reports_none() {
    let stored = stored_result();
    let fake = FakeVault::initialized_with(&stored, 3);
    let store = MemorySaveMethod::with_result(stored);

    bootstrapper(&fake, &store, options())
        .rotate_root()
        .await
        .unwrap();
    assert!(store
        .snapshot()
        .unwrap()
        .root_token
        .starts_with("hvs.rotated-"));
}

#[tokio::test]
async fn test_server_generated_otp_is_used() {
    let stored = stored_result();
    let fake = FakeVault::initialized_with(&stored, 3);
    fake.with_state(|s| s.server_otp = Some("U2VydmVyR2VuZXJhdGVkUGFkMTIzNDU2".to_string()));
    let store = MemorySaveMethod::with_result(stored);

    bootstrapper(&fake, &store, options())
        .rotate_root()
        .await
        .unwrap();
    let token = store.snapshot().unwrap().root_token.clone();
    assert!(token.starts_with("hvs.rotated-"), "decoded with the wrong pad");
}

#[tokio::test]
async fn test_configured_admin_token_is_revoked() {
    let stored = stored_result();
    let fake = FakeVault::initialized_with(&stored, 3);
    let store = MemorySaveMethod::with_result(stored);
    let mut options = options();
    options.admin_token = Some("hvs.operator".to_string());

    bootstrapper(&fake, &store, options)
        .rotate_root()
        .await
        .unwrap();
    assert_eq!(fake.revoked(), vec!["hvs.operator".to_string()]);
}

#[tokio::test]
async fn test_save_failure_never_revokes() {
    let stored = stored_result();
    let fake = FakeVault::initialized_with(&stored, 3);
    let store = MemorySaveMethod::with_result(stored);
    // loads succeed from the memory store, saves fail on both legs
    let chain = SaveChain::new(Box::new(LoadOnly(store.clone()))).with_fallback(Box::new(FailingSave));
    let bootstrapper = Bootstrapper::new(fake.clone(), chain, options());

    let err = bootstrapper.rotate_root().await.unwrap_err();
    assert!(matches!(err, SealOpsError::DataLossRisk(_)), "got: {}", err);
    assert_eq!(fake.count("revoke_self"), 0);
    assert!(fake.revoked().is_empty());
}

#[tokio::test]
async fn test_rejected_share_cancels_generation() {
    let fake = FakeVault::initialized_with(&stored_result(), 3);
    let mut foreign = stored_result();
    foreign.replace_shares(KeyKind::Unseal, Vec::new(), vec!["Zm9yZWlnbg".to_string(); 3]);
    let store = MemorySaveMethod::with_result(foreign.clone());

    let err = bootstrapper(&fake, &store, options())
        .rotate_root()
        .await
        .unwrap_err();
    assert!(matches!(err, SealOpsError::Rejected { phase: "generate root", .. }), "got: {}", err);
    assert_eq!(fake.count("generate_root_update"), 1);
    assert_eq!(fake.count("generate_root_cancel"), 1);
    assert_eq!(fake.count("revoke_self"), 0);
    assert_eq!(store.snapshot(), Some(foreign));
}

#[tokio::test]
async fn test_recovery_shares_authorize_when_no_unseal_shares() {
    let stored = stored_recovery_result();
    let fake = FakeVault::initialized_with(&stored, 2);
    let store = MemorySaveMethod::with_result(stored.clone());

    let outcome = bootstrapper(&fake, &store, options())
        .rotate_root()
        .await
        .unwrap();
    assert_eq!(outcome.authorized_by, KeyKind::Recovery);
    assert_eq!(fake.count("generate_root_update"), 2);

    let updated = store.snapshot().unwrap();
    assert_eq!(updated.recovery_keys_base64, stored.recovery_keys_base64);
    assert_ne!(updated.root_token, stored.root_token);
}

#[tokio::test]
async fn test_no_shares_at_all() {
    let mut stored = stored_result();
    stored.replace_shares(KeyKind::Unseal, Vec::new(), Vec::new());
    let fake = FakeVault::initialized_with(&stored_result(), 3);
    let store = MemorySaveMethod::with_result(stored);

    let err = bootstrapper(&fake, &store, options())
        .rotate_root()
        .await
        .unwrap_err();
    assert!(matches!(err, SealOpsError::NoShares { phase: "generate root" }));
    assert_eq!(fake.count("generate_root_init"), 0);
}

#[tokio::test]
async fn test_generation_in_progress_is_conflict() {
    let fake = FakeVault::initialized_with(&stored_result(), 3);
    fake.with_state(|s| {
        s.generate_root = Some(RootSession {
            nonce: "someone-elses-nonce".to_string(),
            ..Default::default()
        })
    });
    let store = MemorySaveMethod::with_result(stored_result());

    let err = bootstrapper(&fake, &store, options())
        .rotate_root()
        .await
        .unwrap_err();
    assert!(matches!(err, SealOpsError::Conflict { phase: "generate root" }));
    assert_eq!(fake.calls(), vec!["generate_root_status".to_string()]);
}

#[tokio::test]
async fn test_pgp_encrypted_token_is_stored_as_returned() {
    let stored = stored_result();
    let fake = FakeVault::initialized_with(&stored, 3);
    let store = MemorySaveMethod::with_result(stored);
    let mut options = options();
    options.init.root_token_pgp_key = Some("cm9vdC1wZ3Atam5rZXk=".to_string());

    let outcome = bootstrapper(&fake, &store, options)
        .rotate_root()
        .await
        .unwrap();

    let token = store.snapshot().unwrap().root_token.clone();
    assert!(token.starts_with("pgp-encrypted:hvs.rotated-"));
    // the previous root token is PGP-encrypted as well and cannot be used
    assert!(!outcome.revoked);
    assert_eq!(fake.count("revoke_self"), 0);
}

#[tokio::test]
async fn test_revoke_failure_is_reported_after_save() {
    let stored = stored_result();
    let fake = FakeVault::initialized_with(&stored, 3);
    fake.with_state(|s| s.fail_revoke = true);
    let store = MemorySaveMethod::with_result(stored.clone());

    let err = bootstrapper(&fake, &store, options())
        .rotate_root()
        .await
        .unwrap_err();
    assert!(matches!(err, SealOpsError::Api { phase: "revoke self", .. }));
    assert_ne!(store.snapshot().unwrap().root_token, stored.root_token);
}

#[tokio::test]
async fn test_rotate_rekeys_then_rotates_root() {
    let stored = stored_result();
    let fake = FakeVault::initialized_with(&stored, 3);
    let store = MemorySaveMethod::with_result(stored.clone());

    let (rekeyed, rotated) = bootstrapper(&fake, &store, options())
        .rotate()
        .await
        .unwrap();
    assert_eq!(rekeyed.kind, KeyKind::Unseal);
    assert!(rotated.revoked);

    let updated = store.snapshot().unwrap();
    assert_ne!(updated.keys_base64, stored.keys_base64);
    assert_ne!(updated.root_token, stored.root_token);

    // the new shares authorized the root generation
    let calls = fake.calls();
    let first_generate = calls
        .iter()
        .position(|c| c == "generate_root_status")
        .unwrap();
    assert!(calls[..first_generate].iter().any(|c| c == "rekey_update:unseal"));
}

#[tokio::test]
async fn test_rotate_after_rekey_fallback_uses_new_shares() {
    let stored = stored_result();
    let fake = FakeVault::initialized_with(&stored, 3);
    let primary = MemorySaveMethod::with_result(stored.clone());
    let fallback = MemorySaveMethod::new();
    // the primary keeps serving the old result while every save falls back
    let chain = SaveChain::new(Box::new(LoadOnly(primary.clone())))
        .with_fallback(Box::new(fallback.clone()));

    let (rekeyed, rotated) = Bootstrapper::new(fake.clone(), chain, options())
        .rotate()
        .await
        .unwrap();
    assert!(rekeyed.saved.fell_back);
    assert!(rotated.saved.fell_back);
    assert_eq!(rotated.authorized_by, KeyKind::Unseal);
    assert!(rotated.revoked);

    let saved = fallback.snapshot().unwrap();
    assert_eq!(saved.keys_base64, fake.valid_shares(KeyKind::Unseal));
    assert_ne!(saved.keys_base64, stored.keys_base64);
    assert_ne!(saved.root_token, stored.root_token);
    assert_eq!(fake.revoked(), vec![stored.root_token.clone()]);
    assert_eq!(fake.count("generate_root_cancel"), 0);
    assert_eq!(primary.snapshot(), Some(stored));
}

/// Loads from the wrapped memory store, refuses every save
struct LoadOnly(MemorySaveMethod);

#[async_trait::async_trait]
impl vault_init_save::SaveMethod for LoadOnly {
    async fn save(
        &self,
        _: &vault_init_core::BootstrapResult,
        _: vault_init_save::Overwrite,
    ) -> Result<vault_init_core::SaveLocation, vault_init_save::SaveError> {
        Err(vault_init_save::SaveError::unavailable("load-only", "read-only store"))
    }

    async fn load(&self) -> Result<vault_init_core::BootstrapResult, vault_init_save::SaveError> {
        self.0.load().await
    }

    fn name(&self) -> &'static str {
        "load-only"
    }
}
