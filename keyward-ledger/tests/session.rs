// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;
use std::time::Duration;

use keyward_core::backend::{MemoryBackend, StorageBackend};
use keyward_core::crypto::Argon2Params;
use keyward_core::keys::KeyPair;
use keyward_core::keystore::MemoryKeyStore;
use keyward_core::provider::{CryptoProvider, MnemonicProvider, ProviderKind};
use keyward_core::selector::KeySource;
use keyward_core::vault::{KeyVault, LocationIndex, DEFAULT_NAMESPACE};
use keyward_core::{HashAlgorithm, KeyCompatibilityManager, Mnemonic, SignatureAlgorithm};
use keyward_ledger::memory::MemoryLedger;
use keyward_ledger::{
    Account, AccountKey, LedgerError, SessionConfig, Submission, TransactionResult,
    TransactionStatus, WalletSession,
};
use parking_lot::Mutex;

const ADDRESS: &str = "0xf8d6e0586b0a20c7";
const PHRASE: &str =
    "legal winner thank year wave sausage worth useful legal winner thank yellow";

fn compat() -> KeyCompatibilityManager {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
    KeyCompatibilityManager::new(
        Arc::new(KeyVault::new(
            backend.clone(),
            DEFAULT_NAMESPACE,
            Argon2Params::TESTING,
        )),
        Arc::new(MemoryKeyStore::new()),
        Arc::new(LocationIndex::new(backend)),
    )
}

fn key(index: u32, provider: &CryptoProvider, weight: u32) -> AccountKey {
    AccountKey {
        index,
        public_key: provider.public_key_hex(),
        sign_algo: provider.signature_algorithm(),
        hash_algo: provider.hash_algorithm(),
        weight,
        sequence_number: 0,
        revoked: false,
    }
}

fn session(ledger: Arc<MemoryLedger>) -> WalletSession {
    WalletSession::new(compat(), ledger, SessionConfig::default())
}

#[tokio::test]
async fn test_mnemonic_sign_in_uses_account_curve() {
    let mnemonic = Mnemonic::parse(PHRASE).unwrap();
    let registered: CryptoProvider =
        MnemonicProvider::new(&mnemonic, SignatureAlgorithm::EcdsaSecp256k1)
            .unwrap()
            .into();
    let ledger = Arc::new(MemoryLedger::new());
    ledger.insert_account(Account {
        address: ADDRESS.into(),
        keys: vec![key(0, &registered, 1000)],
    });

    let session = session(ledger);
    let provider = session
        .sign_in_with_mnemonic(ADDRESS, mnemonic)
        .await
        .unwrap();
    assert_eq!(provider.kind(), ProviderKind::Mnemonic);
    assert_eq!(provider.public_key_hex(), registered.public_key_hex());
    assert_eq!(provider.public_key_hex().len(), 128);
    assert_eq!(session.account().unwrap().address, ADDRESS);
}

#[tokio::test]
async fn test_sign_in_rejects_unregistered_key() {
    let ledger = Arc::new(MemoryLedger::new());
    ledger.insert_account(Account {
        address: ADDRESS.into(),
        keys: vec![],
    });
    let session = session(ledger);
    let err = session
        .sign_in_with_mnemonic(ADDRESS, Mnemonic::parse(PHRASE).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::KeyNotRegistered(_)));
    assert!(session.current_provider().is_none());
    assert!(session.account().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_prefix_account_revoke_watched_to_seal_then_logout() {
    let ledger = Arc::new(MemoryLedger::new());
    let session = session(ledger.clone());

    let primary = KeyPair::generate(SignatureAlgorithm::EcdsaP256).unwrap();
    session
        .compat()
        .vault()
        .store("user42", &primary, HashAlgorithm::Sha3_256)
        .unwrap();
    let primary_provider = session
        .compat()
        .signing_provider("user42")
        .await
        .unwrap();
    let old: CryptoProvider = keyward_core::provider::ImportedKeyProvider::new(
        KeyPair::generate(SignatureAlgorithm::EcdsaP256).unwrap(),
    )
    .into();
    ledger.insert_account(Account {
        address: ADDRESS.into(),
        keys: vec![key(0, &old, 1000), key(1, &primary_provider, 1000)],
    });

    session
        .sign_in(ADDRESS, KeySource::Prefix("user42".into()))
        .await
        .unwrap();

    let submission = session.revoke_key(0).await.unwrap();
    let id = submission.transaction_id().unwrap().to_string();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    session
        .watch(&id, move |outcome| sink.lock().push(outcome))
        .join()
        .await;
    {
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_success());
    }

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(
        session.transactions().get(&id).unwrap().status,
        TransactionStatus::Sealed
    );

    let account = session.refresh_account().await.unwrap();
    assert!(account.keys[0].revoked);
    assert_eq!(
        session.revoke_key(0).await.unwrap(),
        Submission::AlreadyApplied
    );

    session.logout();
    assert!(session.transactions().transactions().is_empty());
    assert!(session.current_provider().is_none());
    assert!(matches!(
        session.revoke_key(0).await,
        Err(LedgerError::NoSession)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_surfaces_failed_transaction() {
    let ledger = Arc::new(MemoryLedger::new());
    ledger.script(
        "rejected",
        vec![
            TransactionResult::new(TransactionStatus::Pending),
            TransactionResult::error("invalid proposal key"),
        ],
    );
    let session = session(ledger);

    match session.wait_for("rejected").await {
        Err(LedgerError::TransactionFailed { id, message }) => {
            assert_eq!(id, "rejected");
            assert_eq!(message, "invalid proposal key");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(matches!(
        session.wait_for("unknown").await,
        Err(LedgerError::TransactionFailed { .. })
    ));
}
