// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use keyward_core::backup::{
    BackupCipher, BackupCryptoProvider, BackupIdentity, BackupManager, BackupStatus,
    LocalDirFileStore, BACKUP_FILE_NAME,
};
use keyward_core::crypto::Argon2Params;
use keyward_core::{KeywardError, Mnemonic, SignatureAlgorithm};
use tempfile::TempDir;

const APP_SECRET: &[u8] = b"integration-test-application-secret";

fn manager(dir: &TempDir) -> BackupManager {
    let store = Arc::new(LocalDirFileStore::new(dir.path()).unwrap());
    let cipher = BackupCipher::new(APP_SECRET, Argon2Params::TESTING).unwrap();
    BackupManager::new(store, cipher)
}

fn identity(user_id: &str) -> BackupIdentity {
    BackupIdentity {
        address: format!("0x{user_id}"),
        user_id: user_id.to_string(),
        user_name: format!("name-{user_id}"),
        user_avatar: String::new(),
        key_index: Some(1),
    }
}

async fn upload(manager: &BackupManager, user_id: &str, mnemonic: &Mnemonic, pin: &str) -> String {
    let backup = BackupCryptoProvider::from_mnemonic(mnemonic, SignatureAlgorithm::EcdsaP256)
        .unwrap();
    let public_key = backup.public_key().to_hex();
    manager
        .upload(
            &identity(user_id),
            mnemonic,
            &public_key,
            SignatureAlgorithm::EcdsaP256,
            backup.hash_algorithm(),
            pin,
        )
        .await
        .unwrap();
    public_key
}

#[tokio::test]
async fn test_multi_user_backup_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let alice = Mnemonic::generate(12).unwrap();
    let bob = Mnemonic::generate(24).unwrap();

    {
        let manager = manager(&dir);
        upload(&manager, "alice", &alice, "1234").await;
        upload(&manager, "bob", &bob, "5678").await;
    }
    assert!(dir.path().join(BACKUP_FILE_NAME).exists());

    let manager = manager(&dir);
    let items = manager.list().await.unwrap();
    let ids: Vec<&str> = items.iter().map(|i| i.user_id.as_str()).collect();
    assert_eq!(ids, vec!["bob", "alice"]);

    let restored = manager.restore("alice", "1234").await.unwrap();
    assert_eq!(restored, alice);
    let restored = manager.restore("bob", "5678").await.unwrap();
    assert_eq!(restored, bob);
}

#[tokio::test]
async fn test_file_does_not_leak_plaintext() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let mnemonic = Mnemonic::generate(12).unwrap();
    upload(&manager, "visible-user-id", &mnemonic, "pin").await;

    let raw = std::fs::read_to_string(dir.path().join(BACKUP_FILE_NAME)).unwrap();
    assert!(!raw.contains("visible-user-id"));
    let first_word = mnemonic.phrase().split(' ').next().unwrap().to_string();
    assert!(!raw.contains(&format!("{first_word} ")));
}

#[tokio::test]
async fn test_wrong_pin_and_missing_user() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    upload(&manager, "alice", &Mnemonic::generate(12).unwrap(), "right").await;

    assert!(matches!(
        manager.restore("alice", "wrong").await,
        Err(KeywardError::BackupDecryption)
    ));
    assert!(matches!(
        manager.restore("carol", "right").await,
        Err(KeywardError::BackupNotFound(_))
    ));
}

#[tokio::test]
async fn test_different_app_secret_cannot_read_list() {
    let dir = TempDir::new().unwrap();
    upload(&manager(&dir), "alice", &Mnemonic::generate(12).unwrap(), "pin").await;

    let store = Arc::new(LocalDirFileStore::new(dir.path()).unwrap());
    let other = BackupManager::new(
        store,
        BackupCipher::new(b"some-other-application-secret", Argon2Params::TESTING).unwrap(),
    );
    assert!(matches!(
        other.list().await,
        Err(KeywardError::BackupDecryption)
    ));
}

#[tokio::test]
async fn test_check_and_delete() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let key = upload(&manager, "alice", &Mnemonic::generate(12).unwrap(), "pin").await;

    let active = vec![format!("0x04{}", key.to_uppercase())];
    assert_eq!(
        manager.check("alice", &active).await.unwrap(),
        BackupStatus::Present
    );
    assert_eq!(
        manager.check("alice", &[]).await.unwrap(),
        BackupStatus::Stale
    );

    assert!(manager.delete("alice").await.unwrap());
    assert!(!manager.delete("alice").await.unwrap());
    assert_eq!(
        manager.check("alice", &active).await.unwrap(),
        BackupStatus::Missing
    );
    assert!(manager.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_uploads_keep_every_entry() {
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(manager(&dir));
    let mut tasks = Vec::new();
    for i in 0..6 {
        let manager = Arc::clone(&manager);
        tasks.push(tokio::spawn(async move {
            let mnemonic = Mnemonic::generate(12).unwrap();
            upload(&manager, &format!("user-{i}"), &mnemonic, "pin").await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(manager.list().await.unwrap().len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_separate_managers_on_one_directory_keep_every_entry() {
    let dir = TempDir::new().unwrap();
    let managers = [Arc::new(manager(&dir)), Arc::new(manager(&dir))];
    let mut tasks = Vec::new();
    for i in 0..16 {
        let manager = Arc::clone(&managers[i % 2]);
        tasks.push(tokio::spawn(async move {
            let mnemonic = Mnemonic::generate(12).unwrap();
            upload(&manager, &format!("user-{i}"), &mnemonic, "pin").await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let items = manager(&dir).list().await.unwrap();
    assert_eq!(items.len(), 16);
    assert!(!dir.path().join(format!(".{BACKUP_FILE_NAME}.tmp")).exists());

    for i in (0..16).step_by(3) {
        assert!(managers[(i + 1) % 2].delete(&format!("user-{i}")).await.unwrap());
    }
    assert_eq!(managers[0].list().await.unwrap().len(), 10);
}
