// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Multi-destination encrypted mnemonic backups.
//!
//! Every destination holds one file, [`BACKUP_FILE_NAME`], containing the
//! sealed list of [`BackupItem`]s of all users that backed up there. Upload
//! and delete are read-modify-write cycles on that file, run under the
//! destination's file lock so concurrent writers cannot lose updates.

#![forbid(unsafe_code)]

mod cipher;
mod provider;
mod store;

pub use cipher::BackupCipher;
pub use provider::BackupCryptoProvider;
pub use store::{BackupFileStore, FileLock, LocalDirFileStore, MemoryFileStore};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::algo::{HashAlgorithm, SignatureAlgorithm};
use crate::error::{KeywardError, Result};
use crate::keys::normalize_public_key_hex;
use crate::mnemonic::Mnemonic;

pub const BACKUP_FILE_NAME: &str = "outblock_multi_backup";

/// One user's entry in a destination's backup list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupItem {
    pub address: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub user_avatar: String,
    pub public_key: String,
    pub sign_algo: SignatureAlgorithm,
    pub hash_algo: HashAlgorithm,
    #[serde(default)]
    pub key_index: Option<u32>,
    /// Milliseconds since the Unix epoch.
    pub update_time: i64,
    /// PIN-encrypted mnemonic blob.
    pub data: String,
}

/// The account a backup is filed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupIdentity {
    pub address: String,
    pub user_id: String,
    pub user_name: String,
    pub user_avatar: String,
    pub key_index: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStatus {
    /// An entry exists and its key is active on the account.
    Present,
    /// An entry exists but its key is not an active account key.
    Stale,
    Missing,
}

pub struct BackupManager {
    store: Arc<dyn BackupFileStore>,
    cipher: BackupCipher,
    file_name: String,
}

impl BackupManager {
    pub fn new(store: Arc<dyn BackupFileStore>, cipher: BackupCipher) -> Self {
        Self::with_file_name(store, cipher, BACKUP_FILE_NAME)
    }

    pub fn with_file_name(
        store: Arc<dyn BackupFileStore>,
        cipher: BackupCipher,
        file_name: &str,
    ) -> Self {
        Self {
            store,
            cipher,
            file_name: file_name.to_string(),
        }
    }

    pub fn destination(&self) -> &str {
        self.store.destination()
    }

    async fn open_file(&self) -> Result<(String, Vec<BackupItem>)> {
        let id = match self.store.get_file_id(&self.file_name).await? {
            Some(id) => id,
            None => {
                debug!(destination = %self.destination(), "creating backup file");
                self.store.create_file(&self.file_name).await?
            }
        };
        let contents = self.store.read_file(&id).await?;
        Ok((id, self.cipher.open_list(&contents)?))
    }

    async fn seal_mnemonic(&self, mnemonic: &Mnemonic, pin: &str) -> Result<String> {
        let cipher = self.cipher.clone();
        let mnemonic = mnemonic.clone();
        let pin = zeroize::Zeroizing::new(pin.to_string());
        tokio::task::spawn_blocking(move || cipher.seal_mnemonic(&mnemonic, &pin))
            .await
            .map_err(|e| KeywardError::Crypto(format!("backup encryption task failed: {e}")))?
    }

    /// Adds or refreshes the backup entry for `identity`.
    ///
    /// `public_key`, `sign_algo` and `hash_algo` describe the key registered
    /// for this backup on the account.
    pub async fn upload(
        &self,
        identity: &BackupIdentity,
        mnemonic: &Mnemonic,
        public_key: &str,
        sign_algo: SignatureAlgorithm,
        hash_algo: HashAlgorithm,
        pin: &str,
    ) -> Result<BackupItem> {
        let data = self.seal_mnemonic(mnemonic, pin).await?;

        let _lock = self.store.lock_file(&self.file_name).await?;
        let (id, mut items) = self.open_file().await?;

        let now = chrono::Utc::now().timestamp_millis();
        let item = match items.iter_mut().find(|i| i.user_id == identity.user_id) {
            Some(existing) => {
                existing.address = identity.address.clone();
                existing.user_name = identity.user_name.clone();
                existing.user_avatar = identity.user_avatar.clone();
                existing.public_key = public_key.to_string();
                existing.sign_algo = sign_algo;
                existing.hash_algo = hash_algo;
                existing.key_index = identity.key_index;
                existing.update_time = now;
                existing.data = data;
                existing.clone()
            }
            None => {
                let item = BackupItem {
                    address: identity.address.clone(),
                    user_id: identity.user_id.clone(),
                    user_name: identity.user_name.clone(),
                    user_avatar: identity.user_avatar.clone(),
                    public_key: public_key.to_string(),
                    sign_algo,
                    hash_algo,
                    key_index: identity.key_index,
                    update_time: now,
                    data,
                };
                items.insert(0, item.clone());
                item
            }
        };

        let sealed = self.cipher.seal_list(&items)?;
        self.store.write_file(&id, &sealed).await?;
        info!(
            destination = %self.destination(),
            user_id = %identity.user_id,
            entries = items.len(),
            "backup uploaded"
        );
        Ok(item)
    }

    /// Removes the entry for `user_id`. Returns false when there was none.
    /// An emptied list is written back as an empty sealed list.
    pub async fn delete(&self, user_id: &str) -> Result<bool> {
        let _lock = self.store.lock_file(&self.file_name).await?;
        let Some(id) = self.store.get_file_id(&self.file_name).await? else {
            return Ok(false);
        };
        let mut items = self.cipher.open_list(&self.store.read_file(&id).await?)?;
        let before = items.len();
        items.retain(|i| i.user_id != user_id);
        if items.len() == before {
            return Ok(false);
        }

        let sealed = self.cipher.seal_list(&items)?;
        self.store.write_file(&id, &sealed).await?;
        info!(destination = %self.destination(), user_id, "backup deleted");
        Ok(true)
    }

    /// All entries at this destination. A missing file is an empty list.
    pub async fn list(&self) -> Result<Vec<BackupItem>> {
        let Some(id) = self.store.get_file_id(&self.file_name).await? else {
            return Ok(Vec::new());
        };
        self.cipher.open_list(&self.store.read_file(&id).await?)
    }

    pub async fn find(&self, user_id: &str) -> Result<BackupItem> {
        self.list()
            .await?
            .into_iter()
            .find(|i| i.user_id == user_id)
            .ok_or_else(|| KeywardError::BackupNotFound(user_id.to_string()))
    }

    /// Decrypts the mnemonic of one entry with the user's PIN.
    pub async fn decrypt_mnemonic(&self, item: &BackupItem, pin: &str) -> Result<Mnemonic> {
        let cipher = self.cipher.clone();
        let blob = item.data.clone();
        let pin = zeroize::Zeroizing::new(pin.to_string());
        let result = tokio::task::spawn_blocking(move || cipher.open_mnemonic(&blob, &pin))
            .await
            .map_err(|e| KeywardError::Crypto(format!("backup decryption task failed: {e}")))?;
        if result.is_err() {
            warn!(user_id = %item.user_id, "backup decryption failed");
        }
        result
    }

    pub async fn restore(&self, user_id: &str, pin: &str) -> Result<Mnemonic> {
        let item = self.find(user_id).await?;
        self.decrypt_mnemonic(&item, pin).await
    }

    /// Compares the entry for `user_id` with the account's active keys.
    pub async fn check(&self, user_id: &str, active_keys: &[String]) -> Result<BackupStatus> {
        let item = match self.find(user_id).await {
            Ok(item) => item,
            Err(KeywardError::BackupNotFound(_)) => return Ok(BackupStatus::Missing),
            Err(e) => return Err(e),
        };
        let key = normalize_public_key_hex(&item.public_key);
        let registered = active_keys
            .iter()
            .any(|k| normalize_public_key_hex(k) == key);
        Ok(if registered {
            BackupStatus::Present
        } else {
            BackupStatus::Stale
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Argon2Params;
    use crate::mnemonic::ABANDON_12;

    fn manager(store: Arc<MemoryFileStore>) -> BackupManager {
        let cipher = BackupCipher::new(b"application-secret-for-tests", Argon2Params::TESTING)
            .unwrap();
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

    async fn upload(m: &BackupManager, user_id: &str, key: &str) -> BackupItem {
        let mnemonic = Mnemonic::parse(ABANDON_12).unwrap();
        m.upload(
            &identity(user_id),
            &mnemonic,
            key,
            SignatureAlgorithm::EcdsaP256,
            HashAlgorithm::Sha3_256,
            "1234",
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_upload_creates_file_and_prepends() {
        let store = Arc::new(MemoryFileStore::new("mem"));
        let m = manager(store.clone());
        upload(&m, "u1", "aa").await;
        upload(&m, "u2", "bb").await;

        let items = m.list().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].user_id, "u2");
        assert_eq!(items[1].user_id, "u1");
        assert!(store.raw_contents(BACKUP_FILE_NAME).is_some());
    }

    #[tokio::test]
    async fn test_upload_twice_updates_in_place() {
        let store = Arc::new(MemoryFileStore::new("mem"));
        let m = manager(store);
        upload(&m, "u1", "aa").await;
        upload(&m, "u2", "bb").await;
        upload(&m, "u1", "cc").await;

        let items = m.list().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].user_id, "u1");
        assert_eq!(items[1].public_key, "cc");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_managers_sharing_a_store_keep_every_entry() {
        let store = Arc::new(MemoryFileStore::new("mem"));
        let managers = [Arc::new(manager(store.clone())), Arc::new(manager(store))];
        let mut tasks = Vec::new();
        for i in 0..12 {
            let m = Arc::clone(&managers[i % 2]);
            tasks.push(tokio::spawn(async move {
                upload(&m, &format!("user-{i}"), "aa").await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(managers[0].list().await.unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_delete_leaves_empty_sealed_list() {
        let store = Arc::new(MemoryFileStore::new("mem"));
        let m = manager(store.clone());
        upload(&m, "u1", "aa").await;

        assert!(m.delete("u1").await.unwrap());
        assert!(!m.delete("u1").await.unwrap());
        let raw = store.raw_contents(BACKUP_FILE_NAME).unwrap();
        assert!(!raw.is_empty());
        assert!(m.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_not_found_vs_wrong_pin() {
        let m = manager(Arc::new(MemoryFileStore::new("mem")));
        assert!(matches!(
            m.restore("nobody", "1234").await,
            Err(KeywardError::BackupNotFound(_))
        ));
        upload(&m, "u1", "aa").await;
        assert!(matches!(
            m.restore("u1", "0000").await,
            Err(KeywardError::BackupDecryption)
        ));
        let restored = m.restore("u1", "1234").await.unwrap();
        assert_eq!(restored.phrase().as_str(), ABANDON_12);
    }

    #[tokio::test]
    async fn test_io_failure_leaves_file_untouched() {
        let store = Arc::new(MemoryFileStore::new("mem"));
        let m = manager(store.clone());
        upload(&m, "u1", "aa").await;
        let before = store.raw_contents(BACKUP_FILE_NAME).unwrap();

        store.set_fail_writes(true);
        let mnemonic = Mnemonic::parse(ABANDON_12).unwrap();
        let err = m
            .upload(
                &identity("u2"),
                &mnemonic,
                "bb",
                SignatureAlgorithm::EcdsaP256,
                HashAlgorithm::Sha3_256,
                "1234",
            )
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.raw_contents(BACKUP_FILE_NAME).unwrap(), before);
    }

    #[tokio::test]
    async fn test_corrupted_list_is_decryption_error() {
        let store = Arc::new(MemoryFileStore::new("mem"));
        store.put_raw(BACKUP_FILE_NAME, b"garbage");
        let m = manager(store.clone());
        assert!(matches!(m.list().await, Err(KeywardError::BackupDecryption)));
        assert!(matches!(
            m.delete("u1").await,
            Err(KeywardError::BackupDecryption)
        ));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_check_against_active_keys() {
        let m = manager(Arc::new(MemoryFileStore::new("mem")));
        assert_eq!(m.check("u1", &[]).await.unwrap(), BackupStatus::Missing);
        upload(&m, "u1", "AbCd").await;
        assert_eq!(
            m.check("u1", &["0xabcd".to_string()]).await.unwrap(),
            BackupStatus::Present
        );
        assert_eq!(
            m.check("u1", &["ffff".to_string()]).await.unwrap(),
            BackupStatus::Stale
        );
    }
}
