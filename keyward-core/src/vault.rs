// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Current-generation key storage.
//!
//! Each key is stored under `{namespace}_{userPrefix}`, encrypted with a
//! key derived from the user prefix via Argon2id. The prefix is not a
//! secret; the encryption keeps raw scalars out of the database file and
//! binds each record to its id.

#![forbid(unsafe_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::algo::{HashAlgorithm, SignatureAlgorithm};
use crate::backend::{StorageBackend, Table};
use crate::crypto::{self, Argon2Params, EncryptedData, SALT_SIZE};
use crate::error::{KeywardError, Result};
use crate::keys::{KeyPair, PublicKey};

pub const DEFAULT_NAMESPACE: &str = "prefix_key";

const RECORD_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct VaultRecord {
    version: u8,
    algorithm: SignatureAlgorithm,
    hash: HashAlgorithm,
    salt: [u8; SALT_SIZE],
    params: Argon2Params,
    encrypted: Vec<u8>,
    public_key: String,
    created_at: i64,
}

pub struct KeyVault {
    backend: Arc<dyn StorageBackend>,
    namespace: String,
    params: Argon2Params,
}

impl KeyVault {
    pub fn new(backend: Arc<dyn StorageBackend>, namespace: &str, params: Argon2Params) -> Self {
        Self {
            backend,
            namespace: namespace.to_string(),
            params,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key_id(&self, prefix: &str) -> String {
        format!("{}_{}", self.namespace, prefix)
    }

    fn record(&self, prefix: &str) -> Result<Option<VaultRecord>> {
        let id = self.key_id(prefix);
        self.backend
            .get(Table::Keys, id.as_bytes())?
            .map(|bytes| bincode::deserialize::<VaultRecord>(&bytes).map_err(Into::into))
            .transpose()
    }

    pub fn contains(&self, prefix: &str) -> Result<bool> {
        Ok(self
            .backend
            .get(Table::Keys, self.key_id(prefix).as_bytes())?
            .is_some())
    }

    /// Stores `key` for `prefix`, replacing any existing record. `hash` is
    /// the hash algorithm the key is registered with on the account.
    pub fn store(&self, prefix: &str, key: &KeyPair, hash: HashAlgorithm) -> Result<()> {
        if prefix.is_empty() {
            return Err(KeywardError::InvalidInput("empty user prefix".into()));
        }
        let id = self.key_id(prefix);
        let salt: [u8; SALT_SIZE] = crypto::random_bytes();
        let enc_key = crypto::derive_key(prefix.as_bytes(), &salt, self.params)?;
        let encrypted = crypto::encrypt(key.secret_bytes(), &enc_key)?;

        let record = VaultRecord {
            version: RECORD_VERSION,
            algorithm: key.algorithm(),
            hash,
            salt,
            params: self.params,
            encrypted: encrypted.to_bytes(),
            public_key: key.public_key().to_hex(),
            created_at: chrono::Utc::now().timestamp(),
        };
        self.backend
            .put(Table::Keys, id.as_bytes(), &bincode::serialize(&record)?)?;
        info!(key_id = %id, algorithm = %key.algorithm(), "key stored");
        Ok(())
    }

    /// Loads and decrypts the key for `prefix`.
    pub fn load(&self, prefix: &str) -> Result<Option<(KeyPair, HashAlgorithm)>> {
        let Some(record) = self.record(prefix)? else {
            debug!(prefix, "no current-generation key");
            return Ok(None);
        };
        if record.version != RECORD_VERSION {
            return Err(KeywardError::Serialization(format!(
                "unsupported key record version {}",
                record.version
            )));
        }
        let enc_key = crypto::derive_key(prefix.as_bytes(), &record.salt, record.params)?;
        let scalar = crypto::decrypt(&EncryptedData::from_bytes(&record.encrypted)?, &enc_key)?;
        let key = KeyPair::from_scalar(record.algorithm, &scalar)?;
        if key.public_key().to_hex() != record.public_key {
            return Err(KeywardError::InvalidKey(format!(
                "stored public key mismatch for {}",
                self.key_id(prefix)
            )));
        }
        Ok(Some((key, record.hash)))
    }

    /// Public key of the stored record, without decrypting the scalar.
    pub fn public_key(&self, prefix: &str) -> Result<Option<PublicKey>> {
        self.record(prefix)?
            .map(|r| PublicKey::from_hex(r.algorithm, &r.public_key))
            .transpose()
    }

    pub fn delete(&self, prefix: &str) -> Result<bool> {
        let existed = self
            .backend
            .delete(Table::Keys, self.key_id(prefix).as_bytes())?;
        if existed {
            info!(key_id = %self.key_id(prefix), "key deleted");
        }
        Ok(existed)
    }

    /// User prefixes with a record in this namespace.
    pub fn prefixes(&self) -> Result<Vec<String>> {
        let head = format!("{}_", self.namespace);
        Ok(self
            .backend
            .keys_with_prefix(Table::Keys, head.as_bytes())?
            .into_iter()
            .filter_map(|k| String::from_utf8(k).ok())
            .filter_map(|id| id.strip_prefix(&head).map(str::to_string))
            .collect())
    }
}

/// Where the key for a user prefix was last found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageLocation {
    Current,
    LegacyKeystore,
}

/// Durable `userPrefix -> StorageLocation` records.
pub struct LocationIndex {
    backend: Arc<dyn StorageBackend>,
}

impl LocationIndex {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn get(&self, prefix: &str) -> Result<Option<StorageLocation>> {
        self.backend
            .get(Table::Locations, prefix.as_bytes())?
            .map(|bytes| bincode::deserialize(&bytes).map_err(Into::into))
            .transpose()
    }

    pub fn record(&self, prefix: &str, location: StorageLocation) -> Result<()> {
        if self.get(prefix)? == Some(location) {
            return Ok(());
        }
        self.backend
            .put(Table::Locations, prefix.as_bytes(), &bincode::serialize(&location)?)?;
        debug!(prefix, ?location, "key location recorded");
        Ok(())
    }

    pub fn remove(&self, prefix: &str) -> Result<bool> {
        self.backend.delete(Table::Locations, prefix.as_bytes())
    }
}
