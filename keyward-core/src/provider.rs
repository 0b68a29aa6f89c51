// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Signing providers.
//!
//! [`CryptoProvider`] is a closed set of key backends. Every variant answers
//! the same questions (public key, algorithms, weight) and signs raw bytes,
//! user challenges and transaction envelopes. Signing with the hardware
//! variant goes through the platform keystore on a blocking worker since it
//! may wait on a user authentication prompt.

#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::algo::{
    HashAlgorithm, SignatureAlgorithm, FULL_KEY_WEIGHT, TRANSACTION_DOMAIN_TAG, USER_DOMAIN_TAG,
};
use crate::backup::BackupCryptoProvider;
use crate::error::{KeywardError, Result};
use crate::hd::{self, DerivationPath, PRIMARY_PATH};
use crate::keys::{normalize_signature, KeyPair, PublicKey};
use crate::keystore::{KeystoreSession, SecureKeyStore};
use crate::mnemonic::Mnemonic;

/// Keys derived from the active wallet's mnemonic.
#[derive(Clone)]
pub struct MnemonicProvider {
    key: KeyPair,
    path: DerivationPath,
}

impl MnemonicProvider {
    /// Derives the primary signing key.
    pub fn new(mnemonic: &Mnemonic, algorithm: SignatureAlgorithm) -> Result<Self> {
        Self::with_path(mnemonic, algorithm, PRIMARY_PATH.parse()?)
    }

    pub fn with_path(
        mnemonic: &Mnemonic,
        algorithm: SignatureAlgorithm,
        path: DerivationPath,
    ) -> Result<Self> {
        let key = hd::derive_key_pair(mnemonic, algorithm, &path)?;
        Ok(Self { key, path })
    }

    pub fn path(&self) -> &DerivationPath {
        &self.path
    }
}

/// A key decoded from a keystore file or a raw private key string.
#[derive(Clone)]
pub struct ImportedKeyProvider {
    key: KeyPair,
    hash: HashAlgorithm,
}

impl ImportedKeyProvider {
    pub fn new(key: KeyPair) -> Self {
        Self::with_hash(key, HashAlgorithm::Sha2_256)
    }

    pub fn with_hash(key: KeyPair, hash: HashAlgorithm) -> Self {
        Self { key, hash }
    }

    pub fn from_private_key_hex(algorithm: SignatureAlgorithm, hex: &str) -> Result<Self> {
        Ok(Self::new(KeyPair::from_hex(algorithm, hex)?))
    }

    pub(crate) fn key_pair(&self) -> &KeyPair {
        &self.key
    }
}

/// A key that never leaves the platform keystore.
#[derive(Clone)]
pub struct HardwareKeystoreProvider {
    store: Arc<dyn SecureKeyStore>,
    alias: String,
    public_key: PublicKey,
    hash: HashAlgorithm,
}

impl HardwareKeystoreProvider {
    /// Opens the key stored under `alias` and caches its public key.
    pub fn open(store: Arc<dyn SecureKeyStore>, alias: &str) -> Result<Self> {
        let public_key = {
            let session = KeystoreSession::open(store.as_ref(), alias)?
                .ok_or_else(|| KeywardError::KeyNotFound(alias.to_string()))?;
            if !session.is_private_key() {
                return Err(KeywardError::keystore(format!(
                    "{alias} is not a private key entry"
                )));
            }
            session
                .entry()
                .public_key
                .ok_or_else(|| KeywardError::keystore(format!("{alias} has no public key")))?
        };
        let hash = public_key.algorithm().default_hash();
        Ok(Self {
            store,
            alias: alias.to_string(),
            public_key,
            hash,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    async fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let store = Arc::clone(&self.store);
        let alias = self.alias.clone();
        let data = data.to_vec();
        let hash = self.hash;
        let algorithm = self.public_key.algorithm();

        tokio::task::spawn_blocking(move || {
            let session = KeystoreSession::open(store.as_ref(), &alias)?
                .ok_or_else(|| KeywardError::KeyNotFound(alias.clone()))?;
            let sig = session.sign(&data, hash)?;
            normalize_signature(algorithm, &sig)
        })
        .await
        .map_err(|e| KeywardError::keystore(format!("signing task failed: {e}")))?
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Mnemonic,
    Hardware,
    Imported,
    Backup,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Mnemonic => f.write_str("mnemonic"),
            ProviderKind::Hardware => f.write_str("hardware"),
            ProviderKind::Imported => f.write_str("imported"),
            ProviderKind::Backup => f.write_str("backup"),
        }
    }
}

#[derive(Clone)]
pub enum CryptoProvider {
    Mnemonic(MnemonicProvider),
    Hardware(HardwareKeystoreProvider),
    Imported(ImportedKeyProvider),
    Backup(BackupCryptoProvider),
}

impl CryptoProvider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            CryptoProvider::Mnemonic(_) => ProviderKind::Mnemonic,
            CryptoProvider::Hardware(_) => ProviderKind::Hardware,
            CryptoProvider::Imported(_) => ProviderKind::Imported,
            CryptoProvider::Backup(_) => ProviderKind::Backup,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        match self {
            CryptoProvider::Mnemonic(p) => p.key.public_key(),
            CryptoProvider::Hardware(p) => &p.public_key,
            CryptoProvider::Imported(p) => p.key.public_key(),
            CryptoProvider::Backup(p) => p.public_key(),
        }
    }

    /// 128 hex characters, uncompressed point without the `04` prefix.
    pub fn public_key_hex(&self) -> String {
        self.public_key().to_hex()
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.public_key().algorithm()
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        match self {
            CryptoProvider::Mnemonic(_) => HashAlgorithm::Sha2_256,
            CryptoProvider::Hardware(p) => p.hash,
            CryptoProvider::Imported(p) => p.hash,
            CryptoProvider::Backup(p) => p.hash_algorithm(),
        }
    }

    pub fn key_weight(&self) -> u32 {
        match self {
            CryptoProvider::Mnemonic(_) | CryptoProvider::Hardware(_) | CryptoProvider::Imported(_) => {
                FULL_KEY_WEIGHT
            }
            CryptoProvider::Backup(p) => p.key_weight(),
        }
    }

    /// Signs `hash(data)`, returning raw `r || s`.
    pub async fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let hash = self.hash_algorithm();
        match self {
            CryptoProvider::Mnemonic(p) => Ok(p.key.sign(data, hash)?.to_vec()),
            CryptoProvider::Imported(p) => Ok(p.key.sign(data, hash)?.to_vec()),
            CryptoProvider::Backup(p) => Ok(p.key_pair().sign(data, hash)?.to_vec()),
            CryptoProvider::Hardware(p) => p.sign(data).await,
        }
    }

    /// Signs `USER_DOMAIN_TAG || challenge` and returns lowercase hex.
    pub async fn user_signature(&self, challenge: &str) -> Result<String> {
        let mut message = Vec::with_capacity(USER_DOMAIN_TAG.len() + challenge.len());
        message.extend_from_slice(&USER_DOMAIN_TAG);
        message.extend_from_slice(challenge.as_bytes());
        debug!(kind = %self.kind(), "signing user challenge");
        Ok(hex::encode(self.sign(&message).await?))
    }

    /// Signs `TRANSACTION_DOMAIN_TAG || payload`.
    pub async fn sign_transaction(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut message = Vec::with_capacity(TRANSACTION_DOMAIN_TAG.len() + payload.len());
        message.extend_from_slice(&TRANSACTION_DOMAIN_TAG);
        message.extend_from_slice(payload);
        self.sign(&message).await
    }

    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        self.public_key()
            .verify(data, self.hash_algorithm(), signature)
    }
}

impl fmt::Debug for CryptoProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoProvider")
            .field("kind", &self.kind())
            .field("public_key", &self.public_key_hex())
            .field("signature_algorithm", &self.signature_algorithm())
            .field("hash_algorithm", &self.hash_algorithm())
            .finish()
    }
}

impl From<MnemonicProvider> for CryptoProvider {
    fn from(p: MnemonicProvider) -> Self {
        CryptoProvider::Mnemonic(p)
    }
}

impl From<HardwareKeystoreProvider> for CryptoProvider {
    fn from(p: HardwareKeystoreProvider) -> Self {
        CryptoProvider::Hardware(p)
    }
}

impl From<ImportedKeyProvider> for CryptoProvider {
    fn from(p: ImportedKeyProvider) -> Self {
        CryptoProvider::Imported(p)
    }
}

impl From<BackupCryptoProvider> for CryptoProvider {
    fn from(p: BackupCryptoProvider) -> Self {
        CryptoProvider::Backup(p)
    }
}
