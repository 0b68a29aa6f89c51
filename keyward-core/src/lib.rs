// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Keyward Core - wallet key management
//!
//! - Signing providers over mnemonic, imported and hardware-keystore keys
//! - Current-generation key vault (redb, Argon2id + XChaCha20-Poly1305)
//!   with fallback to and migration from legacy keystore entries
//! - Encrypted multi-account mnemonic backup to pluggable destinations

#![forbid(unsafe_code)]

pub mod algo;
pub mod backend;
pub mod backup;
pub mod compat;
pub mod crypto;
pub mod error;
pub mod hd;
pub mod keys;
pub mod keystore;
pub mod migration;
pub mod mnemonic;
pub mod provider;
pub mod selector;
pub mod vault;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

pub use crate::algo::{HashAlgorithm, SignatureAlgorithm};
pub use crate::compat::{KeyCompatibilityManager, KeyLookup};
pub use crate::error::{KeywardError, MigrationError, Result};
pub use crate::keys::{KeyPair, PublicKey};
pub use crate::mnemonic::Mnemonic;
pub use crate::provider::CryptoProvider;

use crate::backend::{RedbBackend, StorageBackend};
use crate::crypto::Argon2Params;
use crate::keystore::SecureKeyStore;
use crate::migration::LegacyKeyMigrator;
use crate::vault::{KeyVault, LocationIndex};

pub const DB_FILE_NAME: &str = "keyward.redb";

/// Key storage opened on a data directory.
pub struct Keyward {
    backend: Arc<dyn StorageBackend>,
    compat: KeyCompatibilityManager,
}

impl Keyward {
    /// Opens (or creates) the database under `data_dir`.
    pub fn open(
        data_dir: &Path,
        namespace: &str,
        params: Argon2Params,
        keystore: Arc<dyn SecureKeyStore>,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(DB_FILE_NAME);
        debug!(path = %path.display(), "opening key database");
        let backend: Arc<dyn StorageBackend> = Arc::new(RedbBackend::open(&path)?);
        Ok(Self::with_backend(backend, namespace, params, keystore))
    }

    pub fn with_backend(
        backend: Arc<dyn StorageBackend>,
        namespace: &str,
        params: Argon2Params,
        keystore: Arc<dyn SecureKeyStore>,
    ) -> Self {
        let vault = Arc::new(KeyVault::new(backend.clone(), namespace, params));
        let locations = Arc::new(LocationIndex::new(backend.clone()));
        let compat = KeyCompatibilityManager::new(vault, keystore, locations);
        Self { backend, compat }
    }

    pub fn compat(&self) -> &KeyCompatibilityManager {
        &self.compat
    }

    pub fn vault(&self) -> &KeyVault {
        self.compat.vault()
    }

    pub fn migrator(&self) -> LegacyKeyMigrator {
        LegacyKeyMigrator::new(self.compat.clone(), self.backend.clone())
    }
}

pub fn default_data_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".keyward"))
        .ok_or(KeywardError::HomeNotFound)
}
