// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Locating a user's key across storage generations.
//!
//! Lookup order is fixed: the current-generation [`KeyVault`] first, then
//! the legacy platform keystore alias `user_keystore_{prefix}`. A legacy key
//! that is hardware backed exists but cannot be exported; that outcome is
//! [`KeyLookup::LegacyHardwareOnly`], distinct from [`KeyLookup::NotFound`].

#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::algo::SignatureAlgorithm;
use crate::crypto::KEY_SIZE;
use crate::error::{KeywardError, MigrationError, Result};
use crate::keys::KeyPair;
use crate::keystore::{EntryKind, KeystoreSession, Protection, SecureKeyStore};
use crate::provider::{CryptoProvider, HardwareKeystoreProvider, ImportedKeyProvider};
use crate::vault::{KeyVault, LocationIndex, StorageLocation};

pub const LEGACY_ALIAS_PREFIX: &str = "user_keystore_";

const LEGACY_LABEL: &str = "Old Android Keystore";
const PUBLIC_KEY_PREVIEW: usize = 16;

pub fn legacy_alias(prefix: &str) -> String {
    format!("{LEGACY_ALIAS_PREFIX}{prefix}")
}

/// Brings an exported private scalar to 32 bytes.
///
/// Platform keystores export big-endian integers: a 33-byte value carries a
/// leading sign byte, shorter values have dropped leading zeros.
pub fn normalize_private_scalar(
    raw: &[u8],
) -> std::result::Result<Zeroizing<[u8; KEY_SIZE]>, MigrationError> {
    let mut out = Zeroizing::new([0u8; KEY_SIZE]);
    match raw.len() {
        KEY_SIZE => out.copy_from_slice(raw),
        33 if raw[0] == 0 => out.copy_from_slice(&raw[1..]),
        n if n > 0 && n < KEY_SIZE => out[KEY_SIZE - n..].copy_from_slice(raw),
        n => return Err(MigrationError::InvalidPrivateKeySize { actual: n }),
    }
    Ok(out)
}

/// Outcome of a key lookup for one user prefix.
#[derive(Debug)]
pub enum KeyLookup {
    /// Loaded from current-generation storage.
    Current(CryptoProvider),
    /// Exported from a software-backed legacy keystore entry.
    LegacyExtracted(CryptoProvider),
    /// A legacy key exists but is hardware isolated.
    LegacyHardwareOnly { alias: String },
    NotFound,
}

impl KeyLookup {
    pub fn exists(&self) -> bool {
        !matches!(self, KeyLookup::NotFound)
    }

    /// The extractable provider, if any.
    pub fn into_provider(self) -> Option<CryptoProvider> {
        match self {
            KeyLookup::Current(p) | KeyLookup::LegacyExtracted(p) => Some(p),
            KeyLookup::LegacyHardwareOnly { .. } | KeyLookup::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationCheck {
    /// Found; carries a short public key preview.
    Found { public_key: String },
    /// A private key entry whose scalar cannot be exported.
    FoundHardwareBacked,
    /// Something is stored under the id but it is not a private key.
    WrongType,
    NotFound,
    Failed(String),
}

/// Support trace of where a user's key was looked for. Never carries
/// private key material.
#[derive(Debug, Clone)]
pub struct KeyDiagnosticsReport {
    pub prefix: String,
    pub current_id: String,
    pub current: LocationCheck,
    pub legacy_alias: String,
    pub legacy: LocationCheck,
    pub recorded_location: Option<StorageLocation>,
}

impl KeyDiagnosticsReport {
    pub fn any_found(&self) -> bool {
        let found = |c: &LocationCheck| {
            matches!(
                c,
                LocationCheck::Found { .. } | LocationCheck::FoundHardwareBacked
            )
        };
        found(&self.current) || found(&self.legacy)
    }
}

fn describe(check: &LocationCheck) -> String {
    match check {
        LocationCheck::Found { public_key } => format!("Found (public key {public_key}...)"),
        LocationCheck::FoundHardwareBacked => "Found (PrivateKeyEntry, hardware backed)".into(),
        LocationCheck::WrongType => "Found but wrong type".into(),
        LocationCheck::NotFound => "Not found".into(),
        LocationCheck::Failed(e) => format!("Error: {e}"),
    }
}

impl fmt::Display for KeyDiagnosticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Key Storage Diagnostic for prefix: {} ===", self.prefix)?;
        writeln!(f, "New storage ({}): {}", self.current_id, describe(&self.current))?;
        writeln!(
            f,
            "{LEGACY_LABEL} ({}): {}",
            self.legacy_alias,
            describe(&self.legacy)
        )?;
        match self.recorded_location {
            Some(location) => writeln!(f, "Recorded location: {location:?}")?,
            None => writeln!(f, "Recorded location: none")?,
        }
        write!(f, "=== End Diagnostic ===")
    }
}

/// Finds usable keys across current and legacy storage.
#[derive(Clone)]
pub struct KeyCompatibilityManager {
    vault: Arc<KeyVault>,
    keystore: Arc<dyn SecureKeyStore>,
    locations: Arc<LocationIndex>,
    legacy_algorithm: SignatureAlgorithm,
}

impl KeyCompatibilityManager {
    pub fn new(
        vault: Arc<KeyVault>,
        keystore: Arc<dyn SecureKeyStore>,
        locations: Arc<LocationIndex>,
    ) -> Self {
        Self {
            vault,
            keystore,
            locations,
            legacy_algorithm: SignatureAlgorithm::EcdsaP256,
        }
    }

    /// Curve assumed for legacy entries that do not report one.
    pub fn with_legacy_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.legacy_algorithm = algorithm;
        self
    }

    pub fn vault(&self) -> &KeyVault {
        &self.vault
    }

    pub fn keystore(&self) -> &Arc<dyn SecureKeyStore> {
        &self.keystore
    }

    pub fn locations(&self) -> &LocationIndex {
        &self.locations
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(KeyCompatibilityManager) -> Result<T> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || f(this))
            .await
            .map_err(|e| KeywardError::keystore(format!("key lookup task failed: {e}")))?
    }

    /// Runs the ordered lookup for `prefix`.
    pub async fn resolve(&self, prefix: &str) -> Result<KeyLookup> {
        let prefix = prefix.to_string();
        self.blocking(move |this| this.resolve_blocking(&prefix))
            .await
    }

    /// The extractable provider for `prefix`, or `None` when no key exists
    /// or the only key is hardware isolated.
    pub async fn get_private_key_with_fallback(
        &self,
        prefix: &str,
    ) -> Result<Option<CryptoProvider>> {
        Ok(self.resolve(prefix).await?.into_provider())
    }

    /// Whether a key exists in either location, extractable or not.
    pub async fn has_private_key(&self, prefix: &str) -> Result<bool> {
        let prefix = prefix.to_string();
        self.blocking(move |this| {
            if this.vault.contains(&prefix)? {
                return Ok(true);
            }
            let alias = legacy_alias(&prefix);
            Ok(matches!(
                KeystoreSession::open(this.keystore.as_ref(), &alias)?,
                Some(session) if session.is_private_key()
            ))
        })
        .await
    }

    /// A provider able to sign for `prefix`, including the hardware
    /// provider when the legacy key cannot be exported.
    pub async fn signing_provider(&self, prefix: &str) -> Result<CryptoProvider> {
        match self.resolve(prefix).await? {
            KeyLookup::Current(p) | KeyLookup::LegacyExtracted(p) => Ok(p),
            KeyLookup::LegacyHardwareOnly { alias } => {
                let store = Arc::clone(&self.keystore);
                tokio::task::spawn_blocking(move || HardwareKeystoreProvider::open(store, &alias))
                    .await
                    .map_err(|e| KeywardError::keystore(format!("keystore task failed: {e}")))?
                    .map(CryptoProvider::from)
            }
            KeyLookup::NotFound => Err(KeywardError::KeyNotFound(prefix.to_string())),
        }
    }

    pub async fn diagnose_key_storage(&self, prefix: &str) -> KeyDiagnosticsReport {
        let owned = prefix.to_string();
        match self
            .blocking(move |this| Ok(this.diagnose_blocking(&owned)))
            .await
        {
            Ok(report) => report,
            Err(e) => KeyDiagnosticsReport {
                prefix: prefix.to_string(),
                current_id: self.vault.key_id(prefix),
                current: LocationCheck::Failed(e.to_string()),
                legacy_alias: legacy_alias(prefix),
                legacy: LocationCheck::Failed(e.to_string()),
                recorded_location: None,
            },
        }
    }

    pub(crate) fn resolve_blocking(&self, prefix: &str) -> Result<KeyLookup> {
        match self.vault.load(prefix) {
            Ok(Some((key, hash))) => {
                debug!(prefix, "key found in current storage");
                self.record_location(prefix, StorageLocation::Current);
                return Ok(KeyLookup::Current(
                    ImportedKeyProvider::with_hash(key, hash).into(),
                ));
            }
            Ok(None) => {}
            Err(e) => warn!(prefix, error = %e, "current storage key unreadable, trying legacy"),
        }

        let alias = legacy_alias(prefix);
        match self.extract_legacy(&alias) {
            Ok(Some(key)) => {
                info!(prefix, "key extracted from legacy keystore");
                self.record_location(prefix, StorageLocation::LegacyKeystore);
                let hash = key.algorithm().default_hash();
                Ok(KeyLookup::LegacyExtracted(
                    ImportedKeyProvider::with_hash(key, hash).into(),
                ))
            }
            Ok(None) => {
                debug!(prefix, "no key in any storage");
                Ok(KeyLookup::NotFound)
            }
            Err(KeywardError::KeyNotExtractable(_)) => {
                debug!(prefix, "legacy key is hardware backed");
                self.record_location(prefix, StorageLocation::LegacyKeystore);
                Ok(KeyLookup::LegacyHardwareOnly { alias })
            }
            Err(e) => Err(e),
        }
    }

    /// Exports the legacy key under `alias`. `Ok(None)` when there is no
    /// private key entry; `KeyNotExtractable` when it is hardware backed.
    pub(crate) fn extract_legacy(&self, alias: &str) -> Result<Option<KeyPair>> {
        let Some(session) = KeystoreSession::open(self.keystore.as_ref(), alias)? else {
            return Ok(None);
        };
        if !session.is_private_key() {
            warn!(alias, "legacy keystore entry is not a private key");
            return Ok(None);
        }
        let algorithm = session.entry().algorithm.unwrap_or(self.legacy_algorithm);
        let raw = session.export_private_scalar()?;
        let scalar = normalize_private_scalar(&raw)?;
        let key = KeyPair::from_scalar(algorithm, scalar.as_slice())?;
        if let Some(expected) = session.entry().public_key {
            if &expected != key.public_key() {
                return Err(MigrationError::Verification {
                    prefix: alias.to_string(),
                }
                .into());
            }
        }
        Ok(Some(key))
    }

    fn diagnose_blocking(&self, prefix: &str) -> KeyDiagnosticsReport {
        let current = match self.vault.public_key(prefix) {
            Ok(Some(pk)) => LocationCheck::Found {
                public_key: pk.to_hex()[..PUBLIC_KEY_PREVIEW].to_string(),
            },
            Ok(None) => LocationCheck::NotFound,
            Err(e) => LocationCheck::Failed(e.to_string()),
        };

        let alias = legacy_alias(prefix);
        let legacy = match KeystoreSession::open(self.keystore.as_ref(), &alias) {
            Ok(Some(session)) => match (session.entry().kind, session.entry().protection) {
                (EntryKind::Other, _) => LocationCheck::WrongType,
                (EntryKind::PrivateKey, Protection::Hardware) => LocationCheck::FoundHardwareBacked,
                (EntryKind::PrivateKey, Protection::Software) => match session.entry().public_key {
                    Some(pk) => LocationCheck::Found {
                        public_key: pk.to_hex()[..PUBLIC_KEY_PREVIEW].to_string(),
                    },
                    None => LocationCheck::FoundHardwareBacked,
                },
            },
            Ok(None) => LocationCheck::NotFound,
            Err(e) => LocationCheck::Failed(e.to_string()),
        };

        KeyDiagnosticsReport {
            prefix: prefix.to_string(),
            current_id: self.vault.key_id(prefix),
            current,
            legacy_alias: alias,
            legacy,
            recorded_location: self.locations.get(prefix).ok().flatten(),
        }
    }

    fn record_location(&self, prefix: &str, location: StorageLocation) {
        if let Err(e) = self.locations.record(prefix, location) {
            warn!(prefix, error = %e, "failed to record key location");
        }
    }
}
