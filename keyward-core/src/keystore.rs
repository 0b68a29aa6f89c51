// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Platform secure key storage interface.
//!
//! The platform keystore isolates private keys behind opaque handles. Every
//! loaded entry is a session that must be released; [`KeystoreSession`]
//! releases it on drop so handles do not leak on early returns.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;
use zeroize::Zeroizing;

use crate::algo::{HashAlgorithm, SignatureAlgorithm};
use crate::error::{KeywardError, Result};
use crate::keys::{KeyPair, PublicKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// An asymmetric key pair usable for signing.
    PrivateKey,
    /// Anything else stored under the alias (symmetric key, certificate).
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    Software,
    Hardware,
}

#[derive(Debug, Clone)]
pub struct KeyEntry {
    pub handle: KeyHandle,
    pub kind: EntryKind,
    pub algorithm: Option<SignatureAlgorithm>,
    pub public_key: Option<PublicKey>,
    pub protection: Protection,
}

/// Secure key storage backend provided by the platform.
///
/// Calls may block on user authentication prompts, so async callers should
/// run them on a blocking worker.
pub trait SecureKeyStore: Send + Sync {
    fn list_aliases(&self) -> Result<Vec<String>>;

    /// Opens the entry stored under `alias`. The returned handle stays valid
    /// until passed to [`release`](Self::release).
    fn load_entry(&self, alias: &str) -> Result<Option<KeyEntry>>;

    /// Signs `hash(data)`. May fail with `AuthenticationRequired`.
    fn sign(&self, handle: KeyHandle, data: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>>;

    /// Fails with `KeyNotExtractable` for hardware-backed entries.
    fn export_private_scalar(&self, handle: KeyHandle) -> Result<Zeroizing<Vec<u8>>>;

    fn release(&self, handle: KeyHandle);

    fn contains_alias(&self, alias: &str) -> Result<bool> {
        Ok(self.list_aliases()?.iter().any(|a| a == alias))
    }
}

/// An open keystore entry, released when dropped.
pub struct KeystoreSession<'a> {
    store: &'a dyn SecureKeyStore,
    alias: String,
    entry: KeyEntry,
}

impl<'a> KeystoreSession<'a> {
    /// Returns `Ok(None)` when nothing is stored under `alias`.
    pub fn open(store: &'a dyn SecureKeyStore, alias: &str) -> Result<Option<Self>> {
        let Some(entry) = store.load_entry(alias)? else {
            return Ok(None);
        };
        debug!(alias, handle = entry.handle.0, "keystore session opened");
        Ok(Some(Self {
            store,
            alias: alias.to_string(),
            entry,
        }))
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn entry(&self) -> &KeyEntry {
        &self.entry
    }

    pub fn is_private_key(&self) -> bool {
        self.entry.kind == EntryKind::PrivateKey
    }

    pub fn sign(&self, data: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>> {
        self.store.sign(self.entry.handle, data, hash)
    }

    pub fn export_private_scalar(&self) -> Result<Zeroizing<Vec<u8>>> {
        self.store.export_private_scalar(self.entry.handle)
    }
}

impl Drop for KeystoreSession<'_> {
    fn drop(&mut self) {
        self.store.release(self.entry.handle);
        debug!(alias = %self.alias, handle = self.entry.handle.0, "keystore session released");
    }
}

struct StoredEntry {
    kind: EntryKind,
    key: Option<KeyPair>,
    protection: Protection,
    requires_auth: bool,
    authenticated: bool,
}

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<String, StoredEntry>,
    open: HashMap<u64, String>,
    next_handle: u64,
}

/// Software emulation of a platform keystore.
///
/// Hardware protection is modelled by refusing export; authentication
/// gating by refusing to sign until [`grant_authentication`] is called.
///
/// [`grant_authentication`]: MemoryKeyStore::grant_authentication
#[derive(Default)]
pub struct MemoryKeyStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_key(&self, alias: &str, key: KeyPair, protection: Protection) {
        self.inner.lock().entries.insert(
            alias.to_string(),
            StoredEntry {
                kind: EntryKind::PrivateKey,
                key: Some(key),
                protection,
                requires_auth: false,
                authenticated: false,
            },
        );
    }

    pub fn generate_key(
        &self,
        alias: &str,
        algorithm: SignatureAlgorithm,
        protection: Protection,
    ) -> Result<PublicKey> {
        let key = KeyPair::generate(algorithm)?;
        let public = *key.public_key();
        self.insert_key(alias, key, protection);
        Ok(public)
    }

    /// Stores a non-signing entry under `alias`.
    pub fn insert_other(&self, alias: &str) {
        self.inner.lock().entries.insert(
            alias.to_string(),
            StoredEntry {
                kind: EntryKind::Other,
                key: None,
                protection: Protection::Software,
                requires_auth: false,
                authenticated: false,
            },
        );
    }

    pub fn require_authentication(&self, alias: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .get_mut(alias)
            .ok_or_else(|| KeywardError::KeyNotFound(alias.to_string()))?;
        entry.requires_auth = true;
        entry.authenticated = false;
        Ok(())
    }

    pub fn grant_authentication(&self, alias: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .get_mut(alias)
            .ok_or_else(|| KeywardError::KeyNotFound(alias.to_string()))?;
        entry.authenticated = true;
        Ok(())
    }

    pub fn remove(&self, alias: &str) -> bool {
        self.inner.lock().entries.remove(alias).is_some()
    }

    /// Number of handles loaded and not yet released.
    pub fn open_handles(&self) -> usize {
        self.inner.lock().open.len()
    }
}

impl SecureKeyStore for MemoryKeyStore {
    fn list_aliases(&self) -> Result<Vec<String>> {
        let mut aliases: Vec<String> = self.inner.lock().entries.keys().cloned().collect();
        aliases.sort();
        Ok(aliases)
    }

    fn load_entry(&self, alias: &str) -> Result<Option<KeyEntry>> {
        let mut inner = self.inner.lock();
        let Some(stored) = inner.entries.get(alias) else {
            return Ok(None);
        };
        let entry_kind = stored.kind;
        let protection = stored.protection;
        let algorithm = stored.key.as_ref().map(|k| k.algorithm());
        let public_key = stored.key.as_ref().map(|k| *k.public_key());

        inner.next_handle += 1;
        let handle = inner.next_handle;
        inner.open.insert(handle, alias.to_string());
        Ok(Some(KeyEntry {
            handle: KeyHandle(handle),
            kind: entry_kind,
            algorithm,
            public_key,
            protection,
        }))
    }

    fn sign(&self, handle: KeyHandle, data: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>> {
        let inner = self.inner.lock();
        let alias = inner
            .open
            .get(&handle.0)
            .ok_or_else(|| KeywardError::keystore("invalid or released handle"))?;
        let stored = inner
            .entries
            .get(alias)
            .ok_or_else(|| KeywardError::KeyNotFound(alias.clone()))?;
        if stored.requires_auth && !stored.authenticated {
            return Err(KeywardError::AuthenticationRequired(alias.clone()));
        }
        let key = stored
            .key
            .as_ref()
            .ok_or_else(|| KeywardError::keystore(format!("{alias} is not a signing key")))?;
        Ok(key.sign(data, hash)?.to_vec())
    }

    fn export_private_scalar(&self, handle: KeyHandle) -> Result<Zeroizing<Vec<u8>>> {
        let inner = self.inner.lock();
        let alias = inner
            .open
            .get(&handle.0)
            .ok_or_else(|| KeywardError::keystore("invalid or released handle"))?;
        let stored = inner
            .entries
            .get(alias)
            .ok_or_else(|| KeywardError::KeyNotFound(alias.clone()))?;
        if stored.protection == Protection::Hardware {
            return Err(KeywardError::KeyNotExtractable(alias.clone()));
        }
        let key = stored
            .key
            .as_ref()
            .ok_or_else(|| KeywardError::keystore(format!("{alias} is not a signing key")))?;
        Ok(Zeroizing::new(key.secret_bytes().to_vec()))
    }

    fn release(&self, handle: KeyHandle) {
        self.inner.lock().open.remove(&handle.0);
    }
}
