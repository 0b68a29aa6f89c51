// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The two encryption layers of a backup file.
//!
//! The outer layer seals the whole entry list with AES-256-GCM under a key
//! derived from the fixed application secret. It hides which users backed
//! up to a destination from anyone without the application.
//!
//! The inner layer seals each mnemonic with XChaCha20-Poly1305 under a key
//! stretched from the user's PIN with Argon2id. Blob layout:
//!
//! ```text
//! version(1) || memory_kib(4) || iterations(4) || parallelism(4) || salt(32) || nonce(24) || ciphertext
//! ```

#![forbid(unsafe_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use zeroize::Zeroizing;

use super::BackupItem;
use crate::crypto::{self, Argon2Params, EncryptedData, SecretKey, SALT_SIZE};
use crate::error::{KeywardError, Result};
use crate::mnemonic::Mnemonic;

const LIST_KEY_CONTEXT: &[u8] = b"keyward-backup-list-v1";
const ENTRY_VERSION: u8 = 1;
const ENTRY_HEADER_LEN: usize = 1 + 12 + SALT_SIZE;
const MAX_MEMORY_KIB: u32 = 1024 * 1024;
const MAX_ITERATIONS: u32 = 64;

#[derive(Clone)]
pub struct BackupCipher {
    list_key: SecretKey,
    params: Argon2Params,
}

impl BackupCipher {
    /// `app_secret` is the fixed application-level key material shared by
    /// every install.
    pub fn new(app_secret: &[u8], params: Argon2Params) -> Result<Self> {
        if app_secret.len() < 16 {
            return Err(KeywardError::InvalidInput(
                "application backup secret too short".into(),
            ));
        }
        Ok(Self {
            list_key: crypto::derive_subkey(app_secret, LIST_KEY_CONTEXT),
            params,
        })
    }

    pub fn params(&self) -> Argon2Params {
        self.params
    }

    /// Encrypts the full entry list into file contents (base64 text).
    pub fn seal_list(&self, items: &[BackupItem]) -> Result<Vec<u8>> {
        let json = Zeroizing::new(serde_json::to_vec(items)?);
        let sealed = crypto::seal_gcm(&json, &self.list_key)?;
        Ok(STANDARD.encode(sealed).into_bytes())
    }

    /// Decrypts file contents. An empty file is an empty list.
    pub fn open_list(&self, contents: &[u8]) -> Result<Vec<BackupItem>> {
        let text = std::str::from_utf8(contents).map_err(|_| KeywardError::BackupDecryption)?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let sealed = STANDARD
            .decode(text)
            .map_err(|_| KeywardError::BackupDecryption)?;
        let json = crypto::open_gcm(&sealed, &self.list_key)
            .map_err(|_| KeywardError::BackupDecryption)?;
        serde_json::from_slice(&json).map_err(|_| KeywardError::BackupDecryption)
    }

    /// Encrypts a mnemonic under `pin`. Runs Argon2id, so call it off the
    /// async executor.
    pub fn seal_mnemonic(&self, mnemonic: &Mnemonic, pin: &str) -> Result<String> {
        if pin.is_empty() {
            return Err(KeywardError::InvalidInput("backup PIN must not be empty".into()));
        }
        let salt: [u8; SALT_SIZE] = crypto::random_bytes();
        let key = crypto::derive_key(pin.as_bytes(), &salt, self.params)?;
        let phrase = mnemonic.phrase();
        let encrypted = crypto::encrypt(phrase.as_bytes(), &key)?;

        let mut blob = Vec::with_capacity(ENTRY_HEADER_LEN + encrypted.ciphertext.len() + 24);
        blob.push(ENTRY_VERSION);
        blob.extend_from_slice(&self.params.memory_kib.to_be_bytes());
        blob.extend_from_slice(&self.params.iterations.to_be_bytes());
        blob.extend_from_slice(&self.params.parallelism.to_be_bytes());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&encrypted.to_bytes());
        Ok(STANDARD.encode(blob))
    }

    /// Decrypts a mnemonic blob. A wrong PIN and a corrupted blob both give
    /// `BackupDecryption`; a blob never decrypts to a different mnemonic.
    pub fn open_mnemonic(&self, blob: &str, pin: &str) -> Result<Mnemonic> {
        let raw = STANDARD
            .decode(blob.trim())
            .map_err(|_| KeywardError::BackupDecryption)?;
        if raw.len() < ENTRY_HEADER_LEN || raw[0] != ENTRY_VERSION {
            return Err(KeywardError::BackupDecryption);
        }
        let word = |at: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&raw[at..at + 4]);
            u32::from_be_bytes(b)
        };
        let params = Argon2Params {
            memory_kib: word(1),
            iterations: word(5),
            parallelism: word(9),
        };
        if params.memory_kib > MAX_MEMORY_KIB || params.iterations > MAX_ITERATIONS {
            return Err(KeywardError::BackupDecryption);
        }
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&raw[13..ENTRY_HEADER_LEN]);

        let encrypted = EncryptedData::from_bytes(&raw[ENTRY_HEADER_LEN..])
            .map_err(|_| KeywardError::BackupDecryption)?;
        let key = crypto::derive_key(pin.as_bytes(), &salt, params)
            .map_err(|_| KeywardError::BackupDecryption)?;
        let phrase = crypto::decrypt(&encrypted, &key).map_err(|_| KeywardError::BackupDecryption)?;
        let phrase = std::str::from_utf8(&phrase).map_err(|_| KeywardError::BackupDecryption)?;
        Mnemonic::parse(phrase).map_err(|_| KeywardError::BackupDecryption)
    }
}
