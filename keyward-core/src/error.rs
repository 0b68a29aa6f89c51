// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use thiserror::Error;

/// Errors surfaced by key storage, signing and backup operations.
///
/// Library failures (redb, AEAD, serde) are converted into these variants at
/// the component boundary so callers can branch on the kind of failure.
#[derive(Error, Debug)]
pub enum KeywardError {
    #[error("No usable key found for {0}")]
    KeyNotFound(String),

    #[error("Key {0} is hardware isolated and cannot be exported")]
    KeyNotExtractable(String),

    #[error("User authentication required before key {0} can sign")]
    AuthenticationRequired(String),

    #[error("Backup I/O error: {0}")]
    BackupIo(String),

    #[error("Backup decryption failed - wrong PIN or corrupted data")]
    BackupDecryption,

    #[error("No backup found for user {0}")]
    BackupNotFound(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key already exists: {0}")]
    KeyAlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption failed - wrong password or corrupted data")]
    DecryptionFailed,

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Keystore error: {0}")]
    Keystore(String),

    #[error("Key migration failed: {0}")]
    Migration(#[from] MigrationError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),

    #[error("Home directory not found")]
    HomeNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KeywardError {
    /// Whether retrying the same call later may succeed.
    ///
    /// Only transport failures qualify. Decryption and signing failures are
    /// deterministic for a given input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, KeywardError::BackupIo(_) | KeywardError::Io(_))
    }

    pub fn backup_io(msg: impl Into<String>) -> Self {
        KeywardError::BackupIo(msg.into())
    }

    pub fn keystore(msg: impl Into<String>) -> Self {
        KeywardError::Keystore(msg.into())
    }
}

/// Failures while moving a legacy keystore key into current storage.
///
/// None of the variants carry key material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    #[error("legacy key not found: {alias}")]
    LegacyKeyNotFound { alias: String },

    #[error("legacy entry {alias} is not a private key entry")]
    InvalidEntry { alias: String },

    #[error("unsupported key type for {alias}")]
    UnsupportedKeyType { alias: String },

    #[error("invalid private key size: {actual} bytes")]
    InvalidPrivateKeySize { actual: usize },

    #[error("keystore access failed: {0}")]
    KeystoreAccess(String),

    #[error("migrated key for {prefix} does not match the legacy public key")]
    Verification { prefix: String },

    #[error("failed to store migrated key: {0}")]
    Storage(String),
}

impl From<bincode::Error> for KeywardError {
    fn from(e: bincode::Error) -> Self {
        KeywardError::Serialization(e.to_string())
    }
}

impl From<bip32::Error> for KeywardError {
    fn from(e: bip32::Error) -> Self {
        KeywardError::InvalidInput(format!("invalid derivation path: {e}"))
    }
}

impl From<serde_json::Error> for KeywardError {
    fn from(e: serde_json::Error) -> Self {
        KeywardError::Serialization(e.to_string())
    }
}

impl From<redb::DatabaseError> for KeywardError {
    fn from(e: redb::DatabaseError) -> Self {
        KeywardError::Database(e.to_string())
    }
}

impl From<redb::TransactionError> for KeywardError {
    fn from(e: redb::TransactionError) -> Self {
        KeywardError::Database(e.to_string())
    }
}

impl From<redb::TableError> for KeywardError {
    fn from(e: redb::TableError) -> Self {
        KeywardError::Database(e.to_string())
    }
}

impl From<redb::StorageError> for KeywardError {
    fn from(e: redb::StorageError) -> Self {
        KeywardError::Database(e.to_string())
    }
}

impl From<redb::CommitError> for KeywardError {
    fn from(e: redb::CommitError) -> Self {
        KeywardError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KeywardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(KeywardError::backup_io("timeout").is_retryable());
        assert!(!KeywardError::BackupDecryption.is_retryable());
        assert!(!KeywardError::BackupNotFound("u1".into()).is_retryable());
        assert!(!KeywardError::KeyNotExtractable("a".into()).is_retryable());
    }

    #[test]
    fn test_migration_error_hides_key_bytes() {
        let err: KeywardError = MigrationError::InvalidPrivateKeySize { actual: 40 }.into();
        assert_eq!(
            err.to_string(),
            "Key migration failed: invalid private key size: 40 bytes"
        );
    }
}
