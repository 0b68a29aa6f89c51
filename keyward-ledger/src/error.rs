// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use keyward_core::error::KeywardError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    /// Signing or submission failed before the ledger assigned an id.
    #[error("Transaction submission failed: {0}")]
    TransactionSubmission(String),

    #[error("Transaction {id} failed: {message}")]
    TransactionFailed { id: String, message: String },

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Insufficient key weight: {remaining} would remain, {threshold} required")]
    InsufficientKeyWeight { remaining: u32, threshold: u32 },

    #[error("Key index not found: {0}")]
    KeyIndexNotFound(u32),

    #[error("Cannot revoke key {0}: it is the key signing for this session")]
    CannotRevokeCurrentKey(u32),

    #[error("Key is not registered on account {0}")]
    KeyNotRegistered(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("No active session")]
    NoSession,

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Account registry error: {0}")]
    Registry(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] KeywardError),
}

impl LedgerError {
    /// Transport failures worth retrying with the same input.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Rpc(_))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LedgerError::Rpc("timeout".into()).is_transient());
        assert!(!LedgerError::KeyIndexNotFound(3).is_transient());
        assert!(!LedgerError::Core(KeywardError::BackupDecryption).is_transient());
    }

    #[test]
    fn test_messages() {
        let e = LedgerError::InsufficientKeyWeight {
            remaining: 500,
            threshold: 1000,
        };
        assert_eq!(
            e.to_string(),
            "Insufficient key weight: 500 would remain, 1000 required"
        );
        let e = LedgerError::TransactionFailed {
            id: "ab12".into(),
            message: "out of gas".into(),
        };
        assert_eq!(e.to_string(), "Transaction ab12 failed: out of gas");
        assert!(!LedgerError::TransactionNotFound("ab12".into()).is_transient());
    }
}
