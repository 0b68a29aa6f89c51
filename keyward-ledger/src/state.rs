// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transaction lifecycle.
//!
//! `Pending -> Executed | Sealed | Error`, `Executed -> Sealed`. `Sealed`
//! and `Error` are terminal. Updates that would move a state backwards or
//! out of a terminal status are ignored, so [`TransactionState::progress`]
//! never decreases.

#![forbid(unsafe_code)]

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Executed,
    Sealed,
    Error,
}

impl TransactionStatus {
    pub fn progress(self) -> f32 {
        match self {
            TransactionStatus::Pending => 0.1,
            TransactionStatus::Executed => 0.6,
            TransactionStatus::Sealed | TransactionStatus::Error => 1.0,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Sealed | TransactionStatus::Error)
    }

    /// Execution has a result, successful or not.
    pub fn is_execute_finished(self) -> bool {
        self != TransactionStatus::Pending
    }

    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Executed) | (Pending, Sealed) | (Pending, Error) | (Executed, Sealed)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Executed => "executed",
            TransactionStatus::Sealed => "sealed",
            TransactionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Ledger-reported status of one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TransactionResult {
    pub fn new(status: TransactionStatus) -> Self {
        Self {
            status,
            error_message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: TransactionStatus::Error,
            error_message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum TransactionType {
    Default = 0,
    Nft = 1,
    TransferCoin = 2,
    AddToken = 3,
    EnableNft = 4,
    TransferNft = 5,
    FclTransaction = 6,
    ClaimDomain = 7,
    StakeFlow = 8,
    RevokeKey = 9,
    AddPublicKey = 10,
    MoveNft = 11,
}

impl From<TransactionType> for u8 {
    fn from(t: TransactionType) -> u8 {
        t as u8
    }
}

impl TryFrom<u8> for TransactionType {
    type Error = String;

    fn try_from(tag: u8) -> std::result::Result<Self, Self::Error> {
        use TransactionType::*;
        Ok(match tag {
            0 => Default,
            1 => Nft,
            2 => TransferCoin,
            3 => AddToken,
            4 => EnableNft,
            5 => TransferNft,
            6 => FclTransaction,
            7 => ClaimDomain,
            8 => StakeFlow,
            9 => RevokeKey,
            10 => AddPublicKey,
            11 => MoveNft,
            other => return Err(format!("unknown transaction type {other}")),
        })
    }
}

/// A tracked transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionState {
    pub id: String,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Opaque display data supplied by the submitter.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl TransactionState {
    pub fn new(id: impl Into<String>, tx_type: TransactionType) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            tx_type,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
            error_message: None,
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn progress(&self) -> f32 {
        self.status.progress()
    }

    pub fn is_processing(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            TransactionStatus::Executed | TransactionStatus::Sealed
        )
    }

    pub fn is_failed(&self) -> bool {
        self.status == TransactionStatus::Error
    }

    /// Applies a ledger result. Returns false when the result does not
    /// advance the state.
    pub fn apply(&mut self, result: &TransactionResult) -> bool {
        if !self.status.can_transition_to(result.status) {
            return false;
        }
        self.status = result.status;
        if result.status == TransactionStatus::Error {
            self.error_message = result.error_message.clone();
        }
        self.updated_at = Utc::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic_along_transitions() {
        use TransactionStatus::*;
        let all = [Pending, Executed, Sealed, Error];
        for from in all {
            for to in all {
                if from.can_transition_to(to) {
                    assert!(to.progress() >= from.progress(), "{from} -> {to}");
                }
            }
        }
    }

    #[test]
    fn test_terminal_states_do_not_move() {
        let mut state = TransactionState::new("a", TransactionType::TransferCoin);
        assert!(state.apply(&TransactionResult::new(TransactionStatus::Executed)));
        assert!(!state.apply(&TransactionResult::new(TransactionStatus::Pending)));
        assert!(!state.apply(&TransactionResult::error("late failure")));
        assert!(state.apply(&TransactionResult::new(TransactionStatus::Sealed)));
        assert!(!state.apply(&TransactionResult::error("after seal")));
        assert_eq!(state.status, TransactionStatus::Sealed);
        assert!(state.is_success());
        assert!(!state.is_processing());
        assert_eq!(state.error_message, None);
    }

    #[test]
    fn test_error_keeps_message() {
        let mut state = TransactionState::new("b", TransactionType::RevokeKey);
        assert!(state.apply(&TransactionResult::error("sequence number mismatch")));
        assert!(state.is_failed());
        assert_eq!(state.progress(), 1.0);
        assert_eq!(
            state.error_message.as_deref(),
            Some("sequence number mismatch")
        );
    }

    #[test]
    fn test_transaction_type_tags() {
        for tag in 0u8..=11 {
            let t = TransactionType::try_from(tag).unwrap();
            assert_eq!(u8::from(t), tag);
        }
        assert!(TransactionType::try_from(12).is_err());
        assert_eq!(
            serde_json::to_string(&TransactionType::AddPublicKey).unwrap(),
            "10"
        );
    }
}
