// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Remote collaborators: the ledger RPC and the account registry.

#![forbid(unsafe_code)]

use async_trait::async_trait;
use keyward_core::algo::{HashAlgorithm, SignatureAlgorithm};
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::error::Result;
use crate::state::TransactionResult;

/// Key changes this crate submits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionBody {
    AddKey {
        public_key: String,
        sign_algo: SignatureAlgorithm,
        hash_algo: HashAlgorithm,
        weight: u32,
    },
    RevokeKey {
        index: u32,
    },
}

/// The signed part of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub address: String,
    pub key_index: u32,
    pub sequence_number: u64,
    pub body: TransactionBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// JSON encoding of a [`TransactionEnvelope`].
    pub payload: Vec<u8>,
    /// Raw `r || s` over the transaction domain tag and `payload`.
    pub signature: Vec<u8>,
}

impl SignedTransaction {
    pub fn envelope(&self) -> Result<TransactionEnvelope> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit_transaction(&self, tx: SignedTransaction) -> Result<String>;

    async fn get_transaction_status(&self, id: &str) -> Result<TransactionResult>;

    async fn get_account(&self, address: &str) -> Result<Account>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub name: String,
    pub platform: String,
}

/// Key description sent to the account registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountKeyPayload {
    pub public_key: String,
    pub sign_algo: SignatureAlgorithm,
    pub hash_algo: HashAlgorithm,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub signature: String,
    pub account_key: AccountKeyPayload,
    pub device_info: DeviceInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterKeyRequest {
    pub account_key: AccountKeyPayload,
    pub device_info: DeviceInfo,
}

#[async_trait]
pub trait AccountRegistry: Send + Sync {
    /// Returns a custom auth token.
    async fn login(&self, request: LoginRequest) -> Result<String>;

    /// Returns the address the key was attached to.
    async fn register_key(&self, request: RegisterKeyRequest) -> Result<String>;
}
