// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-memory ledger and registry with scripted behavior, for tests and
//! local development.

#![forbid(unsafe_code)]

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use keyward_core::algo::TRANSACTION_DOMAIN_TAG;
use keyward_core::keys::PublicKey;
use parking_lot::Mutex;
use tracing::debug;

use crate::account::{Account, AccountKey};
use crate::client::{
    AccountRegistry, LedgerClient, LoginRequest, RegisterKeyRequest, SignedTransaction,
    TransactionBody,
};
use crate::error::{LedgerError, Result};
use crate::state::{TransactionResult, TransactionStatus};

#[derive(Default)]
struct LedgerInner {
    accounts: HashMap<String, Account>,
    scripts: HashMap<String, VecDeque<TransactionResult>>,
    default_script: Vec<TransactionResult>,
    submitted: Vec<SignedTransaction>,
    next_id: u64,
    status_failures: u32,
    status_calls: usize,
    fail_submissions: bool,
    hold_effects: bool,
}

/// A ledger that verifies signatures and applies key changes immediately.
///
/// Each status query returns the next entry of the transaction's script,
/// repeating the last one once the script is exhausted.
pub struct MemoryLedger {
    inner: Mutex<LedgerInner>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        let inner = LedgerInner {
            default_script: vec![
                TransactionResult::new(TransactionStatus::Pending),
                TransactionResult::new(TransactionStatus::Executed),
                TransactionResult::new(TransactionStatus::Sealed),
            ],
            ..Default::default()
        };
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub fn insert_account(&self, account: Account) {
        self.inner
            .lock()
            .accounts
            .insert(account.address.clone(), account);
    }

    pub fn account(&self, address: &str) -> Option<Account> {
        self.inner.lock().accounts.get(address).cloned()
    }

    /// Script used for transactions submitted from now on.
    pub fn set_default_script(&self, script: Vec<TransactionResult>) {
        self.inner.lock().default_script = script;
    }

    /// Tracks `id` as if it had been submitted elsewhere.
    pub fn script(&self, id: &str, script: Vec<TransactionResult>) {
        self.inner
            .lock()
            .scripts
            .insert(id.to_string(), script.into());
    }

    /// The next `n` status queries fail with a transport error.
    pub fn fail_status_queries(&self, n: u32) {
        self.inner.lock().status_failures = n;
    }

    pub fn set_fail_submissions(&self, fail: bool) {
        self.inner.lock().fail_submissions = fail;
    }

    /// Accept transactions without changing account keys, as if they
    /// were still waiting to execute.
    pub fn set_hold_effects(&self, hold: bool) {
        self.inner.lock().hold_effects = hold;
    }

    pub fn submitted(&self) -> Vec<SignedTransaction> {
        self.inner.lock().submitted.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.inner.lock().status_calls
    }
}

fn verify(account: &Account, tx: &SignedTransaction, key_index: u32) -> Result<()> {
    let key = account
        .key(key_index)
        .filter(|k| k.is_active())
        .ok_or_else(|| LedgerError::TransactionSubmission(format!("key {key_index} not usable")))?;
    let public = PublicKey::from_hex(key.sign_algo, &key.public_key)?;
    let mut message = TRANSACTION_DOMAIN_TAG.to_vec();
    message.extend_from_slice(&tx.payload);
    if !public.verify(&message, key.hash_algo, &tx.signature) {
        return Err(LedgerError::TransactionSubmission(
            "invalid signature".into(),
        ));
    }
    Ok(())
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn submit_transaction(&self, tx: SignedTransaction) -> Result<String> {
        let envelope = tx.envelope()?;
        let mut inner = self.inner.lock();
        if inner.fail_submissions {
            return Err(LedgerError::Rpc("connection refused".into()));
        }

        let account = inner
            .accounts
            .get(&envelope.address)
            .ok_or_else(|| LedgerError::AccountNotFound(envelope.address.clone()))?;
        verify(account, &tx, envelope.key_index)?;
        let signer = account
            .key(envelope.key_index)
            .map(|k| k.sequence_number)
            .unwrap_or_default();
        if signer != envelope.sequence_number {
            return Err(LedgerError::TransactionSubmission(
                "sequence number mismatch".into(),
            ));
        }

        let mut account = account.clone();
        match &envelope.body {
            _ if inner.hold_effects => {}
            TransactionBody::AddKey {
                public_key,
                sign_algo,
                hash_algo,
                weight,
            } => {
                let index = account.next_key_index();
                account.keys.push(AccountKey {
                    index,
                    public_key: public_key.clone(),
                    sign_algo: *sign_algo,
                    hash_algo: *hash_algo,
                    weight: *weight,
                    sequence_number: 0,
                    revoked: false,
                });
            }
            TransactionBody::RevokeKey { index } => {
                if let Some(key) = account.keys.iter_mut().find(|k| k.index == *index) {
                    key.revoked = true;
                }
            }
        }
        if let Some(key) = account
            .keys
            .iter_mut()
            .find(|k| k.index == envelope.key_index)
        {
            key.sequence_number += 1;
        }
        inner.accounts.insert(account.address.clone(), account);

        inner.next_id += 1;
        let id = format!("{:064x}", inner.next_id);
        let script = inner.default_script.clone().into();
        inner.scripts.insert(id.clone(), script);
        inner.submitted.push(tx);
        debug!(id = %id, "transaction accepted");
        Ok(id)
    }

    async fn get_transaction_status(&self, id: &str) -> Result<TransactionResult> {
        let mut inner = self.inner.lock();
        inner.status_calls += 1;
        if inner.status_failures > 0 {
            inner.status_failures -= 1;
            return Err(LedgerError::Rpc("status query timed out".into()));
        }
        let script = inner
            .scripts
            .get_mut(id)
            .ok_or_else(|| LedgerError::TransactionNotFound(id.to_string()))?;
        let result = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        result.ok_or_else(|| LedgerError::Rpc(format!("no status for {id}")))
    }

    async fn get_account(&self, address: &str) -> Result<Account> {
        self.account(address)
            .ok_or_else(|| LedgerError::AccountNotFound(address.to_string()))
    }
}

/// Registry that records requests and answers with fixed values.
#[derive(Default)]
pub struct MemoryRegistry {
    logins: Mutex<Vec<LoginRequest>>,
    registrations: Mutex<Vec<RegisterKeyRequest>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logins(&self) -> Vec<LoginRequest> {
        self.logins.lock().clone()
    }

    pub fn registrations(&self) -> Vec<RegisterKeyRequest> {
        self.registrations.lock().clone()
    }
}

#[async_trait]
impl AccountRegistry for MemoryRegistry {
    async fn login(&self, request: LoginRequest) -> Result<String> {
        let token = format!("token-{}", request.device_info.device_id);
        self.logins.lock().push(request);
        Ok(token)
    }

    async fn register_key(&self, request: RegisterKeyRequest) -> Result<String> {
        let mut registrations = self.registrations.lock();
        registrations.push(request);
        Ok(format!("0x{:016x}", registrations.len()))
    }
}
