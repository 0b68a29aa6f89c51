// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Adding and revoking account keys.
//!
//! Both operations are signed by the key that is currently authorized on
//! the account, never by the key being changed, and are tracked by the
//! [`TransactionStateManager`].

#![forbid(unsafe_code)]

use std::collections::HashMap;

use keyward_core::error::KeywardError;
use keyward_core::provider::CryptoProvider;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::account::{Account, AccountKey, KeyPolicy};
use crate::client::{SignedTransaction, TransactionBody, TransactionEnvelope};
use crate::error::{LedgerError, Result};
use crate::manager::TransactionStateManager;
use crate::state::{TransactionState, TransactionType};

/// What a registration call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Submitted(String),
    /// The same change is already on its way; carries its transaction id.
    InFlight(String),
    /// The account already reflects the change.
    AlreadyApplied,
}

impl Submission {
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            Submission::Submitted(id) | Submission::InFlight(id) => Some(id),
            Submission::AlreadyApplied => None,
        }
    }
}

pub struct KeyRegistrar {
    manager: TransactionStateManager,
    policy: KeyPolicy,
    revokes: Mutex<HashMap<(String, u32), String>>,
}

impl KeyRegistrar {
    pub fn new(manager: TransactionStateManager) -> Self {
        Self::with_policy(manager, KeyPolicy::default())
    }

    pub fn with_policy(manager: TransactionStateManager, policy: KeyPolicy) -> Self {
        Self {
            manager,
            policy,
            revokes: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> KeyPolicy {
        self.policy
    }

    /// Revokes submitted by this registrar that are still processing.
    pub fn revokes_in_flight(&self) -> usize {
        self.prune_revokes();
        self.revokes.lock().len()
    }

    fn prune_revokes(&self) {
        self.revokes
            .lock()
            .retain(|_, id| self.manager.get(id).is_some_and(|s| s.is_processing()));
    }

    /// Registers `new_key` on the account at `address`, signed by
    /// `authorizer`.
    pub async fn add_key(
        &self,
        address: &str,
        authorizer: &CryptoProvider,
        new_key: &CryptoProvider,
    ) -> Result<Submission> {
        let account = self.manager.client().get_account(address).await?;
        let public_key = new_key.public_key_hex();
        if account.find_by_public_key(&public_key).is_some() {
            debug!(address, "key already registered");
            return Ok(Submission::AlreadyApplied);
        }

        let body = TransactionBody::AddKey {
            public_key,
            sign_algo: new_key.signature_algorithm(),
            hash_algo: new_key.hash_algorithm(),
            weight: new_key.key_weight(),
        };
        let id = self
            .submit(&account, authorizer, body, TransactionType::AddPublicKey)
            .await?;
        Ok(Submission::Submitted(id))
    }

    /// Revokes the key at `index`.
    ///
    /// Rejected before anything is sent when the remaining active weight
    /// would fall below the policy threshold, or when `index` is the key
    /// `authorizer` signs with.
    pub async fn revoke_key(
        &self,
        address: &str,
        authorizer: &CryptoProvider,
        index: u32,
    ) -> Result<Submission> {
        self.prune_revokes();
        let account = self.manager.client().get_account(address).await?;
        let key = account
            .key(index)
            .ok_or(LedgerError::KeyIndexNotFound(index))?;
        let slot = (address.to_string(), index);
        if key.revoked {
            self.revokes.lock().remove(&slot);
            debug!(address, index, "key already revoked");
            return Ok(Submission::AlreadyApplied);
        }

        let in_flight = self.revokes.lock().get(&slot).cloned();
        if let Some(id) = in_flight {
            if self.manager.get(&id).is_some_and(|s| s.is_processing()) {
                debug!(address, index, id = %id, "revoke already in flight");
                return Ok(Submission::InFlight(id));
            }
        }

        let remaining = account.active_weight().saturating_sub(key.weight);
        if remaining < self.policy.threshold {
            return Err(LedgerError::InsufficientKeyWeight {
                remaining,
                threshold: self.policy.threshold,
            });
        }
        if key.matches(&authorizer.public_key_hex()) {
            return Err(LedgerError::CannotRevokeCurrentKey(index));
        }

        let id = self
            .submit(
                &account,
                authorizer,
                TransactionBody::RevokeKey { index },
                TransactionType::RevokeKey,
            )
            .await?;
        self.revokes.lock().insert(slot, id.clone());
        Ok(Submission::Submitted(id))
    }

    async fn submit(
        &self,
        account: &Account,
        authorizer: &CryptoProvider,
        body: TransactionBody,
        tx_type: TransactionType,
    ) -> Result<String> {
        let signer = signing_key(account, authorizer)?;
        let envelope = TransactionEnvelope {
            address: account.address.clone(),
            key_index: signer.index,
            sequence_number: signer.sequence_number,
            body,
        };
        let payload = serde_json::to_vec(&envelope)?;
        let signature = authorizer
            .sign_transaction(&payload)
            .await
            .map_err(|e| match e {
                KeywardError::AuthenticationRequired(_) => LedgerError::Core(e),
                other => LedgerError::TransactionSubmission(other.to_string()),
            })?;

        let id = self
            .manager
            .client()
            .submit_transaction(SignedTransaction { payload, signature })
            .await
            .map_err(|e| match e {
                LedgerError::TransactionSubmission(_) => e,
                other => LedgerError::TransactionSubmission(other.to_string()),
            })?;

        let data = serde_json::to_value(&envelope.body)?;
        self.manager
            .new_transaction(TransactionState::new(id.clone(), tx_type).with_data(data));
        info!(address = %account.address, id = %id, tx_type = ?tx_type, "key change submitted");
        Ok(id)
    }
}

fn signing_key<'a>(account: &'a Account, authorizer: &CryptoProvider) -> Result<&'a AccountKey> {
    account
        .find_by_public_key(&authorizer.public_key_hex())
        .ok_or_else(|| LedgerError::KeyNotRegistered(account.address.clone()))
}
