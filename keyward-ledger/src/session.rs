// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Services for one signed-in wallet, built once at start-up and torn down
//! on logout.

#![forbid(unsafe_code)]

use std::sync::Arc;

use keyward_core::compat::KeyCompatibilityManager;
use keyward_core::mnemonic::Mnemonic;
use keyward_core::provider::CryptoProvider;
use keyward_core::selector::{KeySource, ProviderSelector};
use parking_lot::RwLock;
use tracing::info;

use crate::account::{Account, KeyPolicy};
use crate::client::LedgerClient;
use crate::error::{LedgerError, Result};
use crate::manager::{TransactionManagerConfig, TransactionStateManager};
use crate::registration::{KeyRegistrar, Submission};
use crate::state::TransactionStatus;
use crate::watcher::{WatchHandle, WatchOutcome, Watcher, WatcherConfig};

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    pub transactions: TransactionManagerConfig,
    pub watcher: WatcherConfig,
    pub policy: KeyPolicy,
}

pub struct WalletSession {
    client: Arc<dyn LedgerClient>,
    selector: ProviderSelector,
    transactions: TransactionStateManager,
    registrar: KeyRegistrar,
    account: RwLock<Option<Account>>,
    watcher: WatcherConfig,
}

impl WalletSession {
    pub fn new(
        compat: KeyCompatibilityManager,
        client: Arc<dyn LedgerClient>,
        config: SessionConfig,
    ) -> Self {
        let transactions = TransactionStateManager::new(client.clone(), config.transactions);
        let registrar = KeyRegistrar::with_policy(transactions.clone(), config.policy);
        Self {
            client,
            selector: ProviderSelector::new(compat),
            transactions,
            registrar,
            account: RwLock::new(None),
            watcher: config.watcher,
        }
    }

    pub fn compat(&self) -> &KeyCompatibilityManager {
        self.selector.compat()
    }

    pub fn transactions(&self) -> &TransactionStateManager {
        &self.transactions
    }

    pub fn account(&self) -> Option<Account> {
        self.account.read().clone()
    }

    pub fn current_provider(&self) -> Option<CryptoProvider> {
        self.selector.current()
    }

    /// Selects the provider for `source` and binds it to the account at
    /// `address`. The provider's key must be active on the account.
    pub async fn sign_in(&self, address: &str, source: KeySource) -> Result<CryptoProvider> {
        let account = self.client.get_account(address).await?;
        let provider = self.selector.select(source).await?;
        if account
            .find_by_public_key(&provider.public_key_hex())
            .is_none()
        {
            self.selector.clear();
            return Err(LedgerError::KeyNotRegistered(address.to_string()));
        }
        info!(address, kind = %provider.kind(), "wallet signed in");
        *self.account.write() = Some(account);
        Ok(provider)
    }

    /// Signs in with a mnemonic, deriving on the curve the account uses.
    pub async fn sign_in_with_mnemonic(
        &self,
        address: &str,
        mnemonic: Mnemonic,
    ) -> Result<CryptoProvider> {
        let account = self.client.get_account(address).await?;
        let algorithm = account.preferred_algorithm();
        self.sign_in(address, KeySource::Mnemonic { mnemonic, algorithm })
            .await
    }

    pub async fn refresh_account(&self) -> Result<Account> {
        let address = self.address()?;
        let account = self.client.get_account(&address).await?;
        *self.account.write() = Some(account.clone());
        Ok(account)
    }

    pub async fn add_key(&self, new_key: &CryptoProvider) -> Result<Submission> {
        let (address, provider) = self.active()?;
        self.registrar.add_key(&address, &provider, new_key).await
    }

    pub async fn revoke_key(&self, index: u32) -> Result<Submission> {
        let (address, provider) = self.active()?;
        self.registrar.revoke_key(&address, &provider, index).await
    }

    /// Watches `id`, feeding its statuses into the transaction history.
    pub fn watch<F>(&self, id: &str, callback: F) -> WatchHandle
    where
        F: FnOnce(WatchOutcome) + Send + 'static,
    {
        Watcher::new(self.client.clone(), self.watcher)
            .with_manager(self.transactions.clone())
            .watch(id, callback)
    }

    /// Waits for `id` to reach a final status, feeding the transaction
    /// history on the way. Failure and timeout are `TransactionFailed`.
    pub async fn wait_for(&self, id: &str) -> Result<TransactionStatus> {
        Watcher::new(self.client.clone(), self.watcher)
            .with_manager(self.transactions.clone())
            .wait(id)
            .await
    }

    pub fn logout(&self) {
        self.transactions.clear();
        self.selector.clear();
        self.account.write().take();
        info!("wallet signed out");
    }

    fn address(&self) -> Result<String> {
        self.account
            .read()
            .as_ref()
            .map(|a| a.address.clone())
            .ok_or(LedgerError::NoSession)
    }

    fn active(&self) -> Result<(String, CryptoProvider)> {
        let address = self.address()?;
        let provider = self.selector.current().ok_or(LedgerError::NoSession)?;
        Ok((address, provider))
    }
}
