// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use parking_lot::RwLock;
use tracing::debug;

use crate::algo::SignatureAlgorithm;
use crate::compat::KeyCompatibilityManager;
use crate::error::Result;
use crate::mnemonic::Mnemonic;
use crate::provider::{CryptoProvider, ImportedKeyProvider, MnemonicProvider};

/// Where the active account's signing key comes from.
pub enum KeySource {
    /// Key decoded from a keystore file or raw private key.
    Imported(ImportedKeyProvider),
    /// Account keyed by a user prefix in current or legacy storage.
    Prefix(String),
    Mnemonic {
        mnemonic: Mnemonic,
        algorithm: SignatureAlgorithm,
    },
}

/// Picks the current provider for the active account and caches it.
pub struct ProviderSelector {
    compat: KeyCompatibilityManager,
    current: RwLock<Option<CryptoProvider>>,
}

impl ProviderSelector {
    pub fn new(compat: KeyCompatibilityManager) -> Self {
        Self {
            compat,
            current: RwLock::new(None),
        }
    }

    pub fn compat(&self) -> &KeyCompatibilityManager {
        &self.compat
    }

    /// Builds a provider for `source` and makes it current, replacing any
    /// previous one.
    pub async fn select(&self, source: KeySource) -> Result<CryptoProvider> {
        let provider = match source {
            KeySource::Imported(p) => CryptoProvider::Imported(p),
            KeySource::Prefix(prefix) => self.compat.signing_provider(&prefix).await?,
            KeySource::Mnemonic {
                mnemonic,
                algorithm,
            } => CryptoProvider::Mnemonic(MnemonicProvider::new(&mnemonic, algorithm)?),
        };
        debug!(kind = %provider.kind(), "selected signing provider");
        *self.current.write() = Some(provider.clone());
        Ok(provider)
    }

    pub fn current(&self) -> Option<CryptoProvider> {
        self.current.read().clone()
    }

    pub fn set_current(&self, provider: CryptoProvider) {
        *self.current.write() = Some(provider);
    }

    pub fn clear(&self) {
        self.current.write().take();
    }
}

/// Curve for a mnemonic wallet given the algorithms of its on-chain keys.
/// secp256k1 wins whenever any key uses it, and when there are none.
pub fn preferred_algorithm<I>(on_chain: I) -> SignatureAlgorithm
where
    I: IntoIterator<Item = SignatureAlgorithm>,
{
    let mut saw_any = false;
    for algorithm in on_chain {
        if algorithm == SignatureAlgorithm::EcdsaSecp256k1 {
            return algorithm;
        }
        saw_any = true;
    }
    if saw_any {
        SignatureAlgorithm::EcdsaP256
    } else {
        SignatureAlgorithm::EcdsaSecp256k1
    }
}
