// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use keyward_core::algo::{HashAlgorithm, SignatureAlgorithm, FULL_KEY_WEIGHT};
use keyward_core::keys::normalize_public_key_hex;
use keyward_core::selector::preferred_algorithm;
use serde::{Deserialize, Serialize};

/// A key registered on a ledger account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountKey {
    pub index: u32,
    pub public_key: String,
    pub sign_algo: SignatureAlgorithm,
    pub hash_algo: HashAlgorithm,
    pub weight: u32,
    pub sequence_number: u64,
    pub revoked: bool,
}

impl AccountKey {
    pub fn is_active(&self) -> bool {
        !self.revoked
    }

    pub fn matches(&self, public_key: &str) -> bool {
        normalize_public_key_hex(&self.public_key) == normalize_public_key_hex(public_key)
    }
}

/// Local mirror of a ledger account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub keys: Vec<AccountKey>,
}

impl Account {
    pub fn active_keys(&self) -> impl Iterator<Item = &AccountKey> {
        self.keys.iter().filter(|k| k.is_active())
    }

    pub fn active_weight(&self) -> u32 {
        self.active_keys().map(|k| k.weight).sum()
    }

    pub fn key(&self, index: u32) -> Option<&AccountKey> {
        self.keys.iter().find(|k| k.index == index)
    }

    /// The active key with this public key, if any.
    pub fn find_by_public_key(&self, public_key: &str) -> Option<&AccountKey> {
        self.active_keys().find(|k| k.matches(public_key))
    }

    /// Active public keys, as used by backup status checks.
    pub fn active_public_keys(&self) -> Vec<String> {
        self.active_keys().map(|k| k.public_key.clone()).collect()
    }

    /// Curve a mnemonic wallet should derive for this account.
    pub fn preferred_algorithm(&self) -> SignatureAlgorithm {
        preferred_algorithm(self.active_keys().map(|k| k.sign_algo))
    }

    pub fn next_key_index(&self) -> u32 {
        self.keys.iter().map(|k| k.index + 1).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPolicy {
    /// Active weight an account needs to authorize a transaction.
    pub threshold: u32,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            threshold: FULL_KEY_WEIGHT,
        }
    }
}

impl KeyPolicy {
    pub fn can_authorize(&self, account: &Account) -> bool {
        account.active_weight() >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(index: u32, public_key: &str, weight: u32, revoked: bool) -> AccountKey {
        AccountKey {
            index,
            public_key: public_key.to_string(),
            sign_algo: SignatureAlgorithm::EcdsaP256,
            hash_algo: HashAlgorithm::Sha3_256,
            weight,
            sequence_number: 0,
            revoked,
        }
    }

    #[test]
    fn test_weights_ignore_revoked() {
        let account = Account {
            address: "0x01".into(),
            keys: vec![
                key(0, "aa", 1000, true),
                key(1, "bb", 1000, false),
                key(2, "cc", 500, false),
            ],
        };
        assert_eq!(account.active_weight(), 1500);
        assert!(KeyPolicy::default().can_authorize(&account));
        assert!(account.find_by_public_key("AA").is_none());
        assert_eq!(account.find_by_public_key("0xBB").unwrap().index, 1);
        assert_eq!(account.next_key_index(), 3);
        assert_eq!(account.active_public_keys(), vec!["bb", "cc"]);
    }

    #[test]
    fn test_preferred_algorithm_from_keys() {
        let mut account = Account {
            address: "0x01".into(),
            keys: vec![key(0, "aa", 1000, false)],
        };
        assert_eq!(account.preferred_algorithm(), SignatureAlgorithm::EcdsaP256);
        account.keys.push(AccountKey {
            sign_algo: SignatureAlgorithm::EcdsaSecp256k1,
            ..key(1, "bb", 1000, false)
        });
        assert_eq!(
            account.preferred_algorithm(),
            SignatureAlgorithm::EcdsaSecp256k1
        );
    }
}
