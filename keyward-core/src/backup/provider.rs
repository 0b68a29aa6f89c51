// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use crate::algo::{HashAlgorithm, SignatureAlgorithm, BACKUP_KEY_WEIGHT};
use crate::error::Result;
use crate::hd::{self, DerivationPath, BACKUP_PATH};
use crate::keys::{KeyPair, PublicKey};
use crate::mnemonic::Mnemonic;

/// Partial-authority key derived from the wallet mnemonic on the backup
/// path. It registers the backup on the account; its weight alone cannot
/// authorize a transaction.
#[derive(Clone)]
pub struct BackupCryptoProvider {
    key: KeyPair,
    hash: HashAlgorithm,
    weight: u32,
}

impl BackupCryptoProvider {
    pub fn from_mnemonic(mnemonic: &Mnemonic, algorithm: SignatureAlgorithm) -> Result<Self> {
        let path: DerivationPath = BACKUP_PATH.parse()?;
        let key = hd::derive_key_pair(mnemonic, algorithm, &path)?;
        Ok(Self {
            hash: algorithm.default_hash(),
            key,
            weight: BACKUP_KEY_WEIGHT,
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        self.key.public_key()
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash
    }

    pub fn key_weight(&self) -> u32 {
        self.weight
    }

    pub(crate) fn key_pair(&self) -> &KeyPair {
        &self.key
    }
}
