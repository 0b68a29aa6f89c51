// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Signature and hash algorithm identifiers as the ledger numbers them,
//! plus the domain separation tags prepended before signing.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sha3::{Digest, Sha3_256};

use crate::error::{KeywardError, Result};

/// Weight of a key that can authorize transactions on its own.
pub const FULL_KEY_WEIGHT: u32 = 1000;
/// Weight assigned to the backup key derived from the mnemonic.
pub const BACKUP_KEY_WEIGHT: u32 = 500;

pub const DOMAIN_TAG_LEN: usize = 32;

/// Prefix for user (login) signatures.
pub const USER_DOMAIN_TAG: [u8; DOMAIN_TAG_LEN] = domain_tag(b"FLOW-V0.0-user");
/// Prefix for transaction envelope signatures.
pub const TRANSACTION_DOMAIN_TAG: [u8; DOMAIN_TAG_LEN] = domain_tag(b"FLOW-V0.0-transaction");

const fn domain_tag(name: &[u8]) -> [u8; DOMAIN_TAG_LEN] {
    let mut tag = [0u8; DOMAIN_TAG_LEN];
    let mut i = 0;
    while i < name.len() {
        tag[i] = name[i];
        i += 1;
    }
    tag
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum SignatureAlgorithm {
    EcdsaP256,
    EcdsaSecp256k1,
}

impl SignatureAlgorithm {
    pub fn index(self) -> u32 {
        match self {
            SignatureAlgorithm::EcdsaP256 => 1,
            SignatureAlgorithm::EcdsaSecp256k1 => 2,
        }
    }

    pub fn from_index(index: u32) -> Result<Self> {
        match index {
            1 => Ok(SignatureAlgorithm::EcdsaP256),
            2 => Ok(SignatureAlgorithm::EcdsaSecp256k1),
            other => Err(KeywardError::InvalidInput(format!(
                "unknown signature algorithm index {other}"
            ))),
        }
    }

    /// The hash a hardware keystore pairs with this curve.
    pub fn default_hash(self) -> HashAlgorithm {
        match self {
            SignatureAlgorithm::EcdsaP256 => HashAlgorithm::Sha3_256,
            SignatureAlgorithm::EcdsaSecp256k1 => HashAlgorithm::Sha2_256,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureAlgorithm::EcdsaP256 => f.write_str("ECDSA_P256"),
            SignatureAlgorithm::EcdsaSecp256k1 => f.write_str("ECDSA_secp256k1"),
        }
    }
}

impl From<SignatureAlgorithm> for u32 {
    fn from(algo: SignatureAlgorithm) -> u32 {
        algo.index()
    }
}

impl TryFrom<u32> for SignatureAlgorithm {
    type Error = KeywardError;

    fn try_from(index: u32) -> Result<Self> {
        Self::from_index(index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum HashAlgorithm {
    Sha2_256,
    Sha3_256,
}

impl HashAlgorithm {
    pub fn index(self) -> u32 {
        match self {
            HashAlgorithm::Sha2_256 => 1,
            HashAlgorithm::Sha3_256 => 3,
        }
    }

    pub fn from_index(index: u32) -> Result<Self> {
        match index {
            1 => Ok(HashAlgorithm::Sha2_256),
            3 => Ok(HashAlgorithm::Sha3_256),
            other => Err(KeywardError::InvalidInput(format!(
                "unknown hash algorithm index {other}"
            ))),
        }
    }

    pub fn digest(self, data: &[u8]) -> [u8; 32] {
        match self {
            HashAlgorithm::Sha2_256 => Sha256::digest(data).into(),
            HashAlgorithm::Sha3_256 => Sha3_256::digest(data).into(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha2_256 => f.write_str("SHA2_256"),
            HashAlgorithm::Sha3_256 => f.write_str("SHA3_256"),
        }
    }
}

impl From<HashAlgorithm> for u32 {
    fn from(algo: HashAlgorithm) -> u32 {
        algo.index()
    }
}

impl TryFrom<u32> for HashAlgorithm {
    type Error = KeywardError;

    fn try_from(index: u32) -> Result<Self> {
        Self::from_index(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_tags_are_zero_padded() {
        assert_eq!(&USER_DOMAIN_TAG[..14], b"FLOW-V0.0-user");
        assert!(USER_DOMAIN_TAG[14..].iter().all(|&b| b == 0));
        assert_eq!(&TRANSACTION_DOMAIN_TAG[..21], b"FLOW-V0.0-transaction");
        assert!(TRANSACTION_DOMAIN_TAG[21..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_algorithm_indexes() {
        for algo in [SignatureAlgorithm::EcdsaP256, SignatureAlgorithm::EcdsaSecp256k1] {
            assert_eq!(SignatureAlgorithm::from_index(algo.index()).unwrap(), algo);
        }
        assert!(SignatureAlgorithm::from_index(0).is_err());
        assert!(HashAlgorithm::from_index(2).is_err());
        assert_eq!(serde_json::to_string(&HashAlgorithm::Sha3_256).unwrap(), "3");
    }

    #[test]
    fn test_sha2_known_digest() {
        assert_eq!(
            hex::encode(HashAlgorithm::Sha2_256.digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            hex::encode(HashAlgorithm::Sha3_256.digest(b"abc")),
            "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532"
        );
    }
}
