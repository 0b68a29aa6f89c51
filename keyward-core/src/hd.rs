// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Hierarchical key derivation for NIST P-256 and secp256k1.
//!
//! secp256k1 is plain BIP-32 through the `bip32` crate. P-256 follows
//! SLIP-0010: the same child rules under the `Nist256p1 seed` master key,
//! where a candidate scalar that is zero or not below the curve order is
//! retried with `0x01 || IR || ser32(i)`.

#![forbid(unsafe_code)]

use bip32::XPrv;
use hmac::{Hmac, Mac};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::elliptic_curve::PrimeField;
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::algo::SignatureAlgorithm;
use crate::error::{KeywardError, Result};
use crate::keys::KeyPair;
use crate::mnemonic::Mnemonic;

pub use bip32::DerivationPath;

type HmacSha512 = Hmac<Sha512>;

const P256_SEED_KEY: &[u8] = b"Nist256p1 seed";
const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Path of the wallet's primary signing key.
pub const PRIMARY_PATH: &str = "m/44'/539'/0'/0/0";
/// Path of the partial-authority backup key. Differs from the primary path
/// in the account index.
pub const BACKUP_PATH: &str = "m/44'/539'/1'/0/0";

struct ExtendedKey {
    key: Zeroizing<[u8; 32]>,
    chain_code: Zeroizing<[u8; 32]>,
}

fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<Zeroizing<[u8; 64]>> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| KeywardError::Crypto(format!("HMAC init failed: {e}")))?;
    mac.update(data);
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn p256_scalar(bytes: &[u8]) -> Option<p256::Scalar> {
    Option::from(p256::Scalar::from_repr(p256::FieldBytes::clone_from_slice(bytes)))
}

/// `il` as a valid secret scalar, or `None` when it is zero or `>= n`.
fn p256_candidate(il: &[u8], parent: Option<&[u8; 32]>) -> Option<Zeroizing<[u8; 32]>> {
    let mut scalar = p256_scalar(il)?;
    if let Some(parent) = parent {
        scalar += p256_scalar(parent)?;
    }
    if scalar == p256::Scalar::ZERO {
        return None;
    }
    let mut out = Zeroizing::new([0u8; 32]);
    out.copy_from_slice(&scalar.to_repr());
    Some(out)
}

fn split(i: &[u8; 64]) -> (&[u8], Zeroizing<[u8; 32]>) {
    let mut chain_code = Zeroizing::new([0u8; 32]);
    chain_code.copy_from_slice(&i[32..]);
    (&i[..32], chain_code)
}

fn p256_master(seed: &[u8]) -> Result<ExtendedKey> {
    let mut i = hmac_sha512(P256_SEED_KEY, seed)?;
    loop {
        let (il, chain_code) = split(&i);
        if let Some(key) = p256_candidate(il, None) {
            return Ok(ExtendedKey { key, chain_code });
        }
        let data = Zeroizing::new(i.to_vec());
        i = hmac_sha512(P256_SEED_KEY, &data)?;
    }
}

fn p256_compressed_public(secret: &[u8; 32]) -> Result<[u8; 33]> {
    let sk = p256::SecretKey::from_slice(secret)
        .map_err(|_| KeywardError::Crypto("invalid derived scalar".into()))?;
    let point = sk.public_key().to_encoded_point(true);
    let mut out = [0u8; 33];
    out.copy_from_slice(point.as_bytes());
    Ok(out)
}

fn p256_child(parent: &ExtendedKey, index: u32) -> Result<ExtendedKey> {
    let mut data = Zeroizing::new(Vec::with_capacity(37));
    if index & HARDENED_OFFSET != 0 {
        data.push(0x00);
        data.extend_from_slice(parent.key.as_slice());
    } else {
        data.extend_from_slice(&p256_compressed_public(&parent.key)?);
    }
    data.extend_from_slice(&index.to_be_bytes());

    loop {
        let i = hmac_sha512(parent.chain_code.as_slice(), &data)?;
        let (il, chain_code) = split(&i);
        if let Some(key) = p256_candidate(il, Some(&parent.key)) {
            return Ok(ExtendedKey { key, chain_code });
        }
        data.clear();
        data.push(0x01);
        data.extend_from_slice(chain_code.as_slice());
        data.extend_from_slice(&index.to_be_bytes());
    }
}

fn derive_p256(seed: &[u8], path: &DerivationPath) -> Result<Zeroizing<[u8; 32]>> {
    let mut node = p256_master(seed)?;
    for child in path.iter() {
        node = p256_child(&node, u32::from(child))?;
    }
    Ok(node.key)
}

fn derive_secp256k1(seed: &[u8], path: &DerivationPath) -> Result<Zeroizing<[u8; 32]>> {
    let xprv = XPrv::derive_from_path(seed, path)
        .map_err(|e| KeywardError::Crypto(format!("BIP-32 derivation failed: {e}")))?;
    let mut out = Zeroizing::new([0u8; 32]);
    out.copy_from_slice(&xprv.private_key().to_bytes());
    Ok(out)
}

/// Derives the private scalar at `path` from a BIP-39 seed.
pub fn derive_scalar(
    seed: &[u8],
    algorithm: SignatureAlgorithm,
    path: &DerivationPath,
) -> Result<Zeroizing<[u8; 32]>> {
    match algorithm {
        SignatureAlgorithm::EcdsaP256 => derive_p256(seed, path),
        SignatureAlgorithm::EcdsaSecp256k1 => derive_secp256k1(seed, path),
    }
}

/// Derives the key pair at `path` from a mnemonic with an empty passphrase.
pub fn derive_key_pair(
    mnemonic: &Mnemonic,
    algorithm: SignatureAlgorithm,
    path: &DerivationPath,
) -> Result<KeyPair> {
    let seed = mnemonic.to_seed("");
    let scalar = derive_scalar(seed.as_slice(), algorithm, path)?;
    KeyPair::from_scalar(algorithm, scalar.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mnemonic::ABANDON_12;

    const SEED_1: &str = "000102030405060708090a0b0c0d0e0f";

    fn scalar_hex(algorithm: SignatureAlgorithm, path: &str) -> String {
        let seed = hex::decode(SEED_1).unwrap();
        let path: DerivationPath = path.parse().unwrap();
        hex::encode(derive_scalar(&seed, algorithm, &path).unwrap().as_slice())
    }

    #[test]
    fn test_path_parse_and_display() {
        let path: DerivationPath = PRIMARY_PATH.parse().unwrap();
        let indices: Vec<u32> = path.iter().map(u32::from).collect();
        assert_eq!(
            indices,
            vec![44 | HARDENED_OFFSET, 539 | HARDENED_OFFSET, HARDENED_OFFSET, 0, 0]
        );
        assert_eq!(path.to_string(), PRIMARY_PATH);
        assert!("44'/0".parse::<DerivationPath>().is_err());
        assert!("m/x".parse::<DerivationPath>().is_err());
        assert!("m/2147483648".parse::<DerivationPath>().is_err());
    }

    #[test]
    fn test_secp256k1_bip32_vector_1() {
        let algo = SignatureAlgorithm::EcdsaSecp256k1;
        assert_eq!(
            scalar_hex(algo, "m"),
            "e8f32e723decf4051aefac8e2c93c5c5b214313817cdb01a1494b917c8436b35"
        );
        assert_eq!(
            scalar_hex(algo, "m/0'"),
            "edb2e14f9ee77d26dd93b4ecede8d16ed408ce149b6cd80b0715a2d911a0afea"
        );
        assert_eq!(
            scalar_hex(algo, "m/0'/1"),
            "3c6cb8d0f6a264c91ea8b5030fadaa8e538b020f0a387421a12de9319dc93368"
        );
    }

    #[test]
    fn test_p256_slip10_master() {
        assert_eq!(
            scalar_hex(SignatureAlgorithm::EcdsaP256, "m"),
            "612091aaa12e22dd2abef664f8a01a82cae99ad7441b7ef8110424915c268bc2"
        );
    }

    #[test]
    fn test_primary_and_backup_paths_differ() {
        let mnemonic = Mnemonic::parse(ABANDON_12).unwrap();
        for algo in [SignatureAlgorithm::EcdsaP256, SignatureAlgorithm::EcdsaSecp256k1] {
            let primary = derive_key_pair(&mnemonic, algo, &PRIMARY_PATH.parse().unwrap()).unwrap();
            let again = derive_key_pair(&mnemonic, algo, &PRIMARY_PATH.parse().unwrap()).unwrap();
            let backup = derive_key_pair(&mnemonic, algo, &BACKUP_PATH.parse().unwrap()).unwrap();
            assert_eq!(primary.public_key(), again.public_key());
            assert_ne!(primary.public_key(), backup.public_key());
        }
    }
}
