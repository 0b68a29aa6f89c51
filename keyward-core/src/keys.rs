// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! EC key pairs for the two curves the ledger accepts.
//!
//! Public keys travel as 64 bytes (`x || y`, no SEC1 prefix) and are shown
//! as 128 lowercase hex characters. Signatures are raw 64-byte `r || s`.

#![forbid(unsafe_code)]

use std::fmt;

use zeroize::Zeroizing;

use crate::algo::{HashAlgorithm, SignatureAlgorithm};
use crate::crypto::KEY_SIZE;
use crate::error::{KeywardError, Result};

pub const PUBLIC_KEY_LEN: usize = 64;
pub const SIGNATURE_LEN: usize = 64;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    algorithm: SignatureAlgorithm,
    bytes: [u8; PUBLIC_KEY_LEN],
}

impl PublicKey {
    /// Parses a public key in any of the forms the ledger and backups use:
    /// optional `0x`, optional `04` SEC1 prefix, or a compressed point.
    pub fn from_hex(algorithm: SignatureAlgorithm, s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(s).map_err(|_| KeywardError::InvalidKey("invalid hex".into()))?;
        Self::from_bytes(algorithm, &raw)
    }

    pub fn from_bytes(algorithm: SignatureAlgorithm, raw: &[u8]) -> Result<Self> {
        let sec1 = match raw.len() {
            PUBLIC_KEY_LEN => {
                let mut v = Vec::with_capacity(65);
                v.push(0x04);
                v.extend_from_slice(raw);
                v
            }
            33 | 65 => raw.to_vec(),
            n => {
                return Err(KeywardError::InvalidKey(format!(
                    "invalid public key length {n}"
                )))
            }
        };
        let uncompressed = match algorithm {
            SignatureAlgorithm::EcdsaP256 => {
                use p256::elliptic_curve::sec1::ToEncodedPoint;
                p256::PublicKey::from_sec1_bytes(&sec1)
                    .map_err(|_| KeywardError::InvalidKey("not a P-256 point".into()))?
                    .to_encoded_point(false)
                    .as_bytes()
                    .to_vec()
            }
            SignatureAlgorithm::EcdsaSecp256k1 => {
                use k256::elliptic_curve::sec1::ToEncodedPoint;
                k256::PublicKey::from_sec1_bytes(&sec1)
                    .map_err(|_| KeywardError::InvalidKey("not a secp256k1 point".into()))?
                    .to_encoded_point(false)
                    .as_bytes()
                    .to_vec()
            }
        };
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        bytes.copy_from_slice(&uncompressed[1..]);
        Ok(Self { algorithm, bytes })
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Verifies a raw `r || s` signature over `hash(data)`.
    pub fn verify(&self, data: &[u8], hash: HashAlgorithm, signature: &[u8]) -> bool {
        let digest = hash.digest(data);
        let mut sec1 = [0u8; PUBLIC_KEY_LEN + 1];
        sec1[0] = 0x04;
        sec1[1..].copy_from_slice(&self.bytes);

        match self.algorithm {
            SignatureAlgorithm::EcdsaP256 => {
                use p256::ecdsa::signature::hazmat::PrehashVerifier;
                let Ok(vk) = p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1) else {
                    return false;
                };
                let Ok(sig) = p256::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                vk.verify_prehash(&digest, &sig).is_ok()
            }
            SignatureAlgorithm::EcdsaSecp256k1 => {
                use k256::ecdsa::signature::hazmat::PrehashVerifier;
                let Ok(vk) = k256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1) else {
                    return false;
                };
                let Ok(sig) = k256::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                let sig = sig.normalize_s().unwrap_or(sig);
                vk.verify_prehash(&digest, &sig).is_ok()
            }
        }
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("algorithm", &self.algorithm)
            .field("hex", &self.to_hex())
            .finish()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Canonical comparison form for public key strings: no `0x`, no `04`
/// SEC1 prefix on uncompressed keys, lowercase.
pub fn normalize_public_key_hex(s: &str) -> String {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    let s = if s.len() == 2 * (PUBLIC_KEY_LEN + 1) {
        s.strip_prefix("04").unwrap_or(s)
    } else {
        s
    };
    s.to_ascii_lowercase()
}

/// A private scalar together with its curve and cached public key.
#[derive(Clone)]
pub struct KeyPair {
    algorithm: SignatureAlgorithm,
    secret: Zeroizing<[u8; KEY_SIZE]>,
    public: PublicKey,
}

impl KeyPair {
    pub fn generate(algorithm: SignatureAlgorithm) -> Result<Self> {
        let mut rng = rand::rngs::OsRng;
        let secret: [u8; KEY_SIZE] = match algorithm {
            SignatureAlgorithm::EcdsaP256 => p256::SecretKey::random(&mut rng).to_bytes().into(),
            SignatureAlgorithm::EcdsaSecp256k1 => {
                k256::SecretKey::random(&mut rng).to_bytes().into()
            }
        };
        let secret = Zeroizing::new(secret);
        let public = public_from_scalar(algorithm, &secret)?;
        Ok(Self {
            algorithm,
            secret,
            public,
        })
    }

    /// Builds a key pair from a 32-byte big-endian scalar.
    pub fn from_scalar(algorithm: SignatureAlgorithm, scalar: &[u8]) -> Result<Self> {
        let secret: [u8; KEY_SIZE] = scalar.try_into().map_err(|_| {
            KeywardError::InvalidKey(format!("private key must be {KEY_SIZE} bytes"))
        })?;
        let secret = Zeroizing::new(secret);
        let public = public_from_scalar(algorithm, &secret)?;
        Ok(Self {
            algorithm,
            secret,
            public,
        })
    }

    pub fn from_hex(algorithm: SignatureAlgorithm, s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let raw = Zeroizing::new(
            hex::decode(s).map_err(|_| KeywardError::InvalidKey("invalid hex".into()))?,
        );
        Self::from_scalar(algorithm, &raw)
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub(crate) fn secret_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.secret
    }

    /// Signs `hash(data)` and returns raw `r || s`.
    pub fn sign(&self, data: &[u8], hash: HashAlgorithm) -> Result<[u8; SIGNATURE_LEN]> {
        self.sign_digest(&hash.digest(data))
    }

    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<[u8; SIGNATURE_LEN]> {
        let mut out = [0u8; SIGNATURE_LEN];
        match self.algorithm {
            SignatureAlgorithm::EcdsaP256 => {
                use p256::ecdsa::signature::hazmat::PrehashSigner;
                let sk = p256::ecdsa::SigningKey::from_slice(self.secret.as_slice())
                    .map_err(|_| KeywardError::InvalidKey("invalid P-256 scalar".into()))?;
                let sig: p256::ecdsa::Signature = sk
                    .sign_prehash(digest)
                    .map_err(|e| KeywardError::Crypto(format!("signing failed: {e}")))?;
                out.copy_from_slice(&sig.to_bytes());
            }
            SignatureAlgorithm::EcdsaSecp256k1 => {
                use k256::ecdsa::signature::hazmat::PrehashSigner;
                let sk = k256::ecdsa::SigningKey::from_slice(self.secret.as_slice())
                    .map_err(|_| KeywardError::InvalidKey("invalid secp256k1 scalar".into()))?;
                let sig: k256::ecdsa::Signature = sk
                    .sign_prehash(digest)
                    .map_err(|e| KeywardError::Crypto(format!("signing failed: {e}")))?;
                out.copy_from_slice(&sig.to_bytes());
            }
        }
        Ok(out)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm)
            .field("public", &self.public.to_hex())
            .finish_non_exhaustive()
    }
}

fn public_from_scalar(algorithm: SignatureAlgorithm, secret: &[u8; KEY_SIZE]) -> Result<PublicKey> {
    let uncompressed = match algorithm {
        SignatureAlgorithm::EcdsaP256 => {
            use p256::elliptic_curve::sec1::ToEncodedPoint;
            p256::SecretKey::from_slice(secret)
                .map_err(|_| KeywardError::InvalidKey("invalid P-256 scalar".into()))?
                .public_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec()
        }
        SignatureAlgorithm::EcdsaSecp256k1 => {
            use k256::elliptic_curve::sec1::ToEncodedPoint;
            k256::SecretKey::from_slice(secret)
                .map_err(|_| KeywardError::InvalidKey("invalid secp256k1 scalar".into()))?
                .public_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec()
        }
    };
    PublicKey::from_bytes(algorithm, &uncompressed)
}

/// Converts a keystore signature to raw `r || s`. Platform keystores
/// usually hand back ASN.1 DER.
pub fn normalize_signature(algorithm: SignatureAlgorithm, sig: &[u8]) -> Result<Vec<u8>> {
    if sig.len() == SIGNATURE_LEN {
        return Ok(sig.to_vec());
    }
    let raw = match algorithm {
        SignatureAlgorithm::EcdsaP256 => p256::ecdsa::Signature::from_der(sig)
            .map(|s| s.to_bytes().to_vec())
            .map_err(|_| KeywardError::Crypto("malformed DER signature".into()))?,
        SignatureAlgorithm::EcdsaSecp256k1 => k256::ecdsa::Signature::from_der(sig)
            .map(|s| {
                let s = s.normalize_s().unwrap_or(s);
                s.to_bytes().to_vec()
            })
            .map_err(|_| KeywardError::Crypto("malformed DER signature".into()))?,
    };
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const P256_SCALAR: &str = "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721";

    #[test]
    fn test_public_key_shape() {
        for algo in [SignatureAlgorithm::EcdsaP256, SignatureAlgorithm::EcdsaSecp256k1] {
            let kp = KeyPair::generate(algo).unwrap();
            assert_eq!(kp.public_key().to_hex().len(), 128);
            assert_eq!(kp.public_key().algorithm(), algo);
        }
    }

    #[test]
    fn test_known_p256_public_key() {
        // RFC 6979 A.2.5 key.
        let kp = KeyPair::from_hex(SignatureAlgorithm::EcdsaP256, P256_SCALAR).unwrap();
        assert_eq!(
            kp.public_key().to_hex(),
            "60fed4ba255a9d31c961eb74c6356d68c049b8923b61fa6ce669622e60f29fb6\
             7903fe1008b8bc99a41ae9e95628bc64f2f1b20c2d7e9f5177a3c294d4462299"
        );
    }

    #[test]
    fn test_sign_verify() {
        for algo in [SignatureAlgorithm::EcdsaP256, SignatureAlgorithm::EcdsaSecp256k1] {
            let kp = KeyPair::generate(algo).unwrap();
            let sig = kp.sign(b"message", HashAlgorithm::Sha2_256).unwrap();
            assert!(kp.public_key().verify(b"message", HashAlgorithm::Sha2_256, &sig));
            assert!(!kp.public_key().verify(b"other", HashAlgorithm::Sha2_256, &sig));
            assert!(!kp.public_key().verify(b"message", HashAlgorithm::Sha3_256, &sig));
        }
    }

    #[test]
    fn test_invalid_scalars_rejected() {
        assert!(KeyPair::from_scalar(SignatureAlgorithm::EcdsaP256, &[0u8; 32]).is_err());
        assert!(KeyPair::from_scalar(SignatureAlgorithm::EcdsaSecp256k1, &[0xffu8; 32]).is_err());
        assert!(KeyPair::from_scalar(SignatureAlgorithm::EcdsaP256, &[1u8; 31]).is_err());
    }

    #[test]
    fn test_public_key_parse_forms() {
        let kp = KeyPair::generate(SignatureAlgorithm::EcdsaSecp256k1).unwrap();
        let hex64 = kp.public_key().to_hex();
        let with_prefix = format!("0x04{}", hex64.to_uppercase());
        let parsed = PublicKey::from_hex(SignatureAlgorithm::EcdsaSecp256k1, &with_prefix).unwrap();
        assert_eq!(&parsed, kp.public_key());
        assert_eq!(normalize_public_key_hex(&format!("04{hex64}")), hex64);
        assert_eq!(normalize_public_key_hex(&with_prefix), hex64);
    }

    #[test]
    fn test_der_signature_normalized() {
        let kp = KeyPair::generate(SignatureAlgorithm::EcdsaP256).unwrap();
        let raw = kp.sign(b"payload", HashAlgorithm::Sha3_256).unwrap();
        let der = p256::ecdsa::Signature::from_slice(&raw).unwrap().to_der();
        let normalized = normalize_signature(SignatureAlgorithm::EcdsaP256, der.as_bytes()).unwrap();
        assert_eq!(normalized, raw.to_vec());
        assert!(normalize_signature(SignatureAlgorithm::EcdsaP256, &[0x30, 0x01]).is_err());
    }
}
