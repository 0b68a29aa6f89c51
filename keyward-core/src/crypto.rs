// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Symmetric primitives shared by the key vault and backups.
//!
//! Secrets at rest use XChaCha20-Poly1305 under an Argon2id key. The
//! backup list uses AES-256-GCM under a subkey of the application secret.
//! Both serialize as `nonce || ciphertext || tag`.

#![forbid(unsafe_code)]

use aes_gcm::Aes256Gcm;
use argon2::{Algorithm, Argon2, Params, Version};
use blake2::{digest::consts::U32, Blake2b, Digest};
use chacha20poly1305::aead::{generic_array::GenericArray, Aead, KeyInit};
use chacha20poly1305::XChaCha20Poly1305;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{KeywardError, Result};

pub const KEY_SIZE: usize = 32;
pub const SALT_SIZE: usize = 32;
/// XChaCha20-Poly1305 nonce.
pub const NONCE_SIZE: usize = 24;
pub const GCM_NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

const SUBKEY_DOMAIN: &[u8] = b"keyward/subkey/v1";

/// Argon2id cost. Stored next to every record it protects so records stay
/// readable after the defaults change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    /// Fast and weak. Tests only.
    pub const TESTING: Self = Self::new(1024, 1, 1);
    pub const DEFAULT: Self = Self::new(64 * 1024, 3, 4);
    pub const HIGH: Self = Self::new(256 * 1024, 4, 4);

    pub const fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    fn to_argon2(self) -> Result<Params> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| KeywardError::Crypto(format!("invalid Argon2 parameters: {e}")))
    }
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Symmetric key material, zeroized on drop.
#[derive(Clone)]
pub struct SecretKey(Zeroizing<[u8; KEY_SIZE]>);

impl SecretKey {
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn generate() -> Self {
        Self::new(random_bytes())
    }

    pub fn expose(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Stretches a low-entropy secret (PIN, user prefix) into a key.
pub fn derive_key(
    secret: &[u8],
    salt: &[u8; SALT_SIZE],
    params: Argon2Params,
) -> Result<SecretKey> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);
    let mut out = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(secret, salt, &mut out[..])
        .map_err(|e| KeywardError::Crypto(format!("Argon2id failed: {e}")))?;
    Ok(SecretKey::new(*out))
}

/// Derives an independent key for `context` from high-entropy material.
/// The context is length-prefixed so distinct contexts never collide.
pub fn derive_subkey(master: &[u8], context: &[u8]) -> SecretKey {
    let digest = Blake2b::<U32>::new()
        .chain_update(SUBKEY_DOMAIN)
        .chain_update((context.len() as u64).to_be_bytes())
        .chain_update(context)
        .chain_update(master)
        .finalize();
    let mut out = [0u8; KEY_SIZE];
    out.copy_from_slice(&digest);
    SecretKey::new(out)
}

fn aead_seal<C: Aead + KeyInit>(key: &SecretKey, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    C::new_from_slice(key.expose())
        .map_err(|_| KeywardError::Crypto("invalid key length".into()))?
        .encrypt(GenericArray::from_slice(nonce), plaintext)
        .map_err(|_| KeywardError::Encryption("AEAD encryption failed".into()))
}

fn aead_open<C: Aead + KeyInit>(
    key: &SecretKey,
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    C::new_from_slice(key.expose())
        .map_err(|_| KeywardError::Crypto("invalid key length".into()))?
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| KeywardError::DecryptionFailed)
}

/// XChaCha20-Poly1305 output.
#[derive(Clone, Debug)]
pub struct EncryptedData {
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the tag appended.
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    pub fn to_bytes(&self) -> Vec<u8> {
        [self.nonce.as_slice(), self.ciphertext.as_slice()].concat()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(KeywardError::DecryptionFailed);
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let mut n = [0u8; NONCE_SIZE];
        n.copy_from_slice(nonce);
        Ok(Self {
            nonce: n,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

pub fn encrypt(plaintext: &[u8], key: &SecretKey) -> Result<EncryptedData> {
    let nonce = random_bytes::<NONCE_SIZE>();
    let ciphertext = aead_seal::<XChaCha20Poly1305>(key, &nonce, plaintext)?;
    Ok(EncryptedData { nonce, ciphertext })
}

pub fn decrypt(data: &EncryptedData, key: &SecretKey) -> Result<Zeroizing<Vec<u8>>> {
    aead_open::<XChaCha20Poly1305>(key, &data.nonce, &data.ciphertext)
}

/// AES-256-GCM with a random 96-bit nonce, returned as one buffer.
pub fn seal_gcm(plaintext: &[u8], key: &SecretKey) -> Result<Vec<u8>> {
    let nonce = random_bytes::<GCM_NONCE_SIZE>();
    let ciphertext = aead_seal::<Aes256Gcm>(key, &nonce, plaintext)?;
    Ok([nonce.as_slice(), ciphertext.as_slice()].concat())
}

pub fn open_gcm(sealed: &[u8], key: &SecretKey) -> Result<Zeroizing<Vec<u8>>> {
    if sealed.len() < GCM_NONCE_SIZE + TAG_SIZE {
        return Err(KeywardError::DecryptionFailed);
    }
    let (nonce, ciphertext) = sealed.split_at(GCM_NONCE_SIZE);
    aead_open::<Aes256Gcm>(key, nonce, ciphertext)
}

pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_key_depends_on_pin_and_salt() {
        let salt = random_bytes::<SALT_SIZE>();
        let a = derive_key(b"1234", &salt, Argon2Params::TESTING).unwrap();
        assert_eq!(
            a.expose(),
            derive_key(b"1234", &salt, Argon2Params::TESTING).unwrap().expose()
        );
        assert_ne!(
            a.expose(),
            derive_key(b"4321", &salt, Argon2Params::TESTING).unwrap().expose()
        );
        let other_salt = random_bytes::<SALT_SIZE>();
        assert_ne!(
            a.expose(),
            derive_key(b"1234", &other_salt, Argon2Params::TESTING).unwrap().expose()
        );
    }

    #[test]
    fn test_invalid_params_rejected() {
        let salt = [0u8; SALT_SIZE];
        let params = Argon2Params::new(1, 1, 1);
        assert!(matches!(
            derive_key(b"1234", &salt, params),
            Err(KeywardError::Crypto(_))
        ));
    }

    #[test]
    fn test_xchacha_wrong_key_and_truncation() {
        let key = SecretKey::generate();
        let sealed = encrypt(b"scalar", &key).unwrap();
        let restored = EncryptedData::from_bytes(&sealed.to_bytes()).unwrap();
        assert_eq!(decrypt(&restored, &key).unwrap().as_slice(), b"scalar");
        assert!(matches!(
            decrypt(&sealed, &SecretKey::generate()),
            Err(KeywardError::DecryptionFailed)
        ));
        assert!(EncryptedData::from_bytes(&[0u8; NONCE_SIZE + TAG_SIZE - 1]).is_err());
    }

    #[test]
    fn test_gcm_tamper_detected() {
        let key = SecretKey::generate();
        let mut sealed = seal_gcm(b"[]", &key).unwrap();
        assert_eq!(sealed.len(), GCM_NONCE_SIZE + 2 + TAG_SIZE);
        assert_eq!(open_gcm(&sealed, &key).unwrap().as_slice(), b"[]");

        sealed[GCM_NONCE_SIZE] ^= 0x01;
        assert!(matches!(
            open_gcm(&sealed, &key),
            Err(KeywardError::DecryptionFailed)
        ));
        assert!(open_gcm(&[0u8; 8], &key).is_err());
    }

    #[test]
    fn test_subkeys_separate_contexts() {
        let master = random_bytes::<32>();
        let list = derive_subkey(&master, b"backup-list");
        assert_eq!(list.expose(), derive_subkey(&master, b"backup-list").expose());
        assert_ne!(list.expose(), derive_subkey(&master, b"backup-lis").expose());
        assert_ne!(list.expose(), derive_subkey(&master[1..], b"backup-list").expose());
    }
}
