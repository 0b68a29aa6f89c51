// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use std::fmt;

use bip39::Language;
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::random_bytes;
use crate::error::{KeywardError, Result};

pub const VALID_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

#[cfg(test)]
pub(crate) const ABANDON_12: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// A BIP-39 English mnemonic held only in process memory.
#[derive(Clone)]
pub struct Mnemonic {
    inner: bip39::Mnemonic,
}

impl Mnemonic {
    pub fn generate(word_count: usize) -> Result<Self> {
        if !VALID_WORD_COUNTS.contains(&word_count) {
            return Err(KeywardError::InvalidMnemonic(format!(
                "unsupported word count {word_count}"
            )));
        }
        let entropy = Zeroizing::new(random_bytes::<32>());
        let len = word_count / 3 * 4;
        let inner = bip39::Mnemonic::from_entropy_in(Language::English, &entropy[..len])
            .map_err(|e| KeywardError::InvalidMnemonic(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Parses a phrase, normalizing whitespace and unicode form.
    pub fn parse(phrase: &str) -> Result<Self> {
        let phrase = Zeroizing::new(phrase.split_whitespace().collect::<Vec<_>>().join(" "));
        let inner = bip39::Mnemonic::parse_in_normalized(Language::English, &phrase)
            .map_err(|e| KeywardError::InvalidMnemonic(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn word_count(&self) -> usize {
        self.inner.word_count()
    }

    pub fn phrase(&self) -> Zeroizing<String> {
        Zeroizing::new(self.inner.to_string())
    }

    pub fn to_seed(&self, passphrase: &str) -> Zeroizing<[u8; 64]> {
        Zeroizing::new(self.inner.to_seed(passphrase))
    }
}

impl Drop for Mnemonic {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mnemonic({} words, [REDACTED])", self.word_count())
    }
}

impl PartialEq for Mnemonic {
    fn eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.phrase().as_bytes().ct_eq(other.phrase().as_bytes()).into()
    }
}

impl Eq for Mnemonic {}
