// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use keyward_core::backup::BackupCipher;
use keyward_core::compat::normalize_private_scalar;
use keyward_core::crypto::{decrypt, encrypt, Argon2Params, SecretKey};
use keyward_core::hd::{derive_scalar, DerivationPath};
use keyward_core::keys::{normalize_public_key_hex, KeyPair};
use keyward_core::{Mnemonic, MigrationError, SignatureAlgorithm};
use proptest::prelude::*;

fn algorithm() -> impl Strategy<Value = SignatureAlgorithm> {
    prop_oneof![
        Just(SignatureAlgorithm::EcdsaP256),
        Just(SignatureAlgorithm::EcdsaSecp256k1),
    ]
}

fn path() -> impl Strategy<Value = DerivationPath> {
    prop::collection::vec((0u32..1000, any::<bool>()), 0..5).prop_map(|steps| {
        let rendered: Vec<String> = steps
            .iter()
            .map(|(i, hardened)| if *hardened { format!("{i}'") } else { i.to_string() })
            .collect();
        let text = if rendered.is_empty() {
            "m".to_string()
        } else {
            format!("m/{}", rendered.join("/"))
        };
        text.parse().unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn scalar_normalization_preserves_value(raw in prop::collection::vec(any::<u8>(), 1..=32)) {
        let out = normalize_private_scalar(&raw).unwrap();
        let pad = 32 - raw.len();
        prop_assert!(out[..pad].iter().all(|b| *b == 0));
        prop_assert_eq!(&out[pad..], &raw[..]);
    }

    #[test]
    fn scalar_normalization_strips_sign_byte(raw in prop::array::uniform32(any::<u8>())) {
        let mut with_sign = vec![0u8];
        with_sign.extend_from_slice(&raw);
        let out = normalize_private_scalar(&with_sign).unwrap();
        prop_assert_eq!(&out[..], &raw[..]);
    }

    #[test]
    fn scalar_normalization_rejects_oversize(raw in prop::collection::vec(1u8..=255, 33..80)) {
        let err = normalize_private_scalar(&raw).unwrap_err();
        prop_assert_eq!(err, MigrationError::InvalidPrivateKeySize { actual: raw.len() });
    }

    #[test]
    fn derivation_is_deterministic(
        seed in prop::collection::vec(any::<u8>(), 16..=64),
        algorithm in algorithm(),
        path in path(),
    ) {
        let a = derive_scalar(&seed, algorithm, &path).unwrap();
        let b = derive_scalar(&seed, algorithm, &path).unwrap();
        prop_assert_eq!(a.as_slice(), b.as_slice());
        prop_assert!(KeyPair::from_scalar(algorithm, a.as_slice()).is_ok());
    }

    #[test]
    fn path_display_round_trips(path in path()) {
        let reparsed: DerivationPath = path.to_string().parse().unwrap();
        prop_assert_eq!(reparsed, path);
    }

    #[test]
    fn xchacha_round_trip(plaintext in prop::collection::vec(any::<u8>(), 0..2048)) {
        let key = SecretKey::generate();
        let encrypted = encrypt(&plaintext, &key).unwrap();
        let decrypted = decrypt(&encrypted, &key).unwrap();
        prop_assert_eq!(&decrypted[..], &plaintext[..]);
    }

    #[test]
    fn public_key_normalization_is_idempotent(bytes in prop::array::uniform32(any::<u8>())) {
        let s = format!("0x04{}{}", hex::encode(bytes), hex::encode(bytes).to_uppercase());
        let once = normalize_public_key_hex(&s);
        prop_assert_eq!(once.len(), 128);
        prop_assert_eq!(normalize_public_key_hex(&once), once.clone());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn backup_entry_round_trip(pin in "[0-9A-Za-z]{1,16}", words in prop::sample::select(vec![12usize, 15, 18, 21, 24])) {
        let cipher = BackupCipher::new(b"property-test-app-secret", Argon2Params::TESTING).unwrap();
        let mnemonic = Mnemonic::generate(words).unwrap();
        let blob = cipher.seal_mnemonic(&mnemonic, &pin).unwrap();
        let opened = cipher.open_mnemonic(&blob, &pin).unwrap();
        prop_assert_eq!(opened, mnemonic);

        let wrong = format!("{pin}x");
        prop_assert!(cipher.open_mnemonic(&blob, &wrong).is_err());
    }
}
