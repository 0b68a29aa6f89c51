// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

use keyward_core::backup::BackupCryptoProvider;
use keyward_core::error::Result;
use keyward_core::provider::{CryptoProvider, MnemonicProvider};
use keyward_core::{Mnemonic, SignatureAlgorithm};

use crate::output::Output;

pub fn cmd_generate(out: &Output, words: usize) -> Result<()> {
    let mnemonic = Mnemonic::generate(words)?;

    out.header(&format!("New {words}-word mnemonic"));
    out.mnemonic(&mnemonic.phrase());

    for algorithm in [
        SignatureAlgorithm::EcdsaSecp256k1,
        SignatureAlgorithm::EcdsaP256,
    ] {
        let primary = CryptoProvider::from(MnemonicProvider::new(&mnemonic, algorithm)?);
        let backup = CryptoProvider::from(BackupCryptoProvider::from_mnemonic(&mnemonic, algorithm)?);
        out.field(&format!("{algorithm} primary"), &primary.public_key_hex());
        out.field(&format!("{algorithm} backup"), &backup.public_key_hex());
    }

    out.secret_warning();
    Ok(())
}
