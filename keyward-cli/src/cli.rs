// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use keyward_core::mnemonic::VALID_WORD_COUNTS;
use keyward_core::{HashAlgorithm, SignatureAlgorithm};

#[derive(Parser)]
#[command(name = "keyward")]
#[command(about = "Wallet key storage and encrypted mnemonic backups")]
#[command(version)]
pub(crate) struct Cli {
    /// Directory holding the key database
    #[arg(short, long, global = true, env = "KEYWARD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory used as the backup destination
    #[arg(long, global = true)]
    pub backup_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    Mnemonic {
        #[command(subcommand)]
        command: MnemonicCommands,
    },
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

#[derive(Subcommand)]
pub(crate) enum MnemonicCommands {
    Generate {
        #[arg(short, long, default_value = "12", value_parser = parse_word_count)]
        words: usize,
    },
}

#[derive(Subcommand)]
pub(crate) enum KeyCommands {
    /// Store a private key for a user prefix
    Import {
        #[arg(short, long)]
        prefix: String,
        #[arg(short, long, value_enum, default_value = "p256")]
        algorithm: AlgorithmArg,
        /// Defaults to the curve's usual hash
        #[arg(long, value_enum)]
        hash: Option<HashArg>,
    },
    Show {
        #[arg(short, long)]
        prefix: String,
    },
    List,
    Diagnose {
        #[arg(short, long)]
        prefix: String,
    },
    Delete {
        #[arg(short, long)]
        prefix: String,
    },
    /// Move extractable legacy keys into current storage
    Migrate {
        /// Prefixes to check; defaults to every stored prefix
        #[arg(short, long = "prefix")]
        prefixes: Vec<String>,
        /// Run again even if a previous migration completed
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub(crate) enum BackupCommands {
    Upload {
        #[arg(short, long)]
        user_id: String,
        #[arg(short, long)]
        address: String,
        #[arg(short, long)]
        name: String,
        #[arg(long, value_enum, default_value = "p256")]
        algorithm: AlgorithmArg,
        #[arg(long)]
        key_index: Option<u32>,
    },
    List,
    Restore {
        #[arg(short, long)]
        user_id: String,
    },
    Delete {
        #[arg(short, long)]
        user_id: String,
    },
    /// Compare a backup with the account's active public keys
    Check {
        #[arg(short, long)]
        user_id: String,
        #[arg(short, long = "key")]
        keys: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum AlgorithmArg {
    P256,
    Secp256k1,
}

impl From<AlgorithmArg> for SignatureAlgorithm {
    fn from(a: AlgorithmArg) -> Self {
        match a {
            AlgorithmArg::P256 => SignatureAlgorithm::EcdsaP256,
            AlgorithmArg::Secp256k1 => SignatureAlgorithm::EcdsaSecp256k1,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum HashArg {
    Sha2,
    Sha3,
}

impl From<HashArg> for HashAlgorithm {
    fn from(h: HashArg) -> Self {
        match h {
            HashArg::Sha2 => HashAlgorithm::Sha2_256,
            HashArg::Sha3 => HashAlgorithm::Sha3_256,
        }
    }
}

fn parse_word_count(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if VALID_WORD_COUNTS.contains(&n) {
        Ok(n)
    } else {
        Err(format!("word count must be one of {VALID_WORD_COUNTS:?}"))
    }
}
