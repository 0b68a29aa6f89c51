// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::Path;
use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::debug;

use keyward_core::compat::KeyLookup;
use keyward_core::error::{KeywardError, Result};
use keyward_core::keystore::MemoryKeyStore;
use keyward_core::migration::MigrationOutcome;
use keyward_core::{HashAlgorithm, KeyPair, Keyward, SignatureAlgorithm};

use super::{get_confirm, get_private_key};
use crate::config::Config;
use crate::output::{Cell, Output};

pub struct KeyContext {
    keyward: Keyward,
}

impl KeyContext {
    /// There is no platform keystore on the command line, so legacy
    /// lookups always see an empty one.
    pub fn open(data_dir: &Path, cfg: &Config) -> Result<Self> {
        let keyward = Keyward::open(
            data_dir,
            cfg.namespace(),
            cfg.kdf.params(),
            Arc::new(MemoryKeyStore::new()),
        )?;
        Ok(Self { keyward })
    }
}

pub fn cmd_import(
    out: &Output,
    ctx: &KeyContext,
    prefix: &str,
    algorithm: SignatureAlgorithm,
    hash: Option<HashAlgorithm>,
) -> Result<()> {
    let vault = ctx.keyward.vault();
    if vault.contains(prefix)?
        && !get_confirm(&format!("A key for '{prefix}' exists. Replace it?"))?
    {
        return Err(KeywardError::KeyAlreadyExists(prefix.to_string()));
    }

    let secret = get_private_key("Private key (hex)")?;
    let key = KeyPair::from_hex(algorithm, secret.expose_secret())?;
    drop(secret);
    let hash = hash.unwrap_or_else(|| algorithm.default_hash());

    let spinner = out.spinner("Encrypting key...");
    let stored = vault.store(prefix, &key, hash);
    spinner.finish();
    stored?;

    debug!(prefix, "key imported");
    out.success(&format!("Stored key for '{prefix}'"));
    out.field("ID", &vault.key_id(prefix));
    out.key_field("Public key", &key.public_key().to_hex());
    Ok(())
}

pub async fn cmd_show(out: &Output, ctx: &KeyContext, prefix: &str) -> Result<()> {
    let spinner = out.spinner("Looking up key...");
    let lookup = ctx.keyward.compat().resolve(prefix).await;
    spinner.finish();

    let (location, provider) = match lookup? {
        KeyLookup::Current(p) => ("current storage", p),
        KeyLookup::LegacyExtracted(p) => ("legacy keystore", p),
        KeyLookup::LegacyHardwareOnly { alias } => {
            out.warn(&format!("Key '{alias}' is hardware isolated"));
            let provider = ctx.keyward.compat().signing_provider(prefix).await?;
            ("legacy keystore (hardware)", provider)
        }
        KeyLookup::NotFound => return Err(KeywardError::KeyNotFound(prefix.to_string())),
    };

    out.header(&format!("Key for '{prefix}'"));
    out.field("Location", location);
    out.field("Provider", &provider.kind().to_string());
    out.field("Signature", &provider.signature_algorithm().to_string());
    out.field("Hash", &provider.hash_algorithm().to_string());
    out.field("Weight", &provider.key_weight().to_string());
    out.key_field("Public key", &provider.public_key_hex());
    Ok(())
}

pub fn cmd_list(out: &Output, ctx: &KeyContext) -> Result<()> {
    let vault = ctx.keyward.vault();
    let prefixes = vault.prefixes()?;
    if prefixes.is_empty() {
        out.info("No keys stored.");
        return Ok(());
    }

    let table = out.table(&[("PREFIX", 24), ("ALGORITHM", 16), ("PUBLIC KEY", 28)]);
    for prefix in &prefixes {
        let Some(pk) = vault.public_key(prefix)? else {
            continue;
        };
        let algorithm = pk.algorithm().to_string();
        let short = format!("{}...", &pk.to_hex()[..24]);
        table.row(&[Cell::Text(prefix), Cell::Text(&algorithm), Cell::Key(&short)]);
    }
    Ok(())
}

pub async fn cmd_diagnose(out: &Output, ctx: &KeyContext, prefix: &str) -> Result<()> {
    let report = ctx.keyward.compat().diagnose_key_storage(prefix).await;
    out.newline();
    for line in report.to_string().lines() {
        out.info(line);
    }
    if !report.any_found() {
        out.warn(&format!("No key found for '{prefix}'"));
    }
    Ok(())
}

pub fn cmd_delete(out: &Output, ctx: &KeyContext, prefix: &str) -> Result<()> {
    let vault = ctx.keyward.vault();
    if !vault.contains(prefix)? {
        return Err(KeywardError::KeyNotFound(prefix.to_string()));
    }
    if !get_confirm(&format!("Delete the key for '{prefix}'? This cannot be undone"))? {
        out.info("Cancelled.");
        return Ok(());
    }
    vault.delete(prefix)?;
    ctx.keyward.compat().locations().remove(prefix)?;
    out.success(&format!("Deleted key for '{prefix}'"));
    Ok(())
}

pub async fn cmd_migrate(
    out: &Output,
    ctx: &KeyContext,
    prefixes: Vec<String>,
    force: bool,
) -> Result<()> {
    let migrator = ctx.keyward.migrator();
    if force {
        migrator.reset()?;
    }
    let prefixes = if prefixes.is_empty() {
        ctx.keyward.vault().prefixes()?
    } else {
        prefixes
    };

    let report = migrator.migrate_if_needed(&prefixes).await?;
    if report.already_completed {
        out.info("Migration already completed. Use --force to run it again.");
        return Ok(());
    }

    for (prefix, outcome) in &report.outcomes {
        match outcome {
            MigrationOutcome::Migrated => out.success(&format!("{prefix}: migrated")),
            MigrationOutcome::AlreadyCurrent => out.info(&format!("{prefix}: already current")),
            MigrationOutcome::NoLegacyKey => out.info(&format!("{prefix}: no legacy key")),
            MigrationOutcome::SkippedNotExtractable => {
                out.warn(&format!("{prefix}: hardware isolated, left in place"))
            }
            MigrationOutcome::Failed(e) => out.error(&format!("{prefix}: {e}")),
        }
    }
    out.field("Migrated", &report.migrated().to_string());
    if report.failed() > 0 {
        out.field("Failed", &report.failed().to_string());
    }
    if report.marked_complete {
        out.success("Migration complete");
    } else {
        out.warn("Migration incomplete; it will be retried on the next run");
    }
    Ok(())
}
