// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use secrecy::ExposeSecret;

use keyward_core::backup::{
    BackupCipher, BackupCryptoProvider, BackupIdentity, BackupManager, BackupStatus,
    LocalDirFileStore,
};
use keyward_core::error::Result;
use keyward_core::{Mnemonic, SignatureAlgorithm};

use super::{get_confirm, get_mnemonic, get_pin, get_pin_with_confirm};
use crate::config::Config;
use crate::output::{Cell, Output};

/// Application key for the outer layer of backup files. Shared by every
/// install so any copy of the tool can list a destination's entries.
const APP_BACKUP_SECRET: &[u8] = b"keyward/backup-list/application-secret/v1";

pub fn open_manager(backup_dir: &Path, cfg: &Config) -> Result<BackupManager> {
    let store = LocalDirFileStore::new(backup_dir)?;
    let cipher = BackupCipher::new(APP_BACKUP_SECRET, cfg.kdf.params())?;
    Ok(BackupManager::new(Arc::new(store), cipher))
}

fn format_time(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub async fn cmd_upload(
    out: &Output,
    manager: &BackupManager,
    identity: &BackupIdentity,
    algorithm: SignatureAlgorithm,
) -> Result<()> {
    let phrase = get_mnemonic("Mnemonic")?;
    let mnemonic = Mnemonic::parse(phrase.expose_secret())?;
    drop(phrase);
    let pin = get_pin_with_confirm("Backup PIN", "Confirm PIN")?;

    let backup = BackupCryptoProvider::from_mnemonic(&mnemonic, algorithm)?;
    let public_key = backup.public_key().to_hex();

    let spinner = out.spinner("Encrypting backup...");
    let result = manager
        .upload(
            identity,
            &mnemonic,
            &public_key,
            algorithm,
            backup.hash_algorithm(),
            pin.expose_secret(),
        )
        .await;
    spinner.finish();
    let item = result?;

    out.success(&format!(
        "Backup for '{}' written to {}",
        item.user_id,
        manager.destination()
    ));
    out.key_field("Backup public key", &item.public_key);
    out.field("Weight", &backup.key_weight().to_string());
    out.info("Register this key on the account to make the backup usable.");
    Ok(())
}

pub async fn cmd_list(out: &Output, manager: &BackupManager) -> Result<()> {
    let items = manager.list().await?;
    if items.is_empty() {
        out.info("No backups at this destination.");
        return Ok(());
    }

    let table = out.table(&[("USER", 20), ("NAME", 16), ("ADDRESS", 20), ("UPDATED", 16)]);
    for item in &items {
        let updated = format_time(item.update_time);
        table.row(&[
            Cell::Text(&item.user_id),
            Cell::Text(&item.user_name),
            Cell::Key(&item.address),
            Cell::Text(&updated),
        ]);
    }
    Ok(())
}

pub async fn cmd_restore(out: &Output, manager: &BackupManager, user_id: &str) -> Result<()> {
    let item = manager.find(user_id).await?;
    let pin = get_pin("Backup PIN")?;

    let spinner = out.spinner("Decrypting backup...");
    let result = manager.decrypt_mnemonic(&item, pin.expose_secret()).await;
    spinner.finish();
    let mnemonic = result?;

    out.header(&format!("Mnemonic for {} ({})", item.user_name, item.address));
    out.mnemonic(&mnemonic.phrase());
    out.secret_warning();
    Ok(())
}

pub async fn cmd_delete(out: &Output, manager: &BackupManager, user_id: &str) -> Result<()> {
    if !get_confirm(&format!("Delete the backup for '{user_id}'?"))? {
        out.info("Cancelled.");
        return Ok(());
    }
    if manager.delete(user_id).await? {
        out.success(&format!("Deleted backup for '{user_id}'"));
    } else {
        out.warn(&format!("No backup for '{user_id}'"));
    }
    Ok(())
}

pub async fn cmd_check(
    out: &Output,
    manager: &BackupManager,
    user_id: &str,
    active_keys: &[String],
) -> Result<()> {
    match manager.check(user_id, active_keys).await? {
        BackupStatus::Present => out.success("Backup present and its key is active"),
        BackupStatus::Stale => {
            out.warn("Backup exists but its key is not an active account key")
        }
        BackupStatus::Missing => out.warn(&format!("No backup for '{user_id}'")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "1970-01-01 00:00");
        assert_eq!(format_time(1_700_000_000_000), "2023-11-14 22:13");
    }
}
