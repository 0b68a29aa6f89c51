// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! One-shot move of legacy keystore keys into current-generation storage.
//!
//! Only software-backed legacy keys can move; hardware-backed ones stay
//! where they are and keep signing through the keystore. Once a pass
//! finishes without storage or keystore failures a marker is written and
//! later calls return immediately.

#![forbid(unsafe_code)]

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{StorageBackend, Table};
use crate::compat::{legacy_alias, KeyCompatibilityManager};
use crate::error::{KeywardError, MigrationError, Result};
use crate::vault::StorageLocation;

pub const MIGRATION_MARKER: &[u8] = b"keystore_migration_completed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    AlreadyCurrent,
    Migrated,
    SkippedNotExtractable,
    NoLegacyKey,
    Failed(MigrationError),
}

impl MigrationOutcome {
    /// Failures that a later run may not repeat.
    fn is_transient_failure(&self) -> bool {
        matches!(
            self,
            MigrationOutcome::Failed(
                MigrationError::Storage(_)
                    | MigrationError::Verification { .. }
                    | MigrationError::KeystoreAccess(_)
            )
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// The completion marker was already present; nothing ran.
    pub already_completed: bool,
    pub outcomes: Vec<(String, MigrationOutcome)>,
    pub marked_complete: bool,
}

impl MigrationReport {
    pub fn migrated(&self) -> usize {
        self.count(|o| *o == MigrationOutcome::Migrated)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::Failed(_)))
    }

    fn count(&self, f: impl Fn(&MigrationOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| f(o)).count()
    }
}

pub struct LegacyKeyMigrator {
    compat: KeyCompatibilityManager,
    backend: Arc<dyn StorageBackend>,
}

impl LegacyKeyMigrator {
    pub fn new(compat: KeyCompatibilityManager, backend: Arc<dyn StorageBackend>) -> Self {
        Self { compat, backend }
    }

    pub fn is_completed(&self) -> Result<bool> {
        Ok(self.backend.get(Table::Meta, MIGRATION_MARKER)?.is_some())
    }

    /// Clears the completion marker so the next call runs again.
    pub fn reset(&self) -> Result<()> {
        self.backend.delete(Table::Meta, MIGRATION_MARKER)?;
        Ok(())
    }

    pub async fn migrate_if_needed(&self, prefixes: &[String]) -> Result<MigrationReport> {
        if self.is_completed()? {
            debug!("key migration already completed");
            return Ok(MigrationReport {
                already_completed: true,
                ..Default::default()
            });
        }

        let compat = self.compat.clone();
        let owned = prefixes.to_vec();
        let outcomes = tokio::task::spawn_blocking(move || {
            owned
                .into_iter()
                .map(|prefix| {
                    let outcome = migrate_prefix(&compat, &prefix);
                    (prefix, outcome)
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| KeywardError::keystore(format!("migration task failed: {e}")))?;

        let mut report = MigrationReport {
            outcomes,
            ..Default::default()
        };
        if !report.outcomes.iter().any(|(_, o)| o.is_transient_failure()) {
            let at = chrono::Utc::now().timestamp().to_be_bytes();
            self.backend.put(Table::Meta, MIGRATION_MARKER, &at)?;
            report.marked_complete = true;
        }
        info!(
            migrated = report.migrated(),
            failed = report.failed(),
            complete = report.marked_complete,
            "key migration pass finished"
        );
        Ok(report)
    }
}

fn migrate_prefix(compat: &KeyCompatibilityManager, prefix: &str) -> MigrationOutcome {
    let vault = compat.vault();
    match vault.contains(prefix) {
        Ok(true) => return MigrationOutcome::AlreadyCurrent,
        Ok(false) => {}
        Err(e) => return MigrationOutcome::Failed(MigrationError::Storage(e.to_string())),
    }

    let alias = legacy_alias(prefix);
    let key = match compat.extract_legacy(&alias) {
        Ok(Some(key)) => key,
        Ok(None) => return MigrationOutcome::NoLegacyKey,
        Err(KeywardError::KeyNotExtractable(_)) => {
            debug!(prefix, "legacy key is hardware backed, leaving in place");
            return MigrationOutcome::SkippedNotExtractable;
        }
        Err(KeywardError::Migration(e)) => {
            warn!(prefix, error = %e, "legacy key rejected");
            return MigrationOutcome::Failed(e);
        }
        Err(e) => return MigrationOutcome::Failed(MigrationError::KeystoreAccess(e.to_string())),
    };

    let hash = key.algorithm().default_hash();
    if let Err(e) = vault.store(prefix, &key, hash) {
        return MigrationOutcome::Failed(MigrationError::Storage(e.to_string()));
    }

    let verified = matches!(
        vault.load(prefix),
        Ok(Some((stored, _))) if stored.public_key() == key.public_key()
    );
    if !verified {
        warn!(prefix, "migrated key failed verification, removing");
        if let Err(e) = vault.delete(prefix) {
            warn!(prefix, error = %e, "failed to remove unverified key");
        }
        return MigrationOutcome::Failed(MigrationError::Verification {
            prefix: prefix.to_string(),
        });
    }

    if let Err(e) = compat.locations().record(prefix, StorageLocation::Current) {
        warn!(prefix, error = %e, "failed to record key location");
    }
    info!(prefix, "legacy key migrated");
    MigrationOutcome::Migrated
}
