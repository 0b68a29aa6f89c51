// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Local key database.
//!
//! Three fixed tables: encrypted key records, the per-user storage
//! location index, and metadata markers. [`RedbBackend`] persists them in
//! one redb file; [`MemoryBackend`] keeps them in process for tests and
//! embedders that bring their own persistence.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use parking_lot::RwLock;
use redb::{Database, DatabaseError, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::{debug, warn};

use crate::error::Result;

const OPEN_ATTEMPTS: u32 = 10;
const OPEN_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// `{namespace}_{prefix}` -> encrypted key record.
    Keys,
    /// `prefix` -> last known storage location.
    Locations,
    Meta,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Keys, Table::Locations, Table::Meta];

    pub fn name(self) -> &'static str {
        match self {
            Table::Keys => "keys",
            Table::Locations => "key_locations",
            Table::Meta => "meta",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn definition(self) -> TableDefinition<'static, &'static [u8], &'static [u8]> {
        TableDefinition::new(self.name())
    }
}

pub trait StorageBackend: Send + Sync {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn put(&self, table: Table, key: &[u8], value: &[u8]) -> Result<()>;

    /// Returns true if the key existed.
    fn delete(&self, table: Table, key: &[u8]) -> Result<bool>;

    /// Keys starting with `prefix`, in byte order.
    fn keys_with_prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<Vec<u8>>>;
}

pub struct RedbBackend {
    db: Database,
}

impl RedbBackend {
    /// Opens the database at `path`, creating the file and its tables if
    /// needed. A file still held by another handle is retried briefly.
    pub fn open(path: &Path) -> Result<Self> {
        let mut attempt = 0;
        let db = loop {
            attempt += 1;
            match Database::create(path) {
                Ok(db) => break db,
                Err(e) if is_busy(&e) && attempt < OPEN_ATTEMPTS => {
                    warn!(attempt, error = %e, "key database busy");
                    std::thread::sleep(OPEN_BACKOFF);
                }
                Err(e) => return Err(e.into()),
            }
        };

        let wtxn = db.begin_write()?;
        for table in Table::ALL {
            wtxn.open_table(table.definition())?;
        }
        wtxn.commit()?;
        debug!(path = %path.display(), "key database open");
        Ok(Self { db })
    }
}

fn is_busy(e: &DatabaseError) -> bool {
    match e {
        DatabaseError::DatabaseAlreadyOpen => true,
        DatabaseError::Storage(redb::StorageError::Io(io)) => {
            io.kind() == std::io::ErrorKind::PermissionDenied
        }
        _ => false,
    }
}

impl StorageBackend for RedbBackend {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let rtxn = self.db.begin_read()?;
        let t = rtxn.open_table(table.definition())?;
        let value = t.get(key)?.map(|v| v.value().to_vec());
        Ok(value)
    }

    fn put(&self, table: Table, key: &[u8], value: &[u8]) -> Result<()> {
        let wtxn = self.db.begin_write()?;
        {
            let mut t = wtxn.open_table(table.definition())?;
            t.insert(key, value)?;
        }
        wtxn.commit()?;
        Ok(())
    }

    fn delete(&self, table: Table, key: &[u8]) -> Result<bool> {
        let wtxn = self.db.begin_write()?;
        let existed = {
            let mut t = wtxn.open_table(table.definition())?;
            let removed = t.remove(key)?;
            removed.is_some()
        };
        wtxn.commit()?;
        Ok(existed)
    }

    fn keys_with_prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let rtxn = self.db.begin_read()?;
        let t = rtxn.open_table(table.definition())?;
        let mut keys = Vec::new();
        for entry in t.range(prefix..)? {
            let (k, _) = entry?;
            let k = k.value();
            if !k.starts_with(prefix) {
                break;
            }
            keys.push(k.to_vec());
        }
        Ok(keys)
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    tables: [RwLock<BTreeMap<Vec<u8>, Vec<u8>>>; 3],
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, table: Table) -> &RwLock<BTreeMap<Vec<u8>, Vec<u8>>> {
        &self.tables[table.index()]
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.table(table).read().get(key).cloned())
    }

    fn put(&self, table: Table, key: &[u8], value: &[u8]) -> Result<()> {
        self.table(table)
            .write()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, table: Table, key: &[u8]) -> Result<bool> {
        Ok(self.table(table).write().remove(key).is_some())
    }

    fn keys_with_prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .table(table)
            .read()
            .range(prefix.to_vec()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
