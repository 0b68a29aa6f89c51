// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Remote backup destinations.
//!
//! A destination is an opaque blob store addressed by file name. Failures
//! from a destination are transport failures and surface as `BackupIo`.
//!
//! Writers hold [`BackupFileStore::lock_file`] from the read to the write
//! of a cycle. The lock belongs to the destination, not to the manager, so
//! every manager and every process writing the same file is serialized.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use crate::error::{KeywardError, Result};

#[async_trait]
pub trait BackupFileStore: Send + Sync {
    /// Human-readable destination name used in logs.
    fn destination(&self) -> &str;

    async fn get_file_id(&self, name: &str) -> Result<Option<String>>;

    /// Creates an empty file and returns its id.
    async fn create_file(&self, name: &str) -> Result<String>;

    async fn read_file(&self, id: &str) -> Result<Vec<u8>>;

    /// Replaces the file contents in a single write. Callers hold the
    /// file's [`lock_file`](Self::lock_file) guard.
    async fn write_file(&self, id: &str, contents: &[u8]) -> Result<()>;

    /// Waits for exclusive write access to the file called `name`. The
    /// file need not exist yet.
    async fn lock_file(&self, name: &str) -> Result<FileLock>;
}

/// Exclusive write access to one backup file, released on drop.
#[must_use = "the file is unlocked when the guard is dropped"]
pub struct FileLock(Held);

enum Held {
    Process(OwnedMutexGuard<()>),
    File(LockedFile),
}

impl FileLock {
    /// Lock for a store whose writers all live in this process.
    pub fn from_guard(guard: OwnedMutexGuard<()>) -> Self {
        Self(Held::Process(guard))
    }
}

impl std::fmt::Debug for FileLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Held::Process(_) => f.write_str("FileLock(process)"),
            Held::File(l) => write!(f, "FileLock({})", l.path.display()),
        }
    }
}

struct LockedFile {
    file: File,
    path: PathBuf,
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release backup file lock");
        }
    }
}

#[derive(Default)]
struct MemoryFiles {
    names: HashMap<String, String>,
    contents: HashMap<String, Vec<u8>>,
}

/// In-process destination. Failure switches let tests simulate an
/// unreachable remote.
pub struct MemoryFileStore {
    name: String,
    files: Mutex<MemoryFiles>,
    next_id: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MemoryFileStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            files: Mutex::new(MemoryFiles::default()),
            next_id: AtomicUsize::new(1),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `write_file` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw contents of the file called `name`, if any.
    pub fn raw_contents(&self, name: &str) -> Option<Vec<u8>> {
        let files = self.files.lock();
        let id = files.names.get(name)?;
        files.contents.get(id).cloned()
    }

    /// Overwrites the raw contents of `name`, creating it if missing.
    pub fn put_raw(&self, name: &str, contents: &[u8]) {
        let mut files = self.files.lock();
        let id = match files.names.get(name) {
            Some(id) => id.clone(),
            None => {
                let id = format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
                files.names.insert(name.to_string(), id.clone());
                id
            }
        };
        files.contents.insert(id, contents.to_vec());
    }
}

#[async_trait]
impl BackupFileStore for MemoryFileStore {
    fn destination(&self) -> &str {
        &self.name
    }

    async fn get_file_id(&self, name: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(KeywardError::backup_io(format!("{}: unreachable", self.name)));
        }
        Ok(self.files.lock().names.get(name).cloned())
    }

    async fn create_file(&self, name: &str) -> Result<String> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KeywardError::backup_io(format!("{}: create failed", self.name)));
        }
        let mut files = self.files.lock();
        if let Some(id) = files.names.get(name) {
            return Ok(id.clone());
        }
        let id = format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        files.names.insert(name.to_string(), id.clone());
        files.contents.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn read_file(&self, id: &str) -> Result<Vec<u8>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(KeywardError::backup_io(format!("{}: unreachable", self.name)));
        }
        self.files
            .lock()
            .contents
            .get(id)
            .cloned()
            .ok_or_else(|| KeywardError::backup_io(format!("{}: no file {id}", self.name)))
    }

    async fn write_file(&self, id: &str, contents: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KeywardError::backup_io(format!("{}: write failed", self.name)));
        }
        let mut files = self.files.lock();
        if !files.contents.contains_key(id) {
            return Err(KeywardError::backup_io(format!("{}: no file {id}", self.name)));
        }
        files.contents.insert(id.to_string(), contents.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn lock_file(&self, name: &str) -> Result<FileLock> {
        let lock = Arc::clone(self.locks.lock().entry(name.to_string()).or_default());
        Ok(FileLock::from_guard(lock.lock_owned().await))
    }
}

/// Destination backed by a local (or mounted) directory. The file id is the
/// file name. Writes go through a temporary file and a rename, so readers
/// see either the old or the new contents. `lock_file` takes an exclusive
/// lock on `.{name}.lock` next to the file.
pub struct LocalDirFileStore {
    root: PathBuf,
    label: String,
}

impl LocalDirFileStore {
    pub fn new(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).map_err(io_error)?;
        Ok(Self {
            label: root.display().to_string(),
            root: root.to_path_buf(),
        })
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty()
            || id.starts_with('.')
            || id.contains(['/', '\\'])
            || id.contains("..")
        {
            return Err(KeywardError::InvalidInput(format!("invalid backup file name: {id}")));
        }
        Ok(self.root.join(id))
    }
}

fn io_error(e: std::io::Error) -> KeywardError {
    KeywardError::BackupIo(e.to_string())
}

fn join_error(e: tokio::task::JoinError) -> KeywardError {
    KeywardError::BackupIo(format!("backup I/O task failed: {e}"))
}

#[cfg(not(windows))]
fn fsync_dir(path: &Path) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("path has no parent directory"))?;
    File::open(parent)?.sync_all()
}

#[cfg(windows)]
fn fsync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> std::io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| std::io::Error::other("invalid file name"))?;
    Ok(path.with_file_name(format!(".{file_name}.{suffix}")))
}

fn lock_exclusive(path: &Path) -> std::io::Result<LockedFile> {
    let lock_path = sibling(path, "lock")?;
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;
    file.lock_exclusive()?;
    Ok(LockedFile {
        file,
        path: lock_path,
    })
}

fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp_path = sibling(path, "tmp")?;
    let result = (|| {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(contents)?;
        tmp.sync_all()?;
        drop(tmp);
        fs::rename(&tmp_path, path)?;
        fsync_dir(path)
    })();
    if result.is_err() {
        if let Err(e) = fs::remove_file(&tmp_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %tmp_path.display(), error = %e, "failed to remove temporary backup file");
            }
        }
    }
    result
}

#[async_trait]
impl BackupFileStore for LocalDirFileStore {
    fn destination(&self) -> &str {
        &self.label
    }

    async fn get_file_id(&self, name: &str) -> Result<Option<String>> {
        let path = self.path_for(name)?;
        let exists = tokio::fs::try_exists(&path).await.map_err(io_error)?;
        Ok(exists.then(|| name.to_string()))
    }

    async fn create_file(&self, name: &str) -> Result<String> {
        let path = self.path_for(name)?;
        tokio::task::spawn_blocking(move || {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)
                .map(|_| ())
        })
        .await
        .map_err(join_error)?
        .map_err(io_error)?;
        debug!(destination = %self.label, name, "backup file created");
        Ok(name.to_string())
    }

    async fn read_file(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.path_for(id)?;
        tokio::fs::read(&path).await.map_err(io_error)
    }

    async fn write_file(&self, id: &str, contents: &[u8]) -> Result<()> {
        let path = self.path_for(id)?;
        let contents = contents.to_vec();
        tokio::task::spawn_blocking(move || write_atomically(&path, &contents))
            .await
            .map_err(join_error)?
            .map_err(io_error)
    }

    async fn lock_file(&self, name: &str) -> Result<FileLock> {
        let path = self.path_for(name)?;
        let locked = tokio::task::spawn_blocking(move || lock_exclusive(&path))
            .await
            .map_err(join_error)?
            .map_err(io_error)?;
        debug!(destination = %self.label, name, "backup file locked");
        Ok(FileLock(Held::File(locked)))
    }
}
