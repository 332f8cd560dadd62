//! Per-path exclusive lock around a read-modify-write cycle.
//!
//! Two layers, both held for the lifetime of a [`PathLock`]:
//!
//! 1. an in-process mutex keyed by the target path, so threads of one process
//!    queue up instead of interleaving;
//! 2. an advisory `flock`-style lock on `<config>.lock`, so separate
//!    processes do the same.
//!
//! The lock is not re-entrant. Code holding a `PathLock` must call the
//! store's unlocked internals.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use once_cell::sync::Lazy;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

use ovpn_core::paths::lock_path_for;

use crate::error::StoreError;

type LocalLocks = Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>;

static LOCAL_LOCKS: Lazy<LocalLocks> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Guard for exclusive access to one config file.
pub struct PathLock {
    file: File,
    lock_path: PathBuf,
    _local: ArcMutexGuard<RawMutex, ()>,
}

impl PathLock {
    /// Block until `target` is exclusively ours.
    ///
    /// Creates the parent directory and the `.lock` sibling if needed.
    pub fn acquire(target: &Path) -> Result<Self, StoreError> {
        let lock_path = lock_path_for(target);
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| lock_err(&lock_path, e))?;
        }
        let local = local_mutex(target).lock_arc();

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| lock_err(&lock_path, e))?;
        file.lock_exclusive().map_err(|e| lock_err(&lock_path, e))?;

        tracing::debug!("locked {}", lock_path.display());
        Ok(Self {
            file,
            lock_path,
            _local: local,
        })
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for PathLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("failed to unlock {}: {e}", self.lock_path.display());
        }
    }
}

fn local_mutex(target: &Path) -> Arc<Mutex<()>> {
    let key = canonical_key(target);
    LOCAL_LOCKS.lock().entry(key).or_default().clone()
}

/// Canonical form of `target`, resolving through the parent when the file
/// itself does not exist yet.
fn canonical_key(target: &Path) -> PathBuf {
    if let Ok(path) = std::fs::canonicalize(target) {
        return path;
    }
    match (target.parent(), target.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or_else(|_| target.to_path_buf()),
        _ => target.to_path_buf(),
    }
}

fn lock_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Lock {
        path: path.to_path_buf(),
        source,
    }
}
