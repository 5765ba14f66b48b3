//! Advisory single-writer lock for an index directory.
//!
//! [`SyncLock::acquire`] creates the lock file with `create_new`, so exactly
//! one holder can exist at a time across processes. The file records the
//! holder's pid and acquisition time and is removed when the guard drops.
//! A crashed holder leaves the file behind; it must be removed by hand.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::SyncError;

#[derive(Debug)]
pub struct SyncLock {
    path: PathBuf,
}

impl SyncLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        Self::acquire_with(path, |file| {
            writeln!(
                file,
                "pid={} acquired_at={}",
                std::process::id(),
                chrono::Utc::now().to_rfc3339()
            )
        })
    }

    /// Create the lock file and hand it to `stamp`. The guard exists before
    /// `stamp` runs, so a failed write still removes the file.
    fn acquire_with(path: &Path, stamp: impl FnOnce(&mut File) -> io::Result<()>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(SyncError::Locked {
                    path: path.to_path_buf(),
                }
                .into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create lock {}", path.display()))
            }
        };
        let guard = Self {
            path: path.to_path_buf(),
        };
        stamp(&mut file).with_context(|| format!("Failed to write lock {}", path.display()))?;
        Ok(guard)
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release sync lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("idx").join("sync.lock");

        let guard = SyncLock::acquire(&path).unwrap();
        let err = SyncLock::acquire(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::Locked { .. })
        ));

        drop(guard);
        assert!(!path.exists());
        assert!(SyncLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_failed_stamp_releases_lock() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sync.lock");

        let err = SyncLock::acquire_with(&path, |_| Err(io::Error::other("disk full")))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to write lock"));
        assert!(!path.exists());
        assert!(SyncLock::acquire(&path).is_ok());
    }
}
