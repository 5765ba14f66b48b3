//! Conditions callers need to tell apart from ordinary failures.
//!
//! Everything else travels as `anyhow::Error`; use
//! [`anyhow::Error::downcast_ref`] to recover a [`SyncError`].

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The source directory is missing or holds no supported documents.
    /// The only fatal sync condition.
    #[error("no source documents found in {}", root.display())]
    NoSources { root: PathBuf },

    /// Another sync pass holds the index lock.
    #[error("index is locked by another sync pass ({}); remove the lock file if no sync is running", path.display())]
    Locked { path: PathBuf },
}
