//! Source discovery and content hashing.
//!
//! Discovery is flat (non-recursive): only regular files directly inside the
//! source directory whose extension is configured are returned, sorted by
//! path.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Read size used when hashing.
const HASH_BUF_BYTES: usize = 1024 * 1024;

/// A discovered source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Absolute, canonical path.
    pub path: PathBuf,
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch.
    pub mtime_ns: i64,
}

impl SourceDescriptor {
    /// Manifest / index key for this source.
    pub fn key(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

/// List candidate sources under `root`.
///
/// A missing root yields an empty list, not an error.
pub fn list_sources(root: &Path, extensions: &[String]) -> Result<Vec<SourceDescriptor>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let matcher = build_matcher(extensions)?;

    let mut sources = Vec::new();
    let entries = std::fs::read_dir(root)
        .with_context(|| format!("Failed to read source directory: {}", root.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !matcher.is_match(&name) {
            continue;
        }

        let path = std::fs::canonicalize(&path).unwrap_or(path);
        let mtime_ns = metadata
            .modified()
            .ok()
            .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
            .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or(0);

        sources.push(SourceDescriptor {
            path,
            size: metadata.len(),
            mtime_ns,
        });
    }

    // Sort for deterministic ordering
    sources.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(sources)
}

/// SHA-256 of the file's full contents, hex encoded.
///
/// Streams the file in fixed-size reads, so the digest depends only on the
/// bytes and never on buffering.
pub fn content_hash(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUF_BYTES];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Case-insensitive `*.{ext}` matcher over file names.
fn build_matcher(extensions: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for ext in extensions {
        let ext = ext.trim_start_matches('.').to_lowercase();
        let glob = GlobBuilder::new(&format!("*.{}", ext))
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Invalid extension pattern: {}", ext))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
