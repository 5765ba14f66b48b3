//! Persisted manifest: what has been indexed, per source path.
//!
//! [`ManifestStore::load`] never fails: a missing, unreadable, or
//! malformed file yields an empty manifest and a warning.
//! [`ManifestStore::save`] writes a temp file and renames it over the old
//! one, so readers see either the previous manifest or the new one.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use docsync_core::models::Manifest;
use docsync_core::search::source_name;

#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

/// One row of the manifest listing.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub source_path: String,
    pub file: String,
    pub size: u64,
    pub sha256_short: String,
    pub ingested_at_utc: String,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Manifest {
        if !self.path.exists() {
            return Manifest::default();
        }
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "manifest is unreadable; resetting");
                return Manifest::default();
            }
        };
        match serde_json::from_str::<Manifest>(&content) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "manifest is malformed; resetting");
                Manifest::default()
            }
        }
    }

    pub fn save(&self, manifest: &Manifest) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(manifest)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    /// Delete the manifest file. Missing is fine.
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove {}", self.path.display()))
            }
        }
    }

    /// Manifest rows, most recently ingested first.
    pub fn entries_by_recency(&self) -> Vec<ManifestEntry> {
        let manifest = self.load();
        let mut records: Vec<_> = manifest.files.into_iter().collect();
        records.sort_by(|a, b| {
            b.1.ingested_at_utc
                .cmp(&a.1.ingested_at_utc)
                .then_with(|| a.0.cmp(&b.0))
        });
        records
            .into_iter()
            .map(|(path, rec)| ManifestEntry {
                file: source_name(&path),
                size: rec.size,
                sha256_short: rec.sha256.chars().take(10).collect(),
                ingested_at_utc: rec.ingested_at_utc.to_rfc3339(),
                source_path: path,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use docsync_core::models::SourceRecord;
    use tempfile::TempDir;

    fn record(sha: &str, age_secs: i64) -> SourceRecord {
        SourceRecord {
            sha256: sha.to_string(),
            size: 2048,
            mtime_ns: 1,
            ingested_at_utc: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::new(tmp.path().join("m.json"));
        assert!(!store.exists());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_invalid_json_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("m.json");
        std::fs::write(&path, "{ this is not json").unwrap();
        let store = ManifestStore::new(&path);
        assert_eq!(store.load(), Manifest::default());
    }

    #[test]
    fn test_wrong_shape_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("m.json");
        std::fs::write(&path, r#"{"files": {"/a.pdf": {"size": 3}}}"#).unwrap();
        assert!(ManifestStore::new(&path).load().is_empty());
    }

    #[test]
    fn test_save_creates_parent_and_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::new(tmp.path().join("nested").join("dir").join("m.json"));
        let mut manifest = Manifest::default();
        manifest.insert("/d/a.pdf".to_string(), record("abc", 0));
        store.save(&manifest).unwrap();
        assert!(store.exists());
        assert_eq!(store.load(), manifest);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::new(tmp.path().join("m.json"));
        store.save(&Manifest::default()).unwrap();
        store.remove().unwrap();
        store.remove().unwrap();
        assert!(!store.exists());
    }

    #[test]
    fn test_entries_newest_first() {
        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::new(tmp.path().join("m.json"));
        let mut manifest = Manifest::default();
        manifest.insert("/d/old.pdf".to_string(), record("1111111111111", 500));
        manifest.insert("/d/new.pdf".to_string(), record("2222222222222", 5));
        store.save(&manifest).unwrap();

        let entries = store.entries_by_recency();
        assert_eq!(entries[0].file, "new.pdf");
        assert_eq!(entries[1].file, "old.pdf");
        assert_eq!(entries[0].sha256_short, "2222222222");
    }
}
