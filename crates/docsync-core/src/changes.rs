//! Change detection: classify a source against the manifest.

use crate::models::{Manifest, SourceRecord};

/// What a sync pass should do with one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Recorded hash matches: nothing to do.
    Unchanged,
    /// No prior record: chunk and add.
    New,
    /// Hash differs from the record: delete old units, then chunk and add.
    Changed { previous_sha256: String },
    /// A previous pass began indexing this source and never committed;
    /// its units are in an unknown state and must be replaced.
    Interrupted,
}

impl Change {
    /// Whether stale units for the source may exist and must be deleted
    /// before new ones are added.
    pub fn needs_delete(&self) -> bool {
        matches!(self, Change::Changed { .. } | Change::Interrupted)
    }
}

/// Classify one source given its current content hash.
///
/// `interrupted` takes precedence over the hash comparison: a matching hash
/// says nothing about units that a crashed pass half-replaced.
pub fn classify(manifest: &Manifest, source_path: &str, sha256: &str, interrupted: bool) -> Change {
    if interrupted {
        return Change::Interrupted;
    }
    match manifest.get(source_path) {
        None => Change::New,
        Some(SourceRecord { sha256: prev, .. }) if prev == sha256 => Change::Unchanged,
        Some(prev) => Change::Changed {
            previous_sha256: prev.sha256.clone(),
        },
    }
}

/// Manifest entries whose path is not among the discovered sources.
pub fn missing_sources<'a>(manifest: &'a Manifest, discovered: &[String]) -> Vec<&'a str> {
    manifest
        .files
        .keys()
        .filter(|path| !discovered.iter().any(|d| d == *path))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn manifest_with(path: &str, sha: &str) -> Manifest {
        let mut m = Manifest::default();
        m.insert(
            path.to_string(),
            SourceRecord {
                sha256: sha.to_string(),
                size: 1,
                mtime_ns: 0,
                ingested_at_utc: Utc::now(),
            },
        );
        m
    }

    #[test]
    fn test_classify() {
        let m = manifest_with("/d/a.pdf", "aaa");
        assert_eq!(classify(&m, "/d/a.pdf", "aaa", false), Change::Unchanged);
        assert_eq!(classify(&m, "/d/b.pdf", "bbb", false), Change::New);
        assert_eq!(
            classify(&m, "/d/a.pdf", "zzz", false),
            Change::Changed {
                previous_sha256: "aaa".to_string()
            }
        );
    }

    #[test]
    fn test_interrupted_overrides_matching_hash() {
        let m = manifest_with("/d/a.pdf", "aaa");
        let change = classify(&m, "/d/a.pdf", "aaa", true);
        assert_eq!(change, Change::Interrupted);
        assert!(change.needs_delete());
        assert!(!Change::New.needs_delete());
    }

    #[test]
    fn test_missing_sources() {
        let mut m = manifest_with("/d/a.pdf", "aaa");
        m.files.extend(manifest_with("/d/gone.pdf", "ggg").files);
        let discovered = vec!["/d/a.pdf".to_string()];
        assert_eq!(missing_sources(&m, &discovered), vec!["/d/gone.pdf"]);
    }
}
