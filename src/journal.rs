//! Write-ahead intent journal for sync passes.
//!
//! Every source that a pass touches gets a `begin` record before the index
//! is modified and a `committed` record once its units are stored. A
//! source with `begin` but no `committed` was interrupted mid-update: its
//! old units may be gone and its new units only partly added. The next
//! incremental pass re-indexes those sources regardless of their hash.
//!
//! The file is JSON lines, appended and flushed per record.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum JournalRecord {
    Begin { source: String, sha256: String },
    Deleted { source: String },
    Added { source: String, units: usize },
    Committed { source: String },
}

#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, record: &JournalRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open journal {}", self.path.display()))?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    /// All readable records, in order. Torn or garbled lines are skipped.
    pub fn records(&self) -> Vec<JournalRecord> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| match serde_json::from_str(l) {
                Ok(r) => Some(r),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable journal line");
                    None
                }
            })
            .collect()
    }

    /// Sources whose latest `begin` has no later `committed`.
    pub fn interrupted(&self) -> BTreeSet<String> {
        let mut open = BTreeSet::new();
        for record in self.records() {
            match record {
                JournalRecord::Begin { source, .. } => {
                    open.insert(source);
                }
                JournalRecord::Committed { source } => {
                    open.remove(&source);
                }
                JournalRecord::Deleted { .. } | JournalRecord::Added { .. } => {}
            }
        }
        open
    }

    /// Truncate the journal. Missing is fine.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to clear {}", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn begin(s: &str) -> JournalRecord {
        JournalRecord::Begin {
            source: s.to_string(),
            sha256: "h".to_string(),
        }
    }

    #[test]
    fn test_interrupted_sources() {
        let tmp = TempDir::new().unwrap();
        let journal = Journal::new(tmp.path().join("sync.journal"));
        journal.append(&begin("/a.pdf")).unwrap();
        journal
            .append(&JournalRecord::Deleted {
                source: "/a.pdf".to_string(),
            })
            .unwrap();
        journal
            .append(&JournalRecord::Committed {
                source: "/a.pdf".to_string(),
            })
            .unwrap();
        journal.append(&begin("/b.pdf")).unwrap();
        journal
            .append(&JournalRecord::Deleted {
                source: "/b.pdf".to_string(),
            })
            .unwrap();

        let open = journal.interrupted();
        assert_eq!(open.into_iter().collect::<Vec<_>>(), vec!["/b.pdf"]);
    }

    #[test]
    fn test_record_wire_format() {
        let line = serde_json::to_string(&JournalRecord::Added {
            source: "/a.pdf".to_string(),
            units: 3,
        })
        .unwrap();
        assert_eq!(line, r#"{"op":"added","source":"/a.pdf","units":3}"#);
    }

    #[test]
    fn test_garbled_lines_skipped_and_clear() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sync.journal");
        std::fs::write(&path, "{\"op\":\"begin\",\"source\":\"/x\",\"sha256\":\"h\"}\n{\"op\":\"beg").unwrap();
        let journal = Journal::new(&path);
        assert_eq!(journal.records().len(), 1);
        assert!(journal.interrupted().contains("/x"));

        journal.clear().unwrap();
        journal.clear().unwrap();
        assert!(journal.records().is_empty());
    }
}
