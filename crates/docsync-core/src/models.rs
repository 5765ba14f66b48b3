//! Core data types shared by the sync pipeline and retrieval.
//!
//! [`Manifest`] and [`SourceRecord`] serialize to the on-disk manifest
//! schema:
//!
//! ```json
//! { "files": { "/abs/path.pdf": {
//!     "sha256": "…", "size": 1024, "mtime_ns": 0,
//!     "ingested_at_utc": "2024-01-01T00:00:00Z" } } }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder used in unit identities when the source has no page boundaries.
pub const NO_PAGE: &str = "na";

/// What the index last saw for one source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub sha256: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mtime_ns: i64,
    #[serde(default)]
    pub ingested_at_utc: DateTime<Utc>,
}

/// Source path → [`SourceRecord`]. The single record of what has been indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub files: BTreeMap<String, SourceRecord>,
}

impl Manifest {
    pub fn get(&self, source_path: &str) -> Option<&SourceRecord> {
        self.files.get(source_path)
    }

    pub fn insert(&mut self, source_path: String, record: SourceRecord) {
        self.files.insert(source_path, record);
    }

    pub fn remove(&mut self, source_path: &str) -> Option<SourceRecord> {
        self.files.remove(source_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Text of one page of a loaded document.
///
/// `page` is 0-based; `None` when the format has no page boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page: Option<u32>,
    pub text: String,
}

impl PageText {
    pub fn paged(page: u32, text: impl Into<String>) -> Self {
        Self {
            page: Some(page),
            text: text.into(),
        }
    }

    pub fn unpaged(text: impl Into<String>) -> Self {
        Self {
            page: None,
            text: text.into(),
        }
    }
}

/// A bounded span of text from one source document: the unit that is
/// embedded, stored, and searched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalUnit {
    pub text: String,
    pub source_path: String,
    /// 0-based page of the originating source page.
    pub page: Option<u32>,
    pub source_hash: String,
    pub sequence_index: usize,
}

impl RetrievalUnit {
    /// Stable identity `(source_hash, page|na, sequence_index)`, used as the
    /// index's upsert key.
    pub fn id(&self) -> UnitId {
        UnitId::new(&self.source_hash, self.page, self.sequence_index)
    }
}

/// String form of a [`RetrievalUnit`] identity: `"{hash}:{page|na}:{seq}"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(source_hash: &str, page: Option<u32>, sequence_index: usize) -> Self {
        let page = match page {
            Some(p) => p.to_string(),
            None => NO_PAGE.to_string(),
        };
        Self(format!("{}:{}:{}", source_hash, page, sequence_index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored unit together with its similarity to a query.
#[derive(Debug, Clone)]
pub struct ScoredUnit {
    pub unit: RetrievalUnit,
    pub score: f32,
}

/// One formatted retrieval hit: file name, 1-based page, and text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub text: String,
    /// File name only, or `"unknown"`.
    pub source: String,
    /// 1-based page for display; `None` when the unit has no page.
    pub page: Option<u32>,
    pub score: f32,
}

/// Which path a sync pass took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Rebuild,
    Fresh,
    Incremental,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncMode::Rebuild => "rebuild",
            SyncMode::Fresh => "fresh",
            SyncMode::Incremental => "incremental",
        };
        f.write_str(s)
    }
}

/// Summary of one sync pass. Returned to the caller, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub mode: SyncMode,
    #[serde(rename = "pdf_total")]
    pub total_sources: usize,
    #[serde(rename = "added_pdfs")]
    pub added: usize,
    #[serde(rename = "updated_pdfs")]
    pub updated: usize,
    #[serde(rename = "skipped_pdfs")]
    pub skipped: usize,
    #[serde(rename = "failed_pdfs")]
    pub failed: usize,
    pub chunks_added: usize,
    pub pruned: usize,
    pub recovered: usize,
    pub warnings: Vec<String>,
}

impl SyncStatus {
    pub fn new(mode: SyncMode, total_sources: usize) -> Self {
        Self {
            mode,
            total_sources,
            added: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            chunks_added: 0,
            pruned: 0,
            recovered: 0,
            warnings: Vec::new(),
        }
    }
}
