//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the only way the pipeline touches chunk
//! storage. Backends implement a narrow required surface (upsert by id,
//! vector search, counting, clearing); the best-effort operations
//! ([`delete_by_source`](VectorIndex::delete_by_source),
//! [`flush`](VectorIndex::flush)) default to
//! [`StoreOutcome::Unsupported`] for stores that lack them.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`add`](VectorIndex::add) | Embed units and upsert them by identity |
//! | [`query`](VectorIndex::query) | Embed a query and return the top-k units |
//! | [`delete_by_source`](VectorIndex::delete_by_source) | Remove every unit of one source |
//! | [`flush`](VectorIndex::flush) | Durability checkpoint |
//! | [`count`](VectorIndex::count) | Number of stored units |
//! | [`clear`](VectorIndex::clear) | Erase everything (rebuild) |

pub mod memory;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::{check_batch, embed_one, Embedder};
use crate::models::{RetrievalUnit, ScoredUnit, UnitId};

/// A unit ready for storage: identity, vector, and the unit itself
/// (text plus `source_path` / `page` metadata).
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: UnitId,
    pub vector: Vec<f32>,
    pub unit: RetrievalUnit,
}

/// Result of a best-effort storage operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The operation ran.
    Applied,
    /// The backend has no such capability.
    Unsupported,
    /// The operation ran and failed; the index may be inconsistent.
    Failed(String),
}

impl fmt::Display for StoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOutcome::Applied => f.write_str("applied"),
            StoreOutcome::Unsupported => f.write_str("unsupported by this store"),
            StoreOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Persisted embedding store keyed by [`UnitId`].
///
/// Implementations must be `Send + Sync`; all methods take `&self`.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite entries by id.
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Nearest neighbours of `vector` by cosine similarity, best first,
    /// at most `k`. An empty store yields an empty vec.
    async fn search_vector(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredUnit>>;

    /// Total number of stored units.
    async fn count(&self) -> Result<usize>;

    /// Number of stored units whose `source_path` matches.
    async fn count_for_source(&self, source_path: &str) -> Result<usize>;

    /// Remove every stored unit.
    async fn clear(&self) -> Result<()>;

    /// Remove all units whose `source_path` matches.
    async fn delete_by_source(&self, _source_path: &str) -> StoreOutcome {
        StoreOutcome::Unsupported
    }

    /// Make prior writes durable.
    async fn flush(&self) -> StoreOutcome {
        StoreOutcome::Unsupported
    }

    /// Embed `units` and store them keyed by identity. Returns the number
    /// of units stored.
    async fn add(&self, units: &[RetrievalUnit], embedder: &dyn Embedder) -> Result<usize> {
        if units.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        check_batch(embedder, texts.len(), &vectors)?;

        let entries: Vec<IndexEntry> = units
            .iter()
            .zip(vectors)
            .map(|(unit, vector)| IndexEntry {
                id: unit.id(),
                vector,
                unit: unit.clone(),
            })
            .collect();
        let n = entries.len();
        self.upsert(entries).await?;
        Ok(n)
    }

    /// Embed `text` and return up to `k` best matches.
    async fn query(
        &self,
        text: &str,
        k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<ScoredUnit>> {
        if k == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }
        let vector = embed_one(embedder, text).await?;
        self.search_vector(&vector, k).await
    }
}

/// Sort best-first, breaking score ties by identity so results are
/// deterministic, and keep at most `k`.
pub fn rank(mut scored: Vec<ScoredUnit>, k: usize) -> Vec<ScoredUnit> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.unit.id().cmp(&b.unit.id()))
    });
    scored.truncate(k);
    scored
}
