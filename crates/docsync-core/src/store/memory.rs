//! In-memory [`VectorIndex`] for tests and ephemeral use.
//!
//! Entries live in a `BTreeMap` behind `std::sync::RwLock`; search is
//! brute-force cosine similarity.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{ScoredUnit, UnitId};

use super::{rank, IndexEntry, StoreOutcome, VectorIndex};

pub struct InMemoryIndex {
    entries: RwLock<BTreeMap<UnitId, IndexEntry>>,
    filtered_delete: bool,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            filtered_delete: true,
        }
    }

    /// An index whose `delete_by_source` reports [`StoreOutcome::Unsupported`],
    /// like a store with no filtered delete.
    pub fn without_filtered_delete() -> Self {
        Self {
            filtered_delete: false,
            ..Self::new()
        }
    }

    /// Snapshot of stored ids, in order.
    pub fn ids(&self) -> Vec<UnitId> {
        match self.entries.read() {
            Ok(entries) => entries.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut stored = self.entries.write().map_err(poisoned)?;
        for entry in entries {
            stored.insert(entry.id.clone(), entry);
        }
        Ok(())
    }

    async fn search_vector(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredUnit>> {
        let stored = self.entries.read().map_err(poisoned)?;
        let scored = stored
            .values()
            .map(|e| ScoredUnit {
                unit: e.unit.clone(),
                score: cosine_similarity(vector, &e.vector),
            })
            .collect();
        Ok(rank(scored, k))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }

    async fn count_for_source(&self, source_path: &str) -> Result<usize> {
        let stored = self.entries.read().map_err(poisoned)?;
        Ok(stored
            .values()
            .filter(|e| e.unit.source_path == source_path)
            .count())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().map_err(poisoned)?.clear();
        Ok(())
    }

    async fn delete_by_source(&self, source_path: &str) -> StoreOutcome {
        if !self.filtered_delete {
            return StoreOutcome::Unsupported;
        }
        match self.entries.write() {
            Ok(mut stored) => {
                stored.retain(|_, e| e.unit.source_path != source_path);
                StoreOutcome::Applied
            }
            Err(e) => StoreOutcome::Failed(e.to_string()),
        }
    }

    async fn flush(&self) -> StoreOutcome {
        StoreOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunker;
    use crate::embedding::HashEmbedder;
    use crate::models::PageText;

    fn units(path: &str, hash: &str, texts: &[&str]) -> Vec<crate::models::RetrievalUnit> {
        let pages: Vec<PageText> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| PageText::paged(i as u32, *t))
            .collect();
        Chunker::new(800, 0).split(path, hash, &pages)
    }

    #[tokio::test]
    async fn test_add_is_upsert_by_identity() {
        let index = InMemoryIndex::new();
        let e = HashEmbedder::new(32);
        let u = units("/a.pdf", "h1", &["one", "two"]);
        assert_eq!(index.add(&u, &e).await.unwrap(), 2);
        assert_eq!(index.add(&u, &e).await.unwrap(), 2);
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_query_empty_store_returns_nothing() {
        let index = InMemoryIndex::new();
        let hits = index.query("anything", 4, &HashEmbedder::new(8)).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_query_returns_fewer_than_k() {
        let index = InMemoryIndex::new();
        let e = HashEmbedder::new(64);
        index.add(&units("/a.pdf", "h", &["alpha", "beta"]), &e).await.unwrap();
        let hits = index.query("alpha", 10, &e).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].unit.text, "alpha");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_delete_by_source_only_touches_that_source() {
        let index = InMemoryIndex::new();
        let e = HashEmbedder::new(32);
        index.add(&units("/a.pdf", "ha", &["a1", "a2"]), &e).await.unwrap();
        index.add(&units("/b.pdf", "hb", &["b1"]), &e).await.unwrap();

        assert_eq!(index.delete_by_source("/a.pdf").await, StoreOutcome::Applied);
        assert_eq!(index.count_for_source("/a.pdf").await.unwrap(), 0);
        assert_eq!(index.count_for_source("/b.pdf").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_unsupported_leaves_units() {
        let index = InMemoryIndex::without_filtered_delete();
        let e = HashEmbedder::new(32);
        index.add(&units("/a.pdf", "ha", &["a1"]), &e).await.unwrap();
        assert_eq!(index.delete_by_source("/a.pdf").await, StoreOutcome::Unsupported);
        assert_eq!(index.count().await.unwrap(), 1);
    }
}
