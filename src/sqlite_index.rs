//! SQLite-backed [`VectorIndex`].
//!
//! One row per retrieval unit, keyed by [`UnitId`]. Vectors are stored as
//! little-endian f32 blobs and searched by brute-force cosine similarity.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use docsync_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use docsync_core::models::{RetrievalUnit, ScoredUnit};
use docsync_core::store::{rank, IndexEntry, StoreOutcome, VectorIndex};

use crate::db;

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(db_path: &Path) -> Result<Self> {
        Ok(Self::new(db::connect(db_path).await?))
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for entry in &entries {
            let unit = &entry.unit;
            sqlx::query(
                r#"
                INSERT INTO units (id, source_path, source_hash, page, seq, text, embedding, dims)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source_path = excluded.source_path,
                    source_hash = excluded.source_hash,
                    page = excluded.page,
                    seq = excluded.seq,
                    text = excluded.text,
                    embedding = excluded.embedding,
                    dims = excluded.dims
                "#,
            )
            .bind(entry.id.as_str())
            .bind(&unit.source_path)
            .bind(&unit.source_hash)
            .bind(unit.page.map(i64::from))
            .bind(unit.sequence_index as i64)
            .bind(&unit.text)
            .bind(vec_to_blob(&entry.vector))
            .bind(entry.vector.len() as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn search_vector(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredUnit>> {
        let rows = sqlx::query(
            "SELECT source_path, source_hash, page, seq, text, embedding FROM units",
        )
        .fetch_all(&self.pool)
        .await?;

        let scored = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let page: Option<i64> = row.get("page");
                let seq: i64 = row.get("seq");
                ScoredUnit {
                    score: cosine_similarity(vector, &blob_to_vec(&blob)),
                    unit: RetrievalUnit {
                        text: row.get("text"),
                        source_path: row.get("source_path"),
                        page: page.and_then(|p| u32::try_from(p).ok()),
                        source_hash: row.get("source_hash"),
                        sequence_index: seq.max(0) as usize,
                    },
                }
            })
            .collect();

        Ok(rank(scored, k))
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM units")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    async fn count_for_source(&self, source_path: &str) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM units WHERE source_path = ?")
            .bind(source_path)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM units").execute(&self.pool).await?;
        Ok(())
    }

    async fn delete_by_source(&self, source_path: &str) -> StoreOutcome {
        match sqlx::query("DELETE FROM units WHERE source_path = ?")
            .bind(source_path)
            .execute(&self.pool)
            .await
        {
            Ok(_) => StoreOutcome::Applied,
            Err(e) => StoreOutcome::Failed(e.to_string()),
        }
    }

    async fn flush(&self) -> StoreOutcome {
        match sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
        {
            Ok(_) => StoreOutcome::Applied,
            Err(e) => StoreOutcome::Failed(e.to_string()),
        }
    }
}
