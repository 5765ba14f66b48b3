//! Process-wide RAG context.
//!
//! A [`RagContext`] is built once at startup and passed by reference to the
//! sync orchestrator and the retriever. It owns the index handle, the
//! embedder, the manifest and journal locations, and the flag recording
//! whether an index has been built in this process. Rebuilding clears the
//! index in place; the handle itself is never replaced.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use docsync_core::embedding::Embedder;
use docsync_core::search::Retriever;
use docsync_core::store::VectorIndex;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::journal::Journal;
use crate::manifest::ManifestStore;
use crate::sqlite_index::SqliteIndex;
use crate::sync::SyncOrchestrator;

pub struct RagContext {
    config: Config,
    manifest: ManifestStore,
    journal: Journal,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    initialized: AtomicBool,
    sync_guard: tokio::sync::Mutex<()>,
}

impl RagContext {
    /// Open the SQLite index under `paths.index_dir` and build the
    /// configured embedder.
    pub async fn open(config: Config) -> Result<Self> {
        let index = SqliteIndex::open(&config.paths.index_file()).await?;
        let embedder = create_embedder(&config.embedding)?;
        Ok(Self::with_parts(config, Arc::new(index), embedder))
    }

    /// Assemble a context from explicit parts.
    pub fn with_parts(
        config: Config,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let manifest = ManifestStore::new(config.paths.manifest_file());
        let journal = Journal::new(config.paths.journal_file());
        Self {
            config,
            manifest,
            journal,
            index,
            embedder,
            initialized: AtomicBool::new(false),
            sync_guard: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn manifest(&self) -> &ManifestStore {
        &self.manifest
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn index(&self) -> &dyn VectorIndex {
        &*self.index
    }

    pub fn embedder(&self) -> &dyn Embedder {
        &*self.embedder
    }

    /// Whether a sync pass has completed in this process.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    pub(crate) fn sync_guard(&self) -> &tokio::sync::Mutex<()> {
        &self.sync_guard
    }

    pub fn orchestrator(&self) -> SyncOrchestrator<'_> {
        SyncOrchestrator::new(self)
    }

    /// A retriever that reports "not initialized" until a sync has run.
    pub fn retriever(&self) -> Retriever<'_> {
        let index = if self.is_initialized() {
            Some(self.index())
        } else {
            None
        };
        Retriever::new(index, self.embedder())
    }

    /// Search with the configured default `k` when `k` is `None`.
    pub async fn search(&self, query: &str, k: Option<usize>) -> Result<String> {
        let k = k.unwrap_or(self.config.retrieval.default_k);
        self.retriever().search(query, k).await
    }
}
