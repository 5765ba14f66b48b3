//! Sync orchestration: reconcile the index and manifest with the source
//! directory.
//!
//! # Modes
//!
//! | Mode | When | What |
//! |------|------|------|
//! | rebuild | caller asks | erase index, manifest, journal; then as fresh |
//! | fresh | manifest missing, or index and manifest both empty | index every source as added |
//! | incremental | otherwise | skip / add / update per content hash |
//!
//! Only [`SyncError::NoSources`] (and [`SyncError::Locked`]) abort a pass.
//! Per-source failures are logged, counted in `failed`, and left out of the
//! manifest so the next pass retries them. Delete and flush problems are
//! logged and recorded in [`SyncStatus::warnings`].

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeSet;

use docsync_core::changes::{classify, missing_sources, Change};
use docsync_core::models::{Manifest, RetrievalUnit, SourceRecord, SyncMode, SyncStatus};
use docsync_core::store::StoreOutcome;

use crate::context::RagContext;
use crate::error::SyncError;
use crate::extract;
use crate::journal::JournalRecord;
use crate::lock::SyncLock;
use crate::scanner::{self, SourceDescriptor};

/// Result of removing vanished sources from the manifest and index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub removed: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct SyncOrchestrator<'a> {
    ctx: &'a RagContext,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(ctx: &'a RagContext) -> Self {
        Self { ctx }
    }

    /// Run one sync pass. `rebuild` erases all persisted state first.
    pub async fn initialize(&self, rebuild: bool) -> Result<SyncStatus> {
        let _serial = self.ctx.sync_guard().lock().await;
        let paths = &self.ctx.config().paths;
        let _lock = SyncLock::acquire(&paths.lock_file())?;

        let sources =
            scanner::list_sources(&paths.data_dir, &self.ctx.config().scanner.extensions)?;
        if sources.is_empty() {
            return Err(SyncError::NoSources {
                root: paths.data_dir.clone(),
            }
            .into());
        }

        let mode = self.select_mode(rebuild).await?;
        let mut status = SyncStatus::new(mode, sources.len());
        tracing::info!(%mode, sources = sources.len(), "sync started");

        let (mut manifest, interrupted) = match mode {
            SyncMode::Rebuild | SyncMode::Fresh => {
                self.reset_storage(&mut status).await?;
                (Manifest::default(), BTreeSet::new())
            }
            SyncMode::Incremental => {
                let interrupted = self.ctx.journal().interrupted();
                if !interrupted.is_empty() {
                    tracing::warn!(
                        count = interrupted.len(),
                        "previous sync was interrupted; re-indexing affected sources"
                    );
                }
                (self.ctx.manifest().load(), interrupted)
            }
        };

        for source in &sources {
            self.sync_source(source, mode, &mut manifest, &interrupted, &mut status)
                .await;
        }

        if mode == SyncMode::Incremental && self.ctx.config().sync.prune_missing {
            let discovered: Vec<String> = sources.iter().map(SourceDescriptor::key).collect();
            let gone: Vec<String> = missing_sources(&manifest, &discovered)
                .into_iter()
                .map(str::to_string)
                .collect();
            let report = self.prune_paths(&mut manifest, gone).await;
            status.pruned = report.removed.len();
            status.warnings.extend(report.warnings);
        }

        self.persist(&manifest, &mut status).await;
        self.ctx.mark_initialized();

        tracing::info!(
            %mode,
            total = status.total_sources,
            added = status.added,
            updated = status.updated,
            skipped = status.skipped,
            failed = status.failed,
            chunks_added = status.chunks_added,
            "sync finished"
        );
        Ok(status)
    }

    /// Remove manifest records (and their units) for sources no longer
    /// discovered in the source directory.
    pub async fn prune(&self) -> Result<PruneReport> {
        let _serial = self.ctx.sync_guard().lock().await;
        let paths = &self.ctx.config().paths;
        let _lock = SyncLock::acquire(&paths.lock_file())?;

        let discovered: Vec<String> =
            scanner::list_sources(&paths.data_dir, &self.ctx.config().scanner.extensions)?
                .iter()
                .map(SourceDescriptor::key)
                .collect();
        let mut manifest = self.ctx.manifest().load();
        let gone: Vec<String> = missing_sources(&manifest, &discovered)
            .into_iter()
            .map(str::to_string)
            .collect();
        if gone.is_empty() {
            return Ok(PruneReport::default());
        }

        let report = self.prune_paths(&mut manifest, gone).await;
        self.ctx.manifest().save(&manifest)?;
        if let StoreOutcome::Failed(e) = self.ctx.index().flush().await {
            tracing::warn!(error = %e, "index flush failed after prune");
        }
        Ok(report)
    }

    async fn select_mode(&self, rebuild: bool) -> Result<SyncMode> {
        if rebuild {
            return Ok(SyncMode::Rebuild);
        }
        if !self.ctx.manifest().exists() {
            tracing::debug!("no manifest on disk");
            return Ok(SyncMode::Fresh);
        }
        // Sources that yield no units leave the index empty but are still
        // recorded, so only an empty index with an empty manifest is fresh.
        if self.ctx.index().count().await? == 0 && self.ctx.manifest().load().is_empty() {
            tracing::debug!("index and manifest are empty");
            return Ok(SyncMode::Fresh);
        }
        Ok(SyncMode::Incremental)
    }

    /// Erase index contents, manifest, and journal. An index without a
    /// manifest cannot be reconciled, so fresh builds start from nothing too.
    async fn reset_storage(&self, status: &mut SyncStatus) -> Result<()> {
        self.ctx.index().clear().await?;
        if let Err(e) = self.ctx.manifest().remove() {
            warn(status, format!("could not remove manifest: {:#}", e));
        }
        if let Err(e) = self.ctx.journal().clear() {
            warn(status, format!("could not clear journal: {:#}", e));
        }
        Ok(())
    }

    async fn sync_source(
        &self,
        source: &SourceDescriptor,
        mode: SyncMode,
        manifest: &mut Manifest,
        interrupted: &BTreeSet<String>,
        status: &mut SyncStatus,
    ) {
        let key = source.key();
        let sha256 = match scanner::content_hash(&source.path) {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(source = %key, error = %format!("{:#}", e), "cannot hash source; skipping");
                status.failed += 1;
                return;
            }
        };

        let change = match mode {
            SyncMode::Incremental => {
                classify(manifest, &key, &sha256, interrupted.contains(&key))
            }
            SyncMode::Rebuild | SyncMode::Fresh => Change::New,
        };
        if change == Change::Unchanged {
            tracing::debug!(source = %key, "unchanged");
            status.skipped += 1;
            return;
        }

        let units = match self.load_units(source, &key, &sha256) {
            Ok(units) => units,
            Err(e) => {
                tracing::warn!(source = %key, error = %format!("{:#}", e), "cannot load source; keeping previous units");
                status.failed += 1;
                return;
            }
        };

        self.record(
            JournalRecord::Begin {
                source: key.clone(),
                sha256: sha256.clone(),
            },
            status,
        );
        let deleted = change.needs_delete() && self.delete_stale(&key, status).await;

        let added = match self.ctx.index().add(&units, self.ctx.embedder()).await {
            Ok(added) => added,
            Err(e) => {
                tracing::warn!(source = %key, error = %format!("{:#}", e), "failed to index source");
                status.failed += 1;
                // The recorded hash no longer has units behind it.
                if deleted && manifest.remove(&key).is_some() {
                    tracing::warn!(source = %key, "previous units deleted; dropped manifest record");
                }
                return;
            }
        };
        self.record(
            JournalRecord::Added {
                source: key.clone(),
                units: added,
            },
            status,
        );
        self.record(JournalRecord::Committed { source: key.clone() }, status);

        status.chunks_added += added;
        match change {
            Change::New => status.added += 1,
            Change::Interrupted => {
                status.updated += 1;
                status.recovered += 1;
            }
            Change::Changed { .. } | Change::Unchanged => status.updated += 1,
        }
        tracing::info!(source = %key, units = added, change = ?change, "indexed");
        manifest.insert(
            key,
            SourceRecord {
                sha256,
                size: source.size,
                mtime_ns: source.mtime_ns,
                ingested_at_utc: chrono::Utc::now(),
            },
        );
    }

    /// Load and chunk one source. Runs before anything is deleted so an
    /// unreadable file keeps its previous units.
    fn load_units(
        &self,
        source: &SourceDescriptor,
        key: &str,
        sha256: &str,
    ) -> Result<Vec<RetrievalUnit>> {
        let pages = extract::load_pages(&source.path)?;
        Ok(self
            .ctx
            .config()
            .chunking
            .chunker()
            .split(key, sha256, &pages))
    }

    /// Delete the previous units of `key`. Returns whether the delete ran.
    async fn delete_stale(&self, key: &str, status: &mut SyncStatus) -> bool {
        match self.ctx.index().delete_by_source(key).await {
            StoreOutcome::Applied => {
                self.record(
                    JournalRecord::Deleted {
                        source: key.to_string(),
                    },
                    status,
                );
                true
            }
            outcome => {
                warn(
                    status,
                    format!("delete_by_source({}) {}; stale units may remain", key, outcome),
                );
                false
            }
        }
    }

    async fn prune_paths(&self, manifest: &mut Manifest, gone: Vec<String>) -> PruneReport {
        let mut report = PruneReport::default();
        for path in gone {
            match self.ctx.index().delete_by_source(&path).await {
                StoreOutcome::Applied => {}
                outcome => {
                    let msg = format!("delete_by_source({}) {}; orphaned units remain", path, outcome);
                    tracing::warn!("{}", msg);
                    report.warnings.push(msg);
                }
            }
            manifest.remove(&path);
            tracing::info!(source = %path, "pruned");
            report.removed.push(path);
        }
        report
    }

    async fn persist(&self, manifest: &Manifest, status: &mut SyncStatus) {
        match self.ctx.index().flush().await {
            StoreOutcome::Applied => {}
            StoreOutcome::Unsupported => tracing::debug!("index has no flush; skipping"),
            StoreOutcome::Failed(e) => warn(status, format!("index flush failed: {}", e)),
        }

        match self.ctx.manifest().save(manifest) {
            Ok(()) => {
                if let Err(e) = self.ctx.journal().clear() {
                    warn(status, format!("could not clear journal: {:#}", e));
                }
            }
            Err(e) => warn(status, format!("manifest save failed: {:#}", e)),
        }
    }

    fn record(&self, record: JournalRecord, status: &mut SyncStatus) {
        if let Err(e) = self.ctx.journal().append(&record) {
            warn(status, format!("journal write failed: {:#}", e));
        }
    }
}

fn warn(status: &mut SyncStatus, message: String) {
    tracing::warn!("{}", message);
    status.warnings.push(message);
}
