//! # docsync
//!
//! Content-addressed incremental indexing of a document directory, with
//! cited top-k retrieval over the result.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │  data_dir  │──▶│ SyncOrchestrator │──▶│ VectorIndex  │
//! │ pdf / txt  │   │ hash→chunk→embed │   │ SQLite units │
//! └────────────┘   └────────┬─────────┘   └──────┬───────┘
//!                           │ manifest            │
//!                           ▼ journal, lock       ▼
//!                     ┌───────────┐        ┌───────────┐
//!                     │ index_dir │        │ Retriever │──▶ CLI / HTTP
//!                     └───────────┘        └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`scanner`] | Source discovery and content hashing |
//! | [`extract`] | Page text extraction |
//! | [`manifest`] | Persisted per-source records |
//! | [`journal`] | Write-ahead intent log for crash recovery |
//! | [`lock`] | Advisory single-writer lock |
//! | [`db`] | Database connection and schema |
//! | [`sqlite_index`] | SQLite vector index |
//! | [`embedding`] | Embedding providers |
//! | [`context`] | Process context shared by sync and search |
//! | [`sync`] | Sync orchestration |
//! | [`server`] | HTTP API |
//!
//! Pure logic (chunking, change detection, retrieval formatting, the
//! in-memory index) lives in `docsync_core`.

pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod journal;
pub mod lock;
pub mod manifest;
pub mod scanner;
pub mod server;
pub mod sqlite_index;
pub mod sync;

pub use context::RagContext;
pub use error::SyncError;
