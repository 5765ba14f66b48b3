//! # docsync core
//!
//! Pure logic for the docsync indexing pipeline: data model, page-aware
//! chunking, the vector index abstraction, change detection, and retrieval
//! formatting.
//!
//! This crate does no filesystem, network, or database I/O. Storage
//! backends and embedding providers that need those live in the `docsync`
//! application crate and plug in through [`store::VectorIndex`] and
//! [`embedding::Embedder`].

pub mod changes;
pub mod chunk;
pub mod embedding;
pub mod models;
pub mod search;
pub mod store;
