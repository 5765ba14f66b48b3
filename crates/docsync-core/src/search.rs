//! Retrieval: top-k search with source/page citations.
//!
//! [`Retriever::search`] returns one formatted text block. The two empty
//! cases are reported as sentinel strings rather than errors:
//!
//! - [`NOT_INITIALIZED`] - no index has been built in this process.
//! - [`NO_RESULTS`] - the index answered with zero matches.
//!
//! Stored page metadata is 0-based; everything this module hands to a
//! caller is 1-based.

use std::path::Path;

use anyhow::{bail, Result};

use crate::embedding::Embedder;
use crate::models::{ScoredUnit, SearchResult};
use crate::store::VectorIndex;

pub const NOT_INITIALIZED: &str =
    "Index is not initialized. Run a sync to build the index first.";
pub const NO_RESULTS: &str = "No relevant information found.";
/// Separator between formatted entries.
pub const ENTRY_DELIMITER: &str = "\n\n---\n\n";
/// Shown in place of a page number for units without one.
pub const PAGE_UNKNOWN: &str = "N/A";

pub const DEFAULT_K: usize = 4;

/// Outcome of a structured search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    NotInitialized,
    NoResults,
    Hits(Vec<SearchResult>),
}

impl SearchOutcome {
    /// Render as the single text block handed to callers.
    pub fn render(&self) -> String {
        match self {
            SearchOutcome::NotInitialized => NOT_INITIALIZED.to_string(),
            SearchOutcome::NoResults => NO_RESULTS.to_string(),
            SearchOutcome::Hits(hits) => format_results(hits),
        }
    }
}

/// Read-only view over an index for answering queries.
pub struct Retriever<'a> {
    index: Option<&'a dyn VectorIndex>,
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    /// `index` is `None` when nothing has been built in this process.
    pub fn new(index: Option<&'a dyn VectorIndex>, embedder: &'a dyn Embedder) -> Self {
        Self { index, embedder }
    }

    /// Search and render. Errors only on embedding/store failure.
    pub async fn search(&self, query: &str, k: usize) -> Result<String> {
        Ok(self.search_results(query, k).await?.render())
    }

    pub async fn search_results(&self, query: &str, k: usize) -> Result<SearchOutcome> {
        let Some(index) = self.index else {
            return Ok(SearchOutcome::NotInitialized);
        };
        if query.trim().is_empty() {
            bail!("query must not be empty");
        }
        let hits = index.query(query, k, self.embedder).await?;
        if hits.is_empty() {
            return Ok(SearchOutcome::NoResults);
        }
        Ok(SearchOutcome::Hits(hits.iter().map(to_result).collect()))
    }
}

/// Convert a stored unit into a caller-facing result.
pub fn to_result(scored: &ScoredUnit) -> SearchResult {
    SearchResult {
        text: scored.unit.text.trim().to_string(),
        source: source_name(&scored.unit.source_path),
        page: display_page(scored.unit.page),
        score: scored.score,
    }
}

/// File name of a source path, or `"unknown"`.
pub fn source_name(source_path: &str) -> String {
    if source_path.is_empty() {
        return "unknown".to_string();
    }
    Path::new(source_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// 0-based stored page → 1-based display page.
pub fn display_page(page: Option<u32>) -> Option<u32> {
    page.map(|p| p + 1)
}

/// `**Source:** name | **Page:** n` header, blank line, text; entries joined
/// by [`ENTRY_DELIMITER`].
pub fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| {
            let page = r
                .page
                .map(|p| p.to_string())
                .unwrap_or_else(|| PAGE_UNKNOWN.to_string());
            format!("**Source:** {} | **Page:** {}\n\n{}", r.source, page, r.text)
        })
        .collect::<Vec<_>>()
        .join(ENTRY_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunker;
    use crate::embedding::HashEmbedder;
    use crate::models::{PageText, RetrievalUnit};
    use crate::store::memory::InMemoryIndex;

    fn unit(page: Option<u32>) -> ScoredUnit {
        ScoredUnit {
            unit: RetrievalUnit {
                text: "  body text \n".to_string(),
                source_path: "/srv/docs/guide.pdf".to_string(),
                page,
                source_hash: "h".to_string(),
                sequence_index: 0,
            },
            score: 0.5,
        }
    }

    #[test]
    fn test_page_zero_is_reported_as_one() {
        let r = to_result(&unit(Some(0)));
        assert_eq!(r.page, Some(1));
        assert_eq!(r.source, "guide.pdf");
        assert_eq!(r.text, "body text");
        assert!(format_results(&[r]).starts_with("**Source:** guide.pdf | **Page:** 1\n\n"));
    }

    #[test]
    fn test_missing_page_is_na() {
        let r = to_result(&unit(None));
        assert_eq!(r.page, None);
        assert_eq!(
            format_results(&[r]),
            "**Source:** guide.pdf | **Page:** N/A\n\nbody text"
        );
    }

    #[test]
    fn test_source_name_fallbacks() {
        assert_eq!(source_name(""), "unknown");
        assert_eq!(source_name("/a/b/c.txt"), "c.txt");
    }

    #[test]
    fn test_entries_joined_by_delimiter() {
        let a = to_result(&unit(Some(1)));
        let b = to_result(&unit(Some(2)));
        let text = format_results(&[a, b]);
        assert_eq!(text.matches(ENTRY_DELIMITER).count(), 1);
        assert!(text.contains("**Page:** 2"));
        assert!(text.contains("**Page:** 3"));
    }

    #[tokio::test]
    async fn test_uninitialized_sentinel() {
        let e = HashEmbedder::default();
        let out = Retriever::new(None, &e).search("anything", 4).await.unwrap();
        assert_eq!(out, NOT_INITIALIZED);
    }

    #[tokio::test]
    async fn test_empty_index_sentinel() {
        let e = HashEmbedder::default();
        let index = InMemoryIndex::new();
        let out = Retriever::new(Some(&index), &e)
            .search("anything", 4)
            .await
            .unwrap();
        assert_eq!(out, NO_RESULTS);
    }

    #[tokio::test]
    async fn test_results_best_first() {
        let e = HashEmbedder::default();
        let index = InMemoryIndex::new();
        let pages = vec![
            PageText::paged(0, "Quarterly budget review and forecasts."),
            PageText::paged(1, "Phishing emails impersonate the helpdesk."),
        ];
        let units = Chunker::new(800, 0).split("/d/sec.pdf", "h", &pages);
        index.add(&units, &e).await.unwrap();

        let outcome = Retriever::new(Some(&index), &e)
            .search_results("phishing helpdesk", 1)
            .await
            .unwrap();
        match outcome {
            SearchOutcome::Hits(hits) => {
                assert_eq!(hits.len(), 1);
                assert_eq!(hits[0].page, Some(2));
                assert!(hits[0].text.contains("Phishing"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
