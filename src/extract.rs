//! Document loading: source bytes → page texts.
//!
//! - PDF: one [`PageText`] per page via `pdf-extract`, 0-based page numbers.
//! - Anything else is read as UTF-8 text (lossy). Form-feed (`\x0c`)
//!   characters mark page breaks; text without them is a single unpaged
//!   page.
//!
//! Errors never panic; the sync pipeline logs them and skips the source.

use std::path::Path;

use docsync_core::models::PageText;

const FORM_FEED: char = '\u{000c}';

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Load the pages of the document at `path`, dispatching on extension.
pub fn load_pages(path: &Path) -> Result<Vec<PageText>, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    if is_pdf(path) {
        extract_pdf_pages(&bytes)
    } else {
        Ok(split_text_pages(&String::from_utf8_lossy(&bytes)))
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<PageText>, ExtractError> {
    // pdf-extract can panic on malformed input.
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ExtractError::Pdf("parser panicked on malformed input".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| PageText::paged(i as u32, text))
        .collect())
}

/// Split plain text on form feeds.
pub fn split_text_pages(text: &str) -> Vec<PageText> {
    if !text.contains(FORM_FEED) {
        return vec![PageText::unpaged(text)];
    }
    text.split(FORM_FEED)
        .enumerate()
        .map(|(i, page)| PageText::paged(i as u32, page))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_plain_text_is_unpaged() {
        let pages = split_text_pages("just one body");
        assert_eq!(pages, vec![PageText::unpaged("just one body")]);
    }

    #[test]
    fn test_form_feed_pages_are_zero_based() {
        let pages = split_text_pages("one\u{000c}two\u{000c}three");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], PageText::paged(0, "one"));
        assert_eq!(pages[2], PageText::paged(2, "three"));
    }

    #[test]
    fn test_txt_file_loads_with_form_feeds() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "first\u{000c}second").unwrap();
        let pages = load_pages(&path).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1], PageText::paged(1, "second"));
    }

    #[test]
    fn test_corrupt_pdf_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();
        assert!(matches!(load_pages(&path), Err(ExtractError::Pdf(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            load_pages(&tmp.path().join("gone.txt")),
            Err(ExtractError::Io { .. })
        ));
    }
}
