//! Content extraction
//!
//! This module provides:
//! - The [`FileParser`] trait implemented by every extractor
//! - A [`ParserRegistry`] that picks the first parser accepting an extension and size
//! - Plain text, Markdown, HTML and (with the `pdf` feature) PDF extractors
//!
//! Parsers are synchronous; the worker runs them on the blocking pool under a timeout.

mod html;
mod markdown;
#[cfg(feature = "pdf")]
mod pdf;
mod text;

pub use html::*;
pub use markdown::*;
#[cfg(feature = "pdf")]
pub use pdf::*;
pub use text::*;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Result kind reported by a parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStatus {
    Success,
    Skipped,
    Failed,
}

/// What a parser produced for one file
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub status: ParseStatus,
    pub content: Option<String>,
    pub processed_bytes: u64,
    pub total_bytes: u64,
    /// Inline embeddings, when the parser computes them
    pub embeddings: Option<Vec<Vec<f32>>>,
    pub reason: Option<String>,
}

impl ParseOutcome {
    pub fn success(content: String, total_bytes: u64) -> Self {
        Self {
            status: ParseStatus::Success,
            content: Some(content),
            processed_bytes: total_bytes,
            total_bytes,
            embeddings: None,
            reason: None,
        }
    }

    pub fn skipped(reason: impl Into<String>, total_bytes: u64) -> Self {
        Self {
            status: ParseStatus::Skipped,
            content: None,
            processed_bytes: 0,
            total_bytes,
            embeddings: None,
            reason: Some(reason.into()),
        }
    }

    pub fn failed(reason: impl Into<String>, total_bytes: u64) -> Self {
        Self {
            status: ParseStatus::Failed,
            content: None,
            processed_bytes: 0,
            total_bytes,
            embeddings: None,
            reason: Some(reason.into()),
        }
    }
}

/// A content extractor for some set of extensions
pub trait FileParser: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Whether this parser handles `extension` (lowercased, dot-prefixed) at `size` bytes
    fn supports(&self, extension: &str, size: u64) -> bool;

    /// Extract text from `path`. Errors are reported as per-file failures.
    fn parse(&self, path: &Path, size: u64) -> Result<ParseOutcome>;
}

/// Ordered set of parsers; the first one that supports a file wins
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn FileParser>>,
}

impl ParserRegistry {
    pub fn empty() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    pub fn register(&mut self, parser: Arc<dyn FileParser>) {
        self.parsers.push(parser);
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Best parser for a file, if any
    pub fn find(&self, extension: &str, size: u64) -> Option<Arc<dyn FileParser>> {
        self.parsers
            .iter()
            .find(|p| p.supports(extension, size))
            .cloned()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(MarkdownParser));
        registry.register(Arc::new(HtmlParser));
        #[cfg(feature = "pdf")]
        registry.register(Arc::new(PdfParser));
        registry.register(Arc::new(TextParser));
        registry
    }
}

/// Check if content appears to be binary
pub fn is_binary_content(data: &[u8]) -> bool {
    // Check for null bytes in the first 8KB
    let check_len = std::cmp::min(data.len(), 8192);
    data[..check_len].contains(&0)
}

/// Read a file as text; `None` when it looks binary
pub fn read_text(path: &Path) -> Result<Option<String>> {
    let bytes = std::fs::read(path)?;
    if is_binary_content(&bytes) {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Collapse whitespace runs, keeping paragraph breaks
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut pending_ws = false;
    let mut newlines = 0;

    for c in text.chars() {
        if c.is_whitespace() {
            if c == '\n' {
                newlines += 1;
            }
            pending_ws = true;
            continue;
        }
        if pending_ws && !result.is_empty() {
            match newlines {
                0 => result.push(' '),
                1 => result.push('\n'),
                _ => result.push_str("\n\n"),
            }
        }
        newlines = 0;
        pending_ws = false;
        result.push(c);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order() {
        let registry = ParserRegistry::default();
        assert_eq!(registry.find(".md", 10).unwrap().name(), "markdown");
        assert_eq!(registry.find(".html", 10).unwrap().name(), "html");
        assert_eq!(registry.find(".rs", 10).unwrap().name(), "text");
        assert!(registry.find(".png", 10).is_none());
        assert!(ParserRegistry::empty().find(".md", 10).is_none());
    }

    #[test]
    fn test_normalize_whitespace() {
        let input = "  Hello   world\n\n\n\ntest\nline ";
        assert_eq!(normalize_whitespace(input), "Hello world\n\ntest\nline");
    }

    #[test]
    fn test_binary_detection() {
        assert!(is_binary_content(&[0x00, 0x01, 0x02]));
        assert!(!is_binary_content(b"Hello world"));
    }
}
