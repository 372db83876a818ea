//! PDF text extraction (requires the `pdf` feature)

use super::{normalize_whitespace, FileParser, ParseOutcome};
use crate::error::{Error, Result};
use std::path::Path;

pub struct PdfParser;

impl FileParser for PdfParser {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn supports(&self, extension: &str, _size: u64) -> bool {
        extension == ".pdf"
    }

    fn parse(&self, path: &Path, size: u64) -> Result<ParseOutcome> {
        let text = pdf_extract::extract_text(path)
            .map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))?;
        if text.trim().is_empty() {
            return Ok(ParseOutcome::skipped("no-text-layer", size));
        }
        Ok(ParseOutcome::success(normalize_whitespace(&text), size))
    }
}
