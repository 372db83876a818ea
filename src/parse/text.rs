//! Plain text and source code

use super::{read_text, FileParser, ParseOutcome};
use crate::error::Result;
use std::path::Path;

/// Extensions read verbatim even when their MIME type is not `text/*`
const TEXT_LIKE: &[&str] = &[
    ".txt", ".log", ".csv", ".json", ".xml", ".yaml", ".yml", ".toml", ".ini", ".conf", ".sql",
    ".js", ".ts", ".tsx", ".jsx", ".py", ".go", ".rs", ".java", ".kt", ".cs", ".c", ".cpp",
    ".swift", ".php", ".rb", ".sh", ".ps1", ".svg", ".rtf",
];

/// Reads UTF-8 (lossily) from anything textual
pub struct TextParser;

impl FileParser for TextParser {
    fn name(&self) -> &'static str {
        "text"
    }

    fn supports(&self, extension: &str, _size: u64) -> bool {
        if TEXT_LIKE.contains(&extension) {
            return true;
        }
        mime_guess::from_ext(extension.trim_start_matches('.'))
            .first()
            .map(|mime| mime.type_() == mime_guess::mime::TEXT)
            .unwrap_or(false)
    }

    fn parse(&self, path: &Path, size: u64) -> Result<ParseOutcome> {
        match read_text(path)? {
            Some(text) => Ok(ParseOutcome::success(text, size)),
            None => Ok(ParseOutcome::skipped("binary-content", size)),
        }
    }
}
