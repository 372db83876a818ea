//! Markdown parsing and text extraction

use super::{normalize_whitespace, read_text, FileParser, ParseOutcome};
use crate::error::Result;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use std::path::Path;

/// Extract readable text from Markdown, dropping markup but keeping code
pub fn markdown_to_text(content: &str) -> String {
    let mut text = String::with_capacity(content.len());

    for event in Parser::new(content) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::Start(Tag::Item) => text.push_str("• "),
            Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::Item)
            | Event::End(TagEnd::CodeBlock) => text.push('\n'),
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::List(_)) => text.push_str("\n\n"),
            _ => {}
        }
    }

    normalize_whitespace(&text)
}

pub struct MarkdownParser;

impl FileParser for MarkdownParser {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn supports(&self, extension: &str, _size: u64) -> bool {
        matches!(extension, ".md" | ".markdown" | ".mdx")
    }

    fn parse(&self, path: &Path, size: u64) -> Result<ParseOutcome> {
        match read_text(path)? {
            Some(raw) => Ok(ParseOutcome::success(markdown_to_text(&raw), size)),
            None => Ok(ParseOutcome::skipped("binary-content", size)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_to_text() {
        let markdown = r#"
# Main Title

This is a paragraph with *some* text.

```rust
fn main() {}
```

- Item 1
- Item 2

[Link text](https://example.com)
"#;

        let text = markdown_to_text(markdown);
        assert!(text.starts_with("Main Title"));
        assert!(text.contains("paragraph with some text"));
        assert!(text.contains("fn main() {}"));
        assert!(text.contains("• Item 1"));
        assert!(text.contains("Link text"));
        assert!(!text.contains("https://example.com"));
        assert!(!text.contains('#'));
    }
}
