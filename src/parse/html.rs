//! HTML parsing and text extraction

use super::{normalize_whitespace, read_text, FileParser, ParseOutcome};
use crate::error::Result;
use scraper::{ElementRef, Html, Node, Selector};
use std::path::Path;

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) => {
                if SKIPPED_ELEMENTS.contains(&el.name()) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                    if matches!(el.name(), "p" | "div" | "li" | "br" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "tr") {
                        out.push('\n');
                    }
                }
            }
            _ => {}
        }
    }
}

/// Extract the title and visible text from an HTML document
pub fn html_to_text(content: &str) -> String {
    let document = Html::parse_document(content);
    let mut text = String::new();

    if let Ok(selector) = Selector::parse("title") {
        if let Some(title) = document.select(&selector).next() {
            text.push_str(title.text().collect::<String>().trim());
            text.push_str("\n\n");
        }
    }

    let body = Selector::parse("body")
        .ok()
        .and_then(|s| document.select(&s).next());
    match body {
        Some(body) => collect_text(body, &mut text),
        None => collect_text(document.root_element(), &mut text),
    }

    normalize_whitespace(&text)
}

pub struct HtmlParser;

impl FileParser for HtmlParser {
    fn name(&self) -> &'static str {
        "html"
    }

    fn supports(&self, extension: &str, _size: u64) -> bool {
        matches!(extension, ".html" | ".htm" | ".xhtml")
    }

    fn parse(&self, path: &Path, size: u64) -> Result<ParseOutcome> {
        match read_text(path)? {
            Some(raw) => Ok(ParseOutcome::success(html_to_text(&raw), size)),
            None => Ok(ParseOutcome::skipped("binary-content", size)),
        }
    }
}
