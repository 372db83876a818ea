//! Type filters embedded in query text
//!
//! `type:<name>` tokens are removed from the text and become filters. A bare
//! token that names a type (`pdf`, `images`, `docs`) also becomes a filter
//! but stays in the text so it still matches keywords.

use crate::config::ExtensionTable;
use std::collections::{BTreeSet, HashSet};

const TYPE_PREFIX: &str = "type:";

// alias → type tag
const TYPE_ALIASES: &[(&str, &str)] = &[
    ("doc", "document"),
    ("docs", "document"),
    ("document", "document"),
    ("pdf", "document"),
    ("txt", "text"),
    ("text", "text"),
    ("image", "image"),
    ("img", "image"),
    ("photo", "image"),
    ("picture", "image"),
    ("pic", "image"),
    ("video", "video"),
    ("movie", "video"),
    ("audio", "audio"),
    ("music", "audio"),
    ("song", "audio"),
    ("sound", "audio"),
    ("archive", "archive"),
    ("zip", "archive"),
    ("compressed", "archive"),
    ("sheet", "spreadsheet"),
    ("excel", "spreadsheet"),
    ("spreadsheet", "spreadsheet"),
    ("slide", "presentation"),
    ("ppt", "presentation"),
    ("presentation", "presentation"),
    ("code", "code"),
    ("source", "code"),
    ("src", "code"),
    ("data", "data"),
    ("json", "data"),
    ("ebook", "ebook"),
    ("book", "ebook"),
    ("installer", "installer"),
    ("app", "installer"),
    ("design", "design"),
];

/// Query text with its type filters separated out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    /// Lowercased text with `type:` tokens removed
    pub text: String,
    pub type_filters: BTreeSet<String>,
}

impl ParsedQuery {
    pub fn has_filters(&self) -> bool {
        !self.type_filters.is_empty()
    }

    pub fn is_type_only(&self) -> bool {
        self.text.trim().is_empty() && self.has_filters()
    }

    pub fn filter_set(&self) -> HashSet<String> {
        self.type_filters.iter().cloned().collect()
    }
}

fn lookup(token: &str, known_tags: &HashSet<&str>) -> Option<String> {
    if let Some((_, tag)) = TYPE_ALIASES.iter().find(|(alias, _)| *alias == token) {
        return Some(tag.to_string());
    }
    known_tags.get(token).map(|t| t.to_string())
}

/// Resolve a token to a type tag, accepting plural `s`/`es` forms
pub fn resolve_type_alias(token: &str, known_tags: &HashSet<&str>) -> Option<String> {
    let token = token.trim().to_lowercase();
    if token.is_empty() {
        return None;
    }
    if let Some(tag) = lookup(&token, known_tags) {
        return Some(tag);
    }
    if let Some(stem) = token.strip_suffix("es") {
        if let Some(tag) = lookup(stem, known_tags) {
            return Some(tag);
        }
    }
    token
        .strip_suffix('s')
        .and_then(|stem| lookup(stem, known_tags))
}

/// Split type filters out of raw query text
pub fn parse_query(raw: &str, extensions: &ExtensionTable) -> ParsedQuery {
    let known_tags: HashSet<&str> = extensions
        .iter()
        .flat_map(|(_, meta)| meta.tags.iter().map(String::as_str))
        .collect();

    let mut filters = BTreeSet::new();
    let mut kept = Vec::new();

    for token in raw.split_whitespace() {
        let lower = token.to_lowercase();
        if let Some(tag) = lower
            .strip_prefix(TYPE_PREFIX)
            .and_then(|name| resolve_type_alias(name, &known_tags))
        {
            filters.insert(tag);
            continue;
        }
        if let Some(tag) = resolve_type_alias(&lower, &known_tags) {
            filters.insert(tag);
        }
        kept.push(lower);
    }

    ParsedQuery {
        text: kept.join(" "),
        type_filters: filters,
    }
}
