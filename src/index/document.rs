//! Turning an item into an FTS document plus weighted keywords

use super::phonetic::phonetic_keys;
use crate::meta::{FtsDocument, KeywordEntry, PreparedDocument};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

static WORD_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\-_]+").expect("valid regex"));
static PATH_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\\/]+").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

pub const NGRAM_PREFIX: &str = "ng:";
const NGRAM_MIN_WORD_LENGTH: usize = 3;

pub const PRIORITY_TITLE: f64 = 1.25;
pub const PRIORITY_TITLE_TOKEN: f64 = 1.0;
pub const PRIORITY_COMPACT_TITLE: f64 = 1.0;
pub const PRIORITY_ACRONYM: f64 = 1.35;
pub const PRIORITY_FIRST_CHAR: f64 = 1.1;
pub const PRIORITY_PHONETIC_FULL: f64 = 1.15;
pub const PRIORITY_PHONETIC_INITIALS: f64 = 1.2;
pub const PRIORITY_SECONDARY_NAME: f64 = 1.1;
pub const PRIORITY_SECONDARY_TOKEN: f64 = 0.95;
pub const PRIORITY_PATH_SEGMENT: f64 = 0.85;
pub const PRIORITY_EXTENSION: f64 = 1.05;
pub const PRIORITY_ALIAS: f64 = 1.4;
pub const PRIORITY_KEYWORD: f64 = 1.1;
pub const PRIORITY_NGRAM: f64 = 0.5;

/// A caller-supplied keyword or alias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordInput {
    pub value: String,
    /// Falls back to the alias/keyword default when unset
    pub priority: Option<f64>,
}

impl KeywordInput {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            priority: None,
        }
    }

    pub fn with_priority(value: impl Into<String>, priority: f64) -> Self {
        Self {
            value: value.into(),
            priority: Some(priority),
        }
    }
}

/// Anything that can be indexed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchIndexItem {
    pub item_id: String,
    pub provider_id: String,
    /// Item type, e.g. `file`
    pub kind: String,
    pub name: String,
    pub display_name: Option<String>,
    pub path: Option<String>,
    pub extension: Option<String>,
    pub aliases: Vec<KeywordInput>,
    pub keywords: Vec<KeywordInput>,
    pub tags: Vec<String>,
    pub content: Option<String>,
}

fn is_cjk(c: char) -> bool {
    ('\u{4E00}'..='\u{9FA5}').contains(&c)
}

/// Whether a normalized keyword is worth storing
pub fn is_keyword_valid(keyword: &str) -> bool {
    let mut chars = keyword.chars();
    match (chars.next(), chars.next()) {
        (None, _) => false,
        (Some(c), None) => c.is_ascii_lowercase() || c.is_ascii_digit() || is_cjk(c),
        _ => keyword
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || is_cjk(c)),
    }
}

fn split_words(text: &str) -> Vec<&str> {
    WORD_SPLIT
        .split(text)
        .map(str::trim)
        .filter(|t| t.chars().count() > 1)
        .collect()
}

fn split_path(path: &str) -> Vec<&str> {
    PATH_SPLIT
        .split(path)
        .map(str::trim)
        .filter(|t| t.chars().count() > 1)
        .collect()
}

/// First letter of each word of a multi-word title; empty otherwise
fn acronym(text: &str) -> String {
    let words: Vec<&str> = WORD_SPLIT
        .split(text)
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .collect();
    if words.len() <= 1 {
        return String::new();
    }
    words
        .iter()
        .filter_map(|w| w.chars().next())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Two-character n-grams, prefixed so they never collide with real keywords
pub fn ngrams(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    if chars.len() < 2 {
        return Vec::new();
    }
    chars
        .windows(2)
        .map(|w| format!("{}{}{}", NGRAM_PREFIX, w[0], w[1]))
        .collect()
}

/// Keyword → priority accumulator keeping the maximum per keyword
#[derive(Debug, Default)]
struct KeywordSet {
    order: Vec<String>,
    priorities: HashMap<String, f64>,
}

impl KeywordSet {
    fn add(&mut self, keyword: &str, priority: f64) {
        let normalized = keyword.trim().to_lowercase();
        if normalized.is_empty() {
            return;
        }
        match self.priorities.get_mut(&normalized) {
            Some(existing) => {
                if priority > *existing {
                    *existing = priority;
                }
            }
            None => {
                self.priorities.insert(normalized.clone(), priority);
                self.order.push(normalized);
            }
        }
    }

    fn into_entries(self) -> Vec<KeywordEntry> {
        let KeywordSet { order, priorities } = self;
        order
            .into_iter()
            .filter(|k| is_keyword_valid(k))
            .map(|keyword| {
                let priority = priorities.get(&keyword).copied().unwrap_or(1.0);
                KeywordEntry { keyword, priority }
            })
            .collect()
    }
}

/// Build the FTS row and keyword set for an item
pub fn prepare_document(item: &SearchIndexItem, with_ngrams: bool) -> PreparedDocument {
    let mut set = KeywordSet::default();

    let title_source = item
        .display_name
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(&item.name);
    let title = title_source.trim().to_lowercase();

    set.add(&title, PRIORITY_TITLE);
    for token in split_words(&title) {
        set.add(token, PRIORITY_TITLE_TOKEN);
    }

    let compact = WHITESPACE.replace_all(&title, "").to_string();
    if compact.chars().count() > 1 {
        set.add(&compact, PRIORITY_COMPACT_TITLE);
    }

    let acronym = acronym(title_source);
    if !acronym.is_empty() {
        set.add(&acronym, PRIORITY_ACRONYM);
    }

    if title_source.chars().any(is_cjk) {
        let (full, initials) = phonetic_keys(title_source);
        set.add(&full, PRIORITY_PHONETIC_FULL);
        set.add(&initials, PRIORITY_PHONETIC_INITIALS);
    } else if acronym.chars().count() != 1 {
        if let Some(first) = title.chars().next().filter(|c| c.is_ascii_alphanumeric()) {
            set.add(&first.to_string(), PRIORITY_FIRST_CHAR);
        }
    }

    let secondary = item.name.trim().to_lowercase();
    if !secondary.is_empty() && secondary != title {
        set.add(&secondary, PRIORITY_SECONDARY_NAME);
        for token in split_words(&secondary) {
            set.add(token, PRIORITY_SECONDARY_TOKEN);
        }
    }

    let path = item.path.as_deref().unwrap_or_default().to_lowercase();
    for segment in split_path(&path) {
        set.add(segment, PRIORITY_PATH_SEGMENT);
    }

    if let Some(ext) = item.extension.as_deref() {
        let ext = ext.trim().to_lowercase();
        if !ext.is_empty() {
            set.add(&ext, PRIORITY_EXTENSION);
            let bare = ext.trim_start_matches('.');
            if !bare.is_empty() && bare != ext {
                set.add(bare, PRIORITY_EXTENSION);
            }
        }
    }

    for alias in &item.aliases {
        set.add(&alias.value, alias.priority.unwrap_or(PRIORITY_ALIAS));
    }
    for keyword in &item.keywords {
        set.add(&keyword.value, keyword.priority.unwrap_or(PRIORITY_KEYWORD));
    }

    let mut entries = set.into_entries();
    let keyword_field = entries
        .iter()
        .map(|e| e.keyword.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    if with_ngrams {
        let mut grams = KeywordSet::default();
        for entry in &entries {
            if entry.keyword.chars().count() >= NGRAM_MIN_WORD_LENGTH {
                for gram in ngrams(&entry.keyword) {
                    grams.add(&gram, PRIORITY_NGRAM);
                }
            }
        }
        entries.extend(grams.order.into_iter().map(|keyword| KeywordEntry {
            keyword,
            priority: PRIORITY_NGRAM,
        }));
    }

    PreparedDocument {
        document: FtsDocument {
            item_id: item.item_id.clone(),
            provider: item.provider_id.clone(),
            kind: item.kind.clone(),
            title: title_source.to_string(),
            title_compact: compact,
            keywords: keyword_field,
            tags: item
                .tags
                .iter()
                .map(|t| t.to_lowercase())
                .collect::<Vec<_>>()
                .join(" "),
            path,
            content: item.content.as_deref().unwrap_or_default().to_lowercase(),
        },
        keywords: entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, path: &str, ext: &str) -> SearchIndexItem {
        SearchIndexItem {
            item_id: path.to_string(),
            provider_id: "file-provider".to_string(),
            kind: "file".to_string(),
            name: name.to_string(),
            path: Some(path.to_string()),
            extension: Some(ext.to_string()),
            ..Default::default()
        }
    }

    fn priority_of(doc: &PreparedDocument, keyword: &str) -> Option<f64> {
        doc.keywords
            .iter()
            .find(|k| k.keyword == keyword)
            .map(|k| k.priority)
    }

    #[test]
    fn test_keyword_validity() {
        assert!(is_keyword_valid("report2024"));
        assert!(is_keyword_valid("a"));
        assert!(is_keyword_valid("报告"));
        assert!(!is_keyword_valid("todo.md"));
        assert!(!is_keyword_valid("-"));
        assert!(!is_keyword_valid(""));
    }

    #[test]
    fn test_multi_word_title() {
        let doc = prepare_document(&item("Quarterly Report", "/docs/Quarterly Report.pdf", ".pdf"), false);

        assert_eq!(priority_of(&doc, "quarterlyreport"), Some(PRIORITY_COMPACT_TITLE));
        assert_eq!(priority_of(&doc, "qr"), Some(PRIORITY_ACRONYM));
        assert_eq!(priority_of(&doc, "q"), Some(PRIORITY_FIRST_CHAR));
        assert_eq!(priority_of(&doc, "docs"), Some(PRIORITY_PATH_SEGMENT));
        assert_eq!(priority_of(&doc, "pdf"), Some(PRIORITY_EXTENSION));
        // the full title contains a space and is rejected
        assert_eq!(priority_of(&doc, "quarterly report"), None);
        assert_eq!(doc.document.title_compact, "quarterlyreport");
        assert_eq!(doc.document.path, "/docs/quarterly report.pdf");
    }

    #[test]
    fn test_duplicate_keywords_keep_max_priority() {
        let mut source = item("todo", "/notes/todo.md", ".md");
        source.keywords = vec![KeywordInput::with_priority("todo", 0.3), KeywordInput::new("notes")];
        let doc = prepare_document(&source, false);

        // title (1.25) beats the explicit keyword (0.3)
        assert_eq!(priority_of(&doc, "todo"), Some(PRIORITY_TITLE));
        // keyword default (1.1) beats the path segment (0.85)
        assert_eq!(priority_of(&doc, "notes"), Some(PRIORITY_KEYWORD));
        assert_eq!(doc.keywords.iter().filter(|k| k.keyword == "todo").count(), 1);
    }

    #[test]
    fn test_secondary_name_and_aliases() {
        let mut source = item("budget_2024.xlsx", "/f/budget_2024.xlsx", ".xlsx");
        source.display_name = Some("Budget".to_string());
        source.aliases = vec![KeywordInput::new("money")];
        let doc = prepare_document(&source, false);

        assert_eq!(priority_of(&doc, "budget"), Some(PRIORITY_TITLE));
        assert_eq!(priority_of(&doc, "2024"), Some(PRIORITY_SECONDARY_TOKEN));
        assert_eq!(priority_of(&doc, "money"), Some(PRIORITY_ALIAS));
        assert_eq!(doc.document.title, "Budget");
    }

    #[test]
    fn test_cjk_title_gets_phonetic_keys() {
        let doc = prepare_document(&item("文档管理", "/f/文档管理.txt", ".txt"), false);
        assert_eq!(priority_of(&doc, "wendangguanli"), Some(PRIORITY_PHONETIC_FULL));
        assert_eq!(priority_of(&doc, "wdgl"), Some(PRIORITY_PHONETIC_INITIALS));
        assert_eq!(priority_of(&doc, "文档管理"), Some(PRIORITY_TITLE));
    }

    #[test]
    fn test_ngrams_are_optional() {
        let plain = prepare_document(&item("todo", "/n/todo.md", ".md"), false);
        assert!(plain.keywords.iter().all(|k| !k.keyword.starts_with(NGRAM_PREFIX)));

        let with = prepare_document(&item("todo", "/n/todo.md", ".md"), true);
        assert_eq!(priority_of(&with, "ng:to"), Some(PRIORITY_NGRAM));
        assert!(!with.document.keywords.contains("ng:"));
    }
}
