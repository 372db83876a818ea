//! Search index builder
//!
//! Converts [`SearchIndexItem`]s into FTS documents and keyword mappings and
//! persists them through [`MetaDb`]. Re-indexing an item always replaces its
//! whole keyword set.

pub mod document;
pub mod phonetic;

pub use document::{is_keyword_valid, prepare_document, KeywordInput, SearchIndexItem, NGRAM_PREFIX};

use crate::error::Result;
use crate::meta::{FtsHit, KeywordHit, MetaDb, PreparedDocument};
use std::collections::HashMap;
use tracing::debug;

/// Index maintenance and lookups for one store
#[derive(Clone)]
pub struct SearchIndex {
    db: MetaDb,
    with_ngrams: bool,
}

impl SearchIndex {
    pub fn new(db: MetaDb, with_ngrams: bool) -> Self {
        Self { db, with_ngrams }
    }

    pub fn prepare(&self, item: &SearchIndexItem) -> PreparedDocument {
        prepare_document(item, self.with_ngrams)
    }

    /// Index or re-index items in one transaction
    pub async fn index_items(&self, items: &[SearchIndexItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let docs: Vec<PreparedDocument> = items.iter().map(|i| self.prepare(i)).collect();
        self.db.replace_documents(&docs).await
    }

    pub async fn remove_items(&self, item_ids: &[String]) -> Result<()> {
        self.db.remove_items(item_ids).await
    }

    pub async fn remove_by_provider(&self, provider_id: &str) -> Result<usize> {
        let removed = self.db.remove_by_provider(provider_id).await?;
        debug!("Removed {} items for provider {}", removed, provider_id);
        Ok(removed)
    }

    pub async fn count_by_provider(&self, provider_id: &str) -> Result<usize> {
        self.db.count_by_provider(provider_id).await
    }

    /// Relevance query against the FTS table; a blank query matches nothing
    pub async fn search(&self, provider_id: &str, fts_query: &str, limit: usize) -> Result<Vec<FtsHit>> {
        let trimmed = fts_query.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        self.db.search_fts(provider_id, trimmed, limit).await
    }

    /// Exact keyword lookup for several keywords at once
    pub async fn lookup_keywords(
        &self,
        provider_id: &str,
        keywords: &[String],
        limit: usize,
    ) -> Result<HashMap<String, Vec<KeywordHit>>> {
        let mut out = HashMap::new();
        for keyword in keywords {
            let hits = self.db.lookup_keyword(keyword, provider_id, limit).await?;
            if !hits.is_empty() {
                out.insert(keyword.clone(), hits);
            }
        }
        Ok(out)
    }

    /// Items with a keyword starting with `prefix`, n-grams excluded
    pub async fn lookup_prefix(&self, provider_id: &str, prefix: &str, limit: usize) -> Result<Vec<KeywordHit>> {
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        self.db.lookup_keyword_prefix(prefix, provider_id, limit).await
    }

    /// Items with a keyword containing `query` as a character subsequence,
    /// best matches first
    pub async fn lookup_subsequence(
        &self,
        provider_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(String, f64)>> {
        let query = query.to_lowercase();
        let query_len = query.chars().count();
        if query_len < 2 {
            return Ok(Vec::new());
        }

        let rows = self.db.keywords_for_provider(provider_id, query_len).await?;
        let mut best: HashMap<String, f64> = HashMap::new();
        for (item_id, keyword) in rows {
            let score = subsequence_score(&query, &keyword);
            if score > 0.0 {
                let entry = best.entry(item_id).or_insert(0.0);
                if score > *entry {
                    *entry = score;
                }
            }
        }

        let mut matches: Vec<(String, f64)> = best.into_iter().collect();
        matches.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(limit);
        Ok(matches)
    }
}

/// How well `query` matches `target` as a character subsequence.
///
/// Returns 0 when it is not a subsequence, otherwise a value in (0, 1] mixing
/// coverage of the target and the longest consecutive run.
pub fn subsequence_score(query: &str, target: &str) -> f64 {
    let q: Vec<char> = query.chars().collect();
    let t: Vec<char> = target.chars().collect();
    if q.is_empty() || t.is_empty() || q.len() > t.len() {
        return 0.0;
    }

    let mut qi = 0;
    let mut run = 0;
    let mut longest = 0;
    for &c in &t {
        if qi == q.len() {
            break;
        }
        if c == q[qi] {
            qi += 1;
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    if qi < q.len() {
        return 0.0;
    }

    let coverage = q.len() as f64 / t.len() as f64;
    let consecutive = longest as f64 / q.len() as f64;
    coverage * 0.5 + consecutive * 0.5
}
