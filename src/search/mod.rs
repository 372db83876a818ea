//! Query engine
//!
//! Answers free-text queries from the keyword and full-text tables:
//! 1. exact keyword lookups per term, intersected across terms, plus the
//!    whole phrase as one keyword
//! 2. a prefix-wildcard full-text query over the sanitized terms
//! 3. hydration of the union from the file table, pruning stale index rows
//! 4. scoring with usage statistics and type filters, best first
//!
//! Failures degrade to an empty result.

pub mod filters;

pub use filters::{parse_query, resolve_type_alias, ParsedQuery};

use crate::config::{Config, ExtensionTable, QueryConfig};
use crate::error::{Error, Result};
use crate::index::SearchIndex;
use crate::meta::{now_millis, FileRecord, MetaDb, UsageLookup, UsageSummary};
use crate::rank::{
    normalize_fts_score, sort_by_score, CandidateSignals, MatchDetails, MatchType, RankWeights, Ranker,
    ScoreBreakdown,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Score given to every item of a type-only query
pub const TYPE_ONLY_SCORE: f64 = 0.4;

static TERM_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s/]+").unwrap());
static FTS_SANITIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\x{4E00}-\x{9FA5}]+").unwrap());

/// Something the caller can do with a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAction {
    pub id: String,
    pub label: String,
    pub target: String,
}

/// File facts shown next to a result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub size: i64,
    pub ctime: i64,
    pub mtime: i64,
    pub extension: String,
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
}

/// One ranked search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedItem {
    pub id: String,
    pub source: String,
    pub kind: String,
    pub title: String,
    pub path: String,
    pub icon: String,
    pub actions: Vec<ItemAction>,
    pub metadata: ItemMetadata,
    pub score: f64,
    pub scoring: ScoreBreakdown,
    pub match_details: MatchDetails,
}

/// Full-text expression: each sanitized term as a prefix, AND-joined
pub fn build_fts_query(terms: &[String], max_terms: usize) -> String {
    terms
        .iter()
        .flat_map(|term| {
            FTS_SANITIZE
                .replace_all(&term.to_lowercase(), " ")
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .take(max_terms)
        .map(|token| format!("{}*", token))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Query terms split on whitespace and slashes
pub fn split_terms(normalized: &str) -> Vec<String> {
    TERM_SPLIT
        .split(normalized)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn check(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

/// Read-only query service over one store
#[derive(Clone)]
pub struct QueryEngine {
    db: MetaDb,
    index: SearchIndex,
    usage: Arc<dyn UsageLookup>,
    extensions: ExtensionTable,
    limits: QueryConfig,
    provider_id: String,
    provider_type: String,
    weights: RankWeights,
}

impl QueryEngine {
    pub fn new(db: MetaDb, config: &Config) -> Self {
        Self {
            index: SearchIndex::new(db.clone(), config.index.enable_ngrams),
            usage: Arc::new(db.clone()),
            db,
            extensions: config.extensions.clone(),
            limits: config.query.clone(),
            provider_id: config.provider_id.clone(),
            provider_type: config.provider_type.clone(),
            weights: RankWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: RankWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_usage(mut self, usage: Arc<dyn UsageLookup>) -> Self {
        self.usage = usage;
        self
    }

    /// Run a query; errors and cancellation yield an empty list
    pub async fn query(&self, raw: &str, cancel: &CancellationToken) -> Vec<RankedItem> {
        match self.try_query(raw, cancel).await {
            Ok(items) => items,
            Err(Error::Cancelled) => {
                debug!("Query '{}' cancelled", raw);
                Vec::new()
            }
            Err(e) => {
                warn!("Query '{}' failed: {}", raw, e);
                Vec::new()
            }
        }
    }

    /// Run a query, surfacing errors
    pub async fn try_query(&self, raw: &str, cancel: &CancellationToken) -> Result<Vec<RankedItem>> {
        let parsed = parse_query(raw, &self.extensions);
        let normalized = parsed.text.trim().to_string();

        if normalized.is_empty() {
            if parsed.is_type_only() {
                return self.type_only(&parsed, cancel).await;
            }
            return Ok(Vec::new());
        }

        let base_terms = split_terms(&normalized);
        let terms = if base_terms.is_empty() {
            vec![normalized.clone()]
        } else {
            base_terms.clone()
        };

        let precise = self.precise_matches(&normalized, &terms, base_terms.len(), cancel).await?;
        let fuzzy = self.fuzzy_matches(&terms, cancel).await?;

        let mut candidates: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for id in precise.iter().chain(fuzzy.iter().map(|(id, _)| id)) {
            if candidates.len() >= self.limits.max_candidates {
                break;
            }
            if seen.insert(id.clone()) {
                candidates.push(id.clone());
            }
        }
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        check(cancel)?;

        let hydrated = self.db.hydrate_files(&candidates).await?;
        self.prune_stale(&candidates, &hydrated);

        let mut records: Vec<(FileRecord, HashMap<String, String>)> = hydrated;
        if parsed.has_filters() {
            let filters = parsed.filter_set();
            records.retain(|(record, _)| {
                self.extensions
                    .type_tags(&record.extension)
                    .iter()
                    .any(|t| filters.contains(t))
            });
            if records.is_empty() {
                return self.type_only(&parsed, cancel).await;
            }
        }
        check(cancel)?;

        let ids: Vec<String> = records.iter().map(|(r, _)| r.path.clone()).collect();
        let usage = self.usage.usage_for(&ids).await?;

        let precise: HashSet<&String> = precise.iter().collect();
        let fuzzy: HashMap<&String, f64> = fuzzy.iter().map(|(id, s)| (id, *s)).collect();
        let ranker = Ranker::new(self.weights, now_millis());

        let mut items: Vec<RankedItem> = records
            .into_iter()
            .map(|(record, meta)| {
                let summary = usage.get(&record.path);
                let signals = CandidateSignals {
                    precise: precise.contains(&record.path),
                    fts_score: fuzzy.get(&record.path).copied().unwrap_or(0.0),
                    last_used: summary.map(|u| u.last_used),
                    click_count: summary.map(|u| u.click_count).unwrap_or(0),
                    mtime: record.mtime,
                    type_match: parsed.has_filters(),
                };
                let scoring = ranker.score(&signals);
                let details = ranker.match_details(&scoring);
                self.to_item(record, &meta, scoring, details)
            })
            .collect();

        sort_by_score(&mut items, |item| item.score);
        items.truncate(self.limits.page_size);
        debug!("Query '{}' ranked {} items", raw, items.len());
        Ok(items)
    }

    /// Close matches for a query that found nothing: keyword prefixes first,
    /// then character subsequences
    pub async fn suggest(&self, raw: &str, limit: usize) -> Vec<String> {
        let text = parse_query(raw, &self.extensions).text.trim().to_lowercase();
        if text.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut ids: Vec<String> = match self.index.lookup_prefix(&self.provider_id, &text, limit).await {
            Ok(hits) => hits.into_iter().map(|h| h.item_id).collect(),
            Err(e) => {
                warn!("Prefix lookup for '{}' failed: {}", text, e);
                Vec::new()
            }
        };

        if ids.len() < limit {
            match self.index.lookup_subsequence(&self.provider_id, &text, limit).await {
                Ok(matches) => {
                    for (id, _) in matches {
                        if ids.len() >= limit {
                            break;
                        }
                        if !ids.contains(&id) {
                            ids.push(id);
                        }
                    }
                }
                Err(e) => warn!("Subsequence lookup for '{}' failed: {}", text, e),
            }
        }
        ids.truncate(limit);
        ids
    }

    async fn precise_matches(
        &self,
        normalized: &str,
        terms: &[String],
        base_term_count: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let mut matched: Option<Vec<String>> = None;
        for term in terms {
            check(cancel)?;
            let hits = self
                .db
                .lookup_keyword(term, &self.provider_id, self.limits.precise_limit)
                .await?;
            let ids: Vec<String> = hits.into_iter().map(|h| h.item_id).collect();
            matched = Some(match matched {
                None => ids,
                Some(previous) => {
                    let current: HashSet<&String> = ids.iter().collect();
                    previous.into_iter().filter(|id| current.contains(id)).collect()
                }
            });
        }
        let mut matched = matched.unwrap_or_default();

        if base_term_count != 1 {
            check(cancel)?;
            let phrase = self
                .db
                .lookup_keyword(normalized, &self.provider_id, self.limits.precise_limit)
                .await?;
            for hit in phrase {
                if !matched.contains(&hit.item_id) {
                    matched.push(hit.item_id);
                }
            }
        }
        Ok(matched)
    }

    async fn fuzzy_matches(&self, terms: &[String], cancel: &CancellationToken) -> Result<Vec<(String, f64)>> {
        let fts_query = build_fts_query(terms, self.limits.max_fts_terms);
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }
        check(cancel)?;

        let hits = self
            .index
            .search(&self.provider_id, &fts_query, self.limits.fts_limit)
            .await?;
        let mut best: Vec<(String, f64)> = Vec::with_capacity(hits.len());
        for hit in hits {
            let score = normalize_fts_score(hit.score);
            match best.iter_mut().find(|(id, _)| *id == hit.item_id) {
                Some(existing) => existing.1 = existing.1.max(score),
                None => best.push((hit.item_id, score)),
            }
        }
        Ok(best)
    }

    /// Most recently modified files of the filtered types
    async fn type_only(&self, parsed: &ParsedQuery, cancel: &CancellationToken) -> Result<Vec<RankedItem>> {
        check(cancel)?;
        let extensions = self.extensions.extensions_for_tags(&parsed.filter_set());
        let records = self
            .db
            .recent_files_by_extension(&extensions, self.limits.page_size)
            .await?;
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        let mut metadata = self.db.file_metadata(&ids).await?;

        Ok(records
            .into_iter()
            .map(|record| {
                let meta = metadata.remove(&record.id).unwrap_or_default();
                let scoring = ScoreBreakdown {
                    total: TYPE_ONLY_SCORE,
                    ..Default::default()
                };
                let details = MatchDetails {
                    match_type: MatchType::Exact,
                    confidence: None,
                };
                self.to_item(record, &meta, scoring, details)
            })
            .collect())
    }

    /// Drop index rows whose file record no longer exists, off the query path
    fn prune_stale(&self, candidates: &[String], hydrated: &[(FileRecord, HashMap<String, String>)]) {
        let present: HashSet<&str> = hydrated.iter().map(|(r, _)| r.path.as_str()).collect();
        let stale: Vec<String> = candidates
            .iter()
            .filter(|id| !present.contains(id.as_str()))
            .cloned()
            .collect();
        if stale.is_empty() {
            return;
        }

        debug!("Pruning {} stale index entries", stale.len());
        let index = self.index.clone();
        tokio::spawn(async move {
            if let Err(e) = index.remove_items(&stale).await {
                warn!("Failed to prune stale index entries: {}", e);
            }
        });
    }

    fn to_item(
        &self,
        record: FileRecord,
        meta: &HashMap<String, String>,
        scoring: ScoreBreakdown,
        match_details: MatchDetails,
    ) -> RankedItem {
        let tags = self.extensions.type_tags(&record.extension);
        let keywords: Vec<String> = meta
            .get("keywords")
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();
        let title = Path::new(&record.name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| record.name.clone());
        let folder = Path::new(&record.path)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        let icon = meta
            .get("icon")
            .cloned()
            .unwrap_or_else(|| format!("type:{}", tags.first().map(String::as_str).unwrap_or("other")));

        RankedItem {
            id: record.path.clone(),
            source: self.provider_id.clone(),
            kind: self.provider_type.clone(),
            title,
            icon,
            actions: vec![
                ItemAction {
                    id: "open".to_string(),
                    label: "Open".to_string(),
                    target: record.path.clone(),
                },
                ItemAction {
                    id: "open-folder".to_string(),
                    label: "Open containing folder".to_string(),
                    target: folder,
                },
            ],
            metadata: ItemMetadata {
                size: record.size,
                ctime: record.ctime,
                mtime: record.mtime,
                extension: record.extension.clone(),
                tags,
                keywords,
            },
            path: record.path,
            score: scoring.total,
            scoring,
            match_details,
        }
    }
}

/// Usage lookup answering from a fixed map, for callers without a store
#[derive(Debug, Clone, Default)]
pub struct StaticUsage(pub HashMap<String, UsageSummary>);

#[async_trait::async_trait]
impl UsageLookup for StaticUsage {
    async fn usage_for(&self, item_ids: &[String]) -> Result<HashMap<String, UsageSummary>> {
        Ok(item_ids
            .iter()
            .filter_map(|id| self.0.get(id).map(|u| (id.clone(), *u)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{prepare_document, KeywordInput, SearchIndexItem};
    use crate::meta::tests::{scanned, setup_test_db};

    fn item(path: &str) -> SearchIndexItem {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        let stem = name.rsplit_once('.').map(|(s, _)| s.to_string()).unwrap_or(name.clone());
        SearchIndexItem {
            item_id: path.to_string(),
            provider_id: "file-provider".to_string(),
            kind: "file".to_string(),
            name,
            display_name: Some(stem),
            path: Some(path.to_string()),
            extension: Some(".md".to_string()),
            keywords: vec![KeywordInput::with_priority("note", 1.05)],
            ..Default::default()
        }
    }

    async fn engine_with(paths: &[&str]) -> (QueryEngine, MetaDb, tempfile::TempDir) {
        let (db, tmp) = setup_test_db().await;
        let files: Vec<_> = paths.iter().map(|p| scanned(p, now_millis())).collect();
        db.upsert_files(&files).await.unwrap();
        let docs: Vec<_> = paths.iter().map(|p| prepare_document(&item(p), false)).collect();
        db.replace_documents(&docs).await.unwrap();
        (QueryEngine::new(db.clone(), &Config::default()), db, tmp)
    }

    #[test]
    fn test_build_fts_query() {
        let terms = vec!["Hello-World".to_string(), "报告".to_string()];
        assert_eq!(build_fts_query(&terms, 5), "hello* AND world* AND 报告*");

        let many: Vec<String> = (0..8).map(|i| format!("t{}", i)).collect();
        assert_eq!(build_fts_query(&many, 5).matches('*').count(), 5);
        assert_eq!(build_fts_query(&["!!".to_string()], 5), "");
    }

    #[test]
    fn test_split_terms() {
        assert_eq!(split_terms("notes/todo  list"), vec!["notes", "todo", "list"]);
        assert!(split_terms("//").is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_is_empty() {
        let (engine, _db, _tmp) = engine_with(&["/n/todo.md"]).await;
        let cancel = CancellationToken::new();
        assert!(engine.query("", &cancel).await.is_empty());
        assert!(engine.query("   \t", &cancel).await.is_empty());
    }

    #[tokio::test]
    async fn test_exact_title_ranks_first() {
        let (engine, _db, _tmp) = engine_with(&["/n/todo.md", "/n/todolist.md"]).await;
        let results = engine.query("todo", &CancellationToken::new()).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "/n/todo.md");
        assert_eq!(results[0].match_details.match_type, MatchType::Exact);
        assert_eq!(results[1].match_details.match_type, MatchType::Semantic);
        assert_eq!(results[0].actions[1].target, "/n");
    }

    #[tokio::test]
    async fn test_usage_breaks_ties() {
        let (engine, db, _tmp) = engine_with(&["/n/alpha report.md", "/n/beta report.md"]).await;
        db.record_usage("/n/beta report.md").await.unwrap();

        let results = engine.query("report", &CancellationToken::new()).await;
        assert_eq!(results[0].id, "/n/beta report.md");
        assert!(results[0].scoring.recency > 0.0);
    }

    #[tokio::test]
    async fn test_cancelled_query_returns_nothing() {
        let (engine, _db, _tmp) = engine_with(&["/n/todo.md"]).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(engine.query("todo", &cancel).await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_entries_are_pruned() {
        let (engine, db, _tmp) = engine_with(&["/n/ghost.md"]).await;
        sqlx::query("DELETE FROM files").execute(db.pool()).await.unwrap();

        assert!(engine.query("ghost", &CancellationToken::new()).await.is_empty());
        for _ in 0..50 {
            if db.count_by_provider("file-provider").await.unwrap() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(db.count_by_provider("file-provider").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_suggest_close_matches() {
        let (engine, _db, _tmp) = engine_with(&["/n/netease.md", "/n/other.md"]).await;
        assert_eq!(engine.suggest("netea", 5).await, vec!["/n/netease.md".to_string()]);
        assert_eq!(engine.suggest("ntse", 5).await, vec!["/n/netease.md".to_string()]);
        assert!(engine.suggest("  ", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_type_only_query() {
        let (engine, _db, _tmp) = engine_with(&["/n/a.md", "/n/b.png"]).await;
        let results = engine.query("type:images", &CancellationToken::new()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "/n/b.png");
        assert_eq!(results[0].score, TYPE_ONLY_SCORE);
    }
}
