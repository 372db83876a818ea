//! Full-text documents and keyword mappings
//!
//! Both tables are keyed by `item_id` and always rewritten together: an item's
//! FTS row and its keyword set are deleted and re-inserted inside one
//! transaction, so no keyword from a previous version of the item survives.

use super::{placeholders, MetaDb, MAX_BIND_CHUNK};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteConnection;
use sqlx::FromRow;
use tracing::debug;

/// One row of the `search_index` FTS table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FtsDocument {
    pub item_id: String,
    pub provider: String,
    pub kind: String,
    pub title: String,
    pub title_compact: String,
    pub keywords: String,
    pub tags: String,
    pub path: String,
    pub content: String,
}

/// A normalized keyword and its priority for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub keyword: String,
    pub priority: f64,
}

/// A document ready to be written: the FTS row plus its keyword set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedDocument {
    pub document: FtsDocument,
    pub keywords: Vec<KeywordEntry>,
}

impl PreparedDocument {
    pub fn item_id(&self) -> &str {
        &self.document.item_id
    }
}

/// An item found through the keyword table
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct KeywordHit {
    pub item_id: String,
    pub priority: f64,
}

/// An item found through the FTS table with its raw bm25 value
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FtsHit {
    pub item_id: String,
    pub score: f64,
}

/// Delete FTS rows and keyword mappings for `item_ids` on an open connection
pub(crate) async fn delete_index_rows(
    conn: &mut SqliteConnection,
    item_ids: &[String],
) -> std::result::Result<(), sqlx::Error> {
    for chunk in item_ids.chunks(MAX_BIND_CHUNK) {
        let list = placeholders(chunk.len());

        let sql = format!("DELETE FROM search_index WHERE item_id IN ({})", list);
        let mut query = sqlx::query(&sql);
        for id in chunk {
            query = query.bind(id);
        }
        query.execute(&mut *conn).await?;

        let sql = format!("DELETE FROM keyword_mappings WHERE item_id IN ({})", list);
        let mut query = sqlx::query(&sql);
        for id in chunk {
            query = query.bind(id);
        }
        query.execute(&mut *conn).await?;
    }
    Ok(())
}

/// Replace documents on an open connection (delete-then-insert)
pub(crate) async fn replace_documents_on(
    conn: &mut SqliteConnection,
    docs: &[PreparedDocument],
) -> std::result::Result<(), sqlx::Error> {
    let ids: Vec<String> = docs.iter().map(|d| d.document.item_id.clone()).collect();
    delete_index_rows(conn, &ids).await?;

    for prepared in docs {
        let doc = &prepared.document;
        sqlx::query(
            r#"
            INSERT INTO search_index
                (item_id, provider, type, title, title_compact, keywords, tags, path, content)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.item_id)
        .bind(&doc.provider)
        .bind(&doc.kind)
        .bind(&doc.title)
        .bind(&doc.title_compact)
        .bind(&doc.keywords)
        .bind(&doc.tags)
        .bind(&doc.path)
        .bind(&doc.content)
        .execute(&mut *conn)
        .await?;

        for entry in &prepared.keywords {
            sqlx::query(
                "INSERT INTO keyword_mappings (keyword, item_id, provider_id, priority) VALUES (?, ?, ?, ?)",
            )
            .bind(&entry.keyword)
            .bind(&doc.item_id)
            .bind(&doc.provider)
            .bind(entry.priority)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

/// Escape `%`, `_` and `\` for a LIKE pattern using `\` as the escape char
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl MetaDb {
    // ===== Search Index Operations =====

    /// Replace the FTS row and keyword set of every document in one transaction
    pub async fn replace_documents(&self, docs: &[PreparedDocument]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let pool = self.pool();
        self.write("search-index.replace", move || async move {
            let mut tx = pool.begin().await?;
            replace_documents_on(&mut tx, docs).await?;
            tx.commit().await
        })
        .await?;
        debug!("Indexed {} documents", docs.len());
        Ok(())
    }

    /// Remove FTS rows and keyword mappings for the given items
    pub async fn remove_items(&self, item_ids: &[String]) -> Result<()> {
        if item_ids.is_empty() {
            return Ok(());
        }
        let pool = self.pool();
        self.write("search-index.remove", move || async move {
            let mut tx = pool.begin().await?;
            delete_index_rows(&mut tx, item_ids).await?;
            tx.commit().await
        })
        .await
    }

    /// Remove every item of a provider; zero matches is not an error
    pub async fn remove_by_provider(&self, provider: &str) -> Result<usize> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT item_id FROM search_index WHERE provider = ?",
        )
        .bind(provider)
        .fetch_all(self.pool())
        .await?;

        if ids.is_empty() {
            debug!("No indexed items for provider {}", provider);
            return Ok(0);
        }
        self.remove_items(&ids).await?;
        Ok(ids.len())
    }

    /// Run a MATCH query scoped to a provider, best matches first
    pub async fn search_fts(&self, provider: &str, fts_query: &str, limit: usize) -> Result<Vec<FtsHit>> {
        let hits = sqlx::query_as::<_, FtsHit>(
            r#"
            SELECT item_id, bm25(search_index) AS score
            FROM search_index
            WHERE search_index MATCH ? AND provider = ?
            ORDER BY score
            LIMIT ?
            "#,
        )
        .bind(fts_query)
        .bind(provider)
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await?;
        Ok(hits)
    }

    /// Items mapped to exactly `keyword`, highest priority first
    pub async fn lookup_keyword(&self, keyword: &str, provider: &str, limit: usize) -> Result<Vec<KeywordHit>> {
        let hits = sqlx::query_as::<_, KeywordHit>(
            r#"
            SELECT item_id, MAX(priority) AS priority
            FROM keyword_mappings
            WHERE keyword = ? AND provider_id = ?
            GROUP BY item_id
            ORDER BY priority DESC
            LIMIT ?
            "#,
        )
        .bind(keyword)
        .bind(provider)
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await?;
        Ok(hits)
    }

    /// Items with a keyword starting with `prefix`
    pub async fn lookup_keyword_prefix(
        &self,
        prefix: &str,
        provider: &str,
        limit: usize,
    ) -> Result<Vec<KeywordHit>> {
        let pattern = format!("{}%", escape_like(prefix));
        let hits = sqlx::query_as::<_, KeywordHit>(
            r#"
            SELECT item_id, MAX(priority) AS priority
            FROM keyword_mappings
            WHERE keyword LIKE ? ESCAPE '\' AND provider_id = ? AND keyword NOT LIKE 'ng:%'
            GROUP BY item_id
            ORDER BY priority DESC
            LIMIT ?
            "#,
        )
        .bind(pattern)
        .bind(provider)
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await?;
        Ok(hits)
    }

    /// Keyword set stored for one item
    pub async fn keywords_for_item(&self, item_id: &str) -> Result<Vec<KeywordEntry>> {
        let rows = sqlx::query_as::<_, (String, f64)>(
            "SELECT keyword, priority FROM keyword_mappings WHERE item_id = ? ORDER BY keyword",
        )
        .bind(item_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|(keyword, priority)| KeywordEntry { keyword, priority })
            .collect())
    }

    /// (item_id, keyword) pairs of a provider with at least `min_len` bytes, n-grams excluded
    pub async fn keywords_for_provider(&self, provider: &str, min_len: usize) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT item_id, keyword FROM keyword_mappings
            WHERE provider_id = ? AND keyword NOT LIKE 'ng:%' AND length(keyword) >= ?
            "#,
        )
        .bind(provider)
        .bind(min_len as i64)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Number of FTS rows for a provider
    pub async fn count_by_provider(&self, provider: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_index WHERE provider = ?")
            .bind(provider)
            .fetch_one(self.pool())
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::tests::setup_test_db;

    fn doc(item_id: &str, keywords: &[(&str, f64)]) -> PreparedDocument {
        PreparedDocument {
            document: FtsDocument {
                item_id: item_id.to_string(),
                provider: "file-provider".to_string(),
                kind: "file".to_string(),
                title: "quarterly report".to_string(),
                title_compact: "quarterlyreport".to_string(),
                keywords: keywords.iter().map(|(k, _)| *k).collect::<Vec<_>>().join(" "),
                tags: "pdf document".to_string(),
                path: item_id.to_lowercase(),
                content: String::new(),
            },
            keywords: keywords
                .iter()
                .map(|(k, p)| KeywordEntry {
                    keyword: k.to_string(),
                    priority: *p,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_replace_regenerates_keyword_set() {
        let (db, _tmp) = setup_test_db().await;
        db.replace_documents(&[doc("/r/a.pdf", &[("old", 1.0), ("shared", 1.0)])])
            .await
            .unwrap();
        db.replace_documents(&[doc("/r/a.pdf", &[("new", 1.0), ("shared", 1.2)])])
            .await
            .unwrap();

        let keywords: Vec<_> = db
            .keywords_for_item("/r/a.pdf")
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.keyword)
            .collect();
        assert_eq!(keywords, vec!["new".to_string(), "shared".to_string()]);
        assert_eq!(db.count_by_provider("file-provider").await.unwrap(), 1);
        assert!(db.lookup_keyword("old", "file-provider", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fts_and_prefix_lookup() {
        let (db, _tmp) = setup_test_db().await;
        db.replace_documents(&[doc("/r/a.pdf", &[("quarterly", 1.0)])])
            .await
            .unwrap();

        let hits = db.search_fts("file-provider", "quart*", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item_id, "/r/a.pdf");

        let hits = db.lookup_keyword_prefix("quar", "file-provider", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(db
            .lookup_keyword_prefix("q%", "file-provider", 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_remove_by_provider_tolerates_empty() {
        let (db, _tmp) = setup_test_db().await;
        assert_eq!(db.remove_by_provider("nobody").await.unwrap(), 0);

        db.replace_documents(&[doc("/r/a.pdf", &[("alpha", 1.0)]), doc("/r/b.pdf", &[("beta", 1.0)])])
            .await
            .unwrap();
        assert_eq!(db.remove_by_provider("file-provider").await.unwrap(), 2);
        assert_eq!(db.count_by_provider("file-provider").await.unwrap(), 0);
        assert!(db.lookup_keyword("alpha", "file-provider", 10).await.unwrap().is_empty());
    }
}
