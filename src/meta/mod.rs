//! Index storage using SQLite
//!
//! This module owns every table the engine persists:
//! - Files (the record mirror of the filesystem)
//! - Scan progress (one completion marker per watch root)
//! - Keyword mappings and the FTS5 `search_index` table
//! - Per-file extension metadata and content extraction progress
//! - Usage statistics read by the ranker
//!
//! All mutations are routed through [`MetaDb::write`], which serializes writers
//! and retries transient busy errors.

mod content;
mod schema;
mod search;
mod write;

pub use content::*;
pub use schema::*;
pub use search::*;
pub use write::*;

use crate::config::{Config, StoreConfig};
use crate::error::{Error, Result};
use crate::scan::ScannedFile;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// SQLite's bound-parameter ceiling is far higher, but large IN lists are slow
pub(crate) const MAX_BIND_CHUNK: usize = 500;

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// `?, ?, ?` with `count` placeholders
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Embedding status of a file's extracted content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingStatus {
    Pending,
    Completed,
}

impl std::fmt::Display for EmbeddingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingStatus::Pending => write!(f, "pending"),
            EmbeddingStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for EmbeddingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(EmbeddingStatus::Pending),
            "completed" => Ok(EmbeddingStatus::Completed),
            _ => Err(Error::Other(format!("Unknown embedding status: {}", s))),
        }
    }
}

/// A persisted file record
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub path: String,
    pub name: String,
    pub extension: String,
    pub size: i64,
    /// Creation time, epoch milliseconds
    pub ctime: i64,
    /// Modification time, epoch milliseconds
    pub mtime: i64,
    pub last_indexed_at: i64,
    pub content: Option<String>,
    pub embedding_status: String,
}

/// The subset of a record reconciliation diffs against
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StoredFileStamp {
    pub id: i64,
    pub path: String,
    pub mtime: i64,
}

/// A completed initial scan of a watch root
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScanProgress {
    pub path: String,
    pub last_scanned: i64,
}

/// Index database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
    writer: Arc<WriteScheduler>,
    retry: RetryPolicy,
}

impl MetaDb {
    /// Connect to the index database described by the config
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.paths.db_file, &config.store).await
    }

    /// Open (creating if needed) the database at `db_path` and apply the schema
    pub async fn open(db_path: &Path, store: &StoreConfig) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(store.busy_timeout_ms))
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(store.max_connections)
            .connect_with(options)
            .await?;

        let db = Self {
            pool,
            writer: Arc::new(WriteScheduler::new()),
            retry: RetryPolicy::from(store),
        };
        db.init_schema().await?;
        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        debug!("Initializing database schema");
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Create supporting indexes; safe to call on every startup
    pub async fn ensure_indexes(&self) -> Result<()> {
        sqlx::raw_sql(INDEX_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn scheduler(&self) -> &WriteScheduler {
        &self.writer
    }

    /// Run a mutation through the write scheduler with busy retry.
    ///
    /// `op` may be invoked more than once, so it must build its transaction
    /// from scratch on every call. Never nest `write` calls.
    pub async fn write<T, F, Fut>(&self, label: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        self.writer
            .schedule(label, with_busy_retry(&self.retry, label, op))
            .await
    }

    // ===== File Operations =====

    /// Insert scanned files, updating existing rows with the same path.
    /// Returns the stored rows so dependent writes can use their ids.
    pub async fn upsert_files(&self, files: &[ScannedFile]) -> Result<Vec<FileRecord>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let now = now_millis();
        let pool = &self.pool;

        self.write("files.upsert", move || async move {
            let mut tx = pool.begin().await?;
            let mut stored = Vec::with_capacity(files.len());
            for file in files {
                let record = sqlx::query_as::<_, FileRecord>(
                    r#"
                    INSERT INTO files (path, name, extension, size, ctime, mtime, last_indexed_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(path) DO UPDATE SET
                        name = excluded.name,
                        extension = excluded.extension,
                        size = excluded.size,
                        ctime = excluded.ctime,
                        mtime = excluded.mtime,
                        last_indexed_at = excluded.last_indexed_at
                    RETURNING *
                    "#,
                )
                .bind(&file.path)
                .bind(&file.name)
                .bind(&file.extension)
                .bind(file.size)
                .bind(file.ctime)
                .bind(file.mtime)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
                stored.push(record);
            }
            tx.commit().await?;
            Ok(stored)
        })
        .await
    }

    /// Apply disk metadata to existing records by id
    pub async fn update_files(&self, updates: &[(i64, ScannedFile)]) -> Result<Vec<FileRecord>> {
        if updates.is_empty() {
            return Ok(Vec::new());
        }
        let now = now_millis();
        let pool = &self.pool;

        self.write("files.update", move || async move {
            let mut tx = pool.begin().await?;
            let mut stored = Vec::with_capacity(updates.len());
            for (id, file) in updates {
                let record = sqlx::query_as::<_, FileRecord>(
                    r#"
                    UPDATE files SET
                        name = ?,
                        extension = ?,
                        size = ?,
                        ctime = ?,
                        mtime = ?,
                        last_indexed_at = ?
                    WHERE id = ?
                    RETURNING *
                    "#,
                )
                .bind(&file.name)
                .bind(&file.extension)
                .bind(file.size)
                .bind(file.ctime)
                .bind(file.mtime)
                .bind(now)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
                if let Some(record) = record {
                    stored.push(record);
                }
            }
            tx.commit().await?;
            Ok(stored)
        })
        .await
    }

    /// Get a file record by path
    pub async fn get_file(&self, path: &str) -> Result<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Fetch records for the given paths; missing paths are simply absent
    pub async fn get_files_by_paths(&self, paths: &[String]) -> Result<Vec<FileRecord>> {
        let mut records = Vec::with_capacity(paths.len());
        for chunk in paths.chunks(MAX_BIND_CHUNK) {
            let sql = format!(
                "SELECT * FROM files WHERE path IN ({})",
                placeholders(chunk.len())
            );
            let mut query = sqlx::query_as::<_, FileRecord>(&sql);
            for path in chunk {
                query = query.bind(path);
            }
            records.extend(query.fetch_all(&self.pool).await?);
        }
        Ok(records)
    }

    /// Every stored path
    pub async fn list_file_paths(&self) -> Result<Vec<String>> {
        let paths = sqlx::query_scalar::<_, String>("SELECT path FROM files")
            .fetch_all(&self.pool)
            .await?;
        Ok(paths)
    }

    /// Records under any of the given roots, for reconciliation
    pub async fn list_file_stamps_under(&self, roots: &[String]) -> Result<Vec<StoredFileStamp>> {
        let mut stamps = Vec::new();
        // two binds per root
        for chunk in roots.chunks(MAX_BIND_CHUNK / 2) {
            let clauses = chunk
                .iter()
                .map(|_| "substr(path, 1, length(?)) = ?")
                .collect::<Vec<_>>()
                .join(" OR ");
            let sql = format!("SELECT id, path, mtime FROM files WHERE {}", clauses);

            let mut query = sqlx::query_as::<_, StoredFileStamp>(&sql);
            for root in chunk {
                let prefix = root_prefix(root);
                query = query.bind(prefix.clone()).bind(prefix);
            }
            stamps.extend(query.fetch_all(&self.pool).await?);
        }
        // overlapping roots in different chunks may repeat a record
        let mut seen = HashSet::new();
        stamps.retain(|stamp| seen.insert(stamp.id));
        Ok(stamps)
    }

    /// Recently modified files with one of the given extensions
    pub async fn recent_files_by_extension(
        &self,
        extensions: &[String],
        limit: usize,
    ) -> Result<Vec<FileRecord>> {
        if extensions.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT * FROM files WHERE extension IN ({}) ORDER BY mtime DESC LIMIT ?",
            placeholders(extensions.len())
        );
        let mut query = sqlx::query_as::<_, FileRecord>(&sql);
        for ext in extensions {
            query = query.bind(ext);
        }
        Ok(query.bind(limit as i64).fetch_all(&self.pool).await?)
    }

    /// Delete records together with their index rows, keyword mappings,
    /// metadata and progress rows, in one transaction per chunk.
    /// Scan completion markers are left alone; see [`MetaDb::forget_scan_roots`].
    pub async fn delete_files_cascade(&self, paths: &[String]) -> Result<u64> {
        let mut deleted = 0;
        for chunk in paths.chunks(MAX_BIND_CHUNK) {
            let pool = &self.pool;
            deleted += self
                .write("files.delete", move || async move {
                    let mut tx = pool.begin().await?;
                    let sql = format!(
                        "DELETE FROM files WHERE path IN ({})",
                        placeholders(chunk.len())
                    );
                    let mut query = sqlx::query(&sql);
                    for path in chunk {
                        query = query.bind(path);
                    }
                    let removed = query.execute(&mut *tx).await?.rows_affected();
                    delete_index_rows(&mut tx, chunk).await?;
                    tx.commit().await?;
                    Ok(removed)
                })
                .await?;
        }
        Ok(deleted)
    }

    // ===== Scan Progress Operations =====

    /// Roots whose initial full scan completed
    pub async fn list_scan_progress(&self) -> Result<Vec<ScanProgress>> {
        let rows = sqlx::query_as::<_, ScanProgress>("SELECT * FROM scan_progress ORDER BY path")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Mark roots as fully scanned
    pub async fn mark_scanned(&self, roots: &[String]) -> Result<()> {
        if roots.is_empty() {
            return Ok(());
        }
        let now = now_millis();
        let pool = &self.pool;
        self.write("scan-progress.upsert", move || async move {
            let mut tx = pool.begin().await?;
            for root in roots {
                sqlx::query(
                    r#"
                    INSERT INTO scan_progress (path, last_scanned) VALUES (?, ?)
                    ON CONFLICT(path) DO UPDATE SET last_scanned = excluded.last_scanned
                    "#,
                )
                .bind(root)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await
        })
        .await
    }

    /// Drop the completion markers of the given roots
    pub async fn forget_scan_roots(&self, roots: &[String]) -> Result<u64> {
        let mut forgotten = 0;
        for chunk in roots.chunks(MAX_BIND_CHUNK) {
            let pool = &self.pool;
            forgotten += self
                .write("scan-progress.forget", move || async move {
                    let sql = format!(
                        "DELETE FROM scan_progress WHERE path IN ({})",
                        placeholders(chunk.len())
                    );
                    let mut query = sqlx::query(&sql);
                    for root in chunk {
                        query = query.bind(root);
                    }
                    Ok(query.execute(pool).await?.rows_affected())
                })
                .await?;
        }
        Ok(forgotten)
    }

    /// Drop every completion marker so all roots are re-scanned as new
    pub async fn clear_scan_progress(&self) -> Result<u64> {
        let pool = &self.pool;
        self.write("scan-progress.clear", move || async move {
            Ok(sqlx::query("DELETE FROM scan_progress")
                .execute(pool)
                .await?
                .rows_affected())
        })
        .await
    }

    // ===== Statistics =====

    /// Get global statistics
    pub async fn get_index_stats(&self, provider_id: &str) -> Result<IndexStats> {
        let file_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await?;
        let scanned_roots: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scan_progress")
            .fetch_one(&self.pool)
            .await?;
        let keyword_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM keyword_mappings WHERE provider_id = ?")
                .bind(provider_id)
                .fetch_one(&self.pool)
                .await?;
        let document_count = self.count_by_provider(provider_id).await?;
        let content_status = self.count_content_status().await?;

        Ok(IndexStats {
            file_count: file_count as usize,
            scanned_roots: scanned_roots as usize,
            keyword_count: keyword_count as usize,
            document_count,
            content_status,
        })
    }
}

/// Root with a trailing separator so `/a/b` does not match `/a/bc`
pub(crate) fn root_prefix(root: &str) -> String {
    let sep = std::path::MAIN_SEPARATOR;
    if root.ends_with(sep) {
        root.to_string()
    } else {
        format!("{}{}", root, sep)
    }
}

/// Whether `path` lies inside `root`
pub fn is_within_root(path: &str, root: &str) -> bool {
    path == root || path.starts_with(&root_prefix(root))
}

/// Index statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub file_count: usize,
    pub scanned_roots: usize,
    pub keyword_count: usize,
    pub document_count: usize,
    pub content_status: Vec<(String, usize)>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) async fn setup_test_db() -> (MetaDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = MetaDb::open(&tmp.path().join("test.db"), &StoreConfig::default())
            .await
            .unwrap();
        db.ensure_indexes().await.unwrap();
        (db, tmp)
    }

    pub(crate) fn scanned(path: &str, mtime: i64) -> ScannedFile {
        let name = path.rsplit('/').next().unwrap().to_string();
        let extension = name
            .rfind('.')
            .map(|i| name[i..].to_lowercase())
            .unwrap_or_default();
        ScannedFile {
            path: path.to_string(),
            name,
            extension,
            size: 10,
            ctime: mtime,
            mtime,
        }
    }

    #[tokio::test]
    async fn test_upsert_files_is_idempotent_by_path() {
        let (db, _tmp) = setup_test_db().await;

        let first = db.upsert_files(&[scanned("/r/a.txt", 1)]).await.unwrap();
        let second = db.upsert_files(&[scanned("/r/a.txt", 2)]).await.unwrap();

        assert_eq!(first[0].id, second[0].id);
        assert_eq!(second[0].mtime, 2);
        assert_eq!(db.list_file_paths().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_files_by_id() {
        let (db, _tmp) = setup_test_db().await;
        let stored = db.upsert_files(&[scanned("/r/a.txt", 1)]).await.unwrap();

        let updated = db
            .update_files(&[(stored[0].id, scanned("/r/a.txt", 5)), (9999, scanned("/r/x.txt", 5))])
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].mtime, 5);
    }

    #[tokio::test]
    async fn test_stamps_are_scoped_to_roots() {
        let (db, _tmp) = setup_test_db().await;
        db.upsert_files(&[
            scanned("/r/a.txt", 1),
            scanned("/r/sub/b.txt", 1),
            scanned("/rx/c.txt", 1),
        ])
        .await
        .unwrap();

        let stamps = db.list_file_stamps_under(&["/r".to_string()]).await.unwrap();
        let mut paths: Vec<_> = stamps.into_iter().map(|s| s.path).collect();
        paths.sort();
        assert_eq!(paths, vec!["/r/a.txt".to_string(), "/r/sub/b.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_scan_progress_marker() {
        let (db, _tmp) = setup_test_db().await;
        db.mark_scanned(&["/r".to_string()]).await.unwrap();
        db.mark_scanned(&["/r".to_string()]).await.unwrap();

        let rows = db.list_scan_progress().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "/r");

        assert_eq!(db.clear_scan_progress().await.unwrap(), 1);
        assert!(db.list_scan_progress().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stamps_for_many_roots() {
        let (db, _tmp) = setup_test_db().await;
        let files: Vec<_> = (0..600).map(|i| scanned(&format!("/r{}/f.txt", i), 1)).collect();
        db.upsert_files(&files).await.unwrap();

        let mut roots: Vec<_> = (0..600).map(|i| format!("/r{}", i)).collect();
        // repeated root lands in a different chunk
        roots.insert(0, "/r599".to_string());
        let stamps = db.list_file_stamps_under(&roots).await.unwrap();
        assert_eq!(stamps.len(), 600);
    }

    #[tokio::test]
    async fn test_delete_keeps_scan_markers() {
        let (db, _tmp) = setup_test_db().await;
        db.upsert_files(&[scanned("/r/a.txt", 1)]).await.unwrap();
        db.mark_scanned(&["/r".to_string(), "/s".to_string()]).await.unwrap();

        db.delete_files_cascade(&["/r/a.txt".to_string(), "/r".to_string()])
            .await
            .unwrap();
        assert_eq!(db.list_scan_progress().await.unwrap().len(), 2);

        assert_eq!(db.forget_scan_roots(&["/r".to_string()]).await.unwrap(), 1);
        let rows = db.list_scan_progress().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "/s");
    }

    #[test]
    fn test_is_within_root() {
        assert!(is_within_root("/a/b/c.txt", "/a/b"));
        assert!(is_within_root("/a/b/c.txt", "/a/b/"));
        assert!(!is_within_root("/a/bc/d.txt", "/a/b"));
        assert!(is_within_root("/a/b", "/a/b"));
    }
}
