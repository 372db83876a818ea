//! Content extraction state, per-file metadata and usage statistics

use super::search::replace_documents_on;
use super::{now_millis, placeholders, EmbeddingStatus, FileRecord, MetaDb, PreparedDocument, MAX_BIND_CHUNK};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use std::str::FromStr;

/// Content extraction status of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Pending,
    Processing,
    Completed,
    Skipped,
    Failed,
}

impl ContentStatus {
    /// Whether no further transitions happen for the file in the current task
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ContentStatus::Completed | ContentStatus::Skipped | ContentStatus::Failed
        )
    }
}

impl std::fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentStatus::Pending => write!(f, "pending"),
            ContentStatus::Processing => write!(f, "processing"),
            ContentStatus::Completed => write!(f, "completed"),
            ContentStatus::Skipped => write!(f, "skipped"),
            ContentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ContentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ContentStatus::Pending),
            "processing" => Ok(ContentStatus::Processing),
            "completed" => Ok(ContentStatus::Completed),
            "skipped" => Ok(ContentStatus::Skipped),
            "failed" => Ok(ContentStatus::Failed),
            _ => Err(Error::Other(format!("Unknown content status: {}", s))),
        }
    }
}

/// A row of `file_index_progress`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub file_id: i64,
    pub status: ContentStatus,
    /// 0..=100
    pub progress: i64,
    pub processed_bytes: Option<i64>,
    pub total_bytes: Option<i64>,
    pub last_error: Option<String>,
}

/// Stored progress row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FileProgress {
    pub file_id: i64,
    pub status: String,
    pub progress: i64,
    pub processed_bytes: Option<i64>,
    pub total_bytes: Option<i64>,
    pub last_error: Option<String>,
    pub started_at: Option<i64>,
    pub updated_at: i64,
}

/// Everything a terminal worker event writes for one file
#[derive(Debug, Clone)]
pub struct ContentWrite {
    pub progress: ProgressUpdate,
    /// Set only when extraction produced content
    pub content: Option<String>,
    pub embedding_status: Option<EmbeddingStatus>,
    pub document: PreparedDocument,
}

/// A `file_extensions` key/value pair
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadataEntry {
    pub file_id: i64,
    pub key: String,
    pub value: String,
}

/// Usage statistics for one item
#[derive(Debug, Clone, Copy, PartialEq, FromRow, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Epoch milliseconds
    pub last_used: i64,
    pub click_count: i64,
}

/// Read access to usage statistics, keyed by item id
#[async_trait]
pub trait UsageLookup: Send + Sync {
    async fn usage_for(&self, item_ids: &[String]) -> Result<HashMap<String, UsageSummary>>;
}

async fn upsert_progress_on(
    conn: &mut sqlx::SqliteConnection,
    update: &ProgressUpdate,
    now: i64,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO file_index_progress
            (file_id, status, progress, processed_bytes, total_bytes, last_error, started_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(file_id) DO UPDATE SET
            status = excluded.status,
            progress = excluded.progress,
            processed_bytes = excluded.processed_bytes,
            total_bytes = excluded.total_bytes,
            last_error = excluded.last_error,
            started_at = COALESCE(file_index_progress.started_at, excluded.started_at),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(update.file_id)
    .bind(update.status.to_string())
    .bind(update.progress)
    .bind(update.processed_bytes)
    .bind(update.total_bytes)
    .bind(&update.last_error)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl MetaDb {
    // ===== File Metadata Operations =====

    /// Upsert per-file key/value metadata
    pub async fn upsert_file_metadata(&self, entries: &[FileMetadataEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let pool = self.pool();
        self.write("file-extensions.upsert", move || async move {
            let mut tx = pool.begin().await?;
            for entry in entries {
                sqlx::query(
                    r#"
                    INSERT INTO file_extensions (file_id, key, value) VALUES (?, ?, ?)
                    ON CONFLICT(file_id, key) DO UPDATE SET value = excluded.value
                    "#,
                )
                .bind(entry.file_id)
                .bind(&entry.key)
                .bind(&entry.value)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await
        })
        .await
    }

    /// Metadata for the given files, keyed by file id
    pub async fn file_metadata(&self, file_ids: &[i64]) -> Result<HashMap<i64, HashMap<String, String>>> {
        let mut out: HashMap<i64, HashMap<String, String>> = HashMap::new();
        for chunk in file_ids.chunks(MAX_BIND_CHUNK) {
            let sql = format!(
                "SELECT file_id, key, value FROM file_extensions WHERE file_id IN ({})",
                placeholders(chunk.len())
            );
            let mut query = sqlx::query_as::<_, (i64, String, String)>(&sql);
            for id in chunk {
                query = query.bind(id);
            }
            for (file_id, key, value) in query.fetch_all(self.pool()).await? {
                out.entry(file_id).or_default().insert(key, value);
            }
        }
        Ok(out)
    }

    /// Records for the given paths, joined with their metadata
    pub async fn hydrate_files(
        &self,
        paths: &[String],
    ) -> Result<Vec<(FileRecord, HashMap<String, String>)>> {
        let records = self.get_files_by_paths(paths).await?;
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        let mut metadata = self.file_metadata(&ids).await?;
        Ok(records
            .into_iter()
            .map(|record| {
                let meta = metadata.remove(&record.id).unwrap_or_default();
                (record, meta)
            })
            .collect())
    }

    // ===== Content Progress Operations =====

    /// Record non-terminal progress (e.g. "processing")
    pub async fn upsert_progress(&self, updates: &[ProgressUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let now = now_millis();
        let pool = self.pool();
        self.write("file-progress.upsert", move || async move {
            let mut tx = pool.begin().await?;
            for update in updates {
                upsert_progress_on(&mut tx, update, now).await?;
            }
            tx.commit().await
        })
        .await
    }

    /// Persist terminal worker results: content columns, progress rows and
    /// index documents, all in one transaction
    pub async fn persist_content(&self, writes: &[ContentWrite]) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let now = now_millis();
        let pool = self.pool();
        self.write("file-content.persist", move || async move {
            let mut tx = pool.begin().await?;
            for write in writes {
                if let Some(content) = &write.content {
                    sqlx::query("UPDATE files SET content = ?, embedding_status = ? WHERE id = ?")
                        .bind(content)
                        .bind(
                            write
                                .embedding_status
                                .unwrap_or(EmbeddingStatus::Pending)
                                .to_string(),
                        )
                        .bind(write.progress.file_id)
                        .execute(&mut *tx)
                        .await?;
                } else if matches!(write.progress.status, ContentStatus::Skipped | ContentStatus::Failed) {
                    // the document below is rebuilt without content, keep the row in step
                    sqlx::query("UPDATE files SET content = NULL WHERE id = ?")
                        .bind(write.progress.file_id)
                        .execute(&mut *tx)
                        .await?;
                }
                upsert_progress_on(&mut tx, &write.progress, now).await?;
            }
            let docs: Vec<PreparedDocument> = writes.iter().map(|w| w.document.clone()).collect();
            replace_documents_on(&mut tx, &docs).await?;
            tx.commit().await
        })
        .await
    }

    /// Progress row for one file
    pub async fn get_progress(&self, file_id: i64) -> Result<Option<FileProgress>> {
        let row = sqlx::query_as::<_, FileProgress>(
            "SELECT * FROM file_index_progress WHERE file_id = ?",
        )
        .bind(file_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Number of progress rows per status
    pub async fn count_content_status(&self) -> Result<Vec<(String, usize)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM file_index_progress GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(s, c)| (s, c as usize)).collect())
    }

    // ===== Usage Operations =====

    /// Record one use of an item
    pub async fn record_usage(&self, item_id: &str) -> Result<()> {
        let now = now_millis();
        let pool = self.pool();
        self.write("usage.record", move || async move {
            sqlx::query(
                r#"
                INSERT INTO usage_summary (item_id, last_used, click_count) VALUES (?, ?, 1)
                ON CONFLICT(item_id) DO UPDATE SET
                    last_used = excluded.last_used,
                    click_count = usage_summary.click_count + 1
                "#,
            )
            .bind(item_id)
            .bind(now)
            .execute(pool)
            .await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl UsageLookup for MetaDb {
    async fn usage_for(&self, item_ids: &[String]) -> Result<HashMap<String, UsageSummary>> {
        let mut out = HashMap::new();
        for chunk in item_ids.chunks(MAX_BIND_CHUNK) {
            let sql = format!(
                "SELECT item_id, last_used, click_count FROM usage_summary WHERE item_id IN ({})",
                placeholders(chunk.len())
            );
            let mut query = sqlx::query_as::<_, (String, i64, i64)>(&sql);
            for id in chunk {
                query = query.bind(id);
            }
            for (item_id, last_used, click_count) in query.fetch_all(self.pool()).await? {
                out.insert(
                    item_id,
                    UsageSummary {
                        last_used,
                        click_count,
                    },
                );
            }
        }
        Ok(out)
    }
}
