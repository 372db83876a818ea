//! Scan and reconciliation orchestrator
//!
//! [`FileIndexer`] keeps the store consistent with the watch roots:
//! 1. ensure supporting indexes exist
//! 2. delete records outside every current root
//! 3. fully scan roots without a completion marker, marking them only after
//!    every chunk succeeded
//! 4. reconcile marked roots against disk: add, update newer, delete missing
//!
//! Every chunk is written in two phases: the file rows first (to obtain their
//! ids), then metadata, index documents and content extraction requests keyed
//! by those ids. Content extraction runs on the [`ContentWorker`] and its
//! events are persisted as they stream back.

mod events;
mod reconcile;

pub use events::ContentStats;
pub use reconcile::{compute_reconciliation_diff, DiffSummary, ReconcileDiff};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::SearchIndex;
use crate::meta::{is_within_root, FileMetadataEntry, FileRecord, MetaDb};
use crate::parse::ParserRegistry;
use crate::progress::{advance, finish, phase_bar};
use crate::queue::{AdaptiveTaskQueue, QueueOptions, QueueReport};
use crate::scan::{stat_file, DirectoryScanner, ScannedFile};
use crate::worker::{build_index_item, ContentWorker, IndexRequest, WorkerContext, WorkerFile};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

// Initial per-chunk duration guesses for the adaptive queue
const CLEANUP_ESTIMATE_MS: u64 = 20;
const FULL_SCAN_ESTIMATE_MS: u64 = 50;
const RECONCILE_ADD_ESTIMATE_MS: u64 = 80;
const RECONCILE_UPDATE_ESTIMATE_MS: u64 = 30;
const RECONCILE_DELETE_ESTIMATE_MS: u64 = 20;

/// Outcome of a startup run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub roots: usize,
    pub new_roots: usize,
    pub existing_roots: usize,
    /// Records removed because they left every configured watch root
    pub cleaned: u64,
    /// Files seen on disk
    pub scanned: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: u64,
    /// Entries the walker skipped
    pub entry_errors: usize,
    pub failed_chunks: usize,
    pub content_requests: usize,
    pub content: ContentStats,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl ScanStats {
    /// Writes made by reconciliation
    pub fn reconciled_writes(&self) -> u64 {
        self.inserted as u64 + self.updated as u64 + self.deleted
    }

    fn absorb(&mut self, report: &QueueReport) {
        self.failed_chunks += report.failed;
        self.errors.extend(report.errors.iter().cloned());
    }
}

/// Outcome of an incremental `index_paths` call
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexPathsStats {
    pub indexed: usize,
    pub skipped: Vec<String>,
}

/// The indexing service for one provider and store
pub struct FileIndexer {
    config: Config,
    db: MetaDb,
    index: SearchIndex,
    scanner: DirectoryScanner,
    queue: AdaptiveTaskQueue,
    worker: Option<Arc<ContentWorker>>,
    drains: Mutex<Vec<JoinHandle<ContentStats>>>,
}

impl FileIndexer {
    /// An indexer that records files and their metadata only
    pub fn new(config: Config, db: MetaDb) -> Self {
        Self {
            index: SearchIndex::new(db.clone(), config.index.enable_ngrams),
            scanner: DirectoryScanner::from_config(&config),
            queue: AdaptiveTaskQueue::new(&config.queue),
            worker: None,
            drains: Mutex::new(Vec::new()),
            config,
            db,
        }
    }

    /// Start a content worker with `parsers`; new and changed files are sent to it
    pub fn with_content_worker(mut self, parsers: ParserRegistry) -> Self {
        let ctx = WorkerContext {
            extensions: self.config.extensions.clone(),
            parsers,
            config: self.config.worker.clone(),
            with_ngrams: self.config.index.enable_ngrams,
        };
        self.worker = Some(Arc::new(ContentWorker::spawn(ctx)));
        self
    }

    pub fn db(&self) -> &MetaDb {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn worker(&self) -> Option<&ContentWorker> {
        self.worker.as_deref()
    }

    /// Startup sequence: cleanup, full scan of new roots, reconciliation of the rest
    pub async fn run_startup(&self) -> Result<ScanStats> {
        let started = Instant::now();
        let mut stats = ScanStats::default();

        self.db.ensure_indexes().await?;

        let roots = self.config.resolved_watch_paths();
        stats.roots = roots.len();
        if roots.is_empty() {
            warn!("No usable watch paths; the index will be empty");
        }

        // Missing roots are skipped for scanning but still protect their records
        let configured = self.config.configured_watch_paths();
        let cleaned = self.cleanup(&configured, &mut stats).await?;
        stats.cleaned = cleaned;

        let completed: HashSet<String> = self
            .db
            .list_scan_progress()
            .await?
            .into_iter()
            .map(|p| p.path)
            .collect();
        let (existing, new): (Vec<String>, Vec<String>) =
            roots.into_iter().partition(|r| completed.contains(r));
        stats.new_roots = new.len();
        stats.existing_roots = existing.len();
        info!(
            "Indexing {} new and {} existing roots",
            new.len(),
            existing.len()
        );

        for root in &new {
            if let Err(e) = self.full_scan(root, &mut stats).await {
                error!("Full scan of {} failed: {}", root, e);
                stats.errors.push(format!("{}: {}", root, e));
            }
        }

        for root in &existing {
            if let Err(e) = self.reconcile(root, &mut stats).await {
                error!("Reconciliation of {} failed: {}", root, e);
                stats.errors.push(format!("{}: {}", root, e));
            }
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Startup indexing finished in {}ms: {} inserted, {} updated, {} deleted",
            stats.duration_ms, stats.inserted, stats.updated, stats.deleted
        );
        Ok(stats)
    }

    /// Remove records that are no longer under any watch root
    async fn cleanup(&self, roots: &[String], stats: &mut ScanStats) -> Result<u64> {
        let outside: Vec<String> = self
            .db
            .list_file_paths()
            .await?
            .into_iter()
            .filter(|path| !roots.iter().any(|root| is_within_root(path, root)))
            .collect();
        if outside.is_empty() {
            return Ok(0);
        }

        info!("Removing {} records outside the watch roots", outside.len());
        let (deleted, report) = self.delete_in_chunks(outside, "cleanup", CLEANUP_ESTIMATE_MS).await;
        stats.absorb(&report);
        Ok(deleted)
    }

    async fn full_scan(&self, root: &str, stats: &mut ScanStats) -> Result<()> {
        info!("Full scan of {}", root);
        let outcome = self.scanner.scan_async(PathBuf::from(root)).await?;
        stats.scanned += outcome.files.len();
        stats.entry_errors += outcome.errors.len();

        let chunks = chunked(outcome.files, self.config.index.full_scan_chunk_size);
        let bar = phase_bar(chunks.len(), "Scanning");
        let progress = &bar;
        let report = self
            .queue
            .run(chunks, &QueueOptions::new("full-scan", FULL_SCAN_ESTIMATE_MS), |chunk| async move {
                let result = self.index_new_files(chunk).await;
                advance(progress, 1);
                result
            })
            .await;
        finish(bar, "Scan complete");

        stats.inserted += report.items;
        stats.content_requests += report.items;
        stats.absorb(&report);

        if report.failed > 0 {
            return Err(Error::Scan(format!(
                "{} of {} chunks failed; root will be rescanned",
                report.failed,
                report.failed + report.processed
            )));
        }
        self.db.mark_scanned(&[root.to_string()]).await?;
        Ok(())
    }

    async fn reconcile(&self, root: &str, stats: &mut ScanStats) -> Result<()> {
        debug!("Reconciling {}", root);
        let outcome = self.scanner.scan_async(PathBuf::from(root)).await?;
        stats.scanned += outcome.files.len();
        stats.entry_errors += outcome.errors.len();

        let stored = self.db.list_file_stamps_under(&[root.to_string()]).await?;
        let diff = compute_reconciliation_diff(outcome.files, stored);
        if diff.is_empty() {
            debug!("{} is up to date", root);
            return Ok(());
        }
        let summary = diff.summary();
        info!(
            "Reconciling {}: {} added, {} updated, {} deleted",
            root, summary.added, summary.updated, summary.deleted
        );

        if !diff.to_delete.is_empty() {
            let (deleted, report) = self
                .delete_in_chunks(diff.to_delete, "reconcile-delete", RECONCILE_DELETE_ESTIMATE_MS)
                .await;
            stats.deleted += deleted;
            stats.absorb(&report);
        }

        if !diff.to_update.is_empty() {
            let chunks = chunked(diff.to_update, self.config.index.update_chunk_size);
            let bar = phase_bar(chunks.len(), "Updating");
            let progress = &bar;
            let report = self
                .queue
                .run(
                    chunks,
                    &QueueOptions::new("reconcile-update", RECONCILE_UPDATE_ESTIMATE_MS),
                    |chunk| async move {
                        let result = self.index_changed_files(chunk).await;
                        advance(progress, 1);
                        result
                    },
                )
                .await;
            finish(bar, "Updates applied");
            stats.updated += report.items;
            stats.content_requests += report.items;
            stats.absorb(&report);
        }

        if !diff.to_add.is_empty() {
            let chunks = chunked(diff.to_add, self.config.index.reconcile_chunk_size);
            let bar = phase_bar(chunks.len(), "Adding");
            let progress = &bar;
            let report = self
                .queue
                .run(
                    chunks,
                    &QueueOptions::new("reconcile-add", RECONCILE_ADD_ESTIMATE_MS),
                    |chunk| async move {
                        let result = self.index_new_files(chunk).await;
                        advance(progress, 1);
                        result
                    },
                )
                .await;
            finish(bar, "Additions applied");
            stats.inserted += report.items;
            stats.content_requests += report.items;
            stats.absorb(&report);
        }

        Ok(())
    }

    async fn delete_in_chunks(&self, paths: Vec<String>, label: &str, estimate_ms: u64) -> (u64, QueueReport) {
        let chunks = chunked(paths, self.config.index.delete_chunk_size);
        let report = self
            .queue
            .run(chunks, &QueueOptions::new(label, estimate_ms), |chunk| async move {
                let deleted = self.db.delete_files_cascade(&chunk).await?;
                Ok(deleted as usize)
            })
            .await;
        (report.items as u64, report)
    }

    /// Insert (or refresh) records, then their dependent rows
    async fn index_new_files(&self, files: Vec<ScannedFile>) -> Result<usize> {
        let records = self.db.upsert_files(&files).await?;
        self.index_records(&records).await?;
        Ok(records.len())
    }

    async fn index_changed_files(&self, updates: Vec<(i64, ScannedFile)>) -> Result<usize> {
        let records = self.db.update_files(&updates).await?;
        self.index_records(&records).await?;
        Ok(records.len())
    }

    /// Second phase of a chunk: metadata, index documents, content requests
    async fn index_records(&self, records: &[FileRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let metadata: Vec<FileMetadataEntry> = records
            .iter()
            .filter_map(|record| {
                let keywords = self.config.extensions.keywords(&record.extension);
                if keywords.is_empty() {
                    return None;
                }
                let value = serde_json::to_string(keywords).ok()?;
                Some(FileMetadataEntry {
                    file_id: record.id,
                    key: "keywords".to_string(),
                    value,
                })
            })
            .collect();
        self.db.upsert_file_metadata(&metadata).await?;

        // Documents carry whatever content is stored until the worker replaces it
        let files: Vec<WorkerFile> = records.iter().map(WorkerFile::from).collect();
        let items: Vec<_> = files
            .iter()
            .zip(records)
            .map(|(file, record)| {
                build_index_item(
                    file,
                    &self.config.provider_id,
                    &self.config.provider_type,
                    &self.config.extensions,
                    record.content.clone(),
                )
            })
            .collect();
        self.index.index_items(&items).await?;

        self.request_content(files).await;
        Ok(())
    }

    /// Hand files to the content worker in batches
    async fn request_content(&self, files: Vec<WorkerFile>) {
        let Some(worker) = &self.worker else {
            return;
        };

        for batch in chunked(files, self.config.index.worker_batch_size) {
            let request = IndexRequest::new(&self.config.provider_id, &self.config.provider_type, batch);
            let task_id = request.task_id.clone();
            match worker.submit(request) {
                Ok(events) => {
                    let handle = tokio::spawn(events::persist_events(self.db.clone(), events));
                    self.drains.lock().await.push(handle);
                }
                Err(e) => warn!("Could not queue content batch {}: {}", task_id, e),
            }
        }
    }

    /// Wait until every submitted batch has been processed and persisted
    pub async fn wait_for_content(&self) -> ContentStats {
        let mut total = ContentStats::default();
        loop {
            let handles: Vec<_> = std::mem::take(&mut *self.drains.lock().await);
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                match handle.await {
                    Ok(stats) => total += stats,
                    Err(e) => warn!("Content persistence task failed: {}", e),
                }
            }
        }
        total
    }

    /// Finish outstanding content work and stop the worker
    pub async fn shutdown(&self) -> ContentStats {
        let stats = self.wait_for_content().await;
        if let Some(worker) = &self.worker {
            worker.shutdown().await;
        }
        stats
    }

    /// Index or refresh specific files reported by a watcher
    pub async fn index_paths(&self, paths: &[PathBuf]) -> Result<IndexPathsStats> {
        let roots = self.config.resolved_watch_paths();
        let mut stats = IndexPathsStats::default();
        let mut files = Vec::new();

        for path in paths {
            let accepted = roots
                .iter()
                .find(|root| is_within_root(&path.to_string_lossy(), root))
                .map(|root| self.scanner.filters().accepts_path(path, Path::new(root)))
                .unwrap_or(false);
            if !accepted || !path.is_file() {
                debug!("Not indexing {}", path.display());
                stats.skipped.push(path.display().to_string());
                continue;
            }
            match stat_file(path) {
                Ok(file) => files.push(file),
                Err(e) => {
                    warn!("Failed to stat {}: {}", path.display(), e);
                    stats.skipped.push(path.display().to_string());
                }
            }
        }

        for chunk in chunked(files, self.config.index.update_chunk_size) {
            stats.indexed += self.index_new_files(chunk).await?;
        }
        Ok(stats)
    }

    /// Remove files, or everything under directories, from the store and index.
    /// With `forget_scan`, scan markers of roots at or under the paths are
    /// dropped too, so a later scan walks them as new roots.
    pub async fn remove_paths(&self, paths: &[PathBuf], forget_scan: bool) -> Result<u64> {
        let requested: Vec<String> = paths.iter().map(|p| p.to_string_lossy().to_string()).collect();
        let mut targets: Vec<String> = requested.clone();
        for stamp in self.db.list_file_stamps_under(&requested).await? {
            if !targets.contains(&stamp.path) {
                targets.push(stamp.path);
            }
        }
        let removed = self.db.delete_files_cascade(&targets).await?;
        info!("Removed {} records", removed);

        if forget_scan {
            let markers: Vec<String> = self
                .db
                .list_scan_progress()
                .await?
                .into_iter()
                .map(|row| row.path)
                .filter(|root| requested.iter().any(|path| is_within_root(root, path)))
                .collect();
            let forgotten = self.db.forget_scan_roots(&markers).await?;
            info!("Forgot {} scan markers", forgotten);
        }
        Ok(removed)
    }

    /// Forget scan completion so every root is fully rescanned next run
    pub async fn rebuild(&self) -> Result<u64> {
        let cleared = self.db.clear_scan_progress().await?;
        info!("Cleared {} scan markers", cleared);
        Ok(cleared)
    }
}

fn chunked<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size));
    let mut current = Vec::with_capacity(size.min(items.len()));
    for item in items {
        current.push(item);
        if current.len() == size {
            chunks.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
