//! Content extraction worker
//!
//! An actor that owns the parser registry and processes one batch of files at
//! a time. Callers talk to it only through messages:
//! - [`ContentWorker::submit`] queues a batch and returns a stream of
//!   [`WorkerEvent`]s: per-file progress, per-file terminal outcomes and one
//!   batch completion
//! - [`ContentWorker::metrics`] is answered immediately, even mid-batch
//!
//! The worker never writes to the store. Every terminal event carries a
//! ready-to-persist index document so the caller can upsert it right away.

mod metrics;

pub use metrics::WorkerMetrics;

use crate::config::{normalize_extension, ExtensionTable, WorkerConfig};
use crate::error::{Error, Result};
use crate::index::{prepare_document, KeywordInput, SearchIndexItem};
use crate::meta::{ContentStatus, ContentWrite, EmbeddingStatus, FileRecord, PreparedDocument, ProgressUpdate};
use crate::parse::{ParseStatus, ParserRegistry};
use metrics::Utilization;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const TRUNCATION_MARKER: &str = "\n...[truncated]";
pub const PRIORITY_EXTENSION_KEYWORD: f64 = 1.05;

pub const REASON_INDEXING_DISABLED: &str = "content-indexing-disabled";
pub const REASON_TOO_LARGE: &str = "file-too-large";
pub const REASON_NO_PARSER: &str = "parser-not-found";
pub const REASON_PARSER_ERROR: &str = "parser-error";
pub const REASON_TIMEOUT: &str = "parser-timeout";

/// A file handed to the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerFile {
    pub file_id: i64,
    pub path: String,
    pub name: String,
    pub extension: String,
    /// Re-read from disk when unknown
    pub size: Option<u64>,
}

impl From<&FileRecord> for WorkerFile {
    fn from(record: &FileRecord) -> Self {
        Self {
            file_id: record.id,
            path: record.path.clone(),
            name: record.name.clone(),
            extension: record.extension.clone(),
            size: u64::try_from(record.size).ok(),
        }
    }
}

/// A batch of files to extract
#[derive(Debug, Clone)]
pub struct IndexRequest {
    pub task_id: String,
    pub provider_id: String,
    pub provider_type: String,
    pub files: Vec<WorkerFile>,
}

impl IndexRequest {
    pub fn new(provider_id: &str, provider_type: &str, files: Vec<WorkerFile>) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            provider_id: provider_id.to_string(),
            provider_type: provider_type.to_string(),
            files,
        }
    }
}

/// Terminal result for one file
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub file_id: i64,
    pub path: String,
    pub status: ContentStatus,
    pub processed_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub reason: Option<String>,
    pub content: Option<String>,
    pub embedding_status: Option<EmbeddingStatus>,
    pub document: PreparedDocument,
}

impl FileOutcome {
    /// Store writes for this outcome
    pub fn to_content_write(&self) -> ContentWrite {
        ContentWrite {
            progress: ProgressUpdate {
                file_id: self.file_id,
                status: self.status,
                progress: 100,
                processed_bytes: self.processed_bytes.map(|b| b as i64),
                total_bytes: self.total_bytes.map(|b| b as i64),
                last_error: self.reason.clone(),
            },
            content: self.content.clone(),
            embedding_status: self.embedding_status,
            document: self.document.clone(),
        }
    }
}

/// Messages streamed back for a submitted batch
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Non-terminal progress (parsing started)
    Progress(ProgressUpdate),
    /// Terminal outcome for one file
    FileDone(Box<FileOutcome>),
    /// The batch finished
    BatchDone {
        task_id: String,
        processed: usize,
        failed: usize,
    },
    /// The batch could not run
    BatchError { task_id: String, error: String },
}

/// Everything the worker needs to process files
#[derive(Clone)]
pub struct WorkerContext {
    pub extensions: ExtensionTable,
    pub parsers: ParserRegistry,
    pub config: WorkerConfig,
    pub with_ngrams: bool,
}

/// Truncate to `max_chars` characters, appending the truncation marker
pub fn truncate_content(content: String, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut truncated = content[..cut].to_string();
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => content,
    }
}

/// File stem used as the display title
pub fn display_name(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| name.to_string())
}

/// Index item for a file: extension keywords plus extension/type tags
pub fn build_index_item(
    file: &WorkerFile,
    provider_id: &str,
    provider_type: &str,
    extensions: &ExtensionTable,
    content: Option<String>,
) -> SearchIndexItem {
    let extension = normalize_extension(&file.extension);
    let keywords = extensions
        .keywords(&extension)
        .iter()
        .map(|k| KeywordInput::with_priority(k.clone(), PRIORITY_EXTENSION_KEYWORD))
        .collect();

    let mut tags: Vec<String> = Vec::new();
    let bare = extension.trim_start_matches('.');
    if !bare.is_empty() {
        tags.push(bare.to_string());
    }
    for tag in extensions.type_tags(&extension) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    SearchIndexItem {
        item_id: file.path.clone(),
        provider_id: provider_id.to_string(),
        kind: provider_type.to_string(),
        name: file.name.clone(),
        display_name: Some(display_name(&file.name)),
        path: Some(file.path.clone()),
        extension: Some(extension),
        aliases: Vec::new(),
        keywords,
        tags,
        content,
    }
}

fn terminal(
    ctx: &WorkerContext,
    request: &IndexRequest,
    file: &WorkerFile,
    status: ContentStatus,
    reason: Option<String>,
    bytes: (Option<u64>, Option<u64>),
) -> FileOutcome {
    let item = build_index_item(file, &request.provider_id, &request.provider_type, &ctx.extensions, None);
    FileOutcome {
        file_id: file.file_id,
        path: file.path.clone(),
        status,
        processed_bytes: bytes.0,
        total_bytes: bytes.1,
        reason,
        content: None,
        embedding_status: None,
        document: prepare_document(&item, ctx.with_ngrams),
    }
}

async fn file_size(file: &WorkerFile) -> Option<u64> {
    if let Some(size) = file.size {
        return Some(size);
    }
    tokio::fs::metadata(&file.path).await.ok().map(|m| m.len())
}

/// Run one file through the state machine, emitting a progress event
/// before parsing. Returns the terminal outcome.
pub async fn process_file(
    ctx: &WorkerContext,
    request: &IndexRequest,
    file: &WorkerFile,
    events: &mpsc::UnboundedSender<WorkerEvent>,
) -> FileOutcome {
    let extension = normalize_extension(&file.extension);
    let size = file_size(file).await;

    if !ctx.extensions.is_content_indexable(&extension) {
        return terminal(
            ctx,
            request,
            file,
            ContentStatus::Skipped,
            Some(REASON_INDEXING_DISABLED.to_string()),
            (Some(0), size),
        );
    }

    let max_bytes = ctx
        .extensions
        .content_size_limit_bytes(&extension, ctx.config.default_content_size_limit_mb);
    if matches!(size, Some(s) if s > max_bytes) {
        return terminal(
            ctx,
            request,
            file,
            ContentStatus::Skipped,
            Some(REASON_TOO_LARGE.to_string()),
            (Some(0), size),
        );
    }

    let _ = events.send(WorkerEvent::Progress(ProgressUpdate {
        file_id: file.file_id,
        status: ContentStatus::Processing,
        progress: 5,
        processed_bytes: Some(0),
        total_bytes: size.map(|s| s as i64),
        last_error: None,
    }));

    let parser = match ctx.parsers.find(&extension, size.unwrap_or(0)) {
        Some(parser) => parser,
        None => {
            return terminal(
                ctx,
                request,
                file,
                ContentStatus::Skipped,
                Some(REASON_NO_PARSER.to_string()),
                (Some(0), size),
            )
        }
    };

    let path = PathBuf::from(&file.path);
    let parse_size = size.unwrap_or(0);
    let parse = tokio::task::spawn_blocking(move || parser.parse(&path, parse_size));
    let timeout = Duration::from_millis(ctx.config.parse_timeout_ms);

    let outcome = match tokio::time::timeout(timeout, parse).await {
        Ok(Ok(Ok(outcome))) => outcome,
        Ok(Ok(Err(e))) => {
            let message = e.to_string();
            let reason = if message.is_empty() { REASON_PARSER_ERROR.to_string() } else { message };
            return terminal(ctx, request, file, ContentStatus::Failed, Some(reason), (Some(0), size));
        }
        Ok(Err(join_err)) => {
            warn!("Parser task for {} panicked: {}", file.path, join_err);
            return terminal(
                ctx,
                request,
                file,
                ContentStatus::Failed,
                Some(REASON_PARSER_ERROR.to_string()),
                (Some(0), size),
            );
        }
        Err(_) => {
            warn!("Parsing {} timed out after {:?}", file.path, timeout);
            return terminal(
                ctx,
                request,
                file,
                ContentStatus::Failed,
                Some(REASON_TIMEOUT.to_string()),
                (Some(0), size),
            );
        }
    };

    let total_bytes = Some(outcome.total_bytes).filter(|b| *b > 0).or(size);
    let processed_bytes = Some(outcome.processed_bytes);

    match outcome.status {
        ParseStatus::Success => {
            let content = truncate_content(outcome.content.unwrap_or_default(), ctx.config.max_content_chars);
            let embedding_status = if outcome.embeddings.map(|e| !e.is_empty()).unwrap_or(false) {
                EmbeddingStatus::Completed
            } else {
                EmbeddingStatus::Pending
            };
            let item = build_index_item(
                file,
                &request.provider_id,
                &request.provider_type,
                &ctx.extensions,
                Some(content.clone()),
            );
            FileOutcome {
                file_id: file.file_id,
                path: file.path.clone(),
                status: ContentStatus::Completed,
                processed_bytes,
                total_bytes,
                reason: None,
                content: Some(content),
                embedding_status: Some(embedding_status),
                document: prepare_document(&item, ctx.with_ngrams),
            }
        }
        ParseStatus::Skipped => terminal(
            ctx,
            request,
            file,
            ContentStatus::Skipped,
            outcome.reason,
            (processed_bytes, total_bytes),
        ),
        ParseStatus::Failed => terminal(
            ctx,
            request,
            file,
            ContentStatus::Failed,
            outcome.reason,
            (processed_bytes, total_bytes),
        ),
    }
}

/// Process a whole batch, streaming events; returns (processed, failed)
async fn process_batch(
    ctx: Arc<WorkerContext>,
    request: IndexRequest,
    events: mpsc::UnboundedSender<WorkerEvent>,
) -> (usize, usize) {
    let mut failed = 0;
    for file in &request.files {
        let outcome = process_file(&ctx, &request, file, &events).await;
        if outcome.status == ContentStatus::Failed {
            failed += 1;
        }
        let _ = events.send(WorkerEvent::FileDone(Box::new(outcome)));
    }
    let processed = request.files.len();
    let _ = events.send(WorkerEvent::BatchDone {
        task_id: request.task_id.clone(),
        processed,
        failed,
    });
    (processed, failed)
}

enum WorkerCommand {
    Index {
        request: IndexRequest,
        events: mpsc::UnboundedSender<WorkerEvent>,
    },
    Metrics {
        reply: oneshot::Sender<WorkerMetrics>,
    },
}

type BatchFuture = Pin<Box<dyn Future<Output = (usize, usize)> + Send>>;

struct WorkerActor {
    ctx: Arc<WorkerContext>,
    commands: mpsc::UnboundedReceiver<WorkerCommand>,
    cancel: CancellationToken,
    queue: VecDeque<(IndexRequest, mpsc::UnboundedSender<WorkerEvent>)>,
    utilization: Utilization,
}

impl WorkerActor {
    fn reject(request: &IndexRequest, events: &mpsc::UnboundedSender<WorkerEvent>, error: &str) {
        let _ = events.send(WorkerEvent::BatchError {
            task_id: request.task_id.clone(),
            error: error.to_string(),
        });
    }

    async fn run(mut self) {
        let mut current: Option<BatchFuture> = None;
        let mut closed = false;

        loop {
            if current.is_none() && !self.cancel.is_cancelled() {
                if let Some((request, events)) = self.queue.pop_front() {
                    debug!("Starting batch {} ({} files)", request.task_id, request.files.len());
                    self.utilization.mark_busy();
                    current = Some(Box::pin(process_batch(self.ctx.clone(), request, events)));
                }
            }

            if current.is_none() && (closed || self.cancel.is_cancelled()) {
                break;
            }

            tokio::select! {
                biased;

                command = self.commands.recv(), if !closed => match command {
                    Some(WorkerCommand::Metrics { reply }) => {
                        let _ = reply.send(self.utilization.snapshot(self.queue.len()));
                    }
                    Some(WorkerCommand::Index { request, events }) => {
                        if self.cancel.is_cancelled() {
                            Self::reject(&request, &events, "worker is shutting down");
                        } else {
                            self.queue.push_back((request, events));
                        }
                    }
                    None => closed = true,
                },

                _ = self.cancel.cancelled(), if !self.queue.is_empty() => {
                    for (request, events) in self.queue.drain(..) {
                        Self::reject(&request, &events, "worker is shutting down");
                    }
                }

                (processed, failed) = async {
                    match current.as_mut() {
                        Some(batch) => batch.await,
                        None => std::future::pending().await,
                    }
                }, if current.is_some() => {
                    current = None;
                    self.utilization.mark_idle();
                    self.utilization.batches_completed += 1;
                    self.utilization.files_processed += processed as u64;
                    self.utilization.files_failed += failed as u64;
                }

                _ = self.cancel.cancelled(), if current.is_none() && !closed => {}
            }
        }

        for (request, events) in self.queue.drain(..) {
            Self::reject(&request, &events, "worker is shutting down");
        }
        info!(
            "Content worker stopped after {} batches",
            self.utilization.batches_completed
        );
    }
}

/// Handle to the content worker actor
pub struct ContentWorker {
    commands: mpsc::UnboundedSender<WorkerCommand>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ContentWorker {
    /// Start the actor on the current runtime
    pub fn spawn(ctx: WorkerContext) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let actor = WorkerActor {
            ctx: Arc::new(ctx),
            commands: rx,
            cancel: cancel.clone(),
            queue: VecDeque::new(),
            utilization: Utilization::new(),
        };
        let handle = tokio::spawn(actor.run());

        Self {
            commands: tx,
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Queue a batch; events arrive on the returned receiver
    pub fn submit(&self, request: IndexRequest) -> Result<mpsc::UnboundedReceiver<WorkerEvent>> {
        let (events, rx) = mpsc::unbounded_channel();
        self.commands
            .send(WorkerCommand::Index { request, events })
            .map_err(|_| Error::Worker("content worker is not running".to_string()))?;
        Ok(rx)
    }

    /// Resource metrics, answered independently of the batch queue
    pub async fn metrics(&self) -> Result<WorkerMetrics> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(WorkerCommand::Metrics { reply })
            .map_err(|_| Error::Worker("content worker is not running".to_string()))?;
        rx.await
            .map_err(|_| Error::Worker("content worker dropped the metrics request".to_string()))
    }

    /// Stop accepting work: the in-flight batch finishes, queued batches are rejected
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Content worker task ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtensionMetadata;
    use crate::parse::{FileParser, ParseOutcome};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    struct Exploding;

    impl FileParser for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }
        fn supports(&self, extension: &str, _size: u64) -> bool {
            extension == ".boom"
        }
        fn parse(&self, _path: &Path, _size: u64) -> Result<ParseOutcome> {
            Err(Error::Parse("corrupt header".to_string()))
        }
    }

    struct Slow;

    impl FileParser for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }
        fn supports(&self, extension: &str, _size: u64) -> bool {
            extension == ".slow"
        }
        fn parse(&self, _path: &Path, size: u64) -> Result<ParseOutcome> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(ParseOutcome::success(String::new(), size))
        }
    }

    fn context() -> WorkerContext {
        let mut entries = BTreeMap::new();
        for (ext, limit) in [(".md", Some(10)), (".boom", Some(1)), (".slow", Some(1)), (".bin", Some(1)), (".png", None)] {
            entries.insert(
                ext.to_string(),
                ExtensionMetadata {
                    tags: vec!["document".to_string()],
                    keywords: vec!["note".to_string()],
                    content_indexing: limit.is_some(),
                    max_content_size_mb: limit,
                },
            );
        }
        let mut parsers = ParserRegistry::default();
        parsers.register(Arc::new(Exploding));
        parsers.register(Arc::new(Slow));
        WorkerContext {
            extensions: ExtensionTable::new(entries),
            parsers,
            config: WorkerConfig {
                max_content_chars: 20,
                parse_timeout_ms: 100,
                default_content_size_limit_mb: 25,
            },
            with_ngrams: false,
        }
    }

    fn file(dir: &Path, name: &str, body: &[u8]) -> WorkerFile {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        WorkerFile {
            file_id: 1,
            path: path.to_string_lossy().to_string(),
            name: name.to_string(),
            extension: crate::scan::extension_of(&path),
            size: Some(body.len() as u64),
        }
    }

    async fn run_one(ctx: &WorkerContext, file: WorkerFile) -> (FileOutcome, Vec<WorkerEvent>) {
        let request = IndexRequest::new("file-provider", "file", vec![file.clone()]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = process_file(ctx, &request, &file, &tx).await;
        drop(tx);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (outcome, events)
    }

    #[test]
    fn test_truncate_content() {
        let exact = "a".repeat(20);
        assert_eq!(truncate_content(exact.clone(), 20), exact);

        let long = "é".repeat(25);
        let truncated = truncate_content(long, 20);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(truncated.chars().count(), 20 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn test_build_index_item_tags_and_keywords() {
        let ctx = context();
        let file = WorkerFile {
            file_id: 1,
            path: "/n/todo.md".to_string(),
            name: "todo.md".to_string(),
            extension: ".md".to_string(),
            size: Some(4),
        };
        let item = build_index_item(&file, "file-provider", "file", &ctx.extensions, None);
        assert_eq!(item.display_name.as_deref(), Some("todo"));
        assert_eq!(item.tags, vec!["md".to_string(), "document".to_string()]);
        assert_eq!(item.keywords[0].priority, Some(PRIORITY_EXTENSION_KEYWORD));
    }

    #[tokio::test]
    async fn test_success_truncates_and_reports_progress() {
        let tmp = TempDir::new().unwrap();
        let ctx = context();
        let body = "word ".repeat(10);
        let (outcome, events) = run_one(&ctx, file(tmp.path(), "notes.md", body.as_bytes())).await;

        assert_eq!(outcome.status, ContentStatus::Completed);
        assert_eq!(outcome.embedding_status, Some(EmbeddingStatus::Pending));
        assert!(outcome.content.unwrap().ends_with(TRUNCATION_MARKER));
        assert!(matches!(
            events.as_slice(),
            [WorkerEvent::Progress(ProgressUpdate { progress: 5, status: ContentStatus::Processing, .. })]
        ));
    }

    #[tokio::test]
    async fn test_gating_never_reaches_parser() {
        let tmp = TempDir::new().unwrap();
        let ctx = context();

        let (outcome, events) = run_one(&ctx, file(tmp.path(), "photo.png", b"x")).await;
        assert_eq!(outcome.status, ContentStatus::Skipped);
        assert_eq!(outcome.reason.as_deref(), Some(REASON_INDEXING_DISABLED));
        assert!(events.is_empty());

        let mut big = file(tmp.path(), "huge.boom", b"x");
        big.size = Some(2 * 1024 * 1024);
        let (outcome, events) = run_one(&ctx, big).await;
        assert_eq!(outcome.status, ContentStatus::Skipped);
        assert_eq!(outcome.reason.as_deref(), Some(REASON_TOO_LARGE));
        assert!(events.is_empty());
        assert!(outcome.document.keywords.iter().any(|k| k.keyword == "huge"));
    }

    #[tokio::test]
    async fn test_parser_failures() {
        let tmp = TempDir::new().unwrap();
        let ctx = context();

        let (outcome, _) = run_one(&ctx, file(tmp.path(), "a.boom", b"x")).await;
        assert_eq!(outcome.status, ContentStatus::Failed);
        assert!(outcome.reason.unwrap().contains("corrupt header"));

        let (outcome, _) = run_one(&ctx, file(tmp.path(), "a.bin", b"x")).await;
        assert_eq!(outcome.status, ContentStatus::Skipped);
        assert_eq!(outcome.reason.as_deref(), Some(REASON_NO_PARSER));

        let (outcome, _) = run_one(&ctx, file(tmp.path(), "a.slow", b"x")).await;
        assert_eq!(outcome.status, ContentStatus::Failed);
        assert_eq!(outcome.reason.as_deref(), Some(REASON_TIMEOUT));
    }

    #[tokio::test]
    async fn test_actor_streams_batch_and_answers_metrics() {
        let tmp = TempDir::new().unwrap();
        let worker = ContentWorker::spawn(context());
        let files = vec![
            file(tmp.path(), "one.md", b"first"),
            file(tmp.path(), "two.boom", b"second"),
        ];

        let mut rx = worker
            .submit(IndexRequest::new("file-provider", "file", files))
            .unwrap();
        let metrics = worker.metrics().await.unwrap();
        assert!(metrics.utilization >= 0.0);

        let mut terminal = 0;
        let mut done = None;
        while let Some(event) = rx.recv().await {
            match event {
                WorkerEvent::FileDone(_) => terminal += 1,
                WorkerEvent::BatchDone { processed, failed, .. } => done = Some((processed, failed)),
                _ => {}
            }
        }
        assert_eq!(terminal, 2);
        assert_eq!(done, Some((2, 1)));

        worker.shutdown().await;
        assert!(worker.metrics().await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_finishes_current_batch_and_rejects_queued() {
        let tmp = TempDir::new().unwrap();
        let worker = ContentWorker::spawn(context());

        let mut running = worker
            .submit(IndexRequest::new("file-provider", "file", vec![file(tmp.path(), "x.slow", b"x")]))
            .unwrap();
        let mut queued = worker
            .submit(IndexRequest::new("file-provider", "file", vec![file(tmp.path(), "one.md", b"first")]))
            .unwrap();

        // the first batch is in flight once its progress event arrives
        assert!(matches!(running.recv().await, Some(WorkerEvent::Progress(_))));
        worker.shutdown().await;

        let mut finished = Vec::new();
        while let Some(event) = running.recv().await {
            finished.push(event);
        }
        assert!(matches!(finished.as_slice(), [WorkerEvent::FileDone(_), WorkerEvent::BatchDone { processed: 1, .. }]));

        match queued.recv().await {
            Some(WorkerEvent::BatchError { error, .. }) => assert_eq!(error, "worker is shutting down"),
            other => panic!("expected a rejection, got {:?}", other),
        }
        assert!(queued.recv().await.is_none());

        assert!(worker
            .submit(IndexRequest::new("file-provider", "file", Vec::new()))
            .is_err());
    }
}
