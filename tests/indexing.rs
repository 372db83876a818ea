//! End-to-end indexing and search scenarios against a temporary store

use findex::commands::{cmd_scan, ScanOptions};
use findex::config::Config;
use findex::indexer::FileIndexer;
use findex::meta::{now_millis, MetaDb, UsageSummary};
use findex::parse::ParserRegistry;
use findex::rank::MatchType;
use findex::search::{QueryEngine, StaticUsage};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Fixture {
    _tmp: TempDir,
    root: PathBuf,
    config: Config,
    db: MetaDb,
}

async fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("watched");
    fs::create_dir_all(&root).unwrap();
    let root = fs::canonicalize(&root).unwrap();

    let mut config = Config::default();
    config.init_paths(Some(tmp.path().join("data")));
    config.watch_paths = vec![root.clone()];
    fs::create_dir_all(&config.paths.base_dir).unwrap();
    let db = MetaDb::connect(&config).await.unwrap();

    Fixture {
        _tmp: tmp,
        root,
        config,
        db,
    }
}

fn write(root: &Path, rel: &str, body: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, body).unwrap();
    path
}

/// A file of `len` bytes without writing them
fn sparse(root: &Path, rel: &str, len: u64) -> PathBuf {
    let path = root.join(rel);
    let file = OpenOptions::new().create(true).write(true).truncate(true).open(&path).unwrap();
    file.set_len(len).unwrap();
    path
}

fn touch_later(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    let later = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(later).unwrap();
}

fn key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

async fn scan(fx: &Fixture) -> findex::indexer::ScanStats {
    cmd_scan(&fx.config, &fx.db, ScanOptions::default()).await.unwrap()
}

async fn search(fx: &Fixture, text: &str) -> Vec<findex::search::RankedItem> {
    QueryEngine::new(fx.db.clone(), &fx.config)
        .query(text, &CancellationToken::new())
        .await
}

#[tokio::test]
async fn test_reconciliation_adds_updates_and_deletes() {
    let fx = fixture().await;
    let a = write(&fx.root, "a.md", "alpha");
    let b = write(&fx.root, "b.md", "bravo");
    let first = scan(&fx).await;
    assert_eq!(first.new_roots, 1);
    assert_eq!(first.inserted, 2);

    touch_later(&a, "alpha revised");
    fs::remove_file(&b).unwrap();
    let c = write(&fx.root, "c.md", "charlie");

    let second = scan(&fx).await;
    assert_eq!(second.existing_roots, 1);
    assert_eq!(second.inserted, 1);
    assert_eq!(second.updated, 1);
    assert_eq!(second.deleted, 1);

    let mut paths = fx.db.list_file_paths().await.unwrap();
    paths.sort();
    assert_eq!(paths, vec![key(&a), key(&c)]);
    assert!(search(&fx, "bravo").await.is_empty());
}

#[tokio::test]
async fn test_rescan_without_changes_writes_nothing() {
    let fx = fixture().await;
    write(&fx.root, "notes/plan.md", "plan");
    write(&fx.root, "notes/log.txt", "log");
    scan(&fx).await;

    let again = scan(&fx).await;
    assert_eq!(again.reconciled_writes(), 0);
    assert_eq!(fx.db.list_file_paths().await.unwrap().len(), 2);
    assert_eq!(fx.db.list_scan_progress().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_indexed_file_is_found_by_name_and_content() {
    let fx = fixture().await;
    let path = write(&fx.root, "quarterly.md", "# Budget\n\nThe zeppelin fund grew.");
    let stats = scan(&fx).await;
    assert_eq!(stats.content.completed, 1);

    let by_name = search(&fx, "quarterly").await;
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].id, key(&path));
    assert_eq!(by_name[0].match_details.match_type, MatchType::Exact);

    let by_content = search(&fx, "zeppelin").await;
    assert_eq!(by_content.len(), 1);
    assert_eq!(by_content[0].id, key(&path));

    let record = fx.db.get_file(&key(&path)).await.unwrap().unwrap();
    assert!(record.content.unwrap().contains("zeppelin"));
}

#[tokio::test]
async fn test_keyword_keeps_highest_priority() {
    let fx = fixture().await;
    let path = write(&fx.root, "markdown.md", "text");
    scan(&fx).await;

    let keywords = fx.db.keywords_for_item(&key(&path)).await.unwrap();
    let markdown: Vec<_> = keywords.iter().filter(|k| k.keyword == "markdown").collect();
    assert_eq!(markdown.len(), 1);
    assert!(markdown[0].priority > 1.05);
}

#[tokio::test]
async fn test_remove_cascades_to_index_and_progress() {
    let fx = fixture().await;
    let path = write(&fx.root, "drop/me.md", "ephemeral words");
    scan(&fx).await;
    let id = fx.db.get_file(&key(&path)).await.unwrap().unwrap().id;
    assert!(fx.db.get_progress(id).await.unwrap().is_some());

    let indexer = FileIndexer::new(fx.config.clone(), fx.db.clone());
    assert_eq!(indexer.remove_paths(&[fx.root.join("drop")], false).await.unwrap(), 1);

    assert!(fx.db.get_progress(id).await.unwrap().is_none());
    assert!(fx.db.keywords_for_item(&key(&path)).await.unwrap().is_empty());
    assert!(search(&fx, "ephemeral").await.is_empty());
    assert_eq!(fx.db.list_scan_progress().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_remove_root_can_forget_scan_marker() {
    let fx = fixture().await;
    write(&fx.root, "keep.md", "kept words");
    scan(&fx).await;

    let indexer = FileIndexer::new(fx.config.clone(), fx.db.clone());
    indexer.remove_paths(&[fx.root.clone()], false).await.unwrap();
    assert_eq!(fx.db.list_scan_progress().await.unwrap().len(), 1);
    assert_eq!(scan(&fx).await.new_roots, 0);

    indexer.remove_paths(&[fx.root.clone()], true).await.unwrap();
    assert!(fx.db.list_scan_progress().await.unwrap().is_empty());
    let rescanned = scan(&fx).await;
    assert_eq!(rescanned.new_roots, 1);
    assert_eq!(rescanned.inserted, 1);
}

#[tokio::test]
async fn test_long_content_is_truncated() {
    let mut fx = fixture().await;
    fx.config.worker.max_content_chars = 64;
    let path = write(&fx.root, "long.txt", &"word ".repeat(100));
    scan(&fx).await;

    let content = fx.db.get_file(&key(&path)).await.unwrap().unwrap().content.unwrap();
    assert!(content.ends_with("\n...[truncated]"));
    assert_eq!(content.chars().count(), 64 + "\n...[truncated]".len());
}

#[tokio::test]
async fn test_oversized_file_is_named_but_not_read() {
    let fx = fixture().await;
    let todo = write(&fx.root, "todo.md", &"todo list entry\n".repeat(512 * 1024));
    let huge = sparse(&fx.root, "huge.md", 50 * 1024 * 1024);

    let stats = scan(&fx).await;
    assert_eq!(stats.inserted, 2);
    assert_eq!(stats.content.completed, 1);
    assert_eq!(stats.content.skipped, 1);

    let huge_id = fx.db.get_file(&key(&huge)).await.unwrap().unwrap().id;
    let progress = fx.db.get_progress(huge_id).await.unwrap().unwrap();
    assert_eq!(progress.status, "skipped");
    assert_eq!(progress.last_error.as_deref(), Some("file-too-large"));

    let results = search(&fx, "todo").await;
    assert_eq!(results[0].id, key(&todo));
    assert_eq!(results[0].match_details.match_type, MatchType::Exact);
    assert_eq!(search(&fx, "huge").await[0].id, key(&huge));
}

#[tokio::test]
async fn test_empty_query_returns_nothing() {
    let fx = fixture().await;
    write(&fx.root, "anything.md", "content");
    scan(&fx).await;

    assert!(search(&fx, "").await.is_empty());
    assert!(search(&fx, "   ").await.is_empty());
}

#[tokio::test]
async fn test_recent_use_outranks_idle_file() {
    let fx = fixture().await;
    let idle = write(&fx.root, "idle report.md", "x");
    let used = write(&fx.root, "used report.md", "x");
    scan(&fx).await;

    let mut usage = HashMap::new();
    usage.insert(
        key(&used),
        UsageSummary {
            last_used: now_millis(),
            click_count: 12,
        },
    );
    let engine = QueryEngine::new(fx.db.clone(), &fx.config).with_usage(Arc::new(StaticUsage(usage)));
    let results = engine.query("report", &CancellationToken::new()).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, key(&used));
    assert_eq!(results[1].id, key(&idle));
    assert!(results[0].score > results[1].score);
    assert!(results[0].scoring.frequency > results[1].scoring.frequency);
}

#[tokio::test]
async fn test_skip_content_still_indexes_names() {
    let fx = fixture().await;
    let path = write(&fx.root, "invoice.md", "secret body");
    let stats = cmd_scan(&fx.config, &fx.db, ScanOptions { skip_content: true })
        .await
        .unwrap();
    assert_eq!(stats.content.files(), 0);

    assert_eq!(search(&fx, "invoice").await[0].id, key(&path));
    assert!(search(&fx, "secret").await.is_empty());

    let indexer = FileIndexer::new(fx.config.clone(), fx.db.clone())
        .with_content_worker(ParserRegistry::default());
    assert_eq!(indexer.index_paths(&[path.clone()]).await.unwrap().indexed, 1);
    indexer.shutdown().await;
    assert_eq!(search(&fx, "secret").await[0].id, key(&path));
}

#[tokio::test]
async fn test_touched_file_keeps_content_without_extraction() {
    let fx = fixture().await;
    let path = write(&fx.root, "ledger.md", "quarterly reconciliation figures");
    scan(&fx).await;

    touch_later(&path, "quarterly reconciliation figures");
    let stats = cmd_scan(&fx.config, &fx.db, ScanOptions { skip_content: true })
        .await
        .unwrap();
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.content.files(), 0);

    let stored = fx.db.get_file(&key(&path)).await.unwrap().unwrap();
    assert_eq!(stored.content.as_deref(), Some("quarterly reconciliation figures"));
    assert_eq!(search(&fx, "reconciliation").await[0].id, key(&path));
}

#[tokio::test]
async fn test_updated_file_content_replaces_old_text() {
    let fx = fixture().await;
    let path = write(&fx.root, "draft.md", "original wording");
    scan(&fx).await;

    touch_later(&path, "revised phrasing");
    let stats = scan(&fx).await;
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.content.completed, 1);

    let stored = fx.db.get_file(&key(&path)).await.unwrap().unwrap();
    assert_eq!(stored.content.as_deref(), Some("revised phrasing"));
    assert_eq!(search(&fx, "phrasing").await[0].id, key(&path));
    assert!(search(&fx, "wording").await.is_empty());
}
