//! Index maintenance commands: rebuild, remove, use, index

use crate::config::Config;
use crate::error::Result;
use crate::indexer::{FileIndexer, IndexPathsStats};
use crate::meta::MetaDb;
use crate::parse::ParserRegistry;
use std::path::PathBuf;
use tracing::info;

/// Clear scan markers so the next scan treats every root as new
pub async fn cmd_rebuild(config: &Config, db: &MetaDb) -> Result<u64> {
    FileIndexer::new(config.clone(), db.clone()).rebuild().await
}

/// Remove files, or whole directories, from the index
pub async fn cmd_remove(
    config: &Config,
    db: &MetaDb,
    paths: &[PathBuf],
    forget_scan: bool,
) -> Result<u64> {
    FileIndexer::new(config.clone(), db.clone())
        .remove_paths(paths, forget_scan)
        .await
}

/// Record that an item was opened
pub async fn cmd_use(db: &MetaDb, path: &str) -> Result<()> {
    info!("Recording use of {}", path);
    db.record_usage(path).await
}

/// Index specific files and extract their content
pub async fn cmd_index(config: &Config, db: &MetaDb, paths: &[PathBuf]) -> Result<IndexPathsStats> {
    let indexer = FileIndexer::new(config.clone(), db.clone()).with_content_worker(ParserRegistry::default());
    let result = indexer.index_paths(paths).await;
    indexer.shutdown().await;
    result
}

/// Print incremental index results to console
pub fn print_index_stats(stats: &IndexPathsStats) {
    println!("✓ Indexed {} files", stats.indexed);
    if !stats.skipped.is_empty() {
        println!("  Skipped (outside watch paths or filtered):");
        for path in &stats.skipped {
            println!("    • {}", path);
        }
    }
}
