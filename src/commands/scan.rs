//! Scan command implementation

use crate::config::Config;
use crate::error::Result;
use crate::indexer::{FileIndexer, ScanStats};
use crate::meta::MetaDb;
use crate::parse::ParserRegistry;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Record files and metadata without extracting content
    pub skip_content: bool,
}

/// Run the startup sequence and wait for content extraction to drain
pub async fn cmd_scan(config: &Config, db: &MetaDb, options: ScanOptions) -> Result<ScanStats> {
    info!("Scanning {} watch paths", config.watch_paths.len());

    let mut indexer = FileIndexer::new(config.clone(), db.clone());
    if !options.skip_content {
        indexer = indexer.with_content_worker(ParserRegistry::default());
    }

    let result = indexer.run_startup().await;
    let content = indexer.wait_for_content().await;
    if let Some(worker) = indexer.worker() {
        match worker.metrics().await {
            Ok(m) => debug!(
                "Content worker: {} files ({} failed) in {} batches, utilization {:.2}, rss {:?}",
                m.files_processed, m.files_failed, m.batches_completed, m.utilization, m.rss_bytes
            ),
            Err(e) => debug!("Content worker metrics unavailable: {}", e),
        }
    }
    indexer.shutdown().await;

    let mut stats = result?;
    stats.content = content;
    Ok(stats)
}

/// Print scan statistics to console
pub fn print_scan_stats(stats: &ScanStats) {
    println!("\n✓ Scan complete in {}ms", stats.duration_ms);
    println!(
        "  Roots: {} ({} new, {} existing)",
        stats.roots, stats.new_roots, stats.existing_roots
    );
    println!("  Files seen: {}", stats.scanned);
    println!("  Inserted: {}", stats.inserted);
    println!("  Updated: {}", stats.updated);
    println!("  Deleted: {}", stats.deleted);
    if stats.cleaned > 0 {
        println!("  Removed outside watch paths: {}", stats.cleaned);
    }

    let content = &stats.content;
    if content.files() > 0 {
        println!(
            "  Content: {} extracted, {} skipped, {} failed",
            content.completed, content.skipped, content.failed
        );
    }

    if stats.entry_errors > 0 {
        println!("  ⚠ {} entries could not be read", stats.entry_errors);
    }
    if !stats.errors.is_empty() {
        println!("\n⚠ Errors:");
        for error in &stats.errors {
            println!("  • {}", error);
        }
    }
}
