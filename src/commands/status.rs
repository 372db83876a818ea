//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::meta::{IndexStats, MetaDb};
use serde::Serialize;
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub provider_id: String,
    pub watch_paths: Vec<String>,
    pub stats: IndexStats,
}

/// Get index status
pub async fn cmd_status(config: &Config, db: &MetaDb) -> Result<StatusInfo> {
    info!("Getting status");

    let stats = db.get_index_stats(&config.provider_id).await?;

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        provider_id: config.provider_id.clone(),
        watch_paths: config
            .watch_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
        stats,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 findex Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("Provider: {}", status.provider_id);

    println!("\nWatch paths:");
    if status.watch_paths.is_empty() {
        println!("  (none)");
    }
    for path in &status.watch_paths {
        println!("  • {}", path);
    }

    let stats = &status.stats;
    println!("\nIndex:");
    println!("  Files: {}", stats.file_count);
    println!("  Fully scanned roots: {}", stats.scanned_roots);
    println!("  Documents: {}", stats.document_count);
    println!("  Keyword mappings: {}", stats.keyword_count);

    if !stats.content_status.is_empty() {
        println!("\nContent extraction:");
        for (status, count) in &stats.content_status {
            println!("  {}: {}", status, count);
        }
    }
}
