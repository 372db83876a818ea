//! Default values for configuration

use std::path::PathBuf;

/// Default provider identifier stored with every keyword mapping and full-text row
pub fn default_provider_id() -> String {
    "file-provider".to_string()
}

/// Default item type stored in the full-text table
pub fn default_provider_type() -> String {
    "file".to_string()
}

/// Default watch roots: the usual user document folders that exist
pub fn default_watch_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for dir in [dirs::document_dir(), dirs::desktop_dir(), dirs::download_dir()]
        .into_iter()
        .flatten()
    {
        if !paths.contains(&dir) {
            paths.push(dir);
        }
    }
    paths
}

/// Directory names pruned before descent
pub fn default_blacklisted_dirs() -> Vec<String> {
    [
        "node_modules",
        ".git",
        ".svn",
        ".hg",
        ".npm",
        ".yarn",
        ".m2",
        "dist",
        "build",
        "target",
        "out",
        "bin",
        "cache",
        ".cache",
        ".vscode",
        ".idea",
        "Library",
        "Application Support",
        "Applications",
        "System",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// File name prefixes that are never indexed (dotfiles)
pub fn default_blacklisted_prefixes() -> Vec<String> {
    vec![".".to_string()]
}

/// Dot-directories are pruned unless disabled
pub fn default_skip_hidden_dirs() -> bool {
    true
}

/// File name suffixes that are never indexed (editor backups)
pub fn default_blacklisted_suffixes() -> Vec<String> {
    vec!["~".to_string()]
}

/// Extensions that are never indexed
pub fn default_blacklisted_extensions() -> Vec<String> {
    [".tmp", ".temp", ".app", ".db", ".db-journal"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Records per insert chunk during a full scan
pub fn default_full_scan_chunk_size() -> usize {
    100
}

/// Records per insert chunk during reconciliation
pub fn default_reconcile_chunk_size() -> usize {
    500
}

/// Records per chunk when applying reconciliation updates
pub fn default_update_chunk_size() -> usize {
    10
}

/// Record ids per delete statement
pub fn default_delete_chunk_size() -> usize {
    500
}

/// Files per content worker batch
pub fn default_worker_batch_size() -> usize {
    80
}

/// Maximum extracted characters kept per file
pub fn default_max_content_chars() -> usize {
    200_000
}

/// Parser time limit in milliseconds
pub fn default_parse_timeout_ms() -> u64 {
    30_000
}

/// Content size limit for extensions without their own
pub fn default_content_size_limit_mb() -> u64 {
    25
}

/// Rows fetched per exact keyword lookup
pub fn default_precise_limit() -> usize {
    200
}

/// Rows fetched from the full-text store
pub fn default_fts_limit() -> usize {
    150
}

/// Maximum merged candidates hydrated per query
pub fn default_max_candidates() -> usize {
    120
}

/// Maximum prefix terms in a full-text query
pub fn default_max_fts_terms() -> usize {
    5
}

/// Results returned per query
pub fn default_page_size() -> usize {
    50
}

/// SQLite pool size
pub fn default_max_connections() -> u32 {
    5
}

/// SQLite busy timeout in milliseconds
pub fn default_busy_timeout_ms() -> u64 {
    30_000
}

/// Retries after a busy/locked error
pub fn default_busy_retries() -> u32 {
    5
}

/// Initial busy backoff in milliseconds
pub fn default_busy_backoff_ms() -> u64 {
    50
}

/// Backoff ceiling in milliseconds
pub fn default_busy_backoff_max_ms() -> u64 {
    2_000
}

/// Upper bound on concurrently running queue chunks
pub fn default_queue_max_concurrency() -> usize {
    8
}

/// Lower bound on concurrently running queue chunks
pub fn default_queue_min_concurrency() -> usize {
    1
}

/// Time budget per wave of chunks in milliseconds
pub fn default_queue_target_batch_ms() -> u64 {
    50
}
