//! SQLite schema definition

/// SQL schema for the index database
pub const SCHEMA_SQL: &str = r#"
-- Files: one record per indexed file, keyed by absolute path
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    extension TEXT NOT NULL DEFAULT '',
    size INTEGER NOT NULL DEFAULT 0,
    ctime INTEGER NOT NULL DEFAULT 0,
    mtime INTEGER NOT NULL DEFAULT 0,
    last_indexed_at INTEGER NOT NULL DEFAULT 0,
    content TEXT,
    embedding_status TEXT NOT NULL DEFAULT 'pending'
);

-- Scan progress: one row per watch root whose initial full scan completed
CREATE TABLE IF NOT EXISTS scan_progress (
    path TEXT PRIMARY KEY,
    last_scanned INTEGER NOT NULL
);

-- Keyword mappings: normalized keyword -> item, regenerated on every re-index
CREATE TABLE IF NOT EXISTS keyword_mappings (
    keyword TEXT NOT NULL,
    item_id TEXT NOT NULL,
    provider_id TEXT NOT NULL,
    priority REAL NOT NULL DEFAULT 1.0
);

-- Per-file key/value metadata (extension keywords, icon refs)
CREATE TABLE IF NOT EXISTS file_extensions (
    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    UNIQUE(file_id, key)
);

-- Content extraction progress per file
CREATE TABLE IF NOT EXISTS file_index_progress (
    file_id INTEGER PRIMARY KEY REFERENCES files(id) ON DELETE CASCADE,
    status TEXT NOT NULL,
    progress INTEGER NOT NULL DEFAULT 0,
    processed_bytes INTEGER,
    total_bytes INTEGER,
    last_error TEXT,
    started_at INTEGER,
    updated_at INTEGER NOT NULL
);

-- Usage statistics consumed by the ranker
CREATE TABLE IF NOT EXISTS usage_summary (
    item_id TEXT PRIMARY KEY,
    last_used INTEGER NOT NULL,
    click_count INTEGER NOT NULL DEFAULT 0
);

-- Full-text documents, one row per item
CREATE VIRTUAL TABLE IF NOT EXISTS search_index USING fts5(
    item_id UNINDEXED,
    provider UNINDEXED,
    type UNINDEXED,
    title,
    title_compact,
    keywords,
    tags,
    path,
    content,
    tokenize = 'unicode61 remove_diacritics 2'
);
"#;

/// Supporting indexes, created idempotently at startup
pub const INDEX_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_keyword_mappings_keyword ON keyword_mappings(keyword, provider_id);
CREATE INDEX IF NOT EXISTS idx_keyword_mappings_item ON keyword_mappings(item_id);
CREATE INDEX IF NOT EXISTS idx_files_extension ON files(extension);
CREATE INDEX IF NOT EXISTS idx_files_mtime ON files(mtime);
CREATE INDEX IF NOT EXISTS idx_file_extensions_file ON file_extensions(file_id);
CREATE INDEX IF NOT EXISTS idx_file_index_progress_status ON file_index_progress(status);
"#;
