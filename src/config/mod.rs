//! Configuration management for findex
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;
mod extensions;

pub use defaults::*;
pub use extensions::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider identifier stored alongside index rows
    #[serde(default = "default_provider_id")]
    pub provider_id: String,

    /// Item type stored in the full-text table
    #[serde(default = "default_provider_type")]
    pub provider_type: String,

    /// Absolute directories kept indexed
    #[serde(default = "default_watch_paths")]
    pub watch_paths: Vec<PathBuf>,

    /// Directory scanner filters
    #[serde(default)]
    pub scan: ScanConfig,

    /// Index maintenance batching
    #[serde(default)]
    pub index: IndexConfig,

    /// Content extraction worker
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Query engine limits
    #[serde(default)]
    pub query: QueryConfig,

    /// SQLite connection and retry behaviour
    #[serde(default)]
    pub store: StoreConfig,

    /// Adaptive batch queue tuning
    #[serde(default)]
    pub queue: QueueConfig,

    /// Extension classification table
    #[serde(default)]
    pub extensions: ExtensionTable,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Directory scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Directory names pruned before descent
    #[serde(default = "default_blacklisted_dirs")]
    pub blacklisted_dirs: Vec<String>,

    /// File name prefixes to skip
    #[serde(default = "default_blacklisted_prefixes")]
    pub blacklisted_prefixes: Vec<String>,

    /// File name suffixes to skip
    #[serde(default = "default_blacklisted_suffixes")]
    pub blacklisted_suffixes: Vec<String>,

    /// Extensions to skip
    #[serde(default = "default_blacklisted_extensions")]
    pub blacklisted_extensions: Vec<String>,

    /// Explicit paths never indexed (the store file is always added)
    #[serde(default)]
    pub exclude_paths: Vec<PathBuf>,

    /// Prune directories whose name starts with a dot
    #[serde(default = "default_skip_hidden_dirs")]
    pub skip_hidden_dirs: bool,

    /// Follow symbolic links while walking
    #[serde(default)]
    pub follow_symlinks: bool,
}

/// Index maintenance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_full_scan_chunk_size")]
    pub full_scan_chunk_size: usize,

    #[serde(default = "default_reconcile_chunk_size")]
    pub reconcile_chunk_size: usize,

    #[serde(default = "default_update_chunk_size")]
    pub update_chunk_size: usize,

    #[serde(default = "default_delete_chunk_size")]
    pub delete_chunk_size: usize,

    /// Files per content worker batch
    #[serde(default = "default_worker_batch_size")]
    pub worker_batch_size: usize,

    /// Emit `ng:` bigram keywords for titles
    #[serde(default)]
    pub enable_ngrams: bool,
}

/// Content extraction worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Extracted content is truncated beyond this many characters
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Per-file parser time limit in milliseconds
    #[serde(default = "default_parse_timeout_ms")]
    pub parse_timeout_ms: u64,

    /// Size limit for extensions that do not set one
    #[serde(default = "default_content_size_limit_mb")]
    pub default_content_size_limit_mb: u64,
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_precise_limit")]
    pub precise_limit: usize,

    #[serde(default = "default_fts_limit")]
    pub fts_limit: usize,

    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    #[serde(default = "default_max_fts_terms")]
    pub max_fts_terms: usize,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_busy_retries")]
    pub busy_retries: u32,

    #[serde(default = "default_busy_backoff_ms")]
    pub busy_backoff_ms: u64,

    #[serde(default = "default_busy_backoff_max_ms")]
    pub busy_backoff_max_ms: u64,
}

/// Adaptive queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_queue_min_concurrency")]
    pub min_concurrency: usize,

    /// Time budget for one wave of chunks in milliseconds
    #[serde(default = "default_queue_target_batch_ms")]
    pub target_batch_ms: u64,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for findex data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider_id: default_provider_id(),
            provider_type: default_provider_type(),
            watch_paths: default_watch_paths(),
            scan: ScanConfig::default(),
            index: IndexConfig::default(),
            worker: WorkerConfig::default(),
            query: QueryConfig::default(),
            store: StoreConfig::default(),
            queue: QueueConfig::default(),
            extensions: ExtensionTable::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            blacklisted_dirs: default_blacklisted_dirs(),
            blacklisted_prefixes: default_blacklisted_prefixes(),
            blacklisted_suffixes: default_blacklisted_suffixes(),
            blacklisted_extensions: default_blacklisted_extensions(),
            exclude_paths: Vec::new(),
            skip_hidden_dirs: default_skip_hidden_dirs(),
            follow_symlinks: false,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            full_scan_chunk_size: default_full_scan_chunk_size(),
            reconcile_chunk_size: default_reconcile_chunk_size(),
            update_chunk_size: default_update_chunk_size(),
            delete_chunk_size: default_delete_chunk_size(),
            worker_batch_size: default_worker_batch_size(),
            enable_ngrams: false,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_content_chars: default_max_content_chars(),
            parse_timeout_ms: default_parse_timeout_ms(),
            default_content_size_limit_mb: default_content_size_limit_mb(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            precise_limit: default_precise_limit(),
            fts_limit: default_fts_limit(),
            max_candidates: default_max_candidates(),
            max_fts_terms: default_max_fts_terms(),
            page_size: default_page_size(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            busy_retries: default_busy_retries(),
            busy_backoff_ms: default_busy_backoff_ms(),
            busy_backoff_max_ms: default_busy_backoff_max_ms(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_queue_max_concurrency(),
            min_concurrency: default_queue_min_concurrency(),
            target_batch_ms: default_queue_target_batch_ms(),
        }
    }
}

impl Config {
    /// Get the default base directory for findex (~/.findex)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".findex")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("index.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("index.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if findex is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Watch roots that exist on disk, as normalized strings.
    ///
    /// Missing roots are dropped with a warning; an empty result degrades to an
    /// empty index rather than failing.
    pub fn resolved_watch_paths(&self) -> Vec<String> {
        let mut roots = Vec::new();
        for path in &self.watch_paths {
            let resolved = match std::fs::canonicalize(path) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Skipping watch path {}: {}", path.display(), e);
                    continue;
                }
            };
            if !resolved.is_dir() {
                warn!("Skipping watch path {}: not a directory", path.display());
                continue;
            }
            let root = resolved.to_string_lossy().to_string();
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        roots
    }

    /// Every configured watch root, normalized, whether or not it exists.
    ///
    /// Records under a root that is temporarily unavailable (an unmounted
    /// volume, say) still belong to the index and must survive cleanup.
    pub fn configured_watch_paths(&self) -> Vec<String> {
        let mut roots = Vec::new();
        for path in &self.watch_paths {
            let root = normalize_watch_path(path).to_string_lossy().to_string();
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        roots
    }

    /// Paths the scanner must never return, including the store itself
    pub fn exclude_paths(&self) -> Vec<PathBuf> {
        let mut excluded = self.scan.exclude_paths.clone();
        if !self.paths.db_file.as_os_str().is_empty() {
            excluded.push(self.paths.db_file.clone());
            let canonical_parent = self
                .paths
                .db_file
                .parent()
                .and_then(|p| std::fs::canonicalize(p).ok());
            if let (Some(parent), Some(name)) = (canonical_parent, self.paths.db_file.file_name()) {
                excluded.push(parent.join(name));
            }
        }
        excluded
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.provider_id.trim().is_empty() {
            return Err(Error::Config("provider_id must not be empty".to_string()));
        }

        for path in &self.watch_paths {
            if !path.is_absolute() {
                return Err(Error::Config(format!(
                    "watch path must be absolute: {}",
                    path.display()
                )));
            }
        }

        let chunk_sizes = [
            ("index.full_scan_chunk_size", self.index.full_scan_chunk_size),
            ("index.reconcile_chunk_size", self.index.reconcile_chunk_size),
            ("index.update_chunk_size", self.index.update_chunk_size),
            ("index.delete_chunk_size", self.index.delete_chunk_size),
            ("index.worker_batch_size", self.index.worker_batch_size),
        ];
        for (name, value) in chunk_sizes {
            if value == 0 {
                return Err(Error::Config(format!("{} must be > 0", name)));
            }
        }

        if self.worker.max_content_chars == 0 {
            return Err(Error::Config(
                "worker.max_content_chars must be > 0".to_string(),
            ));
        }

        if self.worker.parse_timeout_ms == 0 {
            return Err(Error::Config("worker.parse_timeout_ms must be > 0".to_string()));
        }

        let limits = [
            ("query.precise_limit", self.query.precise_limit),
            ("query.fts_limit", self.query.fts_limit),
            ("query.max_candidates", self.query.max_candidates),
            ("query.max_fts_terms", self.query.max_fts_terms),
            ("query.page_size", self.query.page_size),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(Error::Config(format!("{} must be > 0", name)));
            }
        }

        if self.store.max_connections == 0 {
            return Err(Error::Config("store.max_connections must be > 0".to_string()));
        }

        if self.store.busy_backoff_ms > self.store.busy_backoff_max_ms {
            return Err(Error::Config(
                "store.busy_backoff_ms must be <= store.busy_backoff_max_ms".to_string(),
            ));
        }

        if self.queue.min_concurrency == 0 {
            return Err(Error::Config("queue.min_concurrency must be > 0".to_string()));
        }

        if self.queue.min_concurrency > self.queue.max_concurrency {
            return Err(Error::Config(
                "queue.min_concurrency must be <= queue.max_concurrency".to_string(),
            ));
        }

        Ok(())
    }
}

/// Canonicalize the longest existing ancestor and re-append the missing tail
fn normalize_watch_path(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        if let Ok(resolved) = std::fs::canonicalize(current) {
            return missing
                .iter()
                .rev()
                .fold(resolved, |acc: PathBuf, part| acc.join(part));
        }
        match (current.file_name(), current.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}
