//! Directory scanning
//!
//! Walks a watch root and returns flat file metadata for every entry that
//! passes the configured filters. Blacklisted directories are pruned before
//! descent. Per-entry errors are logged and collected, never fatal.

use crate::config::{normalize_extension, Config, ExtensionTable};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Metadata for one file found on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedFile {
    pub path: String,
    pub name: String,
    /// Lowercased, dot-prefixed; empty when the file has no extension
    pub extension: String,
    pub size: i64,
    /// Epoch milliseconds
    pub ctime: i64,
    /// Epoch milliseconds
    pub mtime: i64,
}

/// Result of scanning one root
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<ScannedFile>,
    /// Entries skipped because of I/O errors
    pub errors: Vec<String>,
}

/// Name/extension/path filters applied during a walk
#[derive(Debug, Clone)]
pub struct ScanFilters {
    blacklisted_dirs: HashSet<String>,
    blacklisted_prefixes: Vec<String>,
    blacklisted_suffixes: Vec<String>,
    blacklisted_extensions: HashSet<String>,
    whitelist: ExtensionTable,
    exclude_paths: HashSet<PathBuf>,
    skip_hidden_dirs: bool,
}

impl ScanFilters {
    pub fn from_config(config: &Config) -> Self {
        Self {
            blacklisted_dirs: config.scan.blacklisted_dirs.iter().cloned().collect(),
            blacklisted_prefixes: config.scan.blacklisted_prefixes.clone(),
            blacklisted_suffixes: config.scan.blacklisted_suffixes.clone(),
            blacklisted_extensions: config
                .scan
                .blacklisted_extensions
                .iter()
                .map(|e| normalize_extension(e))
                .collect(),
            whitelist: config.extensions.clone(),
            exclude_paths: config.exclude_paths().into_iter().collect(),
            skip_hidden_dirs: config.scan.skip_hidden_dirs,
        }
    }

    /// Whether a directory should be pruned
    pub fn is_dir_blocked(&self, name: &str) -> bool {
        (self.skip_hidden_dirs && name.starts_with('.')) || self.blacklisted_dirs.contains(name)
    }

    /// Whether a file name and extension pass the filters
    pub fn accepts_file(&self, name: &str, extension: &str) -> bool {
        if self.blacklisted_prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            return false;
        }
        if self.blacklisted_suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            return false;
        }
        if extension.is_empty() || self.blacklisted_extensions.contains(extension) {
            return false;
        }
        self.whitelist.is_whitelisted(extension)
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclude_paths.contains(path)
    }

    /// Apply every filter to a single path, including parent directory names
    pub fn accepts_path(&self, path: &Path, root: &Path) -> bool {
        if self.is_excluded(path) {
            return false;
        }
        if let Ok(relative) = path.strip_prefix(root) {
            let mut components: Vec<_> = relative.components().collect();
            components.pop();
            if components
                .iter()
                .any(|c| self.is_dir_blocked(&c.as_os_str().to_string_lossy()))
            {
                return false;
            }
        }
        let name = file_name(path);
        self.accepts_file(&name, &extension_of(path))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Lowercased dot-prefixed extension, empty if none
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| normalize_extension(&e.to_string_lossy()))
        .unwrap_or_default()
}

fn to_millis(time: std::io::Result<SystemTime>) -> Option<i64> {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
}

/// Build a [`ScannedFile`] from a path on disk
pub fn stat_file(path: &Path) -> Result<ScannedFile> {
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(Error::InvalidPath(format!("{} is not a file", path.display())));
    }
    let mtime = to_millis(metadata.modified()).unwrap_or(0);
    let ctime = to_millis(metadata.created()).unwrap_or(mtime);

    Ok(ScannedFile {
        path: path.to_string_lossy().to_string(),
        name: file_name(path),
        extension: extension_of(path),
        size: metadata.len() as i64,
        ctime,
        mtime,
    })
}

/// Walks watch roots with a fixed filter set
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    filters: ScanFilters,
    follow_symlinks: bool,
}

impl DirectoryScanner {
    pub fn new(filters: ScanFilters, follow_symlinks: bool) -> Self {
        Self {
            filters,
            follow_symlinks,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ScanFilters::from_config(config), config.scan.follow_symlinks)
    }

    pub fn filters(&self) -> &ScanFilters {
        &self.filters
    }

    fn keep_entry(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        if self.filters.is_excluded(entry.path()) {
            return false;
        }
        if entry.file_type().is_dir() {
            return !self.filters.is_dir_blocked(&entry.file_name().to_string_lossy());
        }
        true
    }

    /// Walk `root` synchronously
    pub fn scan(&self, root: &Path) -> Result<ScanOutcome> {
        if !root.is_dir() {
            return Err(Error::Scan(format!("{} is not a directory", root.display())));
        }

        let mut outcome = ScanOutcome::default();
        let walker = WalkDir::new(root)
            .follow_links(self.follow_symlinks)
            .into_iter()
            .filter_entry(|e| self.keep_entry(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping entry under {}: {}", root.display(), e);
                    outcome.errors.push(e.to_string());
                    continue;
                }
            };
            if !entry.file_type().is_file() && !(self.follow_symlinks && entry.path().is_file()) {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            let extension = extension_of(entry.path());
            if !self.filters.accepts_file(&name, &extension) {
                continue;
            }

            match stat_file(entry.path()) {
                Ok(file) => outcome.files.push(file),
                Err(e) => {
                    warn!("Failed to stat {}: {}", entry.path().display(), e);
                    outcome.errors.push(e.to_string());
                }
            }
        }

        debug!(
            "Scanned {}: {} files, {} errors",
            root.display(),
            outcome.files.len(),
            outcome.errors.len()
        );
        Ok(outcome)
    }

    /// Walk `root` on the blocking pool
    pub async fn scan_async(&self, root: PathBuf) -> Result<ScanOutcome> {
        let scanner = self.clone();
        tokio::task::spawn_blocking(move || scanner.scan(&root))
            .await
            .map_err(|e| Error::Scan(format!("scan task failed: {}", e)))?
    }
}
