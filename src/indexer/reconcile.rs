//! Disk vs store diffing

use crate::meta::StoredFileStamp;
use crate::scan::ScannedFile;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Minimal set of writes that brings the store in line with disk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileDiff {
    /// On disk only
    pub to_add: Vec<ScannedFile>,
    /// Newer on disk than in the store, with the stored row id
    pub to_update: Vec<(i64, ScannedFile)>,
    /// In the store only
    pub to_delete: Vec<String>,
}

impl ReconcileDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            added: self.to_add.len(),
            updated: self.to_update.len(),
            deleted: self.to_delete.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Diff `disk` against `stored` by path.
///
/// `stored` must already be scoped to the roots that were walked.
pub fn compute_reconciliation_diff(disk: Vec<ScannedFile>, stored: Vec<StoredFileStamp>) -> ReconcileDiff {
    let stored_by_path: HashMap<&str, &StoredFileStamp> =
        stored.iter().map(|s| (s.path.as_str(), s)).collect();
    let on_disk: HashSet<String> = disk.iter().map(|f| f.path.clone()).collect();

    let mut diff = ReconcileDiff::default();
    for file in disk {
        match stored_by_path.get(file.path.as_str()) {
            None => diff.to_add.push(file),
            Some(stamp) if file.mtime > stamp.mtime => diff.to_update.push((stamp.id, file)),
            Some(_) => {}
        }
    }

    diff.to_delete = stored
        .iter()
        .filter(|s| !on_disk.contains(&s.path))
        .map(|s| s.path.clone())
        .collect();
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::tests::scanned;

    fn stamp(id: i64, path: &str, mtime: i64) -> StoredFileStamp {
        StoredFileStamp {
            id,
            path: path.to_string(),
            mtime,
        }
    }

    #[test]
    fn test_add_update_delete() {
        let disk = vec![scanned("/r/a.md", 2), scanned("/r/c.md", 1)];
        let stored = vec![stamp(1, "/r/a.md", 1), stamp(2, "/r/b.md", 1)];

        let diff = compute_reconciliation_diff(disk, stored);
        assert_eq!(diff.to_add.len(), 1);
        assert_eq!(diff.to_add[0].path, "/r/c.md");
        assert_eq!(diff.to_update.len(), 1);
        assert_eq!(diff.to_update[0].0, 1);
        assert_eq!(diff.to_delete, vec!["/r/b.md".to_string()]);
    }

    #[test]
    fn test_unchanged_is_empty() {
        let disk = vec![scanned("/r/a.md", 5)];
        let stored = vec![stamp(1, "/r/a.md", 5)];
        assert!(compute_reconciliation_diff(disk, stored).is_empty());
    }

    #[test]
    fn test_older_disk_mtime_is_not_an_update() {
        let disk = vec![scanned("/r/a.md", 3)];
        let stored = vec![stamp(1, "/r/a.md", 9)];
        assert!(compute_reconciliation_diff(disk, stored).is_empty());
    }
}
