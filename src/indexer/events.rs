//! Persisting the content worker's event stream

use crate::meta::{ContentStatus, MetaDb};
use crate::worker::WorkerEvent;
use serde::Serialize;
use std::ops::AddAssign;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Terminal outcomes seen on worker streams
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContentStats {
    pub batches: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub batch_errors: usize,
    /// Events the store refused
    pub persist_errors: usize,
}

impl ContentStats {
    pub fn files(&self) -> usize {
        self.completed + self.skipped + self.failed
    }
}

impl AddAssign for ContentStats {
    fn add_assign(&mut self, other: Self) {
        self.batches += other.batches;
        self.completed += other.completed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.batch_errors += other.batch_errors;
        self.persist_errors += other.persist_errors;
    }
}

/// Drain one batch's events, writing each as it arrives
pub(crate) async fn persist_events(db: MetaDb, mut events: mpsc::UnboundedReceiver<WorkerEvent>) -> ContentStats {
    let mut stats = ContentStats::default();

    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::Progress(update) => {
                if let Err(e) = db.upsert_progress(std::slice::from_ref(&update)).await {
                    warn!("Failed to record progress for file {}: {}", update.file_id, e);
                    stats.persist_errors += 1;
                }
            }
            WorkerEvent::FileDone(outcome) => {
                match outcome.status {
                    ContentStatus::Completed => stats.completed += 1,
                    ContentStatus::Failed => stats.failed += 1,
                    _ => stats.skipped += 1,
                }
                if let Some(reason) = &outcome.reason {
                    debug!("{} -> {} ({})", outcome.path, outcome.status, reason);
                }
                if let Err(e) = db.persist_content(&[outcome.to_content_write()]).await {
                    warn!("Failed to persist content for {}: {}", outcome.path, e);
                    stats.persist_errors += 1;
                }
            }
            WorkerEvent::BatchDone {
                task_id,
                processed,
                failed,
            } => {
                debug!("Batch {} done: {} processed, {} failed", task_id, processed, failed);
                stats.batches += 1;
            }
            WorkerEvent::BatchError { task_id, error } => {
                warn!("Batch {} rejected: {}", task_id, error);
                stats.batch_errors += 1;
            }
        }
    }

    stats
}
