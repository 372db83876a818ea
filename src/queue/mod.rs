//! Adaptive batch task queue
//!
//! Runs an ordered list of chunks through an async handler in waves. The wave
//! width is derived from a per-label moving average of observed chunk
//! durations: fast chunks run wide, slow chunks run narrow and the queue
//! yields between waves so foreground work stays responsive.
//!
//! A failing chunk is counted and logged; the remaining chunks still run.

use crate::config::QueueConfig;
use crate::error::Result;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Weight of the newest observation in the moving average
const SMOOTHING: f64 = 0.3;

/// Per-run options
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Duration statistics are kept per label
    pub label: String,
    /// Initial guess used until a duration has been observed for the label
    pub estimated_task_time_ms: u64,
}

impl QueueOptions {
    pub fn new(label: impl Into<String>, estimated_task_time_ms: u64) -> Self {
        Self {
            label: label.into(),
            estimated_task_time_ms,
        }
    }
}

/// Aggregate outcome of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueReport {
    /// Chunks whose handler succeeded
    pub processed: usize,
    /// Chunks whose handler failed
    pub failed: usize,
    /// Items reported by successful handlers
    pub items: usize,
    pub errors: Vec<String>,
}

impl QueueReport {
    pub fn merge(&mut self, other: QueueReport) {
        self.processed += other.processed;
        self.failed += other.failed;
        self.items += other.items;
        self.errors.extend(other.errors);
    }
}

/// Generic chunk executor with duration-learning concurrency
#[derive(Debug)]
pub struct AdaptiveTaskQueue {
    min_concurrency: usize,
    max_concurrency: usize,
    target_batch: Duration,
    averages: Mutex<HashMap<String, f64>>,
}

impl AdaptiveTaskQueue {
    pub fn new(config: &QueueConfig) -> Self {
        let min = config.min_concurrency.max(1);
        Self {
            min_concurrency: min,
            max_concurrency: config.max_concurrency.max(min),
            target_batch: Duration::from_millis(config.target_batch_ms.max(1)),
            averages: Mutex::new(HashMap::new()),
        }
    }

    /// Moving-average chunk duration for a label, in milliseconds
    pub fn average_ms(&self, label: &str) -> Option<f64> {
        self.averages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(label)
            .copied()
    }

    fn observe(&self, label: &str, elapsed: Duration) {
        let sample = elapsed.as_secs_f64() * 1000.0;
        let mut averages = self.averages.lock().unwrap_or_else(|e| e.into_inner());
        let avg = averages.entry(label.to_string()).or_insert(sample);
        *avg = SMOOTHING * sample + (1.0 - SMOOTHING) * *avg;
    }

    /// Concurrency for the next wave of `label`
    pub fn concurrency_for(&self, label: &str, estimated_ms: u64) -> usize {
        let avg = self.average_ms(label).unwrap_or(estimated_ms as f64);
        if avg <= 0.0 {
            return self.max_concurrency;
        }
        let target = self.target_batch.as_secs_f64() * 1000.0;
        let width = (target / avg).floor() as usize;
        width.clamp(self.min_concurrency, self.max_concurrency)
    }

    /// Run every chunk through `handler`.
    ///
    /// The handler returns the number of items it handled. Chunks within a
    /// wave run concurrently; no ordering is guaranteed across chunks.
    pub async fn run<T, F, Fut>(&self, chunks: Vec<T>, options: &QueueOptions, handler: F) -> QueueReport
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<usize>>,
    {
        let mut report = QueueReport::default();
        let total = chunks.len();
        let mut pending = chunks.into_iter().peekable();
        let mut index = 0usize;

        while pending.peek().is_some() {
            let width = self.concurrency_for(&options.label, options.estimated_task_time_ms);
            let wave: Vec<(usize, T)> = pending
                .by_ref()
                .take(width)
                .map(|chunk| {
                    index += 1;
                    (index, chunk)
                })
                .collect();

            let results = join_all(wave.into_iter().map(|(n, chunk)| {
                let fut = handler(chunk);
                async move {
                    let started = Instant::now();
                    let result = fut.await;
                    (n, started.elapsed(), result)
                }
            }))
            .await;

            for (n, elapsed, result) in results {
                self.observe(&options.label, elapsed);
                match result {
                    Ok(items) => {
                        report.processed += 1;
                        report.items += items;
                    }
                    Err(e) => {
                        warn!("{} chunk {}/{} failed: {}", options.label, n, total, e);
                        report.failed += 1;
                        report.errors.push(e.to_string());
                    }
                }
            }

            tokio::task::yield_now().await;
        }

        debug!(
            "{}: {} chunks processed, {} failed (avg {:.1}ms)",
            options.label,
            report.processed,
            report.failed,
            self.average_ms(&options.label).unwrap_or(0.0)
        );
        report
    }
}
