//! Resource metrics reported by the content worker

use crate::meta::now_millis;
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};

/// Snapshot answered to an out-of-band metrics request
#[derive(Debug, Clone, Serialize)]
pub struct WorkerMetrics {
    /// Wall clock, epoch milliseconds
    pub timestamp: i64,
    /// Milliseconds since the worker started (monotonic)
    pub uptime_ms: u64,
    pub rss_bytes: Option<u64>,
    pub load_average_1m: Option<f64>,
    pub busy_ms: u64,
    pub idle_ms: u64,
    /// busy / (busy + idle), 0 when nothing has been measured
    pub utilization: f64,
    pub queue_depth: usize,
    pub batches_completed: u64,
    pub files_processed: u64,
    pub files_failed: u64,
}

/// Busy/idle accounting kept by the worker actor
#[derive(Debug)]
pub(crate) struct Utilization {
    started: Instant,
    busy: Duration,
    busy_since: Option<Instant>,
    pub batches_completed: u64,
    pub files_processed: u64,
    pub files_failed: u64,
}

impl Utilization {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            busy: Duration::ZERO,
            busy_since: None,
            batches_completed: 0,
            files_processed: 0,
            files_failed: 0,
        }
    }

    pub fn mark_busy(&mut self) {
        if self.busy_since.is_none() {
            self.busy_since = Some(Instant::now());
        }
    }

    pub fn mark_idle(&mut self) {
        if let Some(since) = self.busy_since.take() {
            self.busy += since.elapsed();
        }
    }

    pub fn snapshot(&self, queue_depth: usize) -> WorkerMetrics {
        let uptime = self.started.elapsed();
        let busy = self.busy + self.busy_since.map(|s| s.elapsed()).unwrap_or_default();
        let idle = uptime.saturating_sub(busy);
        let total = uptime.as_secs_f64();
        let utilization = if total > 0.0 {
            (busy.as_secs_f64() / total).min(1.0)
        } else {
            0.0
        };

        WorkerMetrics {
            timestamp: now_millis(),
            uptime_ms: uptime.as_millis() as u64,
            rss_bytes: read_rss_bytes(Path::new("/proc/self/status")),
            load_average_1m: read_load_avg_1m(Path::new("/proc/loadavg")),
            busy_ms: busy.as_millis() as u64,
            idle_ms: idle.as_millis() as u64,
            utilization,
            queue_depth,
            batches_completed: self.batches_completed,
            files_processed: self.files_processed,
            files_failed: self.files_failed,
        }
    }
}

fn read_rss_bytes(path: &Path) -> Option<u64> {
    let contents = std::fs::read_to_string(path).ok()?;
    parse_rss_bytes(&contents)
}

fn parse_rss_bytes(contents: &str) -> Option<u64> {
    let line = contents.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb = line.split_whitespace().nth(1)?.parse::<u64>().ok()?;
    Some(kb * 1024)
}

fn read_load_avg_1m(path: &Path) -> Option<f64> {
    let contents = std::fs::read_to_string(path).ok()?;
    parse_load_avg_1m(&contents)
}

fn parse_load_avg_1m(contents: &str) -> Option<f64> {
    contents.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proc_fields() {
        let status = "Name:\tfindex\nVmPeak:\t  9000 kB\nVmRSS:\t  2048 kB\n";
        assert_eq!(parse_rss_bytes(status), Some(2048 * 1024));
        assert_eq!(parse_rss_bytes("Name:\tfindex\n"), None);

        assert_eq!(parse_load_avg_1m("0.52 0.58 0.59 1/467 12345\n"), Some(0.52));
        assert_eq!(parse_load_avg_1m(""), None);
    }

    #[test]
    fn test_utilization_bounds() {
        let mut util = Utilization::new();
        util.mark_busy();
        std::thread::sleep(Duration::from_millis(5));
        util.mark_idle();

        let snapshot = util.snapshot(3);
        assert!(snapshot.busy_ms >= 5);
        assert!(snapshot.utilization > 0.0 && snapshot.utilization <= 1.0);
        assert_eq!(snapshot.queue_depth, 3);
    }
}
