//! Write discipline for the store
//!
//! Every mutation goes through a single [`WriteScheduler`] so that concurrent
//! logical writers cannot interleave their delete-then-insert sequences, and
//! transient `SQLITE_BUSY`/`SQLITE_LOCKED` failures are retried with bounded
//! exponential backoff.

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Serializes logical writers around the store
#[derive(Debug, Default)]
pub struct WriteScheduler {
    gate: Mutex<()>,
    waiting: AtomicUsize,
}

impl WriteScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` once every previously scheduled write has finished
    pub async fn schedule<T, Fut>(&self, label: &str, task: Fut) -> T
    where
        Fut: Future<Output = T>,
    {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let queued_at = Instant::now();
        let _guard = self.gate.lock().await;
        self.waiting.fetch_sub(1, Ordering::SeqCst);

        let waited = queued_at.elapsed();
        if waited > Duration::from_millis(500) {
            debug!("Write '{}' waited {:?} for the scheduler", label, waited);
        }

        task.await
    }

    /// Writers currently queued behind the active one
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

/// Bounded backoff for busy/locked errors
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl From<&StoreConfig> for RetryPolicy {
    fn from(config: &StoreConfig) -> Self {
        Self {
            retries: config.busy_retries,
            base_delay: Duration::from_millis(config.busy_backoff_ms),
            max_delay: Duration::from_millis(config.busy_backoff_max_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

/// Whether an error is a transient lock/busy condition
pub fn is_busy_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            // SQLITE_BUSY, SQLITE_LOCKED and their extended codes
            if matches!(
                db_err.code().as_deref(),
                Some("5") | Some("6") | Some("261") | Some("262") | Some("517")
            ) {
                return true;
            }
            let message = db_err.message().to_lowercase();
            message.contains("database is locked") || message.contains("database is busy")
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// Run `op`, retrying busy errors according to `policy`
pub async fn with_busy_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut attempt: u32 = 0;
    let mut delay = policy.base_delay;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_busy_error(&err) => {
                attempt += 1;
                if attempt > policy.retries {
                    warn!("Write '{}' still busy after {} attempts", label, attempt);
                    return Err(Error::StoreBusy {
                        label: label.to_string(),
                        attempts: attempt,
                        source: err,
                    });
                }
                debug!(
                    "Write '{}' hit a busy store (attempt {}), retrying in {:?}",
                    label, attempt, delay
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_scheduler_serializes_writers() {
        let scheduler = Arc::new(WriteScheduler::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..8 {
            let scheduler = scheduler.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                scheduler
                    .schedule(&format!("test-{}", i), async {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.waiting(), 0);
    }

    #[tokio::test]
    async fn test_retry_gives_up_on_pool_timeout() {
        let policy = RetryPolicy {
            retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let mut calls = 0;
        let result: Result<()> = with_busy_retry(&policy, "always-busy", || {
            calls += 1;
            async { Err(sqlx::Error::PoolTimedOut) }
        })
        .await;

        assert!(matches!(result, Err(Error::StoreBusy { attempts: 3, .. })));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_retry_does_not_retry_other_errors() {
        let policy = RetryPolicy::default();
        let mut calls = 0;
        let result: Result<()> = with_busy_retry(&policy, "row-not-found", || {
            calls += 1;
            async { Err(sqlx::Error::RowNotFound) }
        })
        .await;

        assert!(matches!(result, Err(Error::Database(_))));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_busy() {
        let policy = RetryPolicy {
            retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let mut calls = 0;
        let result = with_busy_retry(&policy, "flaky", || {
            calls += 1;
            let fail = calls < 3;
            async move {
                if fail {
                    Err(sqlx::Error::PoolTimedOut)
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_write_waits_out_a_held_lock() {
        use crate::meta::{MetaDb, UsageLookup};
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("locked.db");
        let store = StoreConfig {
            busy_timeout_ms: 1,
            busy_retries: 20,
            busy_backoff_ms: 20,
            busy_backoff_max_ms: 100,
            ..StoreConfig::default()
        };
        let db = MetaDb::open(&db_path, &store).await.unwrap();

        let other = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(&db_path)
                    .busy_timeout(Duration::from_millis(1)),
            )
            .await
            .unwrap();
        let mut held = other.begin().await.unwrap();
        sqlx::query("INSERT INTO usage_summary (item_id, last_used, click_count) VALUES ('/held', 1, 1)")
            .execute(&mut *held)
            .await
            .unwrap();

        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            held.commit().await.unwrap();
        });

        db.record_usage("/r/a.md").await.unwrap();
        release.await.unwrap();

        let usage = db
            .usage_for(&["/held".to_string(), "/r/a.md".to_string()])
            .await
            .unwrap();
        assert_eq!(usage.len(), 2);
    }
}
