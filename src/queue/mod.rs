// Queue module - FIFO admission gate bounding concurrent expensive work

use crate::env::parse_env_var;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

/// Admission queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of tasks running at once
    pub max_concurrent: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_concurrent: 5 }
    }
}

impl QueueConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            max_concurrent: parse_env_var("PLANRUN_MAX_CONCURRENT", defaults.max_concurrent),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Admission queue is closed")]
    Closed,
}

/// Bounded FIFO gate. Tasks start in arrival order once a slot is free; a slot
/// is released when its task completes, fails, or is dropped.
///
/// One instance is shared (via `Arc`) by everything that must respect the cap.
#[derive(Debug)]
pub struct AdmissionQueue {
    slots: Semaphore,
    max_concurrent: usize,
    running: AtomicUsize,
    waiting: AtomicUsize,
}

impl AdmissionQueue {
    pub fn new(config: QueueConfig) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            slots: Semaphore::new(max_concurrent),
            max_concurrent,
            running: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
        }
    }

    pub fn shared(config: QueueConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Wait for a slot, then run `task` while holding it
    pub async fn submit<F, T>(&self, task: F) -> Result<T, QueueError>
    where
        F: Future<Output = T>,
    {
        let acquired = {
            let _waiting = CountGuard::enter(&self.waiting);
            self.slots.acquire().await
        };
        let _permit = acquired.map_err(|_| QueueError::Closed)?;

        let _running = CountGuard::enter(&self.running);
        debug!(
            running = self.running(),
            waiting = self.waiting(),
            max_concurrent = self.max_concurrent,
            "task admitted"
        );

        Ok(task.await)
    }

    /// Tasks currently holding a slot
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Submissions waiting for a slot
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Reject queued and future submissions. Running tasks finish normally.
    pub fn close(&self) {
        self.slots.close();
    }
}

/// Keeps a gauge accurate even when the submitting future is dropped
struct CountGuard<'a>(&'a AtomicUsize);

impl<'a> CountGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CountGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_never_exceeds_cap() {
        let queue = AdmissionQueue::shared(QueueConfig { max_concurrent: 3 });
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..20u64 {
            let queue = queue.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            let jitter = rand::random::<u64>() % 15;
            handles.push(tokio::spawn(async move {
                queue
                    .submit(async {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        assert!(queue.running() <= 3);
                        tokio::time::sleep(Duration::from_millis(1 + jitter)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        i
                    })
                    .await
            }));
        }

        let results = futures::future::join_all(handles).await;
        assert_eq!(results.len(), 20);
        for r in results {
            assert!(r.unwrap().is_ok());
        }
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(queue.running(), 0);
        assert_eq!(queue.waiting(), 0);
    }

    #[tokio::test]
    async fn test_admits_in_arrival_order() {
        let queue = AdmissionQueue::shared(QueueConfig { max_concurrent: 1 });
        let order = Arc::new(Mutex::new(Vec::new()));
        let (release, blocked) = oneshot::channel::<()>();

        let blocker = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .submit(async {
                        blocked.await.ok();
                    })
                    .await
            })
        };
        while queue.running() == 0 {
            tokio::task::yield_now().await;
        }

        let mut handles = Vec::new();
        for i in 0..5 {
            let q = queue.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                q.submit(async move {
                    order.lock().unwrap().push(i);
                })
                .await
            }));
            while queue.waiting() < i + 1 {
                tokio::task::yield_now().await;
            }
        }

        release.send(()).unwrap();
        blocker.await.unwrap().unwrap();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_failed_task_releases_slot() {
        let queue = AdmissionQueue::new(QueueConfig { max_concurrent: 1 });

        let first: Result<Result<(), String>, _> =
            queue.submit(async { Err("boom".to_string()) }).await;
        assert_eq!(first.unwrap(), Err("boom".to_string()));

        let second = queue.submit(async { 42 }).await;
        assert_eq!(second.unwrap(), 42);
        assert_eq!(queue.running(), 0);
    }

    #[tokio::test]
    async fn test_closed_queue_rejects() {
        let queue = AdmissionQueue::new(QueueConfig::default());
        queue.close();
        assert!(matches!(queue.submit(async {}).await, Err(QueueError::Closed)));
    }
}
