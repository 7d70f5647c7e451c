//! Bounded worker pool for fire-and-forget background jobs.
//!
//! Jobs are queued with `try_send`; when the queue is full the job is dropped
//! and a warning is logged so request handling never waits on delivery.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

pub struct WorkerPool<T> {
    name: &'static str,
    sender: mpsc::Sender<T>,
}

impl<T> Clone for WorkerPool<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            sender: self.sender.clone(),
        }
    }
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawns `workers` tasks draining a queue of `capacity` jobs through `handler`.
    pub fn spawn<H, Fut>(name: &'static str, workers: usize, capacity: usize, handler: H) -> Self
    where
        H: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let handler = Arc::new(handler);

        for worker in 0..workers.max(1) {
            let receiver = Arc::clone(&receiver);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                loop {
                    let job = { receiver.lock().await.recv().await };
                    match job {
                        Some(job) => handler(job).await,
                        None => break,
                    }
                }
                tracing::debug!(pool = name, worker, "Worker stopped");
            });
        }

        tracing::info!(pool = name, workers, capacity, "Worker pool started");
        Self { name, sender }
    }

    /// Queues a job. Returns false when it was dropped.
    pub fn submit(&self, job: T) -> bool {
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(pool = self.name, "Worker queue full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(pool = self.name, "Worker pool closed, dropping job");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn jobs_reach_the_handler() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let pool = WorkerPool::spawn("test", 2, 8, move |value: usize| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(value, Ordering::SeqCst);
            }
        });

        assert!(pool.submit(1));
        assert!(pool.submit(2));

        for _ in 0..50 {
            if seen.load(Ordering::SeqCst) == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn full_queue_drops_jobs() {
        let (release_tx, release_rx) = tokio::sync::watch::channel(false);
        let pool = WorkerPool::spawn("blocked", 1, 1, move |_: u8| {
            let mut release = release_rx.clone();
            async move {
                while !*release.borrow() {
                    if release.changed().await.is_err() {
                        break;
                    }
                }
            }
        });

        let mut accepted = 0;
        for job in 0..10u8 {
            if pool.submit(job) {
                accepted += 1;
            }
        }
        assert!(accepted < 10);
        let _ = release_tx.send(true);
    }
}
