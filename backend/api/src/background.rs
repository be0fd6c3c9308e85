//! Fire-and-forget work that shutdown must wait for.
//!
//! Each spawned task bumps a shared in-flight counter. A panic inside a task
//! is logged, never propagated, and the counter is released either way.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    in_flight: AtomicUsize,
    idle: Notify,
}

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            if let Err(err) = tokio::spawn(task).await {
                if err.is_panic() {
                    tracing::error!(task = name, error = %err, "background task panicked");
                } else {
                    tracing::warn!(task = name, error = %err, "background task cancelled");
                }
            }

            if inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                inner.idle.notify_waiters();
            }
        });
    }

    /// Resolve once no task is in flight
    pub async fn wait(&self) {
        loop {
            let idle = self.inner.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            if self.in_flight() == 0 {
                return;
            }
            idle.await;
        }
    }
}
