// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! A [`tokio::runtime::Handle`] wrapper that caps the number of spawned tasks
//! in flight at once, via a counting semaphore. Used to dispatch HSM calls and
//! Merkle proof verification off the serial path without letting either starve
//! it of threads (§5: "HSM calls ... are dispatched to a bounded worker pool").

use futures::future::Future;
use std::sync::Arc;
use tokio::{
    runtime::Handle,
    sync::{AcquireError, OwnedSemaphorePermit, Semaphore},
    task::JoinHandle,
};

#[derive(Clone)]
pub struct BoundedExecutor {
    semaphore: Arc<Semaphore>,
    executor: Handle,
}

impl BoundedExecutor {
    pub fn new(capacity: usize, executor: Handle) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            executor,
        }
    }

    /// Blocks until a slot is free, then spawns. Use when the caller must not
    /// proceed until the task is admitted (e.g. draining in-flight signs before
    /// a provider swap).
    pub async fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore is never closed");
        self.spawn_with_permit(future, permit)
    }

    /// Returns `None` without spawning if the pool is at capacity, instead of
    /// waiting. Use on paths that must not block the caller (ring-buffer
    /// consumers dispatching proof verification).
    pub fn try_spawn<F>(&self, future: F) -> Option<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        Some(self.spawn_with_permit(future, permit))
    }

    fn spawn_with_permit<F>(&self, future: F, permit: OwnedSemaphorePermit) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.executor.spawn(async move {
            let result = future.await;
            drop(permit);
            result
        })
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.semaphore.clone().acquire_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn caps_concurrency() {
        let executor = BoundedExecutor::new(2, Handle::current());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            handles.push(
                executor
                    .spawn(async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await,
            );
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn try_spawn_rejects_when_full() {
        let executor = BoundedExecutor::new(1, Handle::current());
        let _permit = executor.acquire().await.unwrap();
        assert!(executor.try_spawn(async {}).is_none());
    }
}
