// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::QueueError;
use aptos_metrics_core::{register_int_gauge, IntGauge};
use once_cell::sync::Lazy;
use sequencer_types::QueueEntry;
use std::collections::BinaryHeap;

static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge(
        "sequencer_queue_depth",
        "Transactions currently waiting in the pending queue",
    )
});

/// The pending transaction queue (§4.F). A bounded max-heap ordered by
/// [`sequencer_types::Priority`] then arrival order; `enqueue` refuses once
/// `capacity` is reached rather than growing unboundedly, so a burst of
/// submissions turns into backpressure on the submitter instead of
/// unbounded memory growth on the sequencer.
pub struct PendingQueue {
    heap: BinaryHeap<QueueEntry>,
    capacity: usize,
}

impl PendingQueue {
    pub fn new(capacity: usize) -> Self {
        PendingQueue {
            heap: BinaryHeap::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn enqueue(&mut self, entry: QueueEntry) -> Result<(), QueueError> {
        if self.heap.len() >= self.capacity {
            return Err(QueueError::Full {
                capacity: self.capacity,
            });
        }
        self.heap.push(entry);
        QUEUE_DEPTH.set(self.heap.len() as i64);
        Ok(())
    }

    pub fn dequeue(&mut self) -> Option<QueueEntry> {
        let entry = self.heap.pop();
        QUEUE_DEPTH.set(self.heap.len() as i64);
        entry
    }

    /// Drops every entry whose transaction has expired by `now`, so a
    /// submitter that goes silent cannot permanently occupy a queue slot.
    pub fn evict_expired(&mut self, now: u64) -> usize {
        let before = self.heap.len();
        let remaining: Vec<_> = self
            .heap
            .drain()
            .filter(|entry| !entry.transaction.is_expired_at(now))
            .collect();
        self.heap = BinaryHeap::from(remaining);
        QUEUE_DEPTH.set(self.heap.len() as i64);
        before - self.heap.len()
    }
}
