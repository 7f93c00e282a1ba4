// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// A transaction's priority class inside the pending queue. Higher variants
/// are drained first; `sequencer-queue` breaks ties within a class by
/// arrival order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// A transaction sitting in the pending queue, along with the bookkeeping
/// the batch builder needs to enforce ordering and expiry without
/// re-deriving it from the transaction on every pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueEntry {
    pub transaction: Transaction,
    pub priority: Priority,
    pub enqueued_at: u64,
}

impl QueueEntry {
    pub fn new(transaction: Transaction, priority: Priority, enqueued_at: u64) -> Self {
        QueueEntry {
            transaction,
            priority,
            enqueued_at,
        }
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.transaction.id == other.transaction.id
    }
}
impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    /// Orders by priority first, then by earliest arrival, so this type can
    /// be dropped straight into a `BinaryHeap` to get a priority queue:
    /// `std::cmp::Reverse(entry)` yields the usual max-heap-as-min-heap
    /// idiom the batch builder relies on.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.enqueued_at.cmp(&self.enqueued_at))
    }
}
