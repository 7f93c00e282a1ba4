// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// The state of one slot in the dispatch ring buffer (§4.G). A slot cycles
/// `Empty -> Claimed -> Ready -> Processed -> Empty` as the producer claims
/// it, fills it, and the consumer(s) drain it; the cycle matters because the
/// ring reuses slots rather than allocating per entry.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum RingStatus {
    Empty,
    Claimed,
    Ready,
    Processed,
}

/// One slot in the ring buffer. `sequence` is the monotonically increasing
/// position this slot was last claimed at, used to detect a consumer that
/// has fallen behind the producer by more than the ring's capacity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RingEntry {
    pub sequence: u64,
    pub status: RingStatus,
    pub payload: Option<Transaction>,
}

impl RingEntry {
    pub fn empty() -> Self {
        RingEntry {
            sequence: 0,
            status: RingStatus::Empty,
            payload: None,
        }
    }

    pub fn claim(&mut self, sequence: u64) {
        self.sequence = sequence;
        self.status = RingStatus::Claimed;
        self.payload = None;
    }

    pub fn publish(&mut self, payload: Transaction) {
        self.payload = Some(payload);
        self.status = RingStatus::Ready;
    }

    pub fn mark_processed(&mut self) {
        self.status = RingStatus::Processed;
    }

    pub fn reset(&mut self) {
        self.status = RingStatus::Empty;
        self.payload = None;
    }
}

impl Default for RingEntry {
    fn default() -> Self {
        Self::empty()
    }
}
