// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! The dispatch ring buffer (component G): a fixed-capacity, single-writer
//! slot array that hands transactions from the batch-building path to its
//! consumers in strict sequence order, the way a Disruptor ring decouples a
//! producer from consumers without an unbounded channel between them.

use aptos_metrics_core::{register_int_gauge, IntGauge};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use sequencer_types::{RingEntry, RingStatus, Transaction};
use std::sync::atomic::{AtomicU64, Ordering};

static RING_OCCUPANCY: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge(
        "sequencer_dispatch_ring_occupancy",
        "Slots in the dispatch ring buffer between claim and processed",
    )
});

/// A fixed-size ring of [`RingEntry`] slots. One producer claims and
/// publishes sequence numbers in order; one consumer drains them in the
/// same order. Claiming refuses once the producer has outrun the consumer
/// by a full `capacity`, which is the ring's only form of backpressure — it
/// never grows.
pub struct RingBuffer {
    slots: Vec<Mutex<RingEntry>>,
    capacity: u64,
    next_to_claim: AtomicU64,
    next_to_consume: AtomicU64,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "a ring buffer needs at least one slot");
        let slots = (0..capacity).map(|_| Mutex::new(RingEntry::empty())).collect();
        RingBuffer {
            slots,
            capacity: capacity as u64,
            next_to_claim: AtomicU64::new(1),
            next_to_consume: AtomicU64::new(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    fn slot_index(&self, sequence: u64) -> usize {
        ((sequence - 1) % self.capacity) as usize
    }

    /// Claims the next sequence number for the producer, or `None` if doing
    /// so would overwrite a slot the consumer has not yet processed.
    pub fn claim(&self) -> Option<u64> {
        let next = self.next_to_claim.load(Ordering::SeqCst);
        let consumed = self.next_to_consume.load(Ordering::SeqCst);
        if next - consumed >= self.capacity {
            return None;
        }
        let slot = &self.slots[self.slot_index(next)];
        slot.lock().claim(next);
        self.next_to_claim.store(next + 1, Ordering::SeqCst);
        RING_OCCUPANCY.set((next - consumed) as i64);
        Some(next)
    }

    /// Publishes a payload into a previously claimed slot, making it
    /// visible to the consumer.
    pub fn publish(&self, sequence: u64, payload: Transaction) {
        let slot = &self.slots[self.slot_index(sequence)];
        slot.lock().publish(payload);
    }

    /// Consumes the next slot in sequence if it is `Ready`, returning its
    /// sequence number and payload. Consumption is strictly in order: a
    /// slot published out of turn waits for every earlier slot to be
    /// consumed first.
    pub fn try_consume(&self) -> Option<(u64, Transaction)> {
        let next = self.next_to_consume.load(Ordering::SeqCst);
        let slot = &self.slots[self.slot_index(next)];
        let mut guard = slot.lock();
        if guard.status != RingStatus::Ready || guard.sequence != next {
            return None;
        }
        let payload = guard.payload.take().expect("ready slot always carries a payload");
        guard.mark_processed();
        drop(guard);

        self.next_to_consume.store(next + 1, Ordering::SeqCst);
        let claimed = self.next_to_claim.load(Ordering::SeqCst);
        RING_OCCUPANCY.set((claimed - (next + 1)) as i64);

        let slot = &self.slots[self.slot_index(next)];
        slot.lock().reset();

        Some((next, payload))
    }

    pub fn occupancy(&self) -> u64 {
        self.next_to_claim.load(Ordering::SeqCst) - self.next_to_consume.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethnum::U256;
    use sequencer_types::{Address, AssetId, TransactionKind};

    fn tx(nonce: u64) -> Transaction {
        Transaction::new_unsigned(
            Address([1; 32]),
            Address([2; 32]),
            AssetId([3; 32]),
            U256::from(1u64),
            nonce,
            TransactionKind::Transfer,
            0,
            1_000,
            0,
            None,
        )
        .unwrap()
    }

    #[test]
    fn claim_publish_consume_round_trip() {
        let ring = RingBuffer::new(4);
        let seq = ring.claim().unwrap();
        ring.publish(seq, tx(0));
        let (consumed_seq, payload) = ring.try_consume().unwrap();
        assert_eq!(consumed_seq, seq);
        assert_eq!(payload.nonce, 0);
    }

    #[test]
    fn consume_waits_for_strict_order() {
        let ring = RingBuffer::new(4);
        let first = ring.claim().unwrap();
        let second = ring.claim().unwrap();
        // Publish out of order: second slot is ready before first.
        ring.publish(second, tx(1));
        assert!(ring.try_consume().is_none());
        ring.publish(first, tx(0));
        let (seq, _) = ring.try_consume().unwrap();
        assert_eq!(seq, first);
        let (seq, _) = ring.try_consume().unwrap();
        assert_eq!(seq, second);
    }

    #[test]
    fn claim_refuses_once_producer_laps_consumer() {
        let ring = RingBuffer::new(2);
        let a = ring.claim().unwrap();
        let b = ring.claim().unwrap();
        assert!(ring.claim().is_none());

        ring.publish(a, tx(0));
        ring.try_consume().unwrap();
        let c = ring.claim().unwrap();
        ring.publish(b, tx(1));
        ring.try_consume().unwrap();
        ring.publish(c, tx(2));
        ring.try_consume().unwrap();
    }

    #[test]
    fn slot_is_reusable_after_processing() {
        let ring = RingBuffer::new(1);
        let a = ring.claim().unwrap();
        ring.publish(a, tx(0));
        ring.try_consume().unwrap();
        let b = ring.claim().unwrap();
        assert_ne!(a, b);
    }
}
