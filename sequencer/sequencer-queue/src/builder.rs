// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::queue::PendingQueue;
use sequencer_state::{TransactionVerifier, WorldState};
use sequencer_types::{Batch, NodeId};

/// Assembles committed batches from the pending queue (§4.F). Dequeues up to
/// `max_transactions` entries, replays them against a scratch copy of the
/// current world state to derive the batch's post-state root, and leaves
/// the caller's real state untouched — consensus applies the batch for
/// real only once it is replicated and committed.
pub struct BatchBuilder {
    max_transactions: usize,
}

impl BatchBuilder {
    pub fn new(max_transactions: usize) -> Self {
        BatchBuilder { max_transactions }
    }

    /// Returns `None` if the queue had nothing to offer. A non-empty batch
    /// always includes every transaction it dequeued, even ones `apply`
    /// rejects: a rejection is still a deterministic outcome of applying
    /// the transaction, so it belongs in the batch's post-state derivation
    /// rather than being silently dropped.
    pub fn build(
        &self,
        queue: &mut PendingQueue,
        base_state: &WorldState,
        verifier: &dyn TransactionVerifier,
        sequencer_node: NodeId,
        now: u64,
        expiry: u64,
    ) -> Option<Batch> {
        let mut scratch = base_state.clone();
        let pre_root = scratch.state_root();

        let mut transactions = Vec::with_capacity(self.max_transactions);
        while transactions.len() < self.max_transactions {
            match queue.dequeue() {
                Some(entry) => {
                    scratch.apply(&entry.transaction, verifier, now);
                    transactions.push(entry.transaction);
                }
                None => break,
            }
        }

        if transactions.is_empty() {
            return None;
        }

        let post_root = scratch.state_root();
        Batch::new_unsigned(transactions, pre_root, post_root, sequencer_node, now, expiry).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::PendingQueue;
    use ethnum::U256;
    use sequencer_state::NoopVerifier;
    use sequencer_types::{Address, AssetId, Priority, QueueEntry, Transaction, TransactionKind};

    fn deposit(recipient: Address, nonce: u64) -> Transaction {
        Transaction::new_unsigned(
            recipient,
            recipient,
            AssetId([9; 32]),
            U256::from(10u64),
            nonce,
            TransactionKind::Deposit,
            0,
            1_000,
            0,
            None,
        )
        .unwrap()
    }

    #[test]
    fn empty_queue_produces_no_batch() {
        let mut queue = PendingQueue::new(10);
        let builder = BatchBuilder::new(4);
        let state = WorldState::new();
        let batch = builder.build(&mut queue, &state, &NoopVerifier, NodeId::new(), 1, 100);
        assert!(batch.is_none());
    }

    #[test]
    fn batch_caps_at_max_transactions() {
        let mut queue = PendingQueue::new(10);
        let alice = Address([1; 32]);
        for i in 0..5u64 {
            queue
                .enqueue(QueueEntry::new(deposit(alice, i), Priority::Normal, i))
                .unwrap();
        }
        let builder = BatchBuilder::new(3);
        let state = WorldState::new();
        let batch = builder
            .build(&mut queue, &state, &NoopVerifier, NodeId::new(), 1, 100)
            .unwrap();
        assert_eq!(batch.transactions.len(), 3);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn post_root_reflects_applied_transactions() {
        let mut queue = PendingQueue::new(10);
        let alice = Address([1; 32]);
        queue
            .enqueue(QueueEntry::new(deposit(alice, 0), Priority::Normal, 0))
            .unwrap();
        let builder = BatchBuilder::new(4);
        let state = WorldState::new();
        let batch = builder
            .build(&mut queue, &state, &NoopVerifier, NodeId::new(), 1, 100)
            .unwrap();

        let mut replay = state.clone();
        let outcomes = replay
            .apply_batch(&batch, &NoopVerifier, 1)
            .expect("batch should replay cleanly");
        assert_eq!(outcomes.len(), 1);
        assert_eq!(replay.state_root(), batch.post_state_root);
    }
}
