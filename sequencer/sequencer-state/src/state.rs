// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::verify::TransactionVerifier;
use sequencer_merkle::MerkleTree;
use sequencer_types::{
    AccountState, Address, Batch, Hash256, SequencerError, Transaction, TransactionKind,
    TransactionOutcome,
};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct AccountLeaf<'a> {
    address: &'a Address,
    account: &'a AccountState,
}

/// The full set of account balances the bridge tracks, plus the logic to
/// apply one transaction or one whole batch to it (§4.E). `apply` is pure:
/// given the same state and the same transaction it always produces the
/// same outcome and the same resulting state, which is what lets every
/// replica of the cluster reach the same `post_state_root` independently.
///
/// Owns the authenticated state index itself: every mutated account's leaf
/// is pushed into `tree` as part of applying the transaction that touched
/// it, so `state_root` is a cheap read rather than a full rebuild.
#[derive(Default, Clone)]
pub struct WorldState {
    accounts: BTreeMap<Address, AccountState>,
    tree: MerkleTree,
    leaf_index: BTreeMap<Address, usize>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, address: &Address) -> AccountState {
        self.accounts.get(address).cloned().unwrap_or_default()
    }

    /// The authenticated root over every account, as of the last applied
    /// mutation. A cheap read of the incrementally maintained tree.
    pub fn state_root(&self) -> Hash256 {
        self.tree.root()
    }

    /// Pushes `address`'s current state into the tree: a fresh leaf if this
    /// is the first time `address` has been touched, or an in-place update
    /// of its existing leaf otherwise.
    fn sync_leaf(&mut self, address: Address) {
        let account = self.account(&address);
        let leaf = AccountLeaf {
            address: &address,
            account: &account,
        };
        let hash = Hash256::of(&leaf).expect("account state always encodes");
        match self.leaf_index.get(&address) {
            Some(&index) => self
                .tree
                .update_leaf(index, hash)
                .expect("leaf_index only ever records indices the tree has allocated"),
            None => {
                let index = self.tree.add_leaf(hash);
                self.leaf_index.insert(address, index);
            }
        }
    }

    /// Applies one transaction. A structurally invalid, expired, replayed,
    /// or under-funded transaction is *rejected*, not an error: the state
    /// machine proceeds and the caller is told why so it can be dropped from
    /// the batch.
    pub fn apply(
        &mut self,
        tx: &Transaction,
        verifier: &dyn TransactionVerifier,
        now: u64,
    ) -> TransactionOutcome {
        if let Err(err) = tx.validate() {
            return TransactionOutcome::Rejected {
                reason: err.to_string(),
            };
        }
        if tx.is_expired_at(now) {
            return TransactionOutcome::Rejected {
                reason: "transaction expired".to_string(),
            };
        }
        if !verifier.verify(tx) {
            return TransactionOutcome::Rejected {
                reason: "signature does not verify".to_string(),
            };
        }

        let sender_nonce = self.account(&tx.sender).expected_nonce();
        if tx.nonce != sender_nonce {
            return TransactionOutcome::Rejected {
                reason: format!("expected nonce {}, got {}", sender_nonce, tx.nonce),
            };
        }

        let mut touched = vec![tx.sender];
        match tx.kind {
            TransactionKind::Deposit => {
                let recipient = self.accounts.entry(tx.recipient).or_default();
                recipient.credit(tx.asset, tx.amount, now);
                touched.push(tx.recipient);
            }
            TransactionKind::Transfer => {
                let sufficient = self.account(&tx.sender).balance_of(&tx.asset) >= tx.amount;
                if !sufficient {
                    return TransactionOutcome::Rejected {
                        reason: "insufficient balance".to_string(),
                    };
                }
                self.accounts
                    .entry(tx.sender)
                    .or_default()
                    .debit(tx.asset, tx.amount, now);
                self.accounts
                    .entry(tx.recipient)
                    .or_default()
                    .credit(tx.asset, tx.amount, now);
                touched.push(tx.recipient);
            }
            TransactionKind::Withdrawal => {
                let sufficient = self.account(&tx.sender).balance_of(&tx.asset) >= tx.amount;
                if !sufficient {
                    return TransactionOutcome::Rejected {
                        reason: "insufficient balance".to_string(),
                    };
                }
                self.accounts
                    .entry(tx.sender)
                    .or_default()
                    .debit(tx.asset, tx.amount, now);
            }
        }

        let sender = self.accounts.entry(tx.sender).or_default();
        sender.advance_nonce();
        let post_nonce = sender.nonce;

        touched.sort_unstable();
        touched.dedup();
        for address in touched {
            self.sync_leaf(address);
        }

        TransactionOutcome::Applied { post_nonce }
    }

    /// Applies every transaction in `batch` in order and checks the result
    /// against the batch's declared post-state root, per the batch
    /// invariant: "applying the listed transactions in order to the
    /// pre-state yields exactly the post-state".
    pub fn apply_batch(
        &mut self,
        batch: &Batch,
        verifier: &dyn TransactionVerifier,
        now: u64,
    ) -> Result<Vec<TransactionOutcome>, SequencerError> {
        let pre_root = self.state_root();
        if pre_root != batch.pre_state_root {
            return Err(SequencerError::StateRootMismatch {
                batch: batch.id.to_string(),
                pre_state: batch.pre_state_root.to_string(),
                post_state: batch.post_state_root.to_string(),
            });
        }

        let outcomes: Vec<_> = batch
            .transactions
            .iter()
            .map(|tx| self.apply(tx, verifier, now))
            .collect();

        let post_root = self.state_root();
        if post_root != batch.post_state_root {
            return Err(SequencerError::StateRootMismatch {
                batch: batch.id.to_string(),
                pre_state: pre_root.to_string(),
                post_state: post_root.to_string(),
            });
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::NoopVerifier;
    use ethnum::U256;
    use sequencer_types::{AssetId, NodeId};

    fn addr(byte: u8) -> Address {
        Address([byte; 32])
    }

    fn asset() -> AssetId {
        AssetId([9; 32])
    }

    fn deposit(recipient: Address, amount: u64, nonce: u64) -> Transaction {
        Transaction::new_unsigned(
            recipient,
            recipient,
            asset(),
            U256::from(amount),
            nonce,
            TransactionKind::Deposit,
            0,
            1_000,
            0,
            None,
        )
        .unwrap()
    }

    fn transfer(from: Address, to: Address, amount: u64, nonce: u64) -> Transaction {
        Transaction::new_unsigned(
            from,
            to,
            asset(),
            U256::from(amount),
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
    fn deposit_credits_recipient_and_advances_nonce() {
        let mut state = WorldState::new();
        let alice = addr(1);
        let outcome = state.apply(&deposit(alice, 100, 0), &NoopVerifier, 1);
        assert!(matches!(outcome, TransactionOutcome::Applied { post_nonce: 1 }));
        assert_eq!(state.account(&alice).balance_of(&asset()), U256::from(100u64));
    }

    #[test]
    fn transfer_moves_balance_between_accounts() {
        let mut state = WorldState::new();
        let alice = addr(1);
        let bob = addr(2);
        state.apply(&deposit(alice, 100, 0), &NoopVerifier, 1);
        let outcome = state.apply(&transfer(alice, bob, 40, 0), &NoopVerifier, 2);
        assert!(matches!(outcome, TransactionOutcome::Applied { .. }));
        assert_eq!(state.account(&alice).balance_of(&asset()), U256::from(60u64));
        assert_eq!(state.account(&bob).balance_of(&asset()), U256::from(40u64));
    }

    #[test]
    fn transfer_with_insufficient_balance_is_rejected_not_errored() {
        let mut state = WorldState::new();
        let alice = addr(1);
        let bob = addr(2);
        let outcome = state.apply(&transfer(alice, bob, 1, 0), &NoopVerifier, 1);
        assert!(matches!(outcome, TransactionOutcome::Rejected { .. }));
    }

    #[test]
    fn replayed_nonce_is_rejected() {
        let mut state = WorldState::new();
        let alice = addr(1);
        state.apply(&deposit(alice, 100, 0), &NoopVerifier, 1);
        let outcome = state.apply(&deposit(alice, 100, 0), &NoopVerifier, 2);
        assert!(matches!(outcome, TransactionOutcome::Rejected { .. }));
    }

    #[test]
    fn batch_with_mismatched_post_root_is_rejected() {
        let mut state = WorldState::new();
        let alice = addr(1);
        let pre_root = state.state_root();
        let batch = Batch::new_unsigned(
            vec![deposit(alice, 100, 0)],
            pre_root,
            Hash256::hash_bytes(b"wrong"),
            NodeId::new(),
            10,
            1_000,
        )
        .unwrap();
        let err = state.apply_batch(&batch, &NoopVerifier, 1).unwrap_err();
        assert!(matches!(err, SequencerError::StateRootMismatch { .. }));
    }

    #[test]
    fn batch_with_correct_post_root_commits() {
        let mut state = WorldState::new();
        let alice = addr(1);
        let pre_root = state.state_root();
        let tx = deposit(alice, 100, 0);

        let mut scratch = WorldState::new();
        scratch.apply(&tx, &NoopVerifier, 1);
        let post_root = scratch.state_root();

        let batch =
            Batch::new_unsigned(vec![tx], pre_root, post_root, NodeId::new(), 10, 1_000).unwrap();
        let outcomes = state.apply_batch(&batch, &NoopVerifier, 1).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(state.state_root(), post_root);
    }
}
