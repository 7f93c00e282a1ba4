// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::SequencerError;
use crate::hash::Hash256;
use ethnum::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte account identifier. Wide enough to hold either an EVM address
/// (left-padded) or a Solana-family-L1 public key, so the two sides of the
/// bridge share one representation inside the kernel.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Identifies the asset a transaction moves. Mirrors `Address`'s width so
/// that a native asset, an ERC-20 token, or an SPL mint can all be named the
/// same way.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(pub [u8; 32]);

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", hex::encode(self.0))
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Funds move from the L1 watcher's observed deposit into bridge custody.
    Deposit,
    /// Funds move between two accounts already inside bridge custody.
    Transfer,
    /// Funds leave bridge custody, to be settled back out on L1.
    Withdrawal,
}

/// The outcome of applying a transaction to the state machine (§5's
/// `apply(state, tx)`). Rejections are not errors in the Rust sense: a
/// malformed or stale transaction is dropped from the batch and the state
/// machine proceeds, rather than aborting the whole batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TransactionOutcome {
    Applied { post_nonce: u64 },
    Rejected { reason: String },
}

/// A single bridge operation, identified by a hash of every field below
/// except the id and the producer's signature. Transactions are produced by
/// clients, ordered into batches by the queue, and applied to the state
/// machine in the order a batch lists them.
///
/// Invariants (checked by [`Transaction::validate`], not by construction,
/// since a transaction is deserialized off the wire before it can be
/// validated):
/// - `amount` is greater than zero.
/// - `expiry` is strictly after `submitted_at`.
/// - `signature` verifies against `sender` over the transaction's content
///   hash (verification itself is owned by `sequencer-signing`, which holds
///   the key material; this crate only defines the shape).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Hash256,
    pub sender: Address,
    pub recipient: Address,
    pub asset: AssetId,
    pub amount: U256,
    pub nonce: u64,
    pub kind: TransactionKind,
    pub submitted_at: u64,
    pub expiry: u64,
    pub fee: u64,
    pub memo: Option<String>,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

/// The subset of a transaction's fields that determine its identity. The id
/// is the SHA-256 of this struct's BCS encoding; the signature and the id
/// itself are deliberately excluded so that computing the id does not
/// require the signature to already exist.
#[derive(Serialize)]
struct TransactionContent<'a> {
    sender: &'a Address,
    recipient: &'a Address,
    asset: &'a AssetId,
    amount: &'a U256,
    nonce: u64,
    kind: &'a TransactionKind,
    submitted_at: u64,
    expiry: u64,
    fee: u64,
    memo: &'a Option<String>,
}

impl Transaction {
    /// Builds an unsigned transaction and derives its id. The caller attaches
    /// `signature` afterwards (it is produced over this id by
    /// `sequencer-signing`).
    #[allow(clippy::too_many_arguments)]
    pub fn new_unsigned(
        sender: Address,
        recipient: Address,
        asset: AssetId,
        amount: U256,
        nonce: u64,
        kind: TransactionKind,
        submitted_at: u64,
        expiry: u64,
        fee: u64,
        memo: Option<String>,
    ) -> Result<Self, SequencerError> {
        let content = TransactionContent {
            sender: &sender,
            recipient: &recipient,
            asset: &asset,
            amount: &amount,
            nonce,
            kind: &kind,
            submitted_at,
            expiry,
            fee,
            memo: &memo,
        };
        let id = Hash256::of(&content)?;
        Ok(Transaction {
            id,
            sender,
            recipient,
            asset,
            amount,
            nonce,
            kind,
            submitted_at,
            expiry,
            fee,
            memo,
            signature: Vec::new(),
        })
    }

    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = signature;
        self
    }

    /// Structural checks that do not require access to account state or key
    /// material: amount positivity and the expiry/submission ordering. The
    /// nonce-matches-account and signature-verifies invariants are checked by
    /// `sequencer-state` and `sequencer-signing` respectively, since they
    /// need context this crate does not have.
    pub fn validate(&self) -> Result<(), SequencerError> {
        if self.amount == U256::ZERO {
            return Err(SequencerError::ZeroAmount);
        }
        if self.expiry <= self.submitted_at {
            return Err(SequencerError::ExpiryNotAfterSubmission {
                submitted_at: self.submitted_at,
                expiry: self.expiry,
            });
        }
        Ok(())
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expiry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address([byte; 32])
    }

    fn asset(byte: u8) -> AssetId {
        AssetId([byte; 32])
    }

    fn sample() -> Transaction {
        Transaction::new_unsigned(
            addr(1),
            addr(2),
            asset(3),
            U256::from(100u64),
            0,
            TransactionKind::Transfer,
            1_000,
            2_000,
            1,
            None,
        )
        .unwrap()
    }

    #[test]
    fn id_is_deterministic_and_excludes_signature() {
        let a = sample();
        let b = sample().with_signature(vec![1, 2, 3]);
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn rejects_zero_amount() {
        let tx = Transaction::new_unsigned(
            addr(1),
            addr(2),
            asset(3),
            U256::ZERO,
            0,
            TransactionKind::Transfer,
            1_000,
            2_000,
            1,
            None,
        )
        .unwrap();
        assert!(matches!(tx.validate(), Err(SequencerError::ZeroAmount)));
    }

    #[test]
    fn rejects_expiry_not_after_submission() {
        let tx = Transaction::new_unsigned(
            addr(1),
            addr(2),
            asset(3),
            U256::from(1u64),
            0,
            TransactionKind::Transfer,
            2_000,
            2_000,
            1,
            None,
        )
        .unwrap();
        assert!(matches!(
            tx.validate(),
            Err(SequencerError::ExpiryNotAfterSubmission { .. })
        ));
    }

    #[test]
    fn bcs_round_trips() {
        let tx = sample().with_signature(vec![9; 64]);
        let bytes = bcs::to_bytes(&tx).unwrap();
        let decoded: Transaction = bcs::from_bytes(&bytes).unwrap();
        assert_eq!(tx.id, decoded.id);
        assert_eq!(tx.signature, decoded.signature);
    }
}
