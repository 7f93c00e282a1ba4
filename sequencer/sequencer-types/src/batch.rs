// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::SequencerError;
use crate::hash::Hash256;
use crate::raft::NodeId;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// The unit the queue hands to consensus and consensus hands to the state
/// machine: an ordered list of transactions plus the state roots that
/// bracket it. A batch is only valid if replaying its transactions in order
/// against `pre_state_root` produces exactly `post_state_root`; the kernel
/// checks this with `sequencer-state` before a batch is allowed to commit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Batch {
    pub id: Hash256,
    pub transactions: Vec<Transaction>,
    pub pre_state_root: Hash256,
    pub post_state_root: Hash256,
    pub sequencer_node: NodeId,
    pub timestamp: u64,
    pub expiry: u64,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

#[derive(Serialize)]
struct BatchContent<'a> {
    transactions: &'a [Transaction],
    pre_state_root: &'a Hash256,
    post_state_root: &'a Hash256,
    sequencer_node: &'a NodeId,
    timestamp: u64,
    expiry: u64,
}

impl Batch {
    pub fn new_unsigned(
        transactions: Vec<Transaction>,
        pre_state_root: Hash256,
        post_state_root: Hash256,
        sequencer_node: NodeId,
        timestamp: u64,
        expiry: u64,
    ) -> Result<Self, SequencerError> {
        if transactions.is_empty() {
            return Err(SequencerError::EmptyBatch {
                batch: "<unassigned>".to_string(),
            });
        }
        let content = BatchContent {
            transactions: &transactions,
            pre_state_root: &pre_state_root,
            post_state_root: &post_state_root,
            sequencer_node: &sequencer_node,
            timestamp,
            expiry,
        };
        let id = Hash256::of(&content)?;
        Ok(Batch {
            id,
            transactions,
            pre_state_root,
            post_state_root,
            sequencer_node,
            timestamp,
            expiry,
            signature: Vec::new(),
        })
    }

    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = signature;
        self
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expiry
    }
}
