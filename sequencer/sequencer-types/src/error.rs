// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::raft::NodeId;
use thiserror::Error;

/// Errors raised while constructing or validating the wire types. Kept
/// separate from the operational error taxonomy of the components that use
/// these types (consensus, state machine, ...); this enum only ever reports
/// malformed or invariant-violating data.
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("transaction amount must be greater than zero")]
    ZeroAmount,

    #[error("transaction expiry {expiry} is not after submission time {submitted_at}")]
    ExpiryNotAfterSubmission { submitted_at: u64, expiry: u64 },

    #[error("nonce {given} is not the next unused nonce {expected} for this account")]
    NonceMismatch { expected: u64, given: u64 },

    #[error("batch {batch} is empty")]
    EmptyBatch { batch: String },

    #[error("applying batch {batch} to pre-state root {pre_state} did not yield the declared post-state root {post_state}")]
    StateRootMismatch {
        batch: String,
        pre_state: String,
        post_state: String,
    },

    #[error("signature does not verify for {context}")]
    InvalidSignature { context: String },

    #[error("log entry at index {index} has term {given} lower than the previous entry's term {previous}")]
    NonMonotonicTerm {
        index: u64,
        previous: u64,
        given: u64,
    },

    #[error("key {key} is {status} and cannot be used to sign")]
    KeyNotActive { key: String, status: String },

    #[error("node {0} is not a recognized member of the cluster")]
    UnknownNode(NodeId),

    #[error("canonical encoding failed: {0}")]
    Encoding(#[from] bcs::Error),
}
