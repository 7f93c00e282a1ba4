// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! The wire and state types shared by every sequencer kernel component
//! (§3 of the design: Transaction, Batch, LogEntry, RaftState, AccountState,
//! MerkleNode/MerkleProof, KeyHandle, QueueEntry, RingEntry). Kept dependency-free
//! of any single component so the replicated log, the state machine, and the
//! Merkle index can all speak the same vocabulary without depending on each
//! other.

pub mod account;
pub mod batch;
pub mod error;
pub mod hash;
pub mod keys;
pub mod log_entry;
pub mod merkle;
pub mod queue_entry;
pub mod raft;
pub mod ring_entry;
pub mod transaction;

pub use account::AccountState;
pub use batch::Batch;
pub use error::SequencerError;
pub use hash::Hash256;
pub use keys::{KeyHandle, KeyStatus, SigningAlgorithm};
pub use log_entry::{ConfigChange, LogEntry, LogPayload};
pub use merkle::{MerkleNode, MerkleProof};
pub use queue_entry::{Priority, QueueEntry};
pub use raft::{LogTerm, NodeId, RaftRole, RaftState, SnapshotMeta};
pub use ring_entry::{RingEntry, RingStatus};
pub use transaction::{Address, AssetId, Transaction, TransactionKind, TransactionOutcome};
