// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Raft consensus over the sequencer's replicated log (component D):
//! leader election, log replication, snapshotting, and the durable record
//! of term and vote a node needs to survive a restart without violating
//! Raft's safety properties.

mod log;
mod messages;
mod node;
mod persistence;
mod transport;

pub use log::ReplicatedLog;
pub use messages::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    RequestVoteRequest, RequestVoteResponse,
};
pub use node::RaftNode;
pub use persistence::{FileRaftStore, NoopRaftStore, RaftStore};
pub use transport::RaftTransport;
