// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use sequencer_types::{LogEntry, LogTerm, NodeId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestVoteRequest {
    pub term: LogTerm,
    pub candidate_id: NodeId,
    pub last_log_index: u64,
    pub last_log_term: LogTerm,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestVoteResponse {
    pub term: LogTerm,
    pub vote_granted: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppendEntriesRequest {
    pub term: LogTerm,
    pub leader_id: NodeId,
    pub prev_log_index: u64,
    pub prev_log_term: LogTerm,
    pub entries: Vec<LogEntry>,
    pub leader_commit: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppendEntriesResponse {
    pub term: LogTerm,
    pub success: bool,
    /// The highest index the follower holds after applying this request,
    /// whether or not it matches the leader's log. Lets the leader recover
    /// a lagging follower's `next_index` in fewer round trips than
    /// decrementing by one each time.
    pub match_index: u64,
}

/// Sent by a leader to a follower whose `next_index` has fallen behind the
/// leader's own log-compaction point, so the follower can no longer be
/// caught up with `AppendEntries` alone. `offset`/`done` preserve the
/// chunked-transfer shape of the Raft paper's RPC even though this
/// sequencer's snapshot payload (a single state root) always fits in one
/// chunk, so `offset` is always 0 and `done` is always true in practice.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstallSnapshotRequest {
    pub term: LogTerm,
    pub leader_id: NodeId,
    pub last_included_index: u64,
    pub last_included_term: LogTerm,
    pub offset: u64,
    pub data: Vec<u8>,
    pub done: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstallSnapshotResponse {
    pub term: LogTerm,
}
