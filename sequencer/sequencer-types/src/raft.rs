// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::hash::Hash256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A cluster member's stable identity. Assigned once at enrollment and never
/// reused, so log entries and vote records stay meaningful across a node's
/// restarts or replacements.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        NodeId(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Raft term number. Monotonically increasing; never decreases for the
/// lifetime of a node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct LogTerm(pub u64);

impl LogTerm {
    pub const ZERO: LogTerm = LogTerm(0);

    pub fn next(self) -> LogTerm {
        LogTerm(self.0 + 1)
    }
}

impl fmt::Display for LogTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum RaftRole {
    Follower,
    Candidate,
    Leader,
}

/// Metadata for the most recent snapshot a node has taken, used to truncate
/// the replicated log and to catch up a peer that has fallen too far behind
/// to be served individual entries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub last_included_index: u64,
    pub last_included_term: LogTerm,
    pub state_root: Hash256,
}

/// The durable and volatile state a Raft participant tracks for itself, per
/// the standard decomposition: persistent state that must survive a restart
/// (`current_term`, `voted_for`), volatile state tracked by every node
/// (`commit_index`, `last_applied`), and volatile state tracked only by the
/// leader (`next_index`, `match_index`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RaftState {
    pub current_term: LogTerm,
    pub voted_for: Option<NodeId>,
    pub role: RaftRole,
    pub commit_index: u64,
    pub last_applied: u64,
    pub next_index: BTreeMap<NodeId, u64>,
    pub match_index: BTreeMap<NodeId, u64>,
    pub snapshot: Option<SnapshotMeta>,
}

impl RaftState {
    /// The state a node starts in the first time it ever joins a cluster:
    /// no term has elapsed, no vote has been cast, and it has not applied
    /// anything.
    pub fn new_follower() -> Self {
        RaftState {
            current_term: LogTerm::ZERO,
            voted_for: None,
            role: RaftRole::Follower,
            commit_index: 0,
            last_applied: 0,
            next_index: BTreeMap::new(),
            match_index: BTreeMap::new(),
            snapshot: None,
        }
    }

    pub fn become_candidate(&mut self, self_id: NodeId) {
        self.current_term = self.current_term.next();
        self.voted_for = Some(self_id);
        self.role = RaftRole::Candidate;
    }

    pub fn become_leader(&mut self, peers: &[NodeId], next_log_index: u64) {
        self.role = RaftRole::Leader;
        self.next_index.clear();
        self.match_index.clear();
        for peer in peers {
            self.next_index.insert(*peer, next_log_index);
            self.match_index.insert(*peer, 0);
        }
    }

    pub fn step_down(&mut self, new_term: LogTerm) {
        debug_assert!(new_term >= self.current_term);
        self.current_term = new_term;
        self.role = RaftRole::Follower;
        self.voted_for = None;
    }
}
