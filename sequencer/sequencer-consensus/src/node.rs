// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::log::ReplicatedLog;
use crate::messages::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    RequestVoteRequest, RequestVoteResponse,
};
use crate::persistence::RaftStore;
use crate::transport::RaftTransport;
use aptos_metrics_core::{register_int_counter, IntCounter};
use once_cell::sync::Lazy;
use sequencer_clock::Clock;
use sequencer_types::{Hash256, LogEntry, LogPayload, LogTerm, NodeId, RaftRole, RaftState, SnapshotMeta};
use std::sync::Arc;
use std::time::Duration;

static ELECTIONS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter(
        "sequencer_consensus_elections_started_total",
        "Leader elections this node has started",
    )
});

static ELECTIONS_WON: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter(
        "sequencer_consensus_elections_won_total",
        "Leader elections this node has won",
    )
});

/// A Raft participant. Owns its term/log/role state and the peer set it
/// replicates against, but holds no opinion on how those peers are reached
/// (`RaftTransport`) or when elections should be attempted (callers drive
/// `start_election`/`replicate_once` from their own timer loop, so they can
/// inject jittered timeouts and test with a mock clock).
pub struct RaftNode<T: RaftTransport> {
    pub id: NodeId,
    pub peers: Vec<NodeId>,
    pub state: RaftState,
    pub log: ReplicatedLog,
    transport: Arc<T>,
    store: Arc<dyn RaftStore>,
    clock: Clock,
    per_rpc_timeout: Duration,
}

impl<T: RaftTransport> RaftNode<T> {
    pub fn new(id: NodeId, peers: Vec<NodeId>, transport: Arc<T>, clock: Clock, store: Arc<dyn RaftStore>) -> Self {
        RaftNode {
            id,
            peers,
            state: RaftState::new_follower(),
            log: ReplicatedLog::new(),
            transport,
            store,
            clock,
            per_rpc_timeout: Duration::from_millis(500),
        }
    }

    /// Restores `state` and `log` from the store, for a node that is
    /// starting up after a restart rather than joining fresh. Leaves both
    /// untouched (and returns `Ok(())`) if nothing has been persisted yet.
    pub fn hydrate_from_store(&mut self) -> std::io::Result<()> {
        if let Some(saved) = self.store.load_state()? {
            self.state = saved;
        }
        for entry in self.store.load_log()? {
            self.log.append(entry);
        }
        Ok(())
    }

    fn persist_state(&self) {
        if let Err(err) = self.store.save_state(&self.state) {
            aptos_logger::error!(error = %err, "failed to durably persist raft state before responding to rpc");
        }
    }

    pub fn quorum_size(&self) -> usize {
        (self.peers.len() + 1) / 2 + 1
    }

    pub fn is_leader(&self) -> bool {
        self.state.role == RaftRole::Leader
    }

    /// Follower-side handler for an incoming `RequestVote`. Grants the vote
    /// only if the candidate's term is current or newer, this node hasn't
    /// already voted for someone else this term, and the candidate's log is
    /// at least as up to date as this node's own log — the two safety
    /// conditions the Raft paper requires before granting a vote.
    pub fn handle_request_vote(&mut self, req: RequestVoteRequest) -> RequestVoteResponse {
        if req.term < self.state.current_term {
            return RequestVoteResponse {
                term: self.state.current_term,
                vote_granted: false,
            };
        }

        let mut dirty = false;
        if req.term > self.state.current_term {
            self.state.step_down(req.term);
            dirty = true;
        }

        let can_vote = self.state.voted_for.is_none() || self.state.voted_for == Some(req.candidate_id);
        let log_ok = self
            .log
            .is_at_least_as_up_to_date_as(req.last_log_term, req.last_log_index);
        let vote_granted = can_vote && log_ok;

        if vote_granted {
            self.state.voted_for = Some(req.candidate_id);
            dirty = true;
        }

        // `current_term`/`voted_for` must be durable before this vote is
        // communicated, or a crash right after responding could let this
        // node vote again in the same term after restart.
        if dirty {
            self.persist_state();
        }

        RequestVoteResponse {
            term: self.state.current_term,
            vote_granted,
        }
    }

    /// Follower-side handler for an incoming `AppendEntries` (also serves as
    /// the heartbeat when `entries` is empty).
    pub fn handle_append_entries(&mut self, req: AppendEntriesRequest) -> AppendEntriesResponse {
        if req.term < self.state.current_term {
            return AppendEntriesResponse {
                term: self.state.current_term,
                success: false,
                match_index: self.log.last_index(),
            };
        }

        let mut dirty = false;
        if req.term > self.state.current_term {
            self.state.step_down(req.term);
            dirty = true;
        } else if self.state.role != RaftRole::Follower {
            self.state.role = RaftRole::Follower;
        }

        let prev_ok = self.log.term_at(req.prev_log_index) == Some(req.prev_log_term);
        if !prev_ok {
            if dirty {
                self.persist_state();
            }
            return AppendEntriesResponse {
                term: self.state.current_term,
                success: false,
                match_index: self.log.last_index(),
            };
        }

        if !req.entries.is_empty() {
            if let Err(err) = self.store.truncate_log_after(req.prev_log_index) {
                aptos_logger::error!(error = %err, "failed to truncate persisted log before applying leader's entries");
            }
            if let Err(err) = self.store.append_log_entries(&req.entries) {
                aptos_logger::error!(error = %err, "failed to durably persist replicated log entries before responding to rpc");
            }
        }
        self.log.append_from_leader(&req.entries);

        if req.leader_commit > self.state.commit_index {
            self.state.commit_index = req.leader_commit.min(self.log.last_index());
            dirty = true;
        }

        if dirty {
            self.persist_state();
        }

        AppendEntriesResponse {
            term: self.state.current_term,
            success: true,
            match_index: self.log.last_index(),
        }
    }

    /// Follower-side handler for `InstallSnapshot`: adopts the leader's
    /// snapshot boundary and discards any log entry it already covers. Only
    /// ever sent to a follower whose `next_index` has fallen behind the
    /// leader's compaction point, so there is no conflicting suffix to
    /// reconcile the way `AppendEntries` must.
    pub fn handle_install_snapshot(&mut self, req: InstallSnapshotRequest) -> InstallSnapshotResponse {
        if req.term < self.state.current_term {
            return InstallSnapshotResponse {
                term: self.state.current_term,
            };
        }
        if req.term > self.state.current_term {
            self.state.step_down(req.term);
        } else if self.state.role != RaftRole::Follower {
            self.state.role = RaftRole::Follower;
        }

        if req.done {
            let state_root = <[u8; 32]>::try_from(req.data.as_slice())
                .map(Hash256::from_bytes)
                .unwrap_or(Hash256::ZERO);
            let meta = SnapshotMeta {
                last_included_index: req.last_included_index,
                last_included_term: req.last_included_term,
                state_root,
            };
            if let Err(err) = self.store.save_snapshot(&meta, &req.data) {
                aptos_logger::error!(error = %err, "failed to durably persist installed snapshot");
            }
            self.state.snapshot = Some(meta);
            self.log.compact(req.last_included_index);
            if req.last_included_index > self.state.commit_index {
                self.state.commit_index = req.last_included_index;
            }
            if req.last_included_index > self.state.last_applied {
                self.state.last_applied = req.last_included_index;
            }
        }

        self.persist_state();
        InstallSnapshotResponse {
            term: self.state.current_term,
        }
    }

    /// Converts this node to a candidate, fans out `RequestVote` to every
    /// peer in parallel, and becomes leader if a majority (including its own
    /// vote) grants it within `per_rpc_timeout`. Leaves the node a follower
    /// of a newer term if any response reveals one, per the Raft rule that a
    /// server always defers to a higher term it observes.
    pub async fn start_election(&mut self) -> bool {
        ELECTIONS_STARTED.inc();
        self.state.become_candidate(self.id);
        let term = self.state.current_term;

        let request = RequestVoteRequest {
            term,
            candidate_id: self.id,
            last_log_index: self.log.last_index(),
            last_log_term: self.log.last_term(),
        };

        let futures = self.peers.iter().map(|peer| {
            let transport = self.transport.clone();
            let peer = *peer;
            let request = request.clone();
            let timeout = self.per_rpc_timeout;
            async move { tokio::time::timeout(timeout, transport.request_vote(peer, request)).await }
        });
        let responses = futures::future::join_all(futures).await;

        let mut votes = 1; // vote for self
        let mut highest_term = term;
        for response in responses.into_iter().flatten().flatten() {
            if response.term > highest_term {
                highest_term = response.term;
            }
            if response.vote_granted {
                votes += 1;
            }
        }

        if highest_term > term {
            self.state.step_down(highest_term);
            return false;
        }

        if self.state.role != RaftRole::Candidate || self.state.current_term != term {
            // Stepped down or term moved on while votes were in flight.
            return false;
        }

        if votes >= self.quorum_size() {
            self.state.become_leader(&self.peers, self.log.last_index() + 1);
            ELECTIONS_WON.inc();
            true
        } else {
            false
        }
    }

    /// Leader-side replication pass: sends each peer the entries it is
    /// missing (per that peer's `next_index`), updates `match_index`/
    /// `next_index` from the responses, and advances `commit_index` to the
    /// highest index replicated on a majority, restricted to entries from
    /// the current term (the Raft safety rule against committing a prior
    /// leader's uncommitted entries via count alone).
    pub async fn replicate_once(&mut self) {
        if !self.is_leader() {
            return;
        }
        let term = self.state.current_term;
        let leader_commit = self.state.commit_index;
        let snapshot = self.state.snapshot.clone();

        let mut append_futures = Vec::with_capacity(self.peers.len());
        let mut snapshot_futures = Vec::new();
        for peer in self.peers.clone() {
            let next_index = *self.state.next_index.get(&peer).unwrap_or(&(self.log.last_index() + 1));

            // A peer this far behind can no longer be caught up from the
            // log alone; the entries it needs were already compacted away.
            if let Some(snapshot) = &snapshot {
                if next_index <= snapshot.last_included_index {
                    let request = InstallSnapshotRequest {
                        term,
                        leader_id: self.id,
                        last_included_index: snapshot.last_included_index,
                        last_included_term: snapshot.last_included_term,
                        offset: 0,
                        data: snapshot.state_root.as_bytes().to_vec(),
                        done: true,
                    };
                    let transport = self.transport.clone();
                    let timeout = self.per_rpc_timeout;
                    snapshot_futures.push(async move {
                        let result = tokio::time::timeout(timeout, transport.install_snapshot(peer, request)).await;
                        (peer, snapshot.last_included_index, result)
                    });
                    continue;
                }
            }

            let prev_log_index = next_index.saturating_sub(1);
            let prev_log_term = self.log.term_at(prev_log_index).unwrap_or(LogTerm::ZERO);
            let entries = self.log.entries_from(next_index);
            let request = AppendEntriesRequest {
                term,
                leader_id: self.id,
                prev_log_index,
                prev_log_term,
                entries,
                leader_commit,
            };
            let transport = self.transport.clone();
            let timeout = self.per_rpc_timeout;
            append_futures.push(async move {
                let result = tokio::time::timeout(timeout, transport.append_entries(peer, request)).await;
                (peer, result)
            });
        }

        let mut highest_term = term;

        let snapshot_results = futures::future::join_all(snapshot_futures).await;
        for (peer, last_included_index, result) in snapshot_results {
            let Ok(Ok(response)) = result else { continue };
            if response.term > highest_term {
                highest_term = response.term;
            }
            self.state.match_index.insert(peer, last_included_index);
            self.state.next_index.insert(peer, last_included_index + 1);
        }

        let results = futures::future::join_all(append_futures).await;
        for (peer, result) in results {
            let Ok(Ok(response)) = result else { continue };
            if response.term > highest_term {
                highest_term = response.term;
            }
            if response.success {
                self.state.match_index.insert(peer, response.match_index);
                self.state.next_index.insert(peer, response.match_index + 1);
            } else {
                let retry_from = self
                    .state
                    .next_index
                    .get(&peer)
                    .copied()
                    .unwrap_or(1)
                    .saturating_sub(1)
                    .max(1);
                self.state.next_index.insert(peer, retry_from);
            }
        }

        if highest_term > term {
            self.state.step_down(highest_term);
            self.persist_state();
            return;
        }
        if !self.is_leader() {
            return;
        }

        self.advance_commit_index();
    }

    fn advance_commit_index(&mut self) {
        let mut candidate_indices: Vec<u64> = self.state.match_index.values().copied().collect();
        candidate_indices.push(self.log.last_index());
        candidate_indices.sort_unstable();
        candidate_indices.reverse();

        if let Some(&majority_index) = candidate_indices.get(self.quorum_size() - 1) {
            if majority_index > self.state.commit_index
                && self.log.term_at(majority_index) == Some(self.state.current_term)
            {
                self.state.commit_index = majority_index;
            }
        }
    }

    /// Leader-only: appends `payload` to the local log at the next index
    /// under the current term. Replication and commit advancement happen on
    /// subsequent `replicate_once` calls; callers poll `state.commit_index`
    /// to learn when it has been durably committed.
    pub fn propose(&mut self, payload: LogPayload) -> Option<u64> {
        if !self.is_leader() {
            return None;
        }
        let index = self.log.last_index() + 1;
        self.log
            .append(LogEntry::new(self.state.current_term, index, payload, self.id));
        Some(index)
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Folds every committed entry up to `up_to_index` into a snapshot of
    /// `state_root`, then compacts the log. Only ever called on entries that
    /// are already known to be committed; compacting an uncommitted entry
    /// would let a later leader's conflicting entry silently disappear.
    pub fn take_snapshot(&mut self, up_to_index: u64, state_root: Hash256) {
        if up_to_index > self.state.commit_index {
            return;
        }
        let Some(last_included_term) = self.log.term_at(up_to_index) else {
            return;
        };
        let meta = SnapshotMeta {
            last_included_index: up_to_index,
            last_included_term,
            state_root,
        };
        if let Err(err) = self.store.save_snapshot(&meta, state_root.as_bytes()) {
            aptos_logger::error!(error = %err, "failed to durably persist snapshot");
        }
        self.state.snapshot = Some(meta);
        self.log.compact(up_to_index);
    }
}
