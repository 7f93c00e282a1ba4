// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use dashmap::DashMap;
use sequencer_consensus::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    RaftTransport, RequestVoteRequest, RequestVoteResponse,
};
use sequencer_types::NodeId;
use std::sync::Arc;

/// One peer connection's RPC surface (§6's "Peer RPC": `RequestVote`,
/// `AppendEntries`, `InstallSnapshot`, transported length-prefixed over
/// mutual TLS). Left abstract here so the concrete connection type — a
/// `tonic` channel in production, an in-memory channel in tests — can vary
/// without touching `sequencer-consensus`.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn request_vote(&self, request: RequestVoteRequest) -> anyhow::Result<RequestVoteResponse>;
    async fn append_entries(&self, request: AppendEntriesRequest) -> anyhow::Result<AppendEntriesResponse>;
    async fn install_snapshot(&self, request: InstallSnapshotRequest) -> anyhow::Result<InstallSnapshotResponse>;
}

/// Implements [`RaftTransport`] by looking up the connection registered for
/// a peer and forwarding the call. `sequencer-consensus` already performs
/// its own per-call parallel fan-out and timeout (it deliberately does not
/// reuse the retry-until-all-acked semantics of `reliable-broadcast`, which
/// fit settlement fan-out, not Raft's majority-quorum progress model), so
/// this transport stays a single-call pass-through rather than adding a
/// second retry layer underneath it.
pub struct ClusterTransport {
    connections: DashMap<NodeId, Arc<dyn PeerConnection>>,
}

impl ClusterTransport {
    pub fn new() -> Self {
        ClusterTransport {
            connections: DashMap::new(),
        }
    }

    pub fn register(&self, peer: NodeId, connection: Arc<dyn PeerConnection>) {
        self.connections.insert(peer, connection);
    }

    fn connection(&self, peer: NodeId) -> anyhow::Result<Arc<dyn PeerConnection>> {
        self.connections
            .get(&peer)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("no connection registered for peer {}", peer.0))
    }
}

impl Default for ClusterTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RaftTransport for ClusterTransport {
    async fn request_vote(
        &self,
        peer: NodeId,
        request: RequestVoteRequest,
    ) -> anyhow::Result<RequestVoteResponse> {
        self.connection(peer)?.request_vote(request).await
    }

    async fn append_entries(
        &self,
        peer: NodeId,
        request: AppendEntriesRequest,
    ) -> anyhow::Result<AppendEntriesResponse> {
        self.connection(peer)?.append_entries(request).await
    }

    async fn install_snapshot(
        &self,
        peer: NodeId,
        request: InstallSnapshotRequest,
    ) -> anyhow::Result<InstallSnapshotResponse> {
        self.connection(peer)?.install_snapshot(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer_types::LogTerm;

    struct EchoConnection;

    #[async_trait]
    impl PeerConnection for EchoConnection {
        async fn request_vote(&self, request: RequestVoteRequest) -> anyhow::Result<RequestVoteResponse> {
            Ok(RequestVoteResponse {
                term: request.term,
                vote_granted: true,
            })
        }

        async fn append_entries(&self, request: AppendEntriesRequest) -> anyhow::Result<AppendEntriesResponse> {
            Ok(AppendEntriesResponse {
                term: request.term,
                success: true,
                match_index: request.prev_log_index + request.entries.len() as u64,
            })
        }

        async fn install_snapshot(&self, request: InstallSnapshotRequest) -> anyhow::Result<InstallSnapshotResponse> {
            Ok(InstallSnapshotResponse { term: request.term })
        }
    }

    #[tokio::test]
    async fn forwards_to_the_registered_peer_connection() {
        let transport = ClusterTransport::new();
        let peer = NodeId::new();
        transport.register(peer, Arc::new(EchoConnection));

        let resp = transport
            .request_vote(
                peer,
                RequestVoteRequest {
                    term: LogTerm(3),
                    candidate_id: NodeId::new(),
                    last_log_index: 0,
                    last_log_term: LogTerm(0),
                },
            )
            .await
            .unwrap();
        assert!(resp.vote_granted);
    }

    #[tokio::test]
    async fn unregistered_peer_is_an_error() {
        let transport = ClusterTransport::new();
        let err = transport
            .request_vote(
                NodeId::new(),
                RequestVoteRequest {
                    term: LogTerm(0),
                    candidate_id: NodeId::new(),
                    last_log_index: 0,
                    last_log_term: LogTerm(0),
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no connection registered"));
    }
}
