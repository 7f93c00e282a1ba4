// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::messages::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    RequestVoteRequest, RequestVoteResponse,
};
use async_trait::async_trait;
use sequencer_types::NodeId;

/// How a Raft node reaches its peers. Implemented by `sequencer-adapters`
/// over the cluster's real RPC transport; consensus itself only depends on
/// this trait so it can be driven deterministically in tests.
#[async_trait]
pub trait RaftTransport: Send + Sync {
    async fn request_vote(
        &self,
        peer: NodeId,
        request: RequestVoteRequest,
    ) -> anyhow::Result<RequestVoteResponse>;

    async fn append_entries(
        &self,
        peer: NodeId,
        request: AppendEntriesRequest,
    ) -> anyhow::Result<AppendEntriesResponse>;

    async fn install_snapshot(
        &self,
        peer: NodeId,
        request: InstallSnapshotRequest,
    ) -> anyhow::Result<InstallSnapshotResponse>;
}
