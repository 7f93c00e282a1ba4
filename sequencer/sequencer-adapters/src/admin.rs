// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::{AdapterError, ErrorKind};
use aptos_infallible::Mutex;
use async_trait::async_trait;
use dashmap::DashMap;
use sequencer_clock::Clock;
use sequencer_consensus::{RaftNode, RaftTransport};
use sequencer_merkle::MerkleTree;
use sequencer_queue::PendingQueue;
use sequencer_recovery::RecoverySupervisor;
use sequencer_resilience::{DegradationController, DegradationLevel};
use sequencer_signing::SigningKernel;
use sequencer_types::{
    Batch, Hash256, MerkleProof, NodeId, Priority, QueueEntry, RaftRole, SigningAlgorithm,
    Transaction,
};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// The collaborator-facing admin surface (§6): `submit_transaction`,
/// `get_batch`, `get_proof`, `get_status`, `force_rotate_key`,
/// `trigger_recovery`. The HTTP gateway that actually terminates client
/// connections sits outside this crate; this trait is what it calls into.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn submit_transaction(
        &self,
        idempotency_key: String,
        tx: Transaction,
    ) -> Result<Hash256, AdapterError>;
    fn get_batch(&self, id: &Hash256) -> Option<Batch>;
    fn get_proof(&self, leaf_index: usize) -> Option<MerkleProof>;
    async fn get_status(&self) -> AdminStatus;
    async fn force_rotate_key(&self) -> Result<Hash256, AdapterError>;
    async fn trigger_recovery(&self) -> Result<Vec<(String, String)>, AdapterError>;
}

#[derive(Clone, Debug)]
pub struct AdminStatus {
    pub role: RaftRole,
    pub commit_index: u64,
    pub degradation: DegradationLevel,
    pub queue_depth: usize,
    pub queue_capacity: usize,
}

/// Records a committed batch so `get_batch` can answer by id without
/// replaying the log.
pub struct BatchStore {
    batches: DashMap<Hash256, Batch>,
}

impl BatchStore {
    pub fn new() -> Self {
        BatchStore {
            batches: DashMap::new(),
        }
    }

    pub fn record(&self, batch: Batch) {
        self.batches.insert(batch.id, batch);
    }

    pub fn get(&self, id: &Hash256) -> Option<Batch> {
        self.batches.get(id).map(|entry| entry.value().clone())
    }
}

impl Default for BatchStore {
    fn default() -> Self {
        Self::new()
    }
}

/// The in-process implementation of [`AdminApi`], wiring the admin surface
/// straight to the live queue, consensus node, signing kernel, recovery
/// supervisor, and Merkle index it fronts. Write operations are deduplicated
/// by client-supplied idempotency key (§7): a duplicate key returns the
/// cached transaction id instead of re-enqueuing.
pub struct InProcessAdmin<T: RaftTransport> {
    queue: Arc<Mutex<PendingQueue>>,
    merkle: Arc<Mutex<MerkleTree>>,
    batches: Arc<BatchStore>,
    raft: Arc<AsyncMutex<RaftNode<T>>>,
    signing: Arc<SigningKernel>,
    recovery: Arc<RecoverySupervisor>,
    degradation: Arc<DegradationController>,
    clock: Clock,
    idempotency: DashMap<String, Hash256>,
    rotation_overlap_ms: u64,
}

impl<T: RaftTransport> InProcessAdmin<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<Mutex<PendingQueue>>,
        merkle: Arc<Mutex<MerkleTree>>,
        batches: Arc<BatchStore>,
        raft: Arc<AsyncMutex<RaftNode<T>>>,
        signing: Arc<SigningKernel>,
        recovery: Arc<RecoverySupervisor>,
        degradation: Arc<DegradationController>,
        clock: Clock,
        rotation_overlap_ms: u64,
    ) -> Self {
        InProcessAdmin {
            queue,
            merkle,
            batches,
            raft,
            signing,
            recovery,
            degradation,
            clock,
            idempotency: DashMap::new(),
            rotation_overlap_ms,
        }
    }

    fn leader_hint(&self) -> Option<NodeId> {
        // The node does not track which peer most recently claimed
        // leadership; a follower can only report that it is not the one.
        None
    }
}

#[async_trait]
impl<T: RaftTransport + Send + Sync + 'static> AdminApi for InProcessAdmin<T> {
    async fn submit_transaction(
        &self,
        idempotency_key: String,
        tx: Transaction,
    ) -> Result<Hash256, AdapterError> {
        if let Some(cached) = self.idempotency.get(&idempotency_key) {
            return Ok(*cached.value());
        }

        tx.validate()
            .map_err(|err| AdapterError::validation(err.to_string()))?;

        {
            let raft = self.raft.lock().await;
            if !raft.is_leader() {
                return Err(AdapterError::not_leader(self.leader_hint()));
            }
        }

        let id = tx.id;
        let now = self.clock.now_unix_millis();
        let entry = QueueEntry::new(tx, Priority::Normal, now);
        self.queue
            .lock()
            .enqueue(entry)
            .map_err(|err| AdapterError::backpressure(err.to_string()))?;

        self.idempotency.insert(idempotency_key, id);
        Ok(id)
    }

    fn get_batch(&self, id: &Hash256) -> Option<Batch> {
        self.batches.get(id)
    }

    fn get_proof(&self, leaf_index: usize) -> Option<MerkleProof> {
        self.merkle.lock().prove(leaf_index)
    }

    async fn get_status(&self) -> AdminStatus {
        let raft = self.raft.lock().await;
        let queue = self.queue.lock();
        AdminStatus {
            role: raft.state.role,
            commit_index: raft.state.commit_index,
            degradation: self.degradation.level(),
            queue_depth: queue.len(),
            queue_capacity: queue.capacity(),
        }
    }

    async fn force_rotate_key(&self) -> Result<Hash256, AdapterError> {
        let handle = self
            .signing
            .rotate_key(SigningAlgorithm::Ed25519, self.rotation_overlap_ms)
            .await
            .map_err(|err| AdapterError::no_signer(err.to_string()))?;
        Ok(handle.id)
    }

    async fn trigger_recovery(&self) -> Result<Vec<(String, String)>, AdapterError> {
        let results = self.recovery.run_once().await;
        Ok(results
            .into_iter()
            .map(|(name, signal)| (name, format!("{:?}", signal)))
            .collect())
    }
}
