// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wires every sequencer-* component into one running node: loads
//! configuration, brings up the signing kernel, state machine, queue,
//! consensus node, and resilience fabric, then drives the ingestion →
//! ordering → commit → settlement pipeline described in §2's data flow.
//! The HTTP/REST gateway and SDK client that would front this process are
//! external collaborators and are not implemented here; this binary exposes
//! the `AdminApi` such a gateway calls into.

use aptos_infallible::Mutex;
use bounded_executor::BoundedExecutor;
use tokio::sync::Mutex as AsyncMutex;
use clap::Parser;
use sequencer_adapters::{AdminApi, AdminStatus, BatchStore, ClusterTransport, InProcessAdmin};
use sequencer_clock::Clock;
use sequencer_config::{Args, NodeConfig};
use sequencer_consensus::{FileRaftStore, RaftNode, RaftStore};
use sequencer_merkle::MerkleTree;
use sequencer_queue::{BatchBuilder, PendingQueue};
use sequencer_recovery::{FailureDetector, HealthSignal, RecoverySupervisor, RecoveryStrategy, Watch};
use sequencer_resilience::DegradationController;
use sequencer_signing::{
    EmergencyProvider, ProviderTier, RotationPolicy, SigningKernel, SigningProvider,
    SoftwareEd25519Provider,
};
use sequencer_state::{NoopVerifier, WorldState};
use sequencer_types::SigningAlgorithm;
use std::sync::Arc;
use std::time::Duration;

/// Surfaces the shared [`DegradationController`]'s level as a health signal,
/// so the recovery supervisor's detection loop and the resilience fabric's
/// escalation both read from one source of truth instead of drifting apart.
struct DegradationDetector {
    degradation: Arc<DegradationController>,
}

impl FailureDetector for DegradationDetector {
    fn name(&self) -> &str {
        "degradation-level"
    }

    fn check(&self) -> HealthSignal {
        match self.degradation.level() {
            sequencer_resilience::DegradationLevel::Normal => HealthSignal::Healthy,
            sequencer_resilience::DegradationLevel::Degraded => HealthSignal::Degraded {
                reason: "resilience fabric reports degraded operation".to_string(),
            },
            sequencer_resilience::DegradationLevel::Emergency => HealthSignal::Failed {
                reason: "resilience fabric reports emergency operation".to_string(),
            },
        }
    }
}

/// The recovery action available when nothing more specific applies: log and
/// let the next healthy poll step the degradation level back down on its own.
struct LogAndWaitStrategy;

#[async_trait::async_trait]
impl RecoveryStrategy for LogAndWaitStrategy {
    fn name(&self) -> &str {
        "log-and-wait"
    }

    async fn attempt(&self) -> anyhow::Result<()> {
        aptos_logger::warn!("recovery: no automatic remediation available, waiting for the next health poll");
        Err(anyhow::anyhow!("no automatic remediation available"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    crash_handler::setup_panic_handler();
    aptos_logger::init(aptos_logger::LoggerConfig::default());

    let args = Args::parse();
    let config = NodeConfig::load(&args.config_path)?;
    aptos_logger::info!(node_id = %config.node_id, "sequencer node starting");

    let clock = Clock::real();

    const EMERGENCY_MAX_SIGNATURES: u64 = 1_000;
    const EMERGENCY_MAX_LIFETIME_MS: u64 = 60 * 60 * 1_000;

    let primary_provider: Arc<dyn SigningProvider> = Arc::new(SoftwareEd25519Provider::new("hsm-primary"));
    let secondary_provider: Arc<dyn SigningProvider> = Arc::new(SoftwareEd25519Provider::new("hsm-secondary"));
    let emergency_provider: Arc<dyn SigningProvider> = Arc::new(EmergencyProvider::new(
        "emergency",
        clock.clone(),
        EMERGENCY_MAX_SIGNATURES,
        EMERGENCY_MAX_LIFETIME_MS,
    ));
    let active_key = primary_provider
        .generate_key(SigningAlgorithm::Ed25519, clock.now_unix_millis())
        .await?;
    let signing_executor = BoundedExecutor::new(8, tokio::runtime::Handle::current());
    let signing = Arc::new(SigningKernel::new(
        vec![
            (ProviderTier::Primary, primary_provider),
            (ProviderTier::Secondary, secondary_provider),
            (ProviderTier::Emergency, emergency_provider),
        ],
        active_key,
        signing_executor,
        clock.clone(),
    ));

    let rotation_overlap_ms = config.overlap_hours * 3_600_000;
    signing.spawn_rotation_scheduler(RotationPolicy {
        algorithm: SigningAlgorithm::Ed25519,
        rotation_interval_ms: config.rotation_interval_days * 86_400_000,
        overlap_window_ms: rotation_overlap_ms,
    });
    signing.spawn_rehome_probe(30_000);

    let state = Arc::new(Mutex::new(WorldState::new()));
    let merkle = Arc::new(Mutex::new(MerkleTree::new()));
    let queue = Arc::new(Mutex::new(PendingQueue::new(config.queue_capacity)));
    let builder = BatchBuilder::new(config.batch_max_size);
    let batches = Arc::new(BatchStore::new());

    std::fs::create_dir_all(&config.state_dir)?;
    let raft_store: Arc<dyn RaftStore> = Arc::new(FileRaftStore::new(config.state_dir.clone()));
    let transport = Arc::new(ClusterTransport::new());
    let mut node = RaftNode::new(
        config.node_id(),
        config.peer_ids(),
        transport,
        clock.clone(),
        raft_store,
    );
    node.hydrate_from_store()?;
    let raft = Arc::new(AsyncMutex::new(node));

    let degradation = Arc::new(DegradationController::new());
    let recovery = Arc::new(RecoverySupervisor::new(
        vec![Watch {
            detector: Arc::new(DegradationDetector {
                degradation: degradation.clone(),
            }),
            strategies: vec![Arc::new(LogAndWaitStrategy)],
        }],
        degradation.clone(),
        clock.clone(),
    ));

    let admin: Arc<dyn AdminApi> = Arc::new(InProcessAdmin::new(
        queue.clone(),
        merkle.clone(),
        batches.clone(),
        raft.clone(),
        signing.clone(),
        recovery.clone(),
        degradation.clone(),
        clock.clone(),
        rotation_overlap_ms,
    ));

    let heartbeat = Duration::from_millis(config.heartbeat_ms);
    let election_timeout = Duration::from_millis(config.election_timeout_ms[0]);

    let election_task = tokio::spawn({
        let raft = raft.clone();
        let store = FileRaftStore::new(config.state_dir.clone());
        async move {
            loop {
                tokio::time::sleep(election_timeout).await;
                let won = {
                    let mut node = raft.lock().await;
                    if node.is_leader() {
                        continue;
                    }
                    node.start_election().await
                };
                let state_snapshot = raft.lock().await.state.clone();
                if let Err(err) = store.save_state(&state_snapshot) {
                    aptos_logger::error!(error = %err, "failed to persist raft state after election attempt");
                }
                if won {
                    aptos_logger::info!("node won election, becoming leader");
                }
            }
        }
    });

    let replication_task = tokio::spawn({
        let raft = raft.clone();
        async move {
            loop {
                tokio::time::sleep(heartbeat).await;
                let mut node = raft.lock().await;
                node.replicate_once().await;
            }
        }
    });

    let batching_task = tokio::spawn({
        let raft = raft.clone();
        let queue = queue.clone();
        let state = state.clone();
        let merkle = merkle.clone();
        let signing = signing.clone();
        let batches = batches.clone();
        let clock = clock.clone();
        let batch_timeout = Duration::from_millis(config.batch_timeout_ms);
        async move {
            loop {
                tokio::time::sleep(batch_timeout).await;
                let is_leader = raft.lock().await.is_leader();
                if !is_leader {
                    continue;
                }

                let now = clock.now_unix_millis();
                let base_state = state.lock().clone();
                let self_id = raft.lock().await.id;
                let maybe_batch = builder.build(
                    &mut queue.lock(),
                    &base_state,
                    &NoopVerifier,
                    self_id,
                    now,
                    now + 60_000,
                );
                let Some(mut batch) = maybe_batch else { continue };

                match signing.sign(batch.id.as_bytes()).await {
                    Ok(signature) => batch = batch.with_signature(signature),
                    Err(err) => {
                        aptos_logger::error!(error = %err, "signing kernel refused to sign batch, dropping it");
                        continue;
                    }
                }

                {
                    let mut applied_state = state.lock();
                    if let Err(err) = applied_state.apply_batch(&batch, &NoopVerifier, now) {
                        aptos_logger::error!(error = %err, "batch failed to replay against committed state");
                        continue;
                    }
                }
                merkle.lock().add_leaf(batch.post_state_root);
                batches.record(batch);
            }
        }
    });

    let recovery_task = tokio::spawn({
        let recovery = recovery.clone();
        async move {
            loop {
                tokio::time::sleep(Duration::from_secs(5)).await;
                recovery.run_once().await;
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    aptos_logger::info!("shutdown signal received, stopping background tasks");
    election_task.abort();
    replication_task.abort();
    batching_task.abort();
    recovery_task.abort();

    let status: AdminStatus = admin.get_status().await;
    aptos_logger::info!(
        role = ?status.role,
        commit_index = status.commit_index,
        "sequencer node exiting"
    );
    Ok(())
}
