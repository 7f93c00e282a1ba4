// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::{AdapterError, ErrorKind};
use async_trait::async_trait;
use byteorder::{BigEndian, WriteBytesExt};
use reliable_broadcast::{AckPolicy, BroadcastRpc, ReliableBroadcast};
use sequencer_types::{Batch, Hash256};
use std::sync::Arc;
use std::time::Duration;

/// Encodes a committed batch into the settlement peer's wire payload (§6):
/// big-endian batch id, timestamp, pre/post roots, transaction count, each
/// transaction in canonical (BCS) encoding, the signer's key id, and the
/// signature. This is the exact byte sequence the external contract expects
/// to recover the signed message from, so it does not use BCS end-to-end —
/// only the per-transaction encoding does.
pub fn encode_settlement_payload(
    batch: &Batch,
    signer_key_id: &Hash256,
) -> Result<Vec<u8>, AdapterError> {
    let mut buf = Vec::new();
    buf.extend_from_slice(batch.id.as_bytes());
    buf.write_u64::<BigEndian>(batch.timestamp)
        .expect("writes to a Vec never fail");
    buf.extend_from_slice(batch.pre_state_root.as_bytes());
    buf.extend_from_slice(batch.post_state_root.as_bytes());
    buf.write_u32::<BigEndian>(batch.transactions.len() as u32)
        .expect("writes to a Vec never fail");
    for tx in &batch.transactions {
        let encoded = bcs::to_bytes(tx).map_err(|err| AdapterError::new(ErrorKind::Validation, err.to_string()))?;
        buf.write_u32::<BigEndian>(encoded.len() as u32)
            .expect("writes to a Vec never fail");
        buf.extend_from_slice(&encoded);
    }
    buf.extend_from_slice(signer_key_id.as_bytes());
    buf.extend_from_slice(&batch.signature);
    Ok(buf)
}

/// Identifies one redundant settlement RPC endpoint the sender fans a batch
/// out to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EndpointId(pub String);

#[derive(Clone, Debug)]
pub struct SettlementReceipt {
    pub endpoint: EndpointId,
    pub l1_tx_hash: Hash256,
    pub accepted: bool,
}

#[async_trait]
pub trait SettlementSender: Send + Sync {
    async fn submit(
        &self,
        batch: &Batch,
        signer_key_id: &Hash256,
    ) -> Result<Vec<SettlementReceipt>, AdapterError>;
}

/// The client call one endpoint exposes for accepting a settlement payload.
/// Kept distinct from [`SettlementSender`] so `ReliableBroadcast` can own the
/// retry loop while this trait stays a thin per-endpoint RPC shape.
#[async_trait]
pub trait SettlementRpc: Send + Sync {
    async fn submit_payload(&self, endpoint: EndpointId, payload: Vec<u8>) -> anyhow::Result<SettlementReceipt>;
}

struct RpcAdapter<R> {
    rpc: Arc<R>,
}

#[async_trait]
impl<R: SettlementRpc + 'static> BroadcastRpc<EndpointId, Vec<u8>, SettlementReceipt> for RpcAdapter<R> {
    async fn send(&self, peer: EndpointId, req: Vec<u8>) -> anyhow::Result<SettlementReceipt> {
        self.rpc.submit_payload(peer, req).await
    }
}

struct AcceptedAck;

impl AckPolicy<SettlementReceipt> for AcceptedAck {
    fn is_ack(&self, resp: &SettlementReceipt) -> bool {
        resp.accepted
    }
}

/// Submits a signed batch to every configured redundant settlement endpoint
/// and waits for all of them to acknowledge, reusing the same
/// retry-until-acked fan-out `sequencer-consensus` uses for `AppendEntries`.
/// Unlike Raft replication, settlement genuinely wants every redundant
/// endpoint to confirm rather than a mere quorum, since each endpoint may
/// watch a different L1 RPC provider and a caller wants to know all of them
/// agree the batch landed.
pub struct ReliableBroadcastSettlementSender<R: SettlementRpc + 'static> {
    broadcast: ReliableBroadcast<EndpointId, Vec<u8>, SettlementReceipt, RpcAdapter<R>, AcceptedAck>,
    endpoints: Vec<EndpointId>,
}

impl<R: SettlementRpc + 'static> ReliableBroadcastSettlementSender<R> {
    pub fn new(
        rpc: Arc<R>,
        endpoints: Vec<EndpointId>,
        time_service: aptos_time_service::TimeService,
        retry_interval: Duration,
    ) -> Self {
        ReliableBroadcastSettlementSender {
            broadcast: ReliableBroadcast::new(
                Arc::new(RpcAdapter { rpc }),
                Arc::new(AcceptedAck),
                time_service,
                retry_interval,
            ),
            endpoints,
        }
    }
}

#[async_trait]
impl<R: SettlementRpc + 'static> SettlementSender for ReliableBroadcastSettlementSender<R> {
    async fn submit(
        &self,
        batch: &Batch,
        signer_key_id: &Hash256,
    ) -> Result<Vec<SettlementReceipt>, AdapterError> {
        let payload = encode_settlement_payload(batch, signer_key_id)?;
        let acked = self
            .broadcast
            .broadcast_until_acked(self.endpoints.clone(), payload)
            .await;
        Ok(acked.into_values().collect())
    }
}
