// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sends one request to every member of a peer set in parallel and keeps
//! retrying whichever peers have not yet acknowledged, until either all have
//! acknowledged or the caller's future is dropped. `sequencer-consensus` uses
//! this to fan AppendEntries out to followers (§4.D: "issues AppendEntries to
//! all peers in parallel").

use aptos_infallible::Mutex;
use aptos_time_service::{TimeService, TimeServiceTrait};
use async_trait::async_trait;
use futures::{future::BoxFuture, stream::FuturesUnordered, StreamExt};
use std::{collections::HashMap, hash::Hash, sync::Arc, time::Duration};

#[async_trait]
pub trait BroadcastRpc<Peer, Req, Resp>: Send + Sync {
    async fn send(&self, peer: Peer, req: Req) -> anyhow::Result<Resp>;
}

/// Decides, from a peer's response, whether the broadcast can stop retrying it.
pub trait AckPolicy<Resp>: Send + Sync {
    fn is_ack(&self, resp: &Resp) -> bool;
}

pub struct ReliableBroadcast<Peer, Req, Resp, Rpc, Ack> {
    rpc: Arc<Rpc>,
    ack_policy: Arc<Ack>,
    time_service: TimeService,
    retry_interval: Duration,
    _req: std::marker::PhantomData<Req>,
    _resp: std::marker::PhantomData<Resp>,
    _peer: std::marker::PhantomData<Peer>,
}

impl<Peer, Req, Resp, Rpc, Ack> ReliableBroadcast<Peer, Req, Resp, Rpc, Ack>
where
    Peer: Eq + Hash + Clone + Send + Sync + 'static,
    Req: Clone + Send + Sync + 'static,
    Resp: Send + Sync + 'static,
    Rpc: BroadcastRpc<Peer, Req, Resp> + 'static,
    Ack: AckPolicy<Resp> + 'static,
{
    pub fn new(rpc: Arc<Rpc>, ack_policy: Arc<Ack>, time_service: TimeService, retry_interval: Duration) -> Self {
        Self {
            rpc,
            ack_policy,
            time_service,
            retry_interval,
            _req: std::marker::PhantomData,
            _resp: std::marker::PhantomData,
            _peer: std::marker::PhantomData,
        }
    }

    /// Broadcasts `req` to every peer in `targets`, retrying any peer whose
    /// response is not an ack (per `Ack::is_ack`) or whose RPC failed, at
    /// `retry_interval`, until every peer has acked. Returns the map of peer to
    /// its final ack response.
    pub async fn broadcast_until_acked(
        &self,
        targets: Vec<Peer>,
        req: Req,
    ) -> HashMap<Peer, Resp> {
        let acked: Arc<Mutex<HashMap<Peer, Resp>>> = Arc::new(Mutex::new(HashMap::new()));
        let mut pending: Vec<Peer> = targets;

        while !pending.is_empty() {
            let mut futures: FuturesUnordered<BoxFuture<'_, (Peer, Option<Resp>)>> =
                FuturesUnordered::new();
            for peer in pending.drain(..) {
                let rpc = self.rpc.clone();
                let req = req.clone();
                let peer_for_send = peer.clone();
                futures.push(Box::pin(async move {
                    let resp = rpc.send(peer_for_send, req).await.ok();
                    (peer, resp)
                }));
            }

            let mut still_pending = Vec::new();
            while let Some((peer, resp)) = futures.next().await {
                match resp {
                    Some(resp) if self.ack_policy.is_ack(&resp) => {
                        acked.lock().insert(peer, resp);
                    }
                    _ => still_pending.push(peer),
                }
            }

            pending = still_pending;
            if !pending.is_empty() {
                aptos_logger::debug!(remaining = pending.len(), "reliable broadcast: retrying stragglers");
                self.time_service.sleep(self.retry_interval).await;
            }
        }

        Arc::try_unwrap(acked)
            .unwrap_or_else(|_| unreachable!("no other clone of `acked` escapes this function"))
            .into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyRpc {
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BroadcastRpc<u8, u8, bool> for FlakyRpc {
        async fn send(&self, peer: u8, _req: u8) -> anyhow::Result<bool> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            // peer 2 fails its first attempt, then succeeds.
            if peer == 2 && n < 3 {
                return Ok(false);
            }
            Ok(true)
        }
    }

    struct BoolAck;
    impl AckPolicy<bool> for BoolAck {
        fn is_ack(&self, resp: &bool) -> bool {
            *resp
        }
    }

    #[tokio::test]
    async fn retries_until_all_peers_ack() {
        let rb = ReliableBroadcast::new(
            Arc::new(FlakyRpc {
                attempts: Arc::new(AtomicUsize::new(0)),
            }),
            Arc::new(BoolAck),
            TimeService::mock(),
            Duration::from_millis(1),
        );
        let acked = rb.broadcast_until_acked(vec![1, 2, 3], 0xAA).await;
        assert_eq!(acked.len(), 3);
        assert!(acked.values().all(|v| *v));
    }
}
