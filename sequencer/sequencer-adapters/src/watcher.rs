// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::{AdapterError, ErrorKind};
use async_trait::async_trait;
use sequencer_types::{Address, AssetId};
use std::sync::atomic::{AtomicU64, Ordering};

/// A `Deposited(id, token, sender, recipient, amount)` event observed on the
/// external EVM chain (§6: "L1 watcher (inbound)").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepositEvent {
    pub block: u64,
    pub deposit_id: [u8; 32],
    pub token: AssetId,
    pub sender: Address,
    pub recipient: Address,
    pub amount: ethnum::U256,
}

/// The chain client a watcher polls. Kept separate from [`L1Watcher`] so the
/// watcher's high-water-mark and finality bookkeeping can be tested against a
/// scripted client instead of a live node.
#[async_trait]
pub trait L1Client: Send + Sync {
    async fn latest_block(&self) -> anyhow::Result<u64>;
    async fn deposits_in_range(&self, from: u64, to: u64) -> anyhow::Result<Vec<DepositEvent>>;
}

#[async_trait]
pub trait L1Watcher: Send + Sync {
    /// Polls for newly finalized deposits since the last observed block.
    /// Returns the events found, in block order.
    async fn poll(&self) -> Result<Vec<DepositEvent>, AdapterError>;

    fn high_water_mark(&self) -> u64;
}

/// Polls an [`L1Client`] for deposits, holding back `finality_window` blocks
/// from the chain tip before treating anything as final (§6). A re-org that
/// reaches back past a block this watcher already reported is, per spec, not
/// recoverable locally: the watcher halts and the caller is expected to page
/// an operator rather than silently re-derive state.
pub struct PollingL1Watcher<C: L1Client> {
    client: C,
    high_water_mark: AtomicU64,
    finality_window: u64,
    halted: std::sync::atomic::AtomicBool,
}

impl<C: L1Client> PollingL1Watcher<C> {
    pub fn new(client: C, start_block: u64, finality_window: u64) -> Self {
        PollingL1Watcher {
            client,
            high_water_mark: AtomicU64::new(start_block),
            finality_window,
            halted: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn ensure_not_halted(&self) -> Result<(), AdapterError> {
        if self.halted.load(Ordering::SeqCst) {
            return Err(AdapterError::new(
                ErrorKind::StateDiverged,
                "watcher halted after observing a re-org past the finality window",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<C: L1Client> L1Watcher for PollingL1Watcher<C> {
    async fn poll(&self) -> Result<Vec<DepositEvent>, AdapterError> {
        self.ensure_not_halted()?;

        let tip = self
            .client
            .latest_block()
            .await
            .map_err(|err| AdapterError::new(ErrorKind::Timeout, err.to_string()))?;

        let finalized_tip = tip.saturating_sub(self.finality_window);
        let mark = self.high_water_mark.load(Ordering::SeqCst);

        if finalized_tip < mark {
            self.halted.store(true, Ordering::SeqCst);
            aptos_logger::error!(
                mark,
                finalized_tip,
                "l1 watcher: finalized chain tip regressed past a previously observed block, halting"
            );
            return Err(AdapterError::new(
                ErrorKind::StateDiverged,
                "re-org observed past the finality window",
            ));
        }
        if finalized_tip == mark {
            return Ok(Vec::new());
        }

        let from = mark + 1;
        let events = self
            .client
            .deposits_in_range(from, finalized_tip)
            .await
            .map_err(|err| AdapterError::new(ErrorKind::Timeout, err.to_string()))?;

        self.high_water_mark.store(finalized_tip, Ordering::SeqCst);
        Ok(events)
    }

    fn high_water_mark(&self) -> u64 {
        self.high_water_mark.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedClient {
        tip: AtomicU64,
        events: Mutex<Vec<DepositEvent>>,
    }

    fn event(block: u64) -> DepositEvent {
        DepositEvent {
            block,
            deposit_id: [block as u8; 32],
            token: AssetId([1; 32]),
            sender: Address([2; 32]),
            recipient: Address([3; 32]),
            amount: ethnum::U256::from(10u64),
        }
    }

    #[async_trait]
    impl L1Client for ScriptedClient {
        async fn latest_block(&self) -> anyhow::Result<u64> {
            Ok(self.tip.load(Ordering::SeqCst))
        }

        async fn deposits_in_range(&self, from: u64, to: u64) -> anyhow::Result<Vec<DepositEvent>> {
            Ok(self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.block >= from && e.block <= to)
                .cloned()
                .collect())
        }
    }

    #[tokio::test]
    async fn holds_back_events_within_finality_window() {
        let client = ScriptedClient {
            tip: AtomicU64::new(10),
            events: Mutex::new(vec![event(9), event(10)]),
        };
        let watcher = PollingL1Watcher::new(client, 0, 5);
        let found = watcher.poll().await.unwrap();
        assert!(found.is_empty());
        assert_eq!(watcher.high_water_mark(), 0);
    }

    #[tokio::test]
    async fn reports_deposits_once_finalized() {
        let client = ScriptedClient {
            tip: AtomicU64::new(20),
            events: Mutex::new(vec![event(9), event(10)]),
        };
        let watcher = PollingL1Watcher::new(client, 0, 5);
        let found = watcher.poll().await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(watcher.high_water_mark(), 15);
    }
}
