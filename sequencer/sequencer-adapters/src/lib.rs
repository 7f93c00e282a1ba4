// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Boundary adapters (component J): the L1 deposit watcher, the settlement
//! sender that publishes signed batches outward, and the admin interface the
//! collaborator gateway calls into.

mod admin;
mod error;
mod settlement;
mod transport;
mod watcher;

pub use admin::{AdminApi, AdminStatus, BatchStore, InProcessAdmin};
pub use error::{AdapterError, ErrorKind};
pub use settlement::{
    encode_settlement_payload, EndpointId, ReliableBroadcastSettlementSender, SettlementReceipt,
    SettlementRpc, SettlementSender,
};
pub use transport::{ClusterTransport, PeerConnection};
pub use watcher::{DepositEvent, L1Client, L1Watcher, PollingL1Watcher};
