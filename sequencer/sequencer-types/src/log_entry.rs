// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::batch::Batch;
use crate::raft::{LogTerm, NodeId};
use serde::{Deserialize, Serialize};

/// A cluster membership change, replicated through the log like any other
/// entry so that a reconfiguration is only in effect once it has itself
/// been committed by a majority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigChange {
    pub members: Vec<NodeId>,
}

/// What a single log entry carries. `Batch` is the common case; `Config` lets
/// the cluster add or remove nodes without a separate out-of-band protocol.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum LogPayload {
    Batch(Batch),
    Config(ConfigChange),
}

/// One entry in the Raft replicated log: a term, a 1-based index, the
/// payload, and the id of the node that proposed it. Entries are totally
/// ordered by `index`; `term` is recorded alongside so the log-matching
/// property (§4/§5 of the consensus design) can be checked without a second
/// round trip to fetch term history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    pub term: LogTerm,
    pub index: u64,
    pub payload: LogPayload,
    pub producer: NodeId,
}

impl LogEntry {
    pub fn new(term: LogTerm, index: u64, payload: LogPayload, producer: NodeId) -> Self {
        LogEntry {
            term,
            index,
            payload,
            producer,
        }
    }
}
