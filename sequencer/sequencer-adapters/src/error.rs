// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// The kernel-wide error taxonomy (§7). Every boundary response the admin
/// interface returns carries one of these, so a caller on the other side of
/// the gateway can dispatch on `kind()` without parsing free-text messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Backpressure,
    NotLeader,
    StaleTerm,
    Timeout,
    CircuitOpen,
    NoSigner,
    StateDiverged,
    StorageFault,
}

impl ErrorKind {
    /// Whether the caller may retry the same operation without risking a
    /// duplicate effect. Fatal kinds are never retryable; the process is
    /// expected to halt instead.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::Backpressure)
    }

    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::StateDiverged | ErrorKind::StorageFault)
    }
}

#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct AdapterError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AdapterError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        AdapterError {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn backpressure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Backpressure, message)
    }

    pub fn not_leader(leader_hint: Option<sequencer_types::NodeId>) -> Self {
        Self::new(
            ErrorKind::NotLeader,
            match leader_hint {
                Some(id) => format!("not leader; current leader is {}", id.0),
                None => "not leader; no known leader".to_string(),
            },
        )
    }

    pub fn no_signer(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoSigner, message)
    }
}
