// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Where a signing key currently stands in its rotation lifecycle (§4.C).
/// `Rotating` overlaps with the incoming key so in-flight batches signed
/// under the old key still verify during the handover window.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum KeyStatus {
    Active,
    Rotating,
    Retired,
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyStatus::Active => "active",
            KeyStatus::Rotating => "rotating",
            KeyStatus::Retired => "retired",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    Ed25519,
    EcdsaSecp256k1,
}

/// A reference to a key held by the signing kernel's key store (HSM or
/// software fallback). Never carries key material itself; `sequencer-signing`
/// resolves a `KeyHandle` to an actual signing operation against whichever
/// provider currently owns it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct KeyHandle {
    pub id: Uuid,
    pub algorithm: SigningAlgorithm,
    pub created_at: u64,
    pub expiry: Option<u64>,
    pub status: KeyStatus,
}

impl KeyHandle {
    pub fn new(algorithm: SigningAlgorithm, created_at: u64, expiry: Option<u64>) -> Self {
        KeyHandle {
            id: Uuid::new_v4(),
            algorithm,
            created_at,
            expiry,
            status: KeyStatus::Active,
        }
    }

    pub fn is_usable_for_signing(&self) -> bool {
        matches!(self.status, KeyStatus::Active | KeyStatus::Rotating)
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expiry.map(|e| now >= e).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retired_key_is_not_usable() {
        let mut key = KeyHandle::new(SigningAlgorithm::Ed25519, 0, None);
        key.status = KeyStatus::Retired;
        assert!(!key.is_usable_for_signing());
    }

    #[test]
    fn rotating_key_remains_usable() {
        let mut key = KeyHandle::new(SigningAlgorithm::Ed25519, 0, None);
        key.status = KeyStatus::Rotating;
        assert!(key.is_usable_for_signing());
    }
}
