// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use ed25519_dalek::{PublicKey, Signature, Verifier};
use sequencer_types::Transaction;

/// Checks a transaction's signature against its sender. The sender address
/// doubles as the Ed25519 public key, the way both EVM and Solana-family
/// accounts are ultimately keyed off of a public key of fixed width.
pub trait TransactionVerifier: Send + Sync {
    fn verify(&self, tx: &Transaction) -> bool;
}

#[derive(Default)]
pub struct Ed25519TransactionVerifier;

impl TransactionVerifier for Ed25519TransactionVerifier {
    fn verify(&self, tx: &Transaction) -> bool {
        let Ok(public_key) = PublicKey::from_bytes(&tx.sender.0) else {
            return false;
        };
        let Ok(signature) = Signature::from_bytes(&tx.signature) else {
            return false;
        };
        public_key.verify(tx.id.as_bytes(), &signature).is_ok()
    }
}

/// Accepts every transaction regardless of signature. Used in tests that
/// exercise nonce and balance logic without paying for key generation.
pub struct NoopVerifier;

impl TransactionVerifier for NoopVerifier {
    fn verify(&self, _tx: &Transaction) -> bool {
        true
    }
}
