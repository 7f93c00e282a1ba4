// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! The deterministic state machine (component E): `apply(state, tx)` over
//! account balances and nonces, and the batch-level replay check that a
//! committed batch's pre/post state roots actually bracket its
//! transactions.

mod state;
mod verify;

pub use state::WorldState;
pub use verify::{Ed25519TransactionVerifier, NoopVerifier, TransactionVerifier};
