// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! The resilience fabric (component H): circuit breakers, breaker-aware
//! retry, degradation-level tracking, and the multi-level cache that sits
//! in front of expensive lookups (account state, Merkle proofs).

mod breaker;
mod cache;
mod degradation;
mod retry;

pub use breaker::{CircuitBreaker, CircuitState};
pub use cache::{Compressor, MultiLevelCache, TierConfig};
pub use degradation::{DegradationController, DegradationLevel};
pub use retry::{call_with_breaker, ResilienceError};
