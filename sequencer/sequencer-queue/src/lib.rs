// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! The pending transaction queue and batch builder (component F): a bounded
//! priority queue with expiry eviction, and a builder that turns its
//! contents into batches ready for consensus.

mod builder;
mod error;
mod queue;

pub use builder::BatchBuilder;
pub use error::QueueError;
pub use queue::PendingQueue;
