// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is at capacity ({capacity}); apply backpressure to the caller")]
    Full { capacity: usize },
}
