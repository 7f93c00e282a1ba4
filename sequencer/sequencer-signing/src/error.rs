// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use sequencer_types::KeyStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider {provider} is unreachable: {reason}")]
    Unreachable { provider: String, reason: String },

    #[error("provider {provider} rejected the request: {reason}")]
    Rejected { provider: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("key is {status} and cannot be used to sign")]
    KeyNotActive { status: KeyStatus },

    #[error("every provider in the failover chain rejected the request: {0:?}")]
    AllProvidersFailed(Vec<ProviderError>),
}
