// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! The signing kernel (component C): an HSM façade with a Primary /
//! Secondary / Emergency provider failover chain and key rotation, sitting
//! behind a bounded worker pool so a slow or wedged provider cannot block
//! the rest of the sequencer.

mod error;
mod kernel;
mod provider;

pub use error::{ProviderError, SigningError};
pub use kernel::{ProviderTier, RotationPolicy, SigningKernel};
pub use provider::{AuditRecord, EmergencyProvider, SigningProvider, SoftwareEd25519Provider};
