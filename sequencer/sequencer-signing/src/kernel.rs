// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::{ProviderError, SigningError};
use crate::provider::SigningProvider;
use aptos_infallible::RwLock;
use aptos_metrics_core::{register_int_counter, IntCounter};
use bounded_executor::BoundedExecutor;
use once_cell::sync::Lazy;
use sequencer_clock::Clock;
use sequencer_types::{KeyHandle, KeyStatus, SigningAlgorithm};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

static SIGN_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter(
        "sequencer_signing_requests_total",
        "Signing requests handled by the kernel",
    )
});

static SIGN_FAILOVERS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter(
        "sequencer_signing_failovers_total",
        "Times the primary signing provider was bypassed in favor of a lower tier",
    )
});

static KEY_ROTATIONS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter(
        "sequencer_signing_rotations_total",
        "Key rotations completed by the kernel",
    )
});

/// A provider's position in the failover chain. Providers are tried in
/// ascending tier order; `sign` only reaches for `Secondary` once `Primary`
/// fails, and `Emergency` only once both have failed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProviderTier {
    Primary,
    Secondary,
    Emergency,
}

struct RankedProvider {
    tier: ProviderTier,
    provider: Arc<dyn SigningProvider>,
}

/// A key handle retained past rotation so that signatures produced before
/// the rotation can still be verified until `retire_at_millis`.
struct OverlapKey {
    handle: KeyHandle,
    retire_at_millis: u64,
}

/// Parameters for the background rotation scheduler (§4.C Rotation).
#[derive(Clone, Copy, Debug)]
pub struct RotationPolicy {
    pub algorithm: SigningAlgorithm,
    pub rotation_interval_ms: u64,
    pub overlap_window_ms: u64,
}

/// The signing façade every other component calls through to produce a
/// batch or settlement signature (§4.C). Dispatches to whichever provider in
/// the failover chain is currently healthy, and serializes HSM calls through
/// a bounded worker pool so a slow provider cannot exhaust the runtime.
pub struct SigningKernel {
    providers: Vec<RankedProvider>,
    active_key: RwLock<KeyHandle>,
    overlap_key: RwLock<Option<OverlapKey>>,
    preferred_tier: AtomicUsize,
    executor: BoundedExecutor,
    clock: Clock,
}

impl SigningKernel {
    pub fn new(
        providers: Vec<(ProviderTier, Arc<dyn SigningProvider>)>,
        active_key: KeyHandle,
        executor: BoundedExecutor,
        clock: Clock,
    ) -> Self {
        let mut providers: Vec<RankedProvider> = providers
            .into_iter()
            .map(|(tier, provider)| RankedProvider { tier, provider })
            .collect();
        providers.sort_by_key(|p| tier_rank(p.tier));
        SigningKernel {
            providers,
            active_key: RwLock::new(active_key),
            overlap_key: RwLock::new(None),
            preferred_tier: AtomicUsize::new(0),
            executor,
            clock,
        }
    }

    pub fn active_key(&self) -> KeyHandle {
        *self.active_key.read()
    }

    /// The key retained from the last rotation, if still inside its overlap
    /// window.
    pub fn overlapping_key(&self) -> Option<KeyHandle> {
        self.retire_expired_overlap();
        self.overlap_key.read().as_ref().map(|o| o.handle)
    }

    fn retire_expired_overlap(&self) {
        let now = self.clock.now_unix_millis();
        let mut overlap = self.overlap_key.write();
        if let Some(entry) = overlap.as_ref() {
            if now >= entry.retire_at_millis {
                *overlap = None;
            }
        }
    }

    /// Signs `message` under the currently active key, walking the failover
    /// chain from the currently preferred tier downward until one provider
    /// succeeds. Every provider call is dispatched through the bounded
    /// executor so a stuck HSM driver cannot starve the rest of the kernel.
    pub async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SigningError> {
        SIGN_REQUESTS.inc();
        let key = self.active_key();
        if !key.is_usable_for_signing() {
            return Err(SigningError::KeyNotActive { status: key.status });
        }

        let start = self
            .preferred_tier
            .load(Ordering::Relaxed)
            .min(self.providers.len().saturating_sub(1));
        let order = (start..self.providers.len()).chain(0..start);

        let mut errors = Vec::new();
        for (visited, index) in order.enumerate() {
            let ranked = &self.providers[index];
            let provider = ranked.provider.clone();
            let message = message.to_vec();
            let result = self
                .executor
                .spawn(async move { provider.sign(&key, &message).await })
                .await;

            match result {
                Ok(Ok(signature)) => {
                    if visited > 0 {
                        SIGN_FAILOVERS.inc();
                        aptos_logger::warn!(
                            tier = ?ranked.tier,
                            provider = ranked.provider.name(),
                            "signing kernel failed over to a lower-tier provider"
                        );
                        self.preferred_tier.store(index, Ordering::Relaxed);
                    }
                    return Ok(signature);
                }
                Ok(Err(err)) => errors.push(err),
                Err(join_err) => errors.push(ProviderError::Unreachable {
                    provider: ranked.provider.name().to_string(),
                    reason: join_err.to_string(),
                }),
            }
        }
        Err(SigningError::AllProvidersFailed(errors))
    }

    /// Verifies `signature` over `message` against the currently active key
    /// or, inside its overlap window, the just-rotated-out key too — the §8
    /// law that a rotated key still verifies during overlap and stops
    /// verifying after it elapses.
    pub async fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, SigningError> {
        self.retire_expired_overlap();
        let mut candidates = vec![self.active_key()];
        if let Some(overlap) = self.overlap_key.read().as_ref() {
            candidates.push(overlap.handle);
        }

        for key in candidates {
            for ranked in &self.providers {
                if let Ok(true) = ranked.provider.verify(&key, message, signature).await {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// The active key's public key material, as reported by the first
    /// provider that recognizes it.
    pub async fn public_key(&self) -> Result<Vec<u8>, SigningError> {
        let key = self.active_key();
        let mut errors = Vec::new();
        for ranked in &self.providers {
            match ranked.provider.public_key(&key).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) => errors.push(err),
            }
        }
        Err(SigningError::AllProvidersFailed(errors))
    }

    /// Whether at least one provider in the failover chain is currently
    /// available.
    pub async fn is_available(&self) -> bool {
        for ranked in &self.providers {
            if ranked.provider.is_available().await {
                return true;
            }
        }
        false
    }

    /// Closes every provider in the failover chain. Used during an orderly
    /// shutdown so HSM sessions and emergency key material are released
    /// deterministically rather than dropped.
    pub async fn close(&self) -> Result<(), SigningError> {
        let mut errors = Vec::new();
        for ranked in &self.providers {
            if let Err(err) = ranked.provider.close().await {
                errors.push(err);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SigningError::AllProvidersFailed(errors))
        }
    }

    /// Begins rotating to a freshly generated key on the primary provider:
    /// the old key moves to `Rotating` and is retained as the overlap key
    /// for `overlap_window_ms`, during which [`Self::verify`] still accepts
    /// signatures produced under it.
    pub async fn rotate_key(
        &self,
        algorithm: SigningAlgorithm,
        overlap_window_ms: u64,
    ) -> Result<KeyHandle, SigningError> {
        let primary = self
            .providers
            .first()
            .expect("a signing kernel always has at least one provider");
        let now = self.clock.now_unix_millis();
        let new_key = primary
            .provider
            .generate_key(algorithm, now)
            .await
            .map_err(|err| SigningError::AllProvidersFailed(vec![err]))?;

        let mut old_key = {
            let mut active = self.active_key.write();
            let old_key = *active;
            *active = new_key;
            old_key
        };
        old_key.status = KeyStatus::Rotating;
        *self.overlap_key.write() = Some(OverlapKey {
            handle: old_key,
            retire_at_millis: now + overlap_window_ms,
        });
        KEY_ROTATIONS.inc();
        Ok(new_key)
    }

    /// Forces the overlap key, if any, to retire immediately rather than
    /// waiting out its window. Used by operator tooling to shorten an
    /// overlap window early.
    pub fn retire_overlap_key(&self) {
        *self.overlap_key.write() = None;
    }

    /// Spawns the independent rotation scheduler (§4.C Rotation): on each
    /// fire it rotates to a fresh key, waits out the overlap window, then
    /// retires the old one.
    pub fn spawn_rotation_scheduler(self: &Arc<Self>, policy: RotationPolicy) -> tokio::task::JoinHandle<()> {
        let kernel = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(policy.rotation_interval_ms)).await;
                match kernel.rotate_key(policy.algorithm, policy.overlap_window_ms).await {
                    Ok(new_key) => {
                        aptos_logger::info!(key_id = %new_key.id, "rotation scheduler rotated the active signing key");
                        tokio::time::sleep(Duration::from_millis(policy.overlap_window_ms)).await;
                        kernel.retire_overlap_key();
                    }
                    Err(err) => {
                        aptos_logger::error!(error = %err, "rotation scheduler failed to rotate the signing key");
                    }
                }
            }
        })
    }

    /// Spawns the background re-home probe (§4.C Failover policy): every
    /// `interval_ms`, checks whether a lower-indexed (preferred) provider
    /// than the one currently serving signs has become healthy again, and if
    /// so swaps back to it.
    pub fn spawn_rehome_probe(self: &Arc<Self>, interval_ms: u64) -> tokio::task::JoinHandle<()> {
        let kernel = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(interval_ms)).await;
                let current = kernel.preferred_tier.load(Ordering::Relaxed);
                if current == 0 {
                    continue;
                }
                for index in 0..current {
                    if kernel.providers[index].provider.is_available().await {
                        aptos_logger::info!(
                            from_tier = current,
                            to_tier = index,
                            "signing kernel re-homed to a healthier provider"
                        );
                        kernel.preferred_tier.store(index, Ordering::Relaxed);
                        break;
                    }
                }
            }
        })
    }
}

fn tier_rank(tier: ProviderTier) -> u8 {
    match tier {
        ProviderTier::Primary => 0,
        ProviderTier::Secondary => 1,
        ProviderTier::Emergency => 2,
    }
}
