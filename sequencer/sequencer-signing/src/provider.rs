// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::ProviderError;
use async_trait::async_trait;
use ed25519_dalek::{Keypair, PublicKey, Signature, Signer, Verifier};
use rand::rngs::OsRng;
use sequencer_clock::Clock;
use sequencer_types::{Hash256, KeyHandle, SigningAlgorithm};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// A source of signatures: one physical or logical HSM, or a software
/// fallback standing in for one in tests and in degraded-mode operation.
/// `sequencer-signing` never talks to a provider directly except through
/// this trait, so the failover chain can treat an HSM partition, a cloud KMS,
/// and an in-process emergency provider identically.
#[async_trait]
pub trait SigningProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn sign(&self, key: &KeyHandle, message: &[u8]) -> Result<Vec<u8>, ProviderError>;

    /// Verifies `signature` over `message` under `key`. Returns `Ok(false)`
    /// for a well-formed signature that simply does not match, and `Err` only
    /// when the provider itself could not attempt the check (unknown key,
    /// malformed signature bytes, unreachable device).
    async fn verify(
        &self,
        key: &KeyHandle,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, ProviderError>;

    /// The public key material for `key`, in the provider's native encoding.
    async fn public_key(&self, key: &KeyHandle) -> Result<Vec<u8>, ProviderError>;

    /// Generates and takes custody of a new key, returning a handle to it.
    /// Key material never leaves the provider; the kernel only ever holds
    /// handles.
    async fn generate_key(
        &self,
        algorithm: SigningAlgorithm,
        created_at: u64,
    ) -> Result<KeyHandle, ProviderError>;

    /// Whether the provider is currently able to serve requests. Backs the
    /// failover supervisor's decision to skip to the next provider in the
    /// chain and the background probe's decision to re-home to this one.
    async fn is_available(&self) -> bool;

    /// Releases whatever resources (connections, handles) the provider
    /// holds. After `close`, every other method is expected to fail.
    async fn close(&self) -> Result<(), ProviderError>;
}

/// A software Ed25519 provider. Stands in for an HSM in tests and as the
/// Primary/Secondary tiers' backing implementation when no physical device
/// is wired up.
pub struct SoftwareEd25519Provider {
    name: String,
    keys: parking_lot::Mutex<HashMap<Uuid, Keypair>>,
    closed: AtomicBool,
}

impl SoftwareEd25519Provider {
    pub fn new(name: impl Into<String>) -> Self {
        SoftwareEd25519Provider {
            name: name.into(),
            keys: parking_lot::Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> Result<(), ProviderError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ProviderError::Rejected {
                provider: self.name.clone(),
                reason: "provider has been closed".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SigningProvider for SoftwareEd25519Provider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn sign(&self, key: &KeyHandle, message: &[u8]) -> Result<Vec<u8>, ProviderError> {
        self.check_open()?;
        let keys = self.keys.lock();
        let keypair = keys.get(&key.id).ok_or_else(|| ProviderError::Rejected {
            provider: self.name.clone(),
            reason: format!("no key material for {}", key.id),
        })?;
        let signature: Signature = keypair.sign(message);
        Ok(signature.to_bytes().to_vec())
    }

    async fn verify(
        &self,
        key: &KeyHandle,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, ProviderError> {
        self.check_open()?;
        let keys = self.keys.lock();
        let keypair = keys.get(&key.id).ok_or_else(|| ProviderError::Rejected {
            provider: self.name.clone(),
            reason: format!("no key material for {}", key.id),
        })?;
        let signature = Signature::from_bytes(signature).map_err(|err| ProviderError::Rejected {
            provider: self.name.clone(),
            reason: format!("malformed signature: {err}"),
        })?;
        Ok(keypair.public.verify(message, &signature).is_ok())
    }

    async fn public_key(&self, key: &KeyHandle) -> Result<Vec<u8>, ProviderError> {
        self.check_open()?;
        let keys = self.keys.lock();
        let keypair = keys.get(&key.id).ok_or_else(|| ProviderError::Rejected {
            provider: self.name.clone(),
            reason: format!("no key material for {}", key.id),
        })?;
        Ok(keypair.public.to_bytes().to_vec())
    }

    async fn generate_key(
        &self,
        algorithm: SigningAlgorithm,
        created_at: u64,
    ) -> Result<KeyHandle, ProviderError> {
        self.check_open()?;
        if !matches!(algorithm, SigningAlgorithm::Ed25519) {
            return Err(ProviderError::Rejected {
                provider: self.name.clone(),
                reason: "software provider only supports Ed25519".to_string(),
            });
        }
        let mut csprng = OsRng {};
        let keypair = Keypair::generate(&mut csprng);
        let handle = KeyHandle::new(algorithm, created_at, None);
        self.keys.lock().insert(handle.id, keypair);
        Ok(handle)
    }

    async fn is_available(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<(), ProviderError> {
        self.closed.store(true, Ordering::Release);
        self.keys.lock().clear();
        Ok(())
    }
}

/// One recorded use of the emergency provider's key material: which key
/// signed, a content digest of what it signed (not the message itself, so
/// the log does not duplicate sensitive transaction data), and when.
#[derive(Clone, Debug)]
pub struct AuditRecord {
    pub key_id: Uuid,
    pub message_digest: Hash256,
    pub at_millis: u64,
}

struct EmergencyMaterial {
    handle: KeyHandle,
    keypair: Keypair,
    generated_at_millis: u64,
    uses: u64,
}

/// The §4.C emergency in-process tier: ephemeral key material generated on
/// first use and bounded by a signature count *or* a lifetime, whichever is
/// reached first. Crossing either bound destroys the current material and
/// silently generates a fresh pair on the next use. Every sign and verify is
/// appended to an append-only audit log so operators can reconstruct exactly
/// what the emergency path was asked to do after the fact; signatures it
/// produces are not cryptographically distinguishable from an HSM's, so this
/// log is the only record of provenance.
pub struct EmergencyProvider {
    name: String,
    clock: Clock,
    max_signatures: u64,
    max_lifetime_millis: u64,
    material: parking_lot::Mutex<Option<EmergencyMaterial>>,
    audit_log: parking_lot::Mutex<Vec<AuditRecord>>,
    closed: AtomicBool,
}

impl EmergencyProvider {
    pub fn new(
        name: impl Into<String>,
        clock: Clock,
        max_signatures: u64,
        max_lifetime_millis: u64,
    ) -> Self {
        EmergencyProvider {
            name: name.into(),
            clock,
            max_signatures,
            max_lifetime_millis,
            material: parking_lot::Mutex::new(None),
            audit_log: parking_lot::Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// A snapshot of every recorded use, oldest first. The log is
    /// append-only; nothing in this provider ever removes an entry from it,
    /// including the material-regeneration path.
    pub fn audit_log(&self) -> Vec<AuditRecord> {
        self.audit_log.lock().clone()
    }

    fn exceeded_bounds(&self, material: &EmergencyMaterial, now: u64) -> bool {
        material.uses >= self.max_signatures
            || now.saturating_sub(material.generated_at_millis) >= self.max_lifetime_millis
    }

    /// Returns the current (possibly freshly generated) key material,
    /// regenerating it if the signature count or lifetime bound has been
    /// crossed.
    fn material_for_use(&self) -> EmergencyMaterial {
        let now = self.clock.now_unix_millis();
        let mut guard = self.material.lock();
        let needs_fresh = match guard.as_ref() {
            Some(material) => self.exceeded_bounds(material, now),
            None => true,
        };
        if needs_fresh {
            let mut csprng = OsRng {};
            let keypair = Keypair::generate(&mut csprng);
            let handle = KeyHandle::new(SigningAlgorithm::Ed25519, now, None);
            *guard = Some(EmergencyMaterial {
                handle,
                keypair,
                generated_at_millis: now,
                uses: 0,
            });
        }
        let material = guard.as_ref().expect("just ensured material is present");
        EmergencyMaterial {
            handle: material.handle,
            keypair: Keypair::from_bytes(&material.keypair.to_bytes())
                .expect("round-tripping a keypair's own bytes always succeeds"),
            generated_at_millis: material.generated_at_millis,
            uses: material.uses,
        }
    }

    fn record_use(&self, key_id: Uuid, message: &[u8]) {
        let now = self.clock.now_unix_millis();
        if let Some(material) = self.material.lock().as_mut() {
            if material.handle.id == key_id {
                material.uses += 1;
            }
        }
        self.audit_log.lock().push(AuditRecord {
            key_id,
            message_digest: Hash256::hash_bytes(message),
            at_millis: now,
        });
    }

    fn check_open(&self) -> Result<(), ProviderError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ProviderError::Rejected {
                provider: self.name.clone(),
                reason: "provider has been closed".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SigningProvider for EmergencyProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn sign(&self, key: &KeyHandle, message: &[u8]) -> Result<Vec<u8>, ProviderError> {
        self.check_open()?;
        let material = self.material_for_use();
        if material.handle.id != key.id {
            return Err(ProviderError::Rejected {
                provider: self.name.clone(),
                reason: format!("no key material for {}", key.id),
            });
        }
        let signature: Signature = material.keypair.sign(message);
        self.record_use(key.id, message);
        Ok(signature.to_bytes().to_vec())
    }

    async fn verify(
        &self,
        key: &KeyHandle,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, ProviderError> {
        self.check_open()?;
        let guard = self.material.lock();
        let material = guard.as_ref().filter(|m| m.handle.id == key.id).ok_or_else(|| {
            ProviderError::Rejected {
                provider: self.name.clone(),
                reason: format!("no key material for {}", key.id),
            }
        })?;
        let public: PublicKey = material.keypair.public;
        let signature = Signature::from_bytes(signature).map_err(|err| ProviderError::Rejected {
            provider: self.name.clone(),
            reason: format!("malformed signature: {err}"),
        })?;
        Ok(public.verify(message, &signature).is_ok())
    }

    async fn public_key(&self, key: &KeyHandle) -> Result<Vec<u8>, ProviderError> {
        self.check_open()?;
        let guard = self.material.lock();
        let material = guard.as_ref().filter(|m| m.handle.id == key.id).ok_or_else(|| {
            ProviderError::Rejected {
                provider: self.name.clone(),
                reason: format!("no key material for {}", key.id),
            }
        })?;
        Ok(material.keypair.public.to_bytes().to_vec())
    }

    async fn generate_key(
        &self,
        algorithm: SigningAlgorithm,
        _created_at: u64,
    ) -> Result<KeyHandle, ProviderError> {
        self.check_open()?;
        if !matches!(algorithm, SigningAlgorithm::Ed25519) {
            return Err(ProviderError::Rejected {
                provider: self.name.clone(),
                reason: "emergency provider only supports Ed25519".to_string(),
            });
        }
        Ok(self.material_for_use().handle)
    }

    async fn is_available(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<(), ProviderError> {
        self.closed.store(true, Ordering::Release);
        *self.material.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer_types::SigningAlgorithm;
    use std::time::Duration;

    #[tokio::test]
    async fn signs_with_a_key_it_generated() {
        let provider = SoftwareEd25519Provider::new("test");
        let key = provider
            .generate_key(SigningAlgorithm::Ed25519, 0)
            .await
            .unwrap();
        let sig = provider.sign(&key, b"hello").await.unwrap();
        assert_eq!(sig.len(), 64);
    }

    #[tokio::test]
    async fn rejects_unknown_key() {
        let provider = SoftwareEd25519Provider::new("test");
        let bogus = KeyHandle::new(SigningAlgorithm::Ed25519, 0, None);
        assert!(provider.sign(&bogus, b"hello").await.is_err());
    }

    #[tokio::test]
    async fn verify_matches_sign_and_rejects_tampering() {
        let provider = SoftwareEd25519Provider::new("test");
        let key = provider
            .generate_key(SigningAlgorithm::Ed25519, 0)
            .await
            .unwrap();
        let sig = provider.sign(&key, b"hello").await.unwrap();
        assert!(provider.verify(&key, b"hello", &sig).await.unwrap());
        assert!(!provider.verify(&key, b"goodbye", &sig).await.unwrap());
    }

    #[tokio::test]
    async fn public_key_round_trips_through_verify() {
        let provider = SoftwareEd25519Provider::new("test");
        let key = provider
            .generate_key(SigningAlgorithm::Ed25519, 0)
            .await
            .unwrap();
        let bytes = provider.public_key(&key).await.unwrap();
        let public = PublicKey::from_bytes(&bytes).unwrap();
        let sig_bytes = provider.sign(&key, b"hello").await.unwrap();
        let sig = Signature::from_bytes(&sig_bytes).unwrap();
        assert!(public.verify(b"hello", &sig).is_ok());
    }

    #[tokio::test]
    async fn closed_provider_rejects_every_operation() {
        let provider = SoftwareEd25519Provider::new("test");
        let key = provider
            .generate_key(SigningAlgorithm::Ed25519, 0)
            .await
            .unwrap();
        provider.close().await.unwrap();
        assert!(!provider.is_available().await);
        assert!(provider.sign(&key, b"hello").await.is_err());
    }

    #[tokio::test]
    async fn emergency_provider_regenerates_after_signature_budget() {
        let provider = EmergencyProvider::new("emergency", Clock::mock(), 2, 60_000);
        let first = provider
            .generate_key(SigningAlgorithm::Ed25519, 0)
            .await
            .unwrap();
        provider.sign(&first, b"a").await.unwrap();
        provider.sign(&first, b"b").await.unwrap();
        // Budget exhausted: the next use regenerates material under a new id.
        let second = provider
            .generate_key(SigningAlgorithm::Ed25519, 0)
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn emergency_provider_regenerates_after_lifetime_elapses() {
        let clock = Clock::mock();
        let provider = EmergencyProvider::new("emergency", clock.clone(), 1_000, 100);
        let first = provider
            .generate_key(SigningAlgorithm::Ed25519, 0)
            .await
            .unwrap();
        clock.advance_for_testing(Duration::from_millis(200));
        let second = provider
            .generate_key(SigningAlgorithm::Ed25519, 0)
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn every_sign_is_appended_to_the_audit_log() {
        let provider = EmergencyProvider::new("emergency", Clock::mock(), 1_000, 60_000);
        let key = provider
            .generate_key(SigningAlgorithm::Ed25519, 0)
            .await
            .unwrap();
        provider.sign(&key, b"hello").await.unwrap();
        provider.sign(&key, b"world").await.unwrap();
        let log = provider.audit_log();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|record| record.key_id == key.id));
    }
}
