// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! The kernel's single source of time, identifiers, and content hashing
//! (component A). Every other component reaches through here instead of
//! calling `SystemTime::now()`, `Uuid::new_v4()`, or `sha2` directly, so a
//! test can swap in a deterministic clock and still get deterministic task
//! ids and hashes.

use aptos_id_generator::{IdGenerator, U64IdGenerator};
use aptos_time_service::{TimeService, TimeServiceTrait};
use sequencer_types::Hash256;
use short_hex_str::ShortHexStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[cfg(feature = "async")]
pub use aptos_time_service::Sleep;

/// A stable, loggable identifier for one unit of work (a batch build, a
/// dispatch cycle, an HSM call) that survives being printed across multiple
/// log lines without the full cost of a UUID. Derived from a process-local
/// counter combined with the node's random session tag, so ids are unique
/// within a process lifetime but never need coordination to allocate.
pub type TaskId = ShortHexStr;

/// Wraps a [`TimeService`] with the id-generation and hashing helpers every
/// component needs, so `sequencer-clock` is the one crate with an opinion on
/// "what time is it" and "what do we call this piece of work".
#[derive(Clone)]
pub struct Clock {
    time: TimeService,
    task_ids: Arc<U64IdGenerator>,
    session_tag: [u8; 8],
}

impl Clock {
    pub fn real() -> Self {
        Self::new(TimeService::real())
    }

    pub fn mock() -> Self {
        Self::new(TimeService::mock())
    }

    /// Advances a mock clock by `duration` without waiting in real time.
    /// Panics on a real clock; only meaningful for [`Self::mock`].
    pub fn advance_for_testing(&self, duration: Duration) {
        match &self.time {
            TimeService::Mock(mock) => mock.advance(duration),
            TimeService::Real(_) => panic!("advance_for_testing called on a real clock"),
        }
    }

    fn new(time: TimeService) -> Self {
        let session = Uuid::new_v4();
        let mut session_tag = [0u8; 8];
        session_tag.copy_from_slice(&session.as_bytes()[..8]);
        Clock {
            time,
            task_ids: Arc::new(U64IdGenerator::new()),
            session_tag,
        }
    }

    pub fn time_service(&self) -> &TimeService {
        &self.time
    }

    pub fn now_unix_millis(&self) -> u64 {
        self.time.now_unix_time().as_millis() as u64
    }

    #[cfg(feature = "async")]
    pub fn sleep(&self, duration: Duration) -> Sleep {
        self.time.sleep(duration)
    }

    pub fn new_node_id(&self) -> sequencer_types::NodeId {
        sequencer_types::NodeId::new()
    }

    /// A new `TaskId`, unique for the lifetime of this process: the hash of
    /// this clock's session tag and a monotonically increasing counter,
    /// truncated to the short hex representation used in log lines.
    pub fn new_task_id(&self) -> TaskId {
        let counter = self.task_ids.next();
        let mut buf = Vec::with_capacity(16);
        buf.extend_from_slice(&self.session_tag);
        buf.extend_from_slice(&counter.to_be_bytes());
        let digest = Hash256::hash_bytes(&buf);
        ShortHexStr::try_from_bytes(digest.as_bytes()).expect("sha256 digest is always 32 bytes")
    }

    /// Hashes arbitrary bytes with the same SHA-256 primitive every content
    /// hash in the kernel is built on, so callers never reach for `sha2`
    /// themselves.
    pub fn content_hash(&self, bytes: &[u8]) -> Hash256 {
        Hash256::hash_bytes(bytes)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::real()
    }
}
