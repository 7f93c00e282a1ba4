// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! A mockable time source.
//!
//! Every ordering decision in the sequencer kernel (election timeouts, retry
//! backoff, rotation schedules) must read monotonic time, never wall time: wall
//! clocks can jump backwards under NTP correction and would let two nodes
//! disagree about which entry is newer. [`TimeService`] exposes both because wall
//! time is still needed for persisted, human-facing timestamps, but callers doing
//! ordering should reach for [`TimeService::now`].

use aptos_infallible::Mutex;
use enum_dispatch::enum_dispatch;
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

#[cfg(feature = "async")]
pub mod clock;
#[cfg(feature = "async")]
pub use clock::{Sleep, SleepTrait, TimerTrait};

/// Monotonic nanosecond timestamp since an unspecified, per-process epoch. Only
/// valid for comparison with other [`Instant`]s from the same process.
pub type Instant = std::time::Instant;

#[enum_dispatch]
pub trait TimeServiceTrait: Send + Sync {
    /// Monotonic instant suitable for measuring elapsed durations and for all
    /// ordering decisions (election timeouts, breaker windows, rotation timers).
    fn now(&self) -> Instant;

    /// Wall-clock milliseconds since the Unix epoch. Persisted on records for
    /// human-facing display; never used to order events.
    fn now_unix_time(&self) -> Duration;

    #[cfg(feature = "async")]
    fn sleep(&self, duration: Duration) -> clock::Sleep;
}

#[enum_dispatch(TimeServiceTrait)]
#[derive(Clone)]
pub enum TimeService {
    Real(RealTimeService),
    Mock(MockTimeService),
}

impl TimeService {
    pub fn real() -> Self {
        Self::Real(RealTimeService)
    }

    pub fn mock() -> Self {
        Self::Mock(MockTimeService::new())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RealTimeService;

impl TimeServiceTrait for RealTimeService {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_unix_time(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the Unix epoch")
    }

    #[cfg(feature = "async")]
    fn sleep(&self, duration: Duration) -> clock::Sleep {
        clock::Sleep::Real(tokio::time::sleep(duration))
    }
}

/// A manually advanceable clock for deterministic tests: election timeouts,
/// rotation windows and backoff schedules can be driven forward instantly
/// instead of a test sleeping in real time.
#[derive(Clone)]
pub struct MockTimeService {
    inner: Arc<Mutex<MockState>>,
}

struct MockState {
    epoch: Instant,
    elapsed: Duration,
    unix_origin: Duration,
}

impl MockTimeService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                epoch: Instant::now(),
                elapsed: Duration::ZERO,
                unix_origin: Duration::from_secs(1_700_000_000),
            })),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.inner.lock().elapsed += duration;
    }
}

impl Default for MockTimeService {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeServiceTrait for MockTimeService {
    fn now(&self) -> Instant {
        let state = self.inner.lock();
        state.epoch + state.elapsed
    }

    fn now_unix_time(&self) -> Duration {
        let state = self.inner.lock();
        state.unix_origin + state.elapsed
    }

    #[cfg(feature = "async")]
    fn sleep(&self, duration: Duration) -> clock::Sleep {
        self.advance(duration);
        clock::Sleep::Mock
    }
}
