// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use aptos_infallible::Mutex;
use sequencer_clock::Clock;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CircuitState {
    /// Requests pass through normally; failures are counted.
    Closed,
    /// Requests are rejected outright without calling through.
    Open,
    /// One trial request is allowed through to test recovery.
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u64,
    opened_at: Option<Instant>,
    half_open_trial_in_flight: bool,
}

/// A breaker guarding one downstream dependency (an L1 RPC endpoint, an HSM
/// provider, a peer connection). Opens after `failure_threshold` consecutive
/// failures and stays open for `reset_timeout` before allowing a single
/// half-open trial through; a successful trial closes it, a failed one
/// reopens it for another full timeout.
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    failure_threshold: u64,
    reset_timeout: Duration,
    clock: Clock,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u64, reset_timeout: Duration, clock: Clock) -> Self {
        CircuitBreaker {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                half_open_trial_in_flight: false,
            }),
            failure_threshold,
            reset_timeout,
            clock,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Whether a caller may proceed right now. Transitions `Open` to
    /// `HalfOpen` on the first call after `reset_timeout` has elapsed, and
    /// admits exactly one trial request per half-open window.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                if inner.half_open_trial_in_flight {
                    false
                } else {
                    inner.half_open_trial_in_flight = true;
                    true
                }
            }
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.reset_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_trial_in_flight = true;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = 0;
        inner.half_open_trial_in_flight = false;
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.half_open_trial_in_flight = false;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}
