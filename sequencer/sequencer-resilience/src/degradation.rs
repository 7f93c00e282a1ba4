// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use aptos_infallible::RwLock;
use aptos_metrics_core::{register_int_gauge, IntGauge};
use once_cell::sync::Lazy;

static DEGRADATION_LEVEL: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge(
        "sequencer_degradation_level",
        "Current operating mode: 0=Normal, 1=Degraded, 2=Emergency",
    )
});

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum DegradationLevel {
    Normal,
    Degraded,
    Emergency,
}

impl DegradationLevel {
    fn as_gauge_value(self) -> i64 {
        match self {
            DegradationLevel::Normal => 0,
            DegradationLevel::Degraded => 1,
            DegradationLevel::Emergency => 2,
        }
    }
}

/// Tracks the kernel's current operating mode so components that behave
/// differently under stress (the signing kernel's provider choice, the
/// queue's admission policy) can all read one shared signal instead of each
/// re-deriving it from breaker state.
pub struct DegradationController {
    level: RwLock<DegradationLevel>,
}

impl DegradationController {
    pub fn new() -> Self {
        DegradationController {
            level: RwLock::new(DegradationLevel::Normal),
        }
    }

    pub fn level(&self) -> DegradationLevel {
        *self.level.read()
    }

    /// Moves to `level` if it is more severe than the current one. No-op
    /// otherwise: a transient blip while already `Emergency` should not be
    /// reported as a fresh transition.
    pub fn escalate_to(&self, level: DegradationLevel) {
        let mut current = self.level.write();
        if level > *current {
            *current = level;
            DEGRADATION_LEVEL.set(level.as_gauge_value());
        }
    }

    /// Steps down exactly one level. Recovery is deliberately incremental:
    /// a single healthy probe after an `Emergency` incident moves the
    /// kernel to `Degraded`, not straight back to `Normal`.
    pub fn recover_one_step(&self) {
        let mut current = self.level.write();
        *current = match *current {
            DegradationLevel::Emergency => DegradationLevel::Degraded,
            DegradationLevel::Degraded => DegradationLevel::Normal,
            DegradationLevel::Normal => DegradationLevel::Normal,
        };
        DEGRADATION_LEVEL.set(current.as_gauge_value());
    }
}

impl Default for DegradationController {
    fn default() -> Self {
        Self::new()
    }
}
