// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! The recovery supervisor (component I): a set of failure detectors, each
//! paired with an ordered list of recovery strategies to try when that
//! detector reports trouble. Escalates the shared [`DegradationController`]
//! when every strategy for a failure is exhausted, and steps it back down
//! once health is restored.

use async_trait::async_trait;
use sequencer_clock::Clock;
use sequencer_resilience::{DegradationController, DegradationLevel};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HealthSignal {
    Healthy,
    Degraded { reason: String },
    Failed { reason: String },
}

pub trait FailureDetector: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self) -> HealthSignal;
}

#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    fn name(&self) -> &str;
    async fn attempt(&self) -> anyhow::Result<()>;
}

/// One detector and the strategies to try, in order, when it reports
/// trouble. Strategies are tried until one succeeds; if all fail, the
/// supervisor escalates degradation and waits for the next poll.
pub struct Watch {
    pub detector: Arc<dyn FailureDetector>,
    pub strategies: Vec<Arc<dyn RecoveryStrategy>>,
}

pub struct RecoverySupervisor {
    watches: Vec<Watch>,
    degradation: Arc<DegradationController>,
    clock: Clock,
}

impl RecoverySupervisor {
    pub fn new(watches: Vec<Watch>, degradation: Arc<DegradationController>, clock: Clock) -> Self {
        RecoverySupervisor {
            watches,
            degradation,
            clock,
        }
    }

    /// Runs one detection-and-recovery pass over every registered watch.
    /// Returns the health signal observed for each detector, after any
    /// recovery attempt that pass triggered.
    pub async fn run_once(&self) -> Vec<(String, HealthSignal)> {
        let mut results = Vec::with_capacity(self.watches.len());
        for watch in &self.watches {
            let signal = watch.detector.check();
            match &signal {
                HealthSignal::Healthy => {
                    self.degradation.recover_one_step();
                }
                HealthSignal::Degraded { reason } => {
                    aptos_logger::warn!(
                        detector = watch.detector.name(),
                        reason,
                        "recovery: detector reports degraded health"
                    );
                    self.degradation.escalate_to(DegradationLevel::Degraded);
                }
                HealthSignal::Failed { reason } => {
                    aptos_logger::error!(
                        detector = watch.detector.name(),
                        reason,
                        "recovery: detector reports failure, attempting recovery strategies"
                    );
                    let recovered = self.try_strategies(watch).await;
                    if !recovered {
                        self.degradation.escalate_to(DegradationLevel::Emergency);
                    }
                }
            }
            results.push((watch.detector.name().to_string(), signal));
        }
        results
    }

    async fn try_strategies(&self, watch: &Watch) -> bool {
        for strategy in &watch.strategies {
            match strategy.attempt().await {
                Ok(()) => {
                    aptos_logger::info!(
                        detector = watch.detector.name(),
                        strategy = strategy.name(),
                        "recovery: strategy succeeded"
                    );
                    return true;
                }
                Err(err) => {
                    aptos_logger::warn!(
                        detector = watch.detector.name(),
                        strategy = strategy.name(),
                        error = %err,
                        "recovery: strategy failed, trying the next one"
                    );
                }
            }
        }
        false
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct ScriptedDetector {
        failed: AtomicBool,
    }

    impl FailureDetector for ScriptedDetector {
        fn name(&self) -> &str {
            "scripted"
        }

        fn check(&self) -> HealthSignal {
            if self.failed.load(Ordering::SeqCst) {
                HealthSignal::Failed {
                    reason: "scripted failure".to_string(),
                }
            } else {
                HealthSignal::Healthy
            }
        }
    }

    struct CountingStrategy {
        calls: AtomicUsize,
        succeeds: bool,
    }

    #[async_trait]
    impl RecoveryStrategy for CountingStrategy {
        fn name(&self) -> &str {
            "counting"
        }

        async fn attempt(&self) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeeds {
                Ok(())
            } else {
                Err(anyhow::anyhow!("strategy declined to recover"))
            }
        }
    }

    #[tokio::test]
    async fn successful_strategy_avoids_escalation() {
        let detector = Arc::new(ScriptedDetector {
            failed: AtomicBool::new(true),
        });
        let strategy = Arc::new(CountingStrategy {
            calls: AtomicUsize::new(0),
            succeeds: true,
        });
        let degradation = Arc::new(DegradationController::new());
        let supervisor = RecoverySupervisor::new(
            vec![Watch {
                detector,
                strategies: vec![strategy.clone()],
            }],
            degradation.clone(),
            Clock::mock(),
        );

        supervisor.run_once().await;
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 1);
        assert_eq!(degradation.level(), DegradationLevel::Normal);
    }

    #[tokio::test]
    async fn exhausted_strategies_escalate_to_emergency() {
        let detector = Arc::new(ScriptedDetector {
            failed: AtomicBool::new(true),
        });
        let strategy = Arc::new(CountingStrategy {
            calls: AtomicUsize::new(0),
            succeeds: false,
        });
        let degradation = Arc::new(DegradationController::new());
        let supervisor = RecoverySupervisor::new(
            vec![Watch {
                detector,
                strategies: vec![strategy],
            }],
            degradation.clone(),
            Clock::mock(),
        );

        supervisor.run_once().await;
        assert_eq!(degradation.level(), DegradationLevel::Emergency);
    }
}
