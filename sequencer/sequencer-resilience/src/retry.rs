// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::breaker::CircuitBreaker;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    #[error("circuit breaker is open")]
    BreakerOpen,
    #[error(transparent)]
    Operation(E),
}

/// Retries `op` up to `attempts` times with a fixed delay between tries,
/// consulting `breaker` before every attempt and feeding it the outcome
/// afterward. Unlike `aptos_retrier::fixed_delay_retry`, a tripped breaker
/// short-circuits immediately rather than spending the full retry budget
/// hammering a dependency that is already known to be down.
pub async fn call_with_breaker<F, Fut, T, E>(
    breaker: &CircuitBreaker,
    attempts: usize,
    delay: Duration,
    mut op: F,
) -> Result<T, ResilienceError<E>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut last_err = None;
    for attempt in 1..=attempts {
        if !breaker.allow_request() {
            return Err(ResilienceError::BreakerOpen);
        }
        match op().await {
            Ok(value) => {
                breaker.record_success();
                return Ok(value);
            }
            Err(err) => {
                breaker.record_failure();
                aptos_logger::warn!(
                    attempt,
                    attempts,
                    error = %err,
                    "resilience: breaker-guarded attempt failed"
                );
                last_err = Some(err);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(ResilienceError::Operation(
        last_err.expect("attempts is always >= 1"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer_clock::Clock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn succeeds_without_tripping_breaker() {
        let breaker = CircuitBreaker::new(3, Duration::from_millis(10), Clock::mock());
        let result: Result<u32, ResilienceError<&str>> =
            call_with_breaker(&breaker, 3, Duration::from_millis(1), || async { Ok(42) }).await;
        assert!(matches!(result, Ok(42)));
        assert_eq!(breaker.state(), crate::breaker::CircuitState::Closed);
    }

    #[tokio::test]
    async fn short_circuits_once_breaker_is_open() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60), Clock::mock());
        breaker.record_failure();
        let calls = AtomicUsize::new(0);
        let result: Result<u32, ResilienceError<&str>> =
            call_with_breaker(&breaker, 5, Duration::from_millis(1), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down") }
            })
            .await;
        assert!(matches!(result, Err(ResilienceError::BreakerOpen)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
