// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! A standalone "retry a future a fixed number of times with linear backoff"
//! helper, used by bootstrap and admin-tool code paths that run once at startup
//! and have no circuit breaker to compose with. Request-path retries instead go
//! through `sequencer_resilience::retry`, which is breaker-aware.

use std::time::Duration;

pub async fn fixed_delay_retry<F, Fut, T, E>(
    attempts: usize,
    delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut last_err = None;
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                aptos_logger::warn!(
                    attempt,
                    attempts,
                    error = %err,
                    "retrier: attempt failed"
                );
                last_err = Some(err);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(last_err.expect("attempts is always >= 1"))
}
