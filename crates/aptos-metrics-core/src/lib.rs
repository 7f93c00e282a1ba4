// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shortcuts for registering [`prometheus`] collectors against the default
//! registry, so components declare a metric in one line instead of the usual
//! builder dance.

pub use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, Histogram,
    HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};

/// Registers an [`IntCounter`] with no labels, panicking on duplicate
/// registration — a duplicate metric name is a programming error, not a
/// runtime condition to recover from.
pub fn register_int_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("invalid metric name or help");
    prometheus::register(Box::new(counter.clone())).expect("duplicate metric registration");
    counter
}

pub fn register_int_gauge(name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::new(name, help).expect("invalid metric name or help");
    prometheus::register(Box::new(gauge.clone())).expect("duplicate metric registration");
    gauge
}

#[macro_export]
macro_rules! op_counters {
    ($name:ident, $help:expr) => {
        pub static $name: ::once_cell::sync::Lazy<$crate::IntCounter> =
            ::once_cell::sync::Lazy::new(|| $crate::register_int_counter(stringify!($name), $help));
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_registers_and_increments() {
        let c = register_int_counter("sequencer_test_counter_total", "test counter");
        c.inc();
        assert_eq!(c.get(), 1);
    }
}
