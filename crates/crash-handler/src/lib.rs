// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! A panic hook that logs the panic message and a backtrace through the
//! structured logger before the default hook prints to stderr, so a panic in a
//! spawned task surfaces in the same log sink as everything else, then aborts
//! the process. The cryptographic core and the state machine are not safe to
//! keep running past a panic (§4.B: "Hash function failure is fatal").

use std::panic;

pub fn setup_panic_handler() {
    panic::set_hook(Box::new(|info| {
        let backtrace = backtrace::Backtrace::new();
        aptos_logger::error!(
            panic = %info,
            backtrace = ?backtrace,
            "fatal: unhandled panic, aborting process"
        );
        std::process::abort();
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_does_not_panic() {
        setup_panic_handler();
    }
}
