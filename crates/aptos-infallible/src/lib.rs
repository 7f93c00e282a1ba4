// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Thin wrappers around [`std::sync::Mutex`] and [`std::sync::RwLock`] that panic
//! on a poisoned lock instead of returning a `Result`. A poisoned lock means a
//! thread holding it panicked while mutating shared state; in the sequencer kernel
//! that state (Raft log, account map, Merkle tree) can never be trusted afterwards,
//! so carrying on with a `Result`-based API that callers are tempted to `unwrap()`
//! anyway buys nothing.

use std::sync::{self, TryLockError};

#[derive(Debug, Default)]
pub struct Mutex<T>(sync::Mutex<T>);

impl<T> Mutex<T> {
    pub fn new(t: T) -> Self {
        Self(sync::Mutex::new(t))
    }

    pub fn lock(&self) -> sync::MutexGuard<'_, T> {
        self.0.lock().expect("Mutex poisoned")
    }

    pub fn try_lock(&self) -> Option<sync::MutexGuard<'_, T>> {
        match self.0.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(_)) => panic!("Mutex poisoned"),
        }
    }

    pub fn into_inner(self) -> T {
        self.0.into_inner().expect("Mutex poisoned")
    }
}

#[derive(Debug, Default)]
pub struct RwLock<T>(sync::RwLock<T>);

impl<T> RwLock<T> {
    pub fn new(t: T) -> Self {
        Self(sync::RwLock::new(t))
    }

    pub fn read(&self) -> sync::RwLockReadGuard<'_, T> {
        self.0.read().expect("RwLock poisoned")
    }

    pub fn write(&self) -> sync::RwLockWriteGuard<'_, T> {
        self.0.write().expect("RwLock poisoned")
    }

    pub fn into_inner(self) -> T {
        self.0.into_inner().expect("RwLock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutex_roundtrip() {
        let m = Mutex::new(1);
        *m.lock() += 1;
        assert_eq!(*m.lock(), 2);
    }

    #[test]
    fn rwlock_roundtrip() {
        let l = RwLock::new(vec![1, 2, 3]);
        l.write().push(4);
        assert_eq!(l.read().len(), 4);
    }
}
