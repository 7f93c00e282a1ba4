// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::transaction::AssetId;
use ethnum::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An account's balance of one asset, plus the nonce that orders its
/// transactions and the timestamp of the last transaction applied to it. A
/// `BTreeMap` keeps the encoding deterministic across nodes, which matters
/// because this struct is hashed into the state tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub balances: BTreeMap<AssetId, U256>,
    pub nonce: u64,
    pub last_updated: u64,
}

impl AccountState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, asset: &AssetId) -> U256 {
        self.balances.get(asset).copied().unwrap_or(U256::ZERO)
    }

    pub fn credit(&mut self, asset: AssetId, amount: U256, now: u64) {
        let entry = self.balances.entry(asset).or_insert(U256::ZERO);
        *entry += amount;
        self.last_updated = now;
    }

    /// Returns `false` without mutating state if the account does not hold
    /// enough of `asset`; the caller treats this as a rejected transaction
    /// rather than a hard error.
    pub fn debit(&mut self, asset: AssetId, amount: U256, now: u64) -> bool {
        let entry = self.balances.entry(asset).or_insert(U256::ZERO);
        if *entry < amount {
            return false;
        }
        *entry -= amount;
        self.last_updated = now;
        true
    }

    /// The next nonce this account is expected to use, per the transaction
    /// invariant that `nonce` is "the next unused value for sender at time
    /// of apply".
    pub fn expected_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn advance_nonce(&mut self) {
        self.nonce += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_fails_on_insufficient_balance() {
        let mut account = AccountState::new();
        let asset = AssetId([1; 32]);
        account.credit(asset, U256::from(10u64), 1);
        assert!(!account.debit(asset, U256::from(11u64), 2));
        assert_eq!(account.balance_of(&asset), U256::from(10u64));
    }

    #[test]
    fn credit_then_debit_nets_to_zero() {
        let mut account = AccountState::new();
        let asset = AssetId([1; 32]);
        account.credit(asset, U256::from(10u64), 1);
        assert!(account.debit(asset, U256::from(10u64), 2));
        assert_eq!(account.balance_of(&asset), U256::ZERO);
        assert_eq!(account.last_updated, 2);
    }
}
