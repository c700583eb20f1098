// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Running per-chain, per-token balances of outstanding amounts.
//!
//! Accumulation only ever adds, so it is associative and commutative and
//! chains can be processed in parallel with no ordering guarantees. Writes
//! are serialized by the internal mutex; amounts are arbitrary precision so
//! summing 256-bit on-chain values cannot overflow.

use ethers::types::{Address as EthAddress, U256};
use num_bigint::BigUint;
use parking_lot::Mutex;
use std::collections::BTreeMap;

pub fn u256_to_biguint(value: U256) -> BigUint {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    BigUint::from_bytes_be(&bytes)
}

#[derive(Debug, Default)]
pub struct DiscrepancyAggregator {
    balances: Mutex<BTreeMap<(u8, EthAddress), BigUint>>,
}

impl DiscrepancyAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to the balance for `(chain_id, token)`, creating the
    /// entry at zero if absent.
    pub fn accumulate(&self, chain_id: u8, token: EthAddress, amount: &BigUint) {
        let mut balances = self.balances.lock();
        let balance = balances.entry((chain_id, token)).or_default();
        *balance += amount;
    }

    pub fn accumulate_u256(&self, chain_id: u8, token: EthAddress, amount: U256) {
        self.accumulate(chain_id, token, &u256_to_biguint(amount));
    }

    /// An immutable copy of one chain's balances, for reporting.
    pub fn snapshot(&self, chain_id: u8) -> BTreeMap<EthAddress, BigUint> {
        self.balances
            .lock()
            .iter()
            .filter(|((chain, _), _)| *chain == chain_id)
            .map(|((_, token), balance)| (*token, balance.clone()))
            .collect()
    }
}
