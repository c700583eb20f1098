// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Human-readable rendering of accumulated balances. Formatting divides the
//! raw integer by 10^decimals as a decimal string; no floating point touches
//! an on-chain amount.

use crate::types::TokenMeta;
use ethers::types::Address as EthAddress;
use num_bigint::BigUint;
use serde::Serialize;
use std::collections::BTreeMap;

/// Render a raw token amount with the given number of decimal places.
///
/// The fractional part keeps at least one digit, so whole amounts read as
/// "10.0" rather than "10".
pub fn format_token_amount(value: &BigUint, decimals: u8) -> String {
    let digits = value.to_string();
    if decimals == 0 {
        return digits;
    }
    let decimals = decimals as usize;
    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };
    let split = padded.len() - decimals;
    let integer = &padded[..split];
    let fraction = padded[split..].trim_end_matches('0');
    if fraction.is_empty() {
        format!("{integer}.0")
    } else {
        format!("{integer}.{fraction}")
    }
}

/// One chain's slice of the final report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    /// Outstanding user deposit amounts, keyed by token name.
    pub user_deposits: BTreeMap<String, String>,
    /// Manually executed admin withdrawals, keyed by token name.
    pub admin_withdrawals: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub chains: BTreeMap<u8, ChainReport>,
}

/// Insert a formatted balance under the token's display name. Two distinct
/// contracts can share a name; the later one keeps its address as a
/// disambiguator instead of silently overwriting the first.
pub fn insert_formatted(
    section: &mut BTreeMap<String, String>,
    meta: &TokenMeta,
    token: EthAddress,
    balance: &BigUint,
) {
    let formatted = format_token_amount(balance, meta.decimals);
    if section.contains_key(&meta.name) {
        section.insert(format!("{} ({:?})", meta.name, token), formatted);
    } else {
        section.insert(meta.name.clone(), formatted);
    }
}
