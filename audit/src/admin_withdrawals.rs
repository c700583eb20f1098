// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Extraction of manually executed admin withdrawals.
//!
//! Admin withdrawals bypass the deposit/proposal flow: an administrator
//! queues an `adminWithdraw` call through the multisig wallet's
//! `execTransaction`. They are recovered from the multisig's transaction
//! history and folded into the same per-chain balance map the classifier
//! debits, so both kinds of outflow share one accounting space.

use crate::aggregator::{u256_to_biguint, DiscrepancyAggregator};
use crate::config::Chain;
use crate::error::{AuditError, AuditResult};
use ethers::abi::{parse_abi, Abi, Token};
use ethers::types::{Address as EthAddress, U256};
use num_bigint::BigUint;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use tracing::{debug, info};

static MULTISIG_ABI: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "function execTransaction(address to, uint256 value, bytes data, uint8 operation, uint256 safeTxGas, uint256 baseGas, uint256 gasPrice, address gasToken, address refundReceiver, bytes signatures) returns (bool)",
    ])
    .expect("multisig abi parses")
});

static ADMIN_WITHDRAW_ABI: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "function adminWithdraw(address handlerAddress, address tokenAddress, address recipient, uint256 amountOrTokenID)",
    ])
    .expect("admin withdraw abi parses")
});

/// Decode a batch of raw transaction inputs, keeping only multisig
/// `execTransaction` calls whose nested payload is an `adminWithdraw`, and
/// sum the withdrawn amount per token.
///
/// Anything that does not decode cleanly is ignored: the multisig's history
/// contains arbitrary unrelated calls.
pub fn decode_admin_withdrawals<I>(inputs: I) -> BTreeMap<EthAddress, BigUint>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    let exec = &MULTISIG_ABI.functions["execTransaction"][0];
    let admin = &ADMIN_WITHDRAW_ABI.functions["adminWithdraw"][0];
    let exec_selector = exec.short_signature();
    let admin_selector = admin.short_signature();

    let mut withdrawals: BTreeMap<EthAddress, BigUint> = BTreeMap::new();
    for input in inputs {
        if input.len() < 4 || input[..4] != exec_selector {
            continue;
        }
        let Ok(exec_tokens) = exec.decode_input(&input[4..]) else {
            debug!("skipping undecodable execTransaction payload");
            continue;
        };
        let Some(data) = exec_tokens.into_iter().nth(2).and_then(Token::into_bytes) else {
            continue;
        };
        if data.len() < 4 || data[..4] != admin_selector {
            continue;
        }
        let Ok(admin_tokens) = admin.decode_input(&data[4..]) else {
            debug!("skipping undecodable adminWithdraw payload");
            continue;
        };
        let mut admin_tokens = admin_tokens.into_iter();
        let token_address = admin_tokens.nth(1).and_then(Token::into_address);
        let amount = admin_tokens.nth(1).and_then(Token::into_uint);
        let (Some(token_address), Some(amount)) = (token_address, amount) else {
            continue;
        };
        *withdrawals.entry(token_address).or_default() += u256_to_biguint(amount);
    }
    withdrawals
}

/// Fold summed withdrawals into the shared balance map.
pub fn fold_into(
    aggregator: &DiscrepancyAggregator,
    chain_id: u8,
    withdrawals: &BTreeMap<EthAddress, BigUint>,
) {
    for (token, amount) in withdrawals {
        aggregator.accumulate(chain_id, *token, amount);
    }
}

/// Fetches multisig transaction history from an etherscan-compatible
/// account/txlist API and runs the decoder over it.
pub struct AdminWithdrawalClient {
    http: reqwest::Client,
}

impl AdminWithdrawalClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// All admin withdrawals for one chain, summed per token. Chains with no
    /// multisig or transaction-list API configured yield an empty map.
    pub async fn fetch_withdrawals(
        &self,
        chain: &Chain,
    ) -> AuditResult<BTreeMap<EthAddress, BigUint>> {
        let (Some(multisig), Some(api_url)) =
            (chain.multisig_address, chain.tx_list_api_url.as_deref())
        else {
            debug!(chain = %chain.name, "no multisig configured, skipping admin withdrawal scan");
            return Ok(BTreeMap::new());
        };
        let mut url = format!(
            "{api_url}?module=account&action=txlist&address={multisig:?}&startblock=0&endblock=999999999&sort=asc"
        );
        if let Some(key) = &chain.tx_list_api_key {
            url.push_str(&format!("&apikey={key}"));
        }
        info!(chain = %chain.name, "fetching multisig transactions");
        let response: serde_json::Value = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?;
        let transactions = response
            .get("result")
            .and_then(|result| result.as_array())
            .ok_or_else(|| {
                AuditError::LedgerQueryFailed(format!(
                    "unexpected transaction list response: {response}"
                ))
            })?;
        let inputs = transactions.iter().filter_map(|tx| {
            let input = tx.get("input")?.as_str()?;
            hex::decode(input.strip_prefix("0x").unwrap_or(input)).ok()
        });
        let withdrawals = decode_admin_withdrawals(inputs);
        info!(
            chain = %chain.name,
            tokens = withdrawals.len(),
            "extracted admin withdrawals"
        );
        Ok(withdrawals)
    }
}

impl Default for AdminWithdrawalClient {
    fn default() -> Self {
        Self::new()
    }
}
