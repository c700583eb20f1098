// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Total value deposited: sums every deposit per token on one chain,
//! regardless of what happened to it on the destination side.

use crate::error::{AuditError, AuditResult};
use crate::eth_client::LedgerReader;
use crate::reconcile::ChainHandle;
use crate::retry_with_max_elapsed_time;
use ethers::types::Address as EthAddress;
use num_bigint::BigUint;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

const RPC_RETRY_BUDGET: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenTotals {
    pub deposit_count: u64,
    pub total: BigUint,
}

/// Sum all deposits per token. Deposits whose resource id is not registered
/// to the configured handler belong to another asset class and are skipped.
/// `progress` is called once per deposit with (processed, total).
pub async fn collect_deposit_totals<L, F>(
    handle: &ChainHandle<L>,
    progress: F,
) -> AuditResult<BTreeMap<EthAddress, TokenTotals>>
where
    L: LedgerReader,
    F: Fn(usize, usize),
{
    let chain = &handle.chain;
    let Ok(Ok(deposits)) = retry_with_max_elapsed_time!(
        handle
            .ledger
            .deposit_events(chain.bridge_address, chain.from_block),
        RPC_RETRY_BUDGET
    ) else {
        return Err(AuditError::LedgerQueryFailed(format!(
            "could not fetch deposit events for chain {}",
            chain.chain_id
        )));
    };
    info!(chain = %chain.name, deposits = deposits.len(), "summing deposits");

    let mut totals: BTreeMap<EthAddress, TokenTotals> = BTreeMap::new();
    let deposit_count = deposits.len();
    for (index, deposit) in deposits.iter().enumerate() {
        progress(index + 1, deposit_count);
        let handler = handle
            .ledger
            .handler_for_resource(chain.bridge_address, deposit.resource_id)
            .await?;
        if handler != chain.handler_address {
            continue;
        }
        let record = handle
            .ledger
            .transfer_record(
                chain.handler_address,
                deposit.destination_chain_id,
                deposit.nonce,
            )
            .await?;
        let entry = totals.entry(record.token_address).or_default();
        entry.deposit_count += 1;
        entry.total += crate::aggregator::u256_to_biguint(record.amount);
    }
    Ok(totals)
}
