// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Tracing one deposit to its destination-side proposal.

use crate::config::Chain;
use crate::data_hash::derive_data_hash;
use crate::error::{AuditError, AuditResult};
use crate::eth_client::LedgerReader;
use crate::types::{DepositEvent, TraceOutcome, TransferRecord};
use tracing::debug;

/// Derive the proposal key for one deposit and look the proposal up on the
/// destination chain.
///
/// A recipient that cannot be normalized is the single recoverable failure
/// and is returned as an outcome rather than an error, so one bad record
/// never aborts the batch. A proposal that was never created reads back as
/// the zero value, which the classifier interprets as missing.
pub async fn trace_deposit<L: LedgerReader>(
    origin_chain_id: u8,
    deposit: &DepositEvent,
    record: &TransferRecord,
    destination: &Chain,
    destination_ledger: &L,
) -> AuditResult<TraceOutcome> {
    let data_hash = match derive_data_hash(
        record.amount,
        &record.recipient,
        destination.handler_address,
    ) {
        Ok(data_hash) => data_hash,
        Err(AuditError::MalformedRecipient(detail)) => {
            return Ok(TraceOutcome::MalformedRecipient { detail });
        }
        Err(e) => return Err(e),
    };
    debug!(
        origin_chain_id,
        nonce = deposit.nonce,
        data_hash = ?data_hash,
        "tracing deposit"
    );
    let proposal = destination_ledger
        .proposal(
            destination.bridge_address,
            origin_chain_id,
            deposit.nonce,
            data_hash,
        )
        .await?;
    Ok(TraceOutcome::Traced {
        data_hash,
        proposal,
    })
}
