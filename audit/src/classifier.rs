// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pure mapping from a proposal's state to a discrepancy verdict.
//!
//! Every status maps to exactly one outcome; `Executed` is the only terminal
//! healthy state and a pending `Active` proposal inside its expiry window is
//! the only other case that produces no verdict.

use crate::types::{Discrepancy, DiscrepancyKind, Proposal, ProposalStatus, TransferRecord};

/// Classify one proposal at chain head height `current_block`.
///
/// The expiry boundary is exclusive: a proposal whose age equals `expiry`
/// exactly is still pending.
pub fn classify(
    status: ProposalStatus,
    proposed_block: u64,
    current_block: u64,
    expiry: u64,
) -> Option<DiscrepancyKind> {
    match status {
        ProposalStatus::Inactive => Some(DiscrepancyKind::NotFound),
        ProposalStatus::Active => {
            if current_block.saturating_sub(proposed_block) > expiry {
                Some(DiscrepancyKind::Expired)
            } else {
                None
            }
        }
        ProposalStatus::Passed => Some(DiscrepancyKind::Stuck),
        ProposalStatus::Executed => None,
        ProposalStatus::Cancelled => Some(DiscrepancyKind::Cancelled),
    }
}

/// Classify a traced proposal and attach the amount to debit.
pub fn classify_trace(
    proposal: Proposal,
    record: &TransferRecord,
    current_block: u64,
    expiry: u64,
) -> Option<Discrepancy> {
    classify(proposal.status, proposal.proposed_block, current_block, expiry).map(|kind| {
        Discrepancy {
            kind,
            token_address: record.token_address,
            amount: record.amount,
        }
    })
}
