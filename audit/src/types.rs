// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core data model: deposit events and transfer records read from the origin
//! chain, proposals read from the destination chain, and the discrepancy
//! verdicts the classifier produces from them.

use crate::error::{AuditError, AuditResult};
use ethers::types::{Address as EthAddress, H256, U256};
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Lifecycle of a transfer proposal on the destination bridge contract.
///
/// The numeric values are the contract's own status encoding; a proposal that
/// was never created reads back as the zero value (`Inactive`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, Display, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum ProposalStatus {
    Inactive = 0,
    Active = 1,
    Passed = 2,
    Executed = 3,
    Cancelled = 4,
}

impl ProposalStatus {
    pub fn from_status_byte(byte: u8) -> AuditResult<Self> {
        Self::try_from(byte).map_err(|_| AuditError::UnknownProposalStatus(byte))
    }
}

/// One `Deposit` event emitted by an origin chain's bridge contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositEvent {
    pub destination_chain_id: u8,
    pub resource_id: H256,
    /// Per-route deposit nonce, monotonically increasing on the origin chain.
    pub nonce: u64,
    pub block_number: u64,
    pub tx_hash: H256,
}

/// Transfer detail stored by the origin chain's handler contract, keyed by
/// (destination chain id, deposit nonce). Exactly one record exists per
/// deposit event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub token_address: EthAddress,
    pub destination_chain_id: u8,
    pub resource_id: H256,
    /// Destination recipient in its on-the-wire hex form. Kept as a string
    /// because the proposal key derivation must normalize it itself and
    /// reject values that do not decode to whole bytes.
    pub recipient: String,
    pub depositor: EthAddress,
    pub amount: U256,
}

/// Destination-chain record for (origin chain id, nonce, data hash).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proposal {
    pub status: ProposalStatus,
    pub proposed_block: u64,
}

impl Proposal {
    /// The value an absent proposal reads back as. Absence is meaningful to
    /// the classifier, so ledger lookups never error on a missing key.
    pub fn absent() -> Self {
        Self {
            status: ProposalStatus::Inactive,
            proposed_block: 0,
        }
    }
}

/// Result of tracing one deposit to its destination-side proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceOutcome {
    Traced { data_hash: H256, proposal: Proposal },
    /// The single recoverable per-deposit failure: the recipient stored in
    /// the transfer record cannot be normalized to whole bytes, so no
    /// proposal key can exist for it.
    MalformedRecipient { detail: String },
}

/// Why a deposit's amount is counted as outstanding.
///
/// `Stuck` and `Expired` flag proposals pending operator investigation; only
/// `NotFound` and `Cancelled` describe transfers that will never execute as
/// proposed. Consumers must keep the kinds apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum DiscrepancyKind {
    NotFound,
    Expired,
    Stuck,
    Cancelled,
}

impl DiscrepancyKind {
    /// Bracketed tag used in the operator log.
    pub fn tag(&self) -> &'static str {
        match self {
            DiscrepancyKind::NotFound => "[NOT FOUND]",
            DiscrepancyKind::Expired => "[EXPIRED]",
            DiscrepancyKind::Stuck => "[STUCK]",
            DiscrepancyKind::Cancelled => "[CANCELLED]",
        }
    }
}

/// A single outstanding amount attributed to one deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    pub token_address: EthAddress,
    pub amount: U256,
}

/// ERC-20 metadata, fetched lazily once per (chain, token) and cached for
/// the duration of a run. Display only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMeta {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}
