// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Audit-specific errors.
///
/// None of these abort a whole run: a malformed recipient skips one deposit,
/// a ledger query failure is retried and then excluded from the balances, and
/// a bad chain configuration fails only that chain.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("malformed recipient address: {0}")]
    MalformedRecipient(String),

    #[error("ledger query failed: {0}")]
    LedgerQueryFailed(String),

    #[error("ledger returned unknown proposal status byte: {0}")]
    UnknownProposalStatus(u8),

    #[error("invalid chain configuration: {0}")]
    InvalidChainConfig(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AuditError {
    /// Short label used when tagging skipped deposits in the operator log.
    pub fn label(&self) -> &'static str {
        match self {
            AuditError::MalformedRecipient(_) => "malformed_recipient",
            AuditError::LedgerQueryFailed(_) => "ledger_query_failed",
            AuditError::UnknownProposalStatus(_) => "unknown_proposal_status",
            AuditError::InvalidChainConfig(_) => "invalid_chain_config",
            AuditError::Other(_) => "other",
        }
    }
}

pub type AuditResult<T> = std::result::Result<T, AuditError>;
