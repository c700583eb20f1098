// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Append-only operator log. Every flagged or skipped deposit is written as
//! a tagged block with the origin explorer link and the exact proposal query
//! parameters, so an operator can re-run the query by hand. These lines are
//! for triage, not machine parsing.

use crate::config::Chain;
use crate::types::{DepositEvent, DiscrepancyKind, TransferRecord};
use ethers::types::H256;
use parking_lot::Mutex;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, warn};

pub struct DiscrepancyLog {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl DiscrepancyLog {
    /// Open a fresh timestamped log file under `dir`, creating the directory
    /// if needed.
    pub fn to_dir(dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = dir.join(format!("bridge-audit-{stamp}.log"));
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Mutex::new(Box::new(writer)),
        }
    }

    /// A log that drops everything. Useful when only the report is wanted.
    pub fn discard() -> Self {
        Self::from_writer(std::io::sink())
    }

    pub fn record_discrepancy(
        &self,
        kind: DiscrepancyKind,
        origin: &Chain,
        deposit: &DepositEvent,
        record: &TransferRecord,
        data_hash: H256,
    ) {
        let headline = match kind {
            DiscrepancyKind::NotFound => {
                "A deposit had no corresponding proposal on the destination chain."
            }
            DiscrepancyKind::Expired => {
                "An active proposal passed its expiry window without being executed."
            }
            DiscrepancyKind::Stuck => {
                "A proposal that met the voting threshold has not been executed."
            }
            DiscrepancyKind::Cancelled => "A proposal has been cancelled.",
        };
        warn!(
            chain = %origin.name,
            nonce = deposit.nonce,
            kind = %kind,
            "flagged deposit"
        );
        self.write_block(&format!(
            "{} - {}\nDeposit tx: {}\nResourceId: {:?}\nProposal query: origin-id: {} deposit-nonce: {} data-hash: {:?}\nAmount: {} token: {:?}",
            kind.tag(),
            headline,
            origin.explorer_tx_url(deposit.tx_hash),
            record.resource_id,
            origin.chain_id,
            deposit.nonce,
            data_hash,
            record.amount,
            record.token_address,
        ));
    }

    /// A deposit excluded from the balances, with the reason.
    pub fn record_skipped(&self, origin: &Chain, deposit: &DepositEvent, reason: &str) {
        warn!(
            chain = %origin.name,
            nonce = deposit.nonce,
            reason,
            "skipped deposit"
        );
        self.write_block(&format!(
            "[SKIPPED] - Couldn't process the deposit.\nDeposit tx: {}\ndeposit-nonce: {}\nReason: {}",
            origin.explorer_tx_url(deposit.tx_hash),
            deposit.nonce,
            reason,
        ));
    }

    fn write_block(&self, body: &str) {
        let mut sink = self.sink.lock();
        if let Err(e) = writeln!(sink, "{body}\n=========").and_then(|_| sink.flush()) {
            // The report is still produced; losing triage lines is worth a
            // loud complaint but not an abort.
            error!("failed to write discrepancy log: {e}");
        }
    }
}
