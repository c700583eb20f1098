// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The reconciliation run: drives tracing, classification and accumulation
//! for every configured chain.
//!
//! Chains are processed concurrently; deposits within a chain are traced at
//! a bounded concurrency limit and their verdicts folded sequentially. All
//! state is run-local, so replaying the same block range with unchanged
//! on-chain state yields identical balances.

use crate::admin_withdrawals::{fold_into, AdminWithdrawalClient};
use crate::aggregator::DiscrepancyAggregator;
use crate::audit_log::DiscrepancyLog;
use crate::classifier::classify_trace;
use crate::config::Chain;
use crate::error::{AuditError, AuditResult};
use crate::eth_client::LedgerReader;
use crate::report::{insert_formatted, AuditReport, ChainReport};
use crate::retry_with_max_elapsed_time;
use crate::tracer::trace_deposit;
use crate::types::{DepositEvent, Discrepancy, TokenMeta, TraceOutcome, TransferRecord};
use ethers::types::{Address as EthAddress, H256};
use futures::stream::{self, StreamExt};
use lru::LruCache;
use num_bigint::BigUint;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const TOKEN_META_CACHE_SIZE: usize = 256;
const DEFAULT_RPC_RETRY_BUDGET: Duration = Duration::from_secs(60);

/// One configured chain paired with its ledger client.
#[derive(Debug)]
pub struct ChainHandle<L> {
    pub chain: Chain,
    pub ledger: Arc<L>,
}

impl<L> ChainHandle<L> {
    pub fn new(chain: Chain, ledger: Arc<L>) -> Self {
        Self { chain, ledger }
    }
}

/// Per-run token metadata cache. Metadata that stays unavailable after
/// retries degrades to the raw form (address as name, zero decimals) so the
/// balance is still reported rather than dropped.
#[derive(Debug)]
pub struct TokenMetaCache {
    inner: Mutex<LruCache<(u8, EthAddress), TokenMeta>>,
}

impl TokenMetaCache {
    pub fn new() -> Self {
        let capacity = NonZeroUsize::new(TOKEN_META_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn get_or_fetch<L: LedgerReader>(
        &self,
        chain_id: u8,
        token: EthAddress,
        ledger: &L,
        retry_budget: Duration,
    ) -> TokenMeta {
        if let Some(meta) = self.inner.lock().get(&(chain_id, token)) {
            return meta.clone();
        }
        let meta = match retry_with_max_elapsed_time!(ledger.token_meta(token), retry_budget) {
            Ok(Ok(meta)) => meta,
            _ => {
                warn!(chain_id, token = ?token, "token metadata unavailable, reporting raw amount");
                TokenMeta {
                    name: format!("{token:?}"),
                    symbol: String::new(),
                    decimals: 0,
                }
            }
        };
        self.inner.lock().put((chain_id, token), meta.clone());
        meta
    }
}

impl Default for TokenMetaCache {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ChainFailure {
    pub chain_id: u8,
    pub error: AuditError,
}

pub struct RunSummary {
    pub report: AuditReport,
    /// Chains whose reconciliation or admin scan failed outright. Balances
    /// accumulated for other chains are unaffected.
    pub failed_chains: Vec<ChainFailure>,
}

enum DepositOutcome {
    Healthy,
    Flagged {
        discrepancy: Discrepancy,
        record: TransferRecord,
        data_hash: H256,
    },
    Malformed {
        detail: String,
    },
    UnknownDestination {
        destination_chain_id: u8,
    },
}

#[derive(Debug)]
pub struct Reconciler<L> {
    chains: BTreeMap<u8, ChainHandle<L>>,
    aggregator: DiscrepancyAggregator,
    token_metas: TokenMetaCache,
    destination_heights: Mutex<BTreeMap<u8, u64>>,
    max_concurrent_traces: usize,
    rpc_retry_budget: Duration,
}

impl<L> Reconciler<L>
where
    L: LedgerReader,
{
    pub fn new(handles: Vec<ChainHandle<L>>) -> AuditResult<Self> {
        let mut chains = BTreeMap::new();
        for handle in handles {
            let chain_id = handle.chain.chain_id;
            if chains.insert(chain_id, handle).is_some() {
                return Err(AuditError::InvalidChainConfig(format!(
                    "duplicate chain id {chain_id}"
                )));
            }
        }
        Ok(Self {
            chains,
            aggregator: DiscrepancyAggregator::new(),
            token_metas: TokenMetaCache::new(),
            destination_heights: Mutex::new(BTreeMap::new()),
            max_concurrent_traces: crate::config::DEFAULT_MAX_CONCURRENT_TRACES,
            rpc_retry_budget: DEFAULT_RPC_RETRY_BUDGET,
        })
    }

    pub fn with_max_concurrent_traces(mut self, limit: usize) -> Self {
        self.max_concurrent_traces = limit.max(1);
        self
    }

    pub fn with_rpc_retry_budget(mut self, budget: Duration) -> Self {
        self.rpc_retry_budget = budget;
        self
    }

    /// The merged outstanding balances for one chain (user debits plus any
    /// folded admin withdrawals).
    pub fn outstanding(&self, chain_id: u8) -> BTreeMap<EthAddress, BigUint> {
        self.aggregator.snapshot(chain_id)
    }

    /// Fold admin withdrawal debits into the shared balance map.
    pub fn fold_admin_debits(
        &self,
        chain_id: u8,
        withdrawals: &BTreeMap<EthAddress, BigUint>,
    ) {
        fold_into(&self.aggregator, chain_id, withdrawals);
    }

    /// Run the full reconciliation and build the report.
    pub async fn run(&self, log: &DiscrepancyLog, admin: &AdminWithdrawalClient) -> RunSummary {
        let results = futures::future::join_all(self.chains.values().map(|origin| async move {
            (origin.chain.chain_id, self.reconcile_chain(origin, log).await)
        }))
        .await;

        let mut failed_chains = Vec::new();
        for (chain_id, result) in results {
            if let Err(err) = result {
                error!(chain_id, error = %err, "chain reconciliation failed");
                failed_chains.push(ChainFailure {
                    chain_id,
                    error: err,
                });
            }
        }

        let mut report = AuditReport::default();
        for (chain_id, handle) in &self.chains {
            // Snapshot before folding admin debits so the report keeps the
            // two sections apart while the balance map stays shared.
            let user_balances = self.aggregator.snapshot(*chain_id);
            let admin_withdrawals = match admin.fetch_withdrawals(&handle.chain).await {
                Ok(withdrawals) => withdrawals,
                Err(err) => {
                    error!(chain_id, error = %err, "admin withdrawal scan failed");
                    failed_chains.push(ChainFailure {
                        chain_id: *chain_id,
                        error: err,
                    });
                    BTreeMap::new()
                }
            };
            self.fold_admin_debits(*chain_id, &admin_withdrawals);

            let mut chain_report = ChainReport::default();
            for (token, balance) in &user_balances {
                let meta = self
                    .token_metas
                    .get_or_fetch(*chain_id, *token, handle.ledger.as_ref(), self.rpc_retry_budget)
                    .await;
                insert_formatted(&mut chain_report.user_deposits, &meta, *token, balance);
            }
            for (token, amount) in &admin_withdrawals {
                let meta = self
                    .token_metas
                    .get_or_fetch(*chain_id, *token, handle.ledger.as_ref(), self.rpc_retry_budget)
                    .await;
                insert_formatted(&mut chain_report.admin_withdrawals, &meta, *token, amount);
            }
            report.chains.insert(*chain_id, chain_report);
        }

        RunSummary {
            report,
            failed_chains,
        }
    }

    async fn reconcile_chain(
        &self,
        origin: &ChainHandle<L>,
        log: &DiscrepancyLog,
    ) -> AuditResult<()> {
        let Ok(Ok(deposits)) = retry_with_max_elapsed_time!(
            origin
                .ledger
                .deposit_events(origin.chain.bridge_address, origin.chain.from_block),
            self.rpc_retry_budget
        ) else {
            return Err(AuditError::LedgerQueryFailed(format!(
                "could not fetch deposit events for chain {}",
                origin.chain.chain_id
            )));
        };
        info!(
            chain = %origin.chain.name,
            deposits = deposits.len(),
            "collected deposit events"
        );

        let outcomes: Vec<_> = stream::iter(
            deposits
                .iter()
                .map(|deposit| self.process_deposit(origin, deposit)),
        )
        .buffered(self.max_concurrent_traces)
        .collect()
        .await;

        for (deposit, outcome) in deposits.iter().zip(outcomes) {
            match outcome {
                Ok(DepositOutcome::Healthy) => {}
                Ok(DepositOutcome::Flagged {
                    discrepancy,
                    record,
                    data_hash,
                }) => {
                    log.record_discrepancy(
                        discrepancy.kind,
                        &origin.chain,
                        deposit,
                        &record,
                        data_hash,
                    );
                    self.aggregator.accumulate_u256(
                        origin.chain.chain_id,
                        discrepancy.token_address,
                        discrepancy.amount,
                    );
                }
                Ok(DepositOutcome::Malformed { detail }) => {
                    log.record_skipped(
                        &origin.chain,
                        deposit,
                        &format!("malformed recipient: {detail}"),
                    );
                }
                Ok(DepositOutcome::UnknownDestination {
                    destination_chain_id,
                }) => {
                    log.record_skipped(
                        &origin.chain,
                        deposit,
                        &format!("destination chain {destination_chain_id} is not configured"),
                    );
                }
                // Persistent query failure: the deposit is excluded from the
                // balances, loudly.
                Err(err) => {
                    log.record_skipped(&origin.chain, deposit, &err.to_string());
                }
            }
        }
        Ok(())
    }

    async fn process_deposit(
        &self,
        origin: &ChainHandle<L>,
        deposit: &DepositEvent,
    ) -> AuditResult<DepositOutcome> {
        let Some(destination) = self.chains.get(&deposit.destination_chain_id) else {
            return Ok(DepositOutcome::UnknownDestination {
                destination_chain_id: deposit.destination_chain_id,
            });
        };

        let Ok(Ok(record)) = retry_with_max_elapsed_time!(
            origin.ledger.transfer_record(
                origin.chain.handler_address,
                deposit.destination_chain_id,
                deposit.nonce,
            ),
            self.rpc_retry_budget
        ) else {
            return Err(AuditError::LedgerQueryFailed(format!(
                "transfer record fetch failed for deposit nonce {}",
                deposit.nonce
            )));
        };

        let Ok(Ok(outcome)) = retry_with_max_elapsed_time!(
            trace_deposit(
                origin.chain.chain_id,
                deposit,
                &record,
                &destination.chain,
                destination.ledger.as_ref(),
            ),
            self.rpc_retry_budget
        ) else {
            return Err(AuditError::LedgerQueryFailed(format!(
                "proposal query failed for deposit nonce {}",
                deposit.nonce
            )));
        };

        match outcome {
            TraceOutcome::MalformedRecipient { detail } => {
                Ok(DepositOutcome::Malformed { detail })
            }
            TraceOutcome::Traced {
                data_hash,
                proposal,
            } => {
                let current_block = self.destination_height(destination).await?;
                match classify_trace(proposal, &record, current_block, destination.chain.expiry)
                {
                    Some(discrepancy) => Ok(DepositOutcome::Flagged {
                        discrepancy,
                        record,
                        data_hash,
                    }),
                    None => Ok(DepositOutcome::Healthy),
                }
            }
        }
    }

    // Classification needs the destination head height; it is fetched once
    // per destination per run.
    async fn destination_height(&self, destination: &ChainHandle<L>) -> AuditResult<u64> {
        let chain_id = destination.chain.chain_id;
        if let Some(height) = self.destination_heights.lock().get(&chain_id) {
            return Ok(*height);
        }
        let Ok(Ok(height)) = retry_with_max_elapsed_time!(
            destination.ledger.current_block(),
            self.rpc_retry_budget
        ) else {
            return Err(AuditError::LedgerQueryFailed(format!(
                "current block query failed for chain {chain_id}"
            )));
        };
        self.destination_heights.lock().insert(chain_id, height);
        Ok(height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_hash::derive_data_hash;
    use crate::mock_ledger::MockLedger;
    use crate::test_utils::{
        sample_chain, sample_deposit, sample_token_meta, sample_transfer_record, test_token,
    };
    use crate::types::{Proposal, ProposalStatus};
    use ethers::types::U256;

    fn two_chain_setup() -> (Reconciler<MockLedger>, MockLedger, MockLedger) {
        let ledger1 = MockLedger::new();
        let ledger2 = MockLedger::new();
        let reconciler = Reconciler::new(vec![
            ChainHandle::new(sample_chain(1), Arc::new(ledger1.clone())),
            ChainHandle::new(sample_chain(2), Arc::new(ledger2.clone())),
        ])
        .unwrap()
        .with_rpc_retry_budget(Duration::from_millis(10));
        (reconciler, ledger1, ledger2)
    }

    fn destination_data_hash() -> H256 {
        let record = sample_transfer_record();
        derive_data_hash(
            record.amount,
            &record.recipient,
            sample_chain(2).handler_address,
        )
        .unwrap()
    }

    async fn run(reconciler: &Reconciler<MockLedger>) -> RunSummary {
        reconciler
            .run(&DiscrepancyLog::discard(), &AdminWithdrawalClient::new())
            .await
    }

    #[tokio::test]
    async fn test_missing_proposal_is_debited_as_not_found() {
        let (reconciler, ledger1, ledger2) = two_chain_setup();
        ledger1.add_deposit(sample_deposit(2, 7961));
        ledger1.add_record(2, 7961, sample_transfer_record());
        ledger1.set_token_meta(test_token(), sample_token_meta());
        ledger2.set_height(300);

        let summary = run(&reconciler).await;
        assert!(summary.failed_chains.is_empty());
        assert_eq!(
            reconciler.outstanding(1)[&test_token()].to_string(),
            "10000000000000000000"
        );
        assert_eq!(
            summary.report.chains[&1].user_deposits["Wrapped Ether"],
            "10.0"
        );
        assert!(summary.report.chains[&2].user_deposits.is_empty());
    }

    #[tokio::test]
    async fn test_expired_proposal_is_debited() {
        let (reconciler, ledger1, ledger2) = two_chain_setup();
        ledger1.add_deposit(sample_deposit(2, 7961));
        ledger1.add_record(2, 7961, sample_transfer_record());
        ledger1.set_token_meta(test_token(), sample_token_meta());
        // proposed at block 100, head at 300, expiry 100: 200 > 100
        ledger2.add_proposal(
            1,
            7961,
            destination_data_hash(),
            Proposal {
                status: ProposalStatus::Active,
                proposed_block: 100,
            },
        );
        ledger2.set_height(300);

        let summary = run(&reconciler).await;
        assert!(summary.failed_chains.is_empty());
        assert_eq!(
            summary.report.chains[&1].user_deposits["Wrapped Ether"],
            "10.0"
        );
    }

    #[tokio::test]
    async fn test_active_proposal_at_expiry_boundary_is_pending() {
        let (reconciler, ledger1, ledger2) = two_chain_setup();
        ledger1.add_deposit(sample_deposit(2, 7961));
        ledger1.add_record(2, 7961, sample_transfer_record());
        ledger2.add_proposal(
            1,
            7961,
            destination_data_hash(),
            Proposal {
                status: ProposalStatus::Active,
                proposed_block: 100,
            },
        );
        // age == expiry exactly: no debit
        ledger2.set_height(200);

        let summary = run(&reconciler).await;
        assert!(summary.failed_chains.is_empty());
        assert!(reconciler.outstanding(1).is_empty());
    }

    #[tokio::test]
    async fn test_executed_proposal_leaves_no_balance() {
        let (reconciler, ledger1, ledger2) = two_chain_setup();
        ledger1.add_deposit(sample_deposit(2, 7961));
        ledger1.add_record(2, 7961, sample_transfer_record());
        ledger2.add_proposal(
            1,
            7961,
            destination_data_hash(),
            Proposal {
                status: ProposalStatus::Executed,
                proposed_block: 100,
            },
        );
        ledger2.set_height(300);

        let summary = run(&reconciler).await;
        assert!(summary.failed_chains.is_empty());
        assert!(reconciler.outstanding(1).is_empty());
        assert!(summary.report.chains[&1].user_deposits.is_empty());
    }

    #[tokio::test]
    async fn test_admin_debits_merge_into_the_same_balance() {
        let (reconciler, ledger1, ledger2) = two_chain_setup();
        let mut record = sample_transfer_record();
        record.amount = U256::from(5u64);
        ledger1.add_deposit(sample_deposit(2, 1));
        ledger1.add_record(2, 1, record);
        ledger2.set_height(300);

        let summary = run(&reconciler).await;
        assert!(summary.failed_chains.is_empty());

        let mut withdrawals = BTreeMap::new();
        withdrawals.insert(test_token(), BigUint::from(3u64));
        reconciler.fold_admin_debits(1, &withdrawals);
        assert_eq!(reconciler.outstanding(1)[&test_token()], BigUint::from(8u64));
    }

    #[tokio::test]
    async fn test_failed_chain_does_not_corrupt_others() {
        let (reconciler, ledger1, ledger2) = two_chain_setup();
        ledger1.fail_deposits("rpc down");
        ledger2.add_deposit(sample_deposit(1, 5));
        ledger2.add_record(1, 5, sample_transfer_record());
        ledger2.set_token_meta(test_token(), sample_token_meta());
        ledger1.set_height(300);

        let summary = run(&reconciler).await;
        assert_eq!(summary.failed_chains.len(), 1);
        assert_eq!(summary.failed_chains[0].chain_id, 1);
        // the other chain still accounted its deposit
        assert_eq!(
            reconciler.outstanding(2)[&test_token()].to_string(),
            "10000000000000000000"
        );
    }

    #[tokio::test]
    async fn test_persistent_record_failure_skips_deposit() {
        let (reconciler, ledger1, ledger2) = two_chain_setup();
        ledger1.add_deposit(sample_deposit(2, 1));
        ledger1.fail_records("rpc timed out");
        ledger2.set_height(300);

        let summary = run(&reconciler).await;
        // deposit-level failures do not fail the chain
        assert!(summary.failed_chains.is_empty());
        assert!(reconciler.outstanding(1).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_destination_is_skipped() {
        let (reconciler, ledger1, ledger2) = two_chain_setup();
        ledger1.add_deposit(sample_deposit(9, 1));
        ledger2.set_height(300);

        let summary = run(&reconciler).await;
        assert!(summary.failed_chains.is_empty());
        assert!(reconciler.outstanding(1).is_empty());
    }

    #[tokio::test]
    async fn test_malformed_recipient_is_skipped() {
        let (reconciler, ledger1, ledger2) = two_chain_setup();
        let mut record = sample_transfer_record();
        record.recipient = "0xabc".to_string();
        ledger1.add_deposit(sample_deposit(2, 1));
        ledger1.add_record(2, 1, record);
        ledger2.set_height(300);

        let summary = run(&reconciler).await;
        assert!(summary.failed_chains.is_empty());
        assert!(reconciler.outstanding(1).is_empty());
    }

    #[tokio::test]
    async fn test_missing_token_meta_degrades_to_raw_report() {
        let (reconciler, ledger1, ledger2) = two_chain_setup();
        ledger1.add_deposit(sample_deposit(2, 1));
        ledger1.add_record(2, 1, sample_transfer_record());
        // no token metadata registered on ledger1
        ledger2.set_height(300);

        let summary = run(&reconciler).await;
        assert!(summary.failed_chains.is_empty());
        let key = format!("{:?}", test_token());
        assert_eq!(
            summary.report.chains[&1].user_deposits[&key],
            "10000000000000000000"
        );
    }

    #[test]
    fn test_duplicate_chain_ids_rejected() {
        let err = Reconciler::new(vec![
            ChainHandle::new(sample_chain(1), Arc::new(MockLedger::new())),
            ChainHandle::new(sample_chain(1), Arc::new(MockLedger::new())),
        ])
        .unwrap_err();
        assert!(matches!(err, AuditError::InvalidChainConfig(_)));
    }
}
