// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! A mock implementation of the ledger query surface, used in test
//! environments in place of a JSON-RPC provider.

use crate::error::{AuditError, AuditResult};
use crate::eth_client::LedgerReader;
use crate::types::{DepositEvent, Proposal, TokenMeta, TransferRecord};
use async_trait::async_trait;
use ethers::types::{Address as EthAddress, H256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default)]
pub struct MockLedger {
    deposits: Arc<Mutex<Vec<DepositEvent>>>,
    records: Arc<Mutex<HashMap<(u8, u64), TransferRecord>>>,
    proposals: Arc<Mutex<HashMap<(u8, u64, H256), Proposal>>>,
    resource_handlers: Arc<Mutex<HashMap<H256, EthAddress>>>,
    token_meta: Arc<Mutex<HashMap<EthAddress, TokenMeta>>>,
    height: Arc<AtomicU64>,
    deposits_error: Arc<Mutex<Option<String>>>,
    records_error: Arc<Mutex<Option<String>>>,
    proposals_error: Arc<Mutex<Option<String>>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_deposit(&self, deposit: DepositEvent) {
        self.deposits.lock().unwrap().push(deposit);
    }

    pub fn add_record(&self, destination_chain_id: u8, nonce: u64, record: TransferRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((destination_chain_id, nonce), record);
    }

    pub fn add_proposal(
        &self,
        origin_chain_id: u8,
        nonce: u64,
        data_hash: H256,
        proposal: Proposal,
    ) {
        self.proposals
            .lock()
            .unwrap()
            .insert((origin_chain_id, nonce, data_hash), proposal);
    }

    pub fn add_resource_handler(&self, resource_id: H256, handler: EthAddress) {
        self.resource_handlers
            .lock()
            .unwrap()
            .insert(resource_id, handler);
    }

    pub fn set_token_meta(&self, token: EthAddress, meta: TokenMeta) {
        self.token_meta.lock().unwrap().insert(token, meta);
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::Relaxed);
    }

    pub fn fail_deposits(&self, cause: &str) {
        *self.deposits_error.lock().unwrap() = Some(cause.to_string());
    }

    pub fn fail_records(&self, cause: &str) {
        *self.records_error.lock().unwrap() = Some(cause.to_string());
    }

    pub fn fail_proposals(&self, cause: &str) {
        *self.proposals_error.lock().unwrap() = Some(cause.to_string());
    }

    fn check(error: &Mutex<Option<String>>) -> AuditResult<()> {
        match error.lock().unwrap().as_ref() {
            Some(cause) => Err(AuditError::LedgerQueryFailed(cause.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LedgerReader for MockLedger {
    async fn deposit_events(
        &self,
        _bridge: EthAddress,
        from_block: u64,
    ) -> AuditResult<Vec<DepositEvent>> {
        Self::check(&self.deposits_error)?;
        Ok(self
            .deposits
            .lock()
            .unwrap()
            .iter()
            .filter(|deposit| deposit.block_number >= from_block)
            .cloned()
            .collect())
    }

    async fn transfer_record(
        &self,
        _handler: EthAddress,
        destination_chain_id: u8,
        nonce: u64,
    ) -> AuditResult<TransferRecord> {
        Self::check(&self.records_error)?;
        self.records
            .lock()
            .unwrap()
            .get(&(destination_chain_id, nonce))
            .cloned()
            .ok_or_else(|| {
                AuditError::LedgerQueryFailed(format!(
                    "no transfer record for destination {destination_chain_id} nonce {nonce}"
                ))
            })
    }

    async fn proposal(
        &self,
        _bridge: EthAddress,
        origin_chain_id: u8,
        nonce: u64,
        data_hash: H256,
    ) -> AuditResult<Proposal> {
        Self::check(&self.proposals_error)?;
        Ok(self
            .proposals
            .lock()
            .unwrap()
            .get(&(origin_chain_id, nonce, data_hash))
            .copied()
            .unwrap_or_else(Proposal::absent))
    }

    async fn handler_for_resource(
        &self,
        _bridge: EthAddress,
        resource_id: H256,
    ) -> AuditResult<EthAddress> {
        Ok(self
            .resource_handlers
            .lock()
            .unwrap()
            .get(&resource_id)
            .copied()
            .unwrap_or_else(EthAddress::zero))
    }

    async fn token_meta(&self, token: EthAddress) -> AuditResult<TokenMeta> {
        self.token_meta
            .lock()
            .unwrap()
            .get(&token)
            .cloned()
            .ok_or_else(|| {
                AuditError::LedgerQueryFailed(format!("no token metadata for {token:?}"))
            })
    }

    async fn current_block(&self) -> AuditResult<u64> {
        Ok(self.height.load(Ordering::Relaxed))
    }
}
