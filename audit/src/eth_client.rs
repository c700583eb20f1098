// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Read-only chain access. `LedgerReader` is the narrow query surface the
//! reconciliation engine needs; `EthClient` implements it over an ethers
//! JSON-RPC provider. Tests substitute `MockLedger`.

use crate::error::{AuditError, AuditResult};
use crate::types::{DepositEvent, Proposal, ProposalStatus, TokenMeta, TransferRecord};
use async_trait::async_trait;
use ethers::abi::{parse_abi, Abi};
use ethers::contract::Contract;
use ethers::providers::{Http, JsonRpcClient, Middleware, Provider};
use ethers::types::{Address as EthAddress, Bytes, Filter, Log, H256, U256};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

/// Signature of the bridge contract's deposit event. All three fields are
/// indexed, so the payload rides entirely in the log topics.
pub const DEPOSIT_EVENT_SIGNATURE: &str = "Deposit(uint8,bytes32,uint64)";

// The proposal mapping getter flattens the on-chain struct and omits the
// vote arrays, leaving only static return types.
static BRIDGE_ABI: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "function _proposals(uint72, bytes32) view returns (bytes32, bytes32, uint8, uint256)",
        "function _resourceIDToHandlerAddress(bytes32) view returns (address)",
    ])
    .expect("bridge abi parses")
});

static HANDLER_ABI: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "function _depositRecords(uint8, uint64) view returns (address, uint8, uint8, bytes32, bytes, address, uint256)",
    ])
    .expect("handler abi parses")
});

static ERC20_ABI: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "function name() view returns (string)",
        "function symbol() view returns (string)",
        "function decimals() view returns (uint8)",
    ])
    .expect("erc20 abi parses")
});

/// Read-only queries against one chain's ledger.
///
/// Failures surface as [`AuditError::LedgerQueryFailed`]; callers retry with
/// backoff and exclude the deposit from the balances if the failure
/// persists. A proposal lookup never fails on absence: a key that was never
/// proposed reads back as the zero value.
#[async_trait]
pub trait LedgerReader: Send + Sync + 'static {
    /// All deposit events emitted by `bridge` from `from_block` onwards.
    async fn deposit_events(
        &self,
        bridge: EthAddress,
        from_block: u64,
    ) -> AuditResult<Vec<DepositEvent>>;

    /// The transfer record stored by `handler` for one deposit.
    async fn transfer_record(
        &self,
        handler: EthAddress,
        destination_chain_id: u8,
        nonce: u64,
    ) -> AuditResult<TransferRecord>;

    /// The proposal keyed by (origin chain id, nonce, data hash).
    async fn proposal(
        &self,
        bridge: EthAddress,
        origin_chain_id: u8,
        nonce: u64,
        data_hash: H256,
    ) -> AuditResult<Proposal>;

    /// The handler contract registered for a resource id.
    async fn handler_for_resource(
        &self,
        bridge: EthAddress,
        resource_id: H256,
    ) -> AuditResult<EthAddress>;

    /// ERC-20 name/symbol/decimals for a token contract.
    async fn token_meta(&self, token: EthAddress) -> AuditResult<TokenMeta>;

    /// Current chain head height.
    async fn current_block(&self) -> AuditResult<u64>;
}

pub struct EthClient<P> {
    provider: Arc<Provider<P>>,
}

impl EthClient<Http> {
    pub fn new(rpc_url: &str) -> AuditResult<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| {
                AuditError::InvalidChainConfig(format!("bad rpc url {rpc_url:?}: {e}"))
            })?
            .interval(Duration::from_millis(2000));
        Ok(Self {
            provider: Arc::new(provider),
        })
    }
}

impl<P> EthClient<P>
where
    P: JsonRpcClient + 'static,
{
    pub fn new_with_provider(provider: Provider<P>) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    // Log connection info so a misconfigured RPC url is visible up front.
    pub async fn describe(&self) -> AuditResult<()> {
        let chain_id = self
            .provider
            .get_chainid()
            .await
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?;
        let block_number = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?;
        tracing::info!(
            "EthClient connected to chain {}, current block: {}",
            chain_id,
            block_number
        );
        Ok(())
    }

    fn contract(&self, address: EthAddress, abi: &Abi) -> Contract<Provider<P>> {
        Contract::new(address, abi.clone(), self.provider.clone())
    }
}

// The proposal mapping is keyed by a packed (nonce, origin chain id) word.
fn nonce_and_id(nonce: u64, origin_chain_id: u8) -> U256 {
    (U256::from(nonce) << 8) | U256::from(origin_chain_id)
}

fn parse_deposit_log(log: &Log) -> AuditResult<DepositEvent> {
    if log.topics.len() != 4 {
        return Err(AuditError::LedgerQueryFailed(format!(
            "provider returned deposit log with {} topics: {:?}",
            log.topics.len(),
            log
        )));
    }
    let block_number = log
        .block_number
        .ok_or_else(|| {
            AuditError::LedgerQueryFailed("provider returned log without block_number".into())
        })?
        .as_u64();
    let tx_hash = log.transaction_hash.ok_or_else(|| {
        AuditError::LedgerQueryFailed("provider returned log without transaction_hash".into())
    })?;
    Ok(DepositEvent {
        destination_chain_id: log.topics[1].to_low_u64_be() as u8,
        resource_id: log.topics[2],
        nonce: log.topics[3].to_low_u64_be(),
        block_number,
        tx_hash,
    })
}

fn status_byte(word: U256) -> AuditResult<u8> {
    if word > U256::from(u8::MAX) {
        return Err(AuditError::LedgerQueryFailed(format!(
            "provider returned out-of-range status word {word}"
        )));
    }
    Ok(word.low_u64() as u8)
}

#[async_trait]
impl<P> LedgerReader for EthClient<P>
where
    P: JsonRpcClient + 'static,
{
    async fn deposit_events(
        &self,
        bridge: EthAddress,
        from_block: u64,
    ) -> AuditResult<Vec<DepositEvent>> {
        let filter = Filter::new()
            .address(bridge)
            .event(DEPOSIT_EVENT_SIGNATURE)
            .from_block(from_block);
        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?;
        // Safeguard check that all events are emitted from the requested
        // contract address.
        if logs.iter().any(|log| log.address != bridge) {
            return Err(AuditError::LedgerQueryFailed(format!(
                "provider returned logs from a different contract (expected {:?})",
                bridge
            )));
        }
        logs.iter().map(parse_deposit_log).collect()
    }

    async fn transfer_record(
        &self,
        handler: EthAddress,
        destination_chain_id: u8,
        nonce: u64,
    ) -> AuditResult<TransferRecord> {
        let contract = self.contract(handler, &HANDLER_ABI);
        let (token_address, _recipient_len, record_destination, resource_id, recipient, depositor, amount): (
            EthAddress,
            U256,
            U256,
            H256,
            Bytes,
            EthAddress,
            U256,
        ) = contract
            .method(
                "_depositRecords",
                (U256::from(destination_chain_id), U256::from(nonce)),
            )
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?
            .call()
            .await
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?;
        Ok(TransferRecord {
            token_address,
            destination_chain_id: status_byte(record_destination)
                .unwrap_or(destination_chain_id),
            resource_id,
            recipient: format!("0x{}", hex::encode(&recipient)),
            depositor,
            amount,
        })
    }

    async fn proposal(
        &self,
        bridge: EthAddress,
        origin_chain_id: u8,
        nonce: u64,
        data_hash: H256,
    ) -> AuditResult<Proposal> {
        let contract = self.contract(bridge, &BRIDGE_ABI);
        let (_resource_id, _data_hash, status_word, proposed_block): (H256, H256, U256, U256) =
            contract
                .method("_proposals", (nonce_and_id(nonce, origin_chain_id), data_hash))
                .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?
                .call()
                .await
                .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?;
        let status = ProposalStatus::from_status_byte(status_byte(status_word)?)?;
        Ok(Proposal {
            status,
            proposed_block: proposed_block.low_u64(),
        })
    }

    async fn handler_for_resource(
        &self,
        bridge: EthAddress,
        resource_id: H256,
    ) -> AuditResult<EthAddress> {
        let contract = self.contract(bridge, &BRIDGE_ABI);
        contract
            .method::<_, EthAddress>("_resourceIDToHandlerAddress", resource_id)
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?
            .call()
            .await
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))
    }

    async fn token_meta(&self, token: EthAddress) -> AuditResult<TokenMeta> {
        let contract = self.contract(token, &ERC20_ABI);
        let name: String = contract
            .method("name", ())
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?
            .call()
            .await
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?;
        let symbol: String = contract
            .method("symbol", ())
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?
            .call()
            .await
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?;
        let decimals: U256 = contract
            .method("decimals", ())
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?
            .call()
            .await
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?;
        Ok(TokenMeta {
            name,
            symbol,
            decimals: status_byte(decimals)?,
        })
    }

    async fn current_block(&self) -> AuditResult<u64> {
        let block_number = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?;
        Ok(block_number.as_u64())
    }
}
