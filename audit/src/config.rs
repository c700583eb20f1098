// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::{AuditError, AuditResult};
use bridge_audit_config::Config;
use ethers::types::{Address as EthAddress, H256};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChainConfig {
    // Numeric bridge chain id. Also the key routes are expressed in, so it
    // must be unique across the config.
    pub chain_id: u8,
    // Human readable chain name, used in logs and reports only.
    pub name: String,
    // Rpc url for the chain's fullnode, used for query stuff.
    pub rpc_url: String,
    // The bridge contract that emits Deposit events and stores proposals.
    pub bridge_address: String,
    // The handler contract that stores per-deposit transfer records.
    pub handler_address: String,
    // The multisig wallet admin withdrawals are executed through. When unset,
    // the admin withdrawal scan is skipped for this chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multisig_address: Option<String>,
    // Etherscan-compatible account/txlist API endpoint used to enumerate the
    // multisig's historical transactions. Required for the admin scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_list_api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_list_api_key: Option<String>,
    // The block to start scanning Deposit events from. Usually the block the
    // bridge contracts were deployed at.
    pub from_block: u64,
    // Number of blocks after which an unexecuted Active proposal is
    // considered abandoned.
    pub expiry: u64,
    // Explorer transaction URL prefix, e.g. "https://etherscan.io/tx/".
    // Used only to render operator-facing links.
    pub explorer_base_url: String,
}

impl ChainConfig {
    /// Parse the string addresses into their runtime form. A failure here is
    /// the only abort-worthy condition for a chain.
    pub fn validate(&self) -> AuditResult<Chain> {
        let bridge_address = parse_address(&self.bridge_address, "bridge-address")?;
        let handler_address = parse_address(&self.handler_address, "handler-address")?;
        let multisig_address = self
            .multisig_address
            .as_deref()
            .map(|addr| parse_address(addr, "multisig-address"))
            .transpose()?;
        if self.multisig_address.is_some() && self.tx_list_api_url.is_none() {
            return Err(AuditError::InvalidChainConfig(format!(
                "chain {}: multisig-address is set but tx-list-api-url is not",
                self.chain_id
            )));
        }
        info!(chain_id = self.chain_id, name = %self.name, "validated chain config");
        Ok(Chain {
            chain_id: self.chain_id,
            name: self.name.clone(),
            rpc_url: self.rpc_url.clone(),
            bridge_address,
            handler_address,
            multisig_address,
            tx_list_api_url: self.tx_list_api_url.clone(),
            tx_list_api_key: self.tx_list_api_key.clone(),
            from_block: self.from_block,
            expiry: self.expiry,
            explorer_base_url: self.explorer_base_url.clone(),
        })
    }
}

fn parse_address(addr: &str, field: &str) -> AuditResult<EthAddress> {
    EthAddress::from_str(addr)
        .map_err(|e| AuditError::InvalidChainConfig(format!("{field} {addr:?}: {e}")))
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuditConfig {
    pub chains: Vec<ChainConfig>,
    // Upper bound on in-flight deposit traces per chain, to respect upstream
    // rate limits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_traces: Option<usize>,
    // Directory the append-only discrepancy log files are written to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discrepancy_log_dir: Option<PathBuf>,
}

pub const DEFAULT_MAX_CONCURRENT_TRACES: usize = 8;

impl Config for AuditConfig {}

impl AuditConfig {
    pub fn max_concurrent_traces(&self) -> usize {
        self.max_concurrent_traces
            .unwrap_or(DEFAULT_MAX_CONCURRENT_TRACES)
    }

    /// Validate every chain and index them by chain id. Rejects duplicate
    /// ids: balances are keyed by chain id so a duplicate would silently
    /// merge two chains' accounting.
    pub fn validate(&self) -> AuditResult<BTreeMap<u8, Chain>> {
        let mut chains = BTreeMap::new();
        for chain_config in &self.chains {
            let chain = chain_config.validate()?;
            if chains.insert(chain.chain_id, chain).is_some() {
                return Err(AuditError::InvalidChainConfig(format!(
                    "duplicate chain id {}",
                    chain_config.chain_id
                )));
            }
        }
        Ok(chains)
    }
}

/// A validated chain: `ChainConfig` with the addresses parsed.
#[derive(Clone, Debug)]
pub struct Chain {
    pub chain_id: u8,
    pub name: String,
    pub rpc_url: String,
    pub bridge_address: EthAddress,
    pub handler_address: EthAddress,
    pub multisig_address: Option<EthAddress>,
    pub tx_list_api_url: Option<String>,
    pub tx_list_api_key: Option<String>,
    pub from_block: u64,
    pub expiry: u64,
    pub explorer_base_url: String,
}

impl Chain {
    pub fn explorer_tx_url(&self, tx_hash: H256) -> String {
        format!("{}{:?}", self.explorer_base_url, tx_hash)
    }
}

// Generate an audit config template and write it to a file.
pub fn generate_audit_config_and_write_to_file(path: &PathBuf) -> Result<(), anyhow::Error> {
    let config = AuditConfig {
        chains: vec![
            ChainConfig {
                chain_id: 1,
                name: "Ethereum".to_string(),
                rpc_url: "your_eth_rpc_url".to_string(),
                bridge_address: "0x0000000000000000000000000000000000000000".to_string(),
                handler_address: "0x0000000000000000000000000000000000000000".to_string(),
                multisig_address: None,
                tx_list_api_url: Some("https://api.etherscan.io/api".to_string()),
                tx_list_api_key: None,
                from_block: 0,
                expiry: 100,
                explorer_base_url: "https://etherscan.io/tx/".to_string(),
            },
            ChainConfig {
                chain_id: 2,
                name: "Ava".to_string(),
                rpc_url: "your_ava_rpc_url".to_string(),
                bridge_address: "0x0000000000000000000000000000000000000000".to_string(),
                handler_address: "0x0000000000000000000000000000000000000000".to_string(),
                multisig_address: None,
                tx_list_api_url: None,
                tx_list_api_key: None,
                from_block: 0,
                expiry: 7200000,
                explorer_base_url: "https://cchain.explorer.avax.network/tx/".to_string(),
            },
        ],
        max_concurrent_traces: None,
        discrepancy_log_dir: Some(PathBuf::from("./logs")),
    };
    config.save(path)
}
