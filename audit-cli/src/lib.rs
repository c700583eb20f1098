// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use bridge_audit::config::AuditConfig;
use bridge_audit::eth_client::EthClient;
use bridge_audit::reconcile::ChainHandle;
use clap::*;
use ethers::providers::Http;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "bridge-audit",
    about = "Reconciles bridge deposits against destination-chain proposals",
    rename_all = "kebab-case"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: AuditCommand,
}

#[derive(Subcommand)]
#[command(rename_all = "kebab-case")]
pub enum AuditCommand {
    /// Replay deposits on every configured chain, classify their proposals
    /// and print the per-chain balance report as JSON.
    Reconcile {
        #[arg(long)]
        config_path: PathBuf,
        /// Write the report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Sum every deposit per token on one chain, optionally priced in USD.
    TotalValueDeposited {
        #[arg(long)]
        config_path: PathBuf,
        #[arg(long)]
        chain_id: u8,
        #[arg(long)]
        with_prices: bool,
    },
    /// Write a starter configuration file.
    CreateAuditConfigTemplate {
        #[arg(long)]
        path: PathBuf,
    },
}

/// Build one RPC-backed ledger handle per validated chain.
pub fn build_chain_handles(
    config: &AuditConfig,
) -> anyhow::Result<Vec<ChainHandle<EthClient<Http>>>> {
    let chains = config.validate()?;
    chains
        .into_values()
        .map(|chain| {
            let client = EthClient::new(&chain.rpc_url)
                .with_context(|| format!("failed to set up rpc client for {}", chain.name))?;
            Ok(ChainHandle::new(chain, Arc::new(client)))
        })
        .collect()
}
