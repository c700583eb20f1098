// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use bridge_audit::admin_withdrawals::AdminWithdrawalClient;
use bridge_audit::audit_log::DiscrepancyLog;
use bridge_audit::config::{generate_audit_config_and_write_to_file, AuditConfig};
use bridge_audit::eth_client::LedgerReader;
use bridge_audit::market::MarketClient;
use bridge_audit::reconcile::Reconciler;
use bridge_audit::report::format_token_amount;
use bridge_audit::totals::collect_deposit_totals;
use bridge_audit_cli::{build_chain_handles, Args, AuditCommand};
use bridge_audit_config::Config;
use clap::Parser;
use indicatif::ProgressBar;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    match args.command {
        AuditCommand::Reconcile {
            config_path,
            output,
        } => {
            let config = AuditConfig::load(&config_path)
                .with_context(|| format!("failed to load config from {}", config_path.display()))?;
            let handles = build_chain_handles(&config)?;
            for handle in &handles {
                handle.ledger.describe().await?;
            }
            let log = match &config.discrepancy_log_dir {
                Some(dir) => DiscrepancyLog::to_dir(dir)?,
                None => DiscrepancyLog::discard(),
            };
            let reconciler = Reconciler::new(handles)?
                .with_max_concurrent_traces(config.max_concurrent_traces());
            let summary = reconciler.run(&log, &AdminWithdrawalClient::new()).await;

            let rendered = serde_json::to_string_pretty(&summary.report)?;
            match output {
                Some(path) => std::fs::write(&path, rendered)
                    .with_context(|| format!("failed to write report to {}", path.display()))?,
                None => println!("{rendered}"),
            }
            if !summary.failed_chains.is_empty() {
                anyhow::bail!("{} chain(s) failed to reconcile", summary.failed_chains.len());
            }
        }

        AuditCommand::TotalValueDeposited {
            config_path,
            chain_id,
            with_prices,
        } => {
            let config = AuditConfig::load(&config_path)
                .with_context(|| format!("failed to load config from {}", config_path.display()))?;
            let mut handles = build_chain_handles(&config)?;
            let position = handles
                .iter()
                .position(|handle| handle.chain.chain_id == chain_id)
                .with_context(|| format!("chain {chain_id} is not configured"))?;
            let handle = handles.swap_remove(position);
            handle.ledger.describe().await?;

            let progress = ProgressBar::new(0);
            let totals = collect_deposit_totals(&handle, |done, total| {
                progress.set_length(total as u64);
                progress.set_position(done as u64);
            })
            .await?;
            progress.finish_and_clear();

            let market = MarketClient::new("ethereum");
            for (token, entry) in &totals {
                let meta = handle.ledger.token_meta(*token).await?;
                let amount = format_token_amount(&entry.total, meta.decimals);
                let usd_value = if with_prices {
                    match market.token_price_usd(*token).await {
                        Ok(price) => {
                            let tokens: f64 = amount.parse().unwrap_or(0.0);
                            format!("{:.2}", tokens * price)
                        }
                        Err(e) => {
                            tracing::warn!(token = ?token, "price lookup failed: {e}");
                            "n/a".to_string()
                        }
                    }
                } else {
                    "n/a".to_string()
                };
                println!(
                    "{name} ({symbol}) {token:?} deposits: {count} tokens: {amount} usd: {usd_value}",
                    name = meta.name,
                    symbol = meta.symbol,
                    count = entry.deposit_count,
                );
            }
        }

        AuditCommand::CreateAuditConfigTemplate { path } => {
            generate_audit_config_and_write_to_file(&path)?;
            println!("Audit config template generated at {}", path.display());
        }
    }
    Ok(())
}
