// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Current USD prices from a coingecko-style market-data API. Prices are
//! display-only and never feed balance arithmetic.

use crate::error::{AuditError, AuditResult};
use ethers::types::Address as EthAddress;
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_MARKET_API_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Deserialize)]
struct MarketChart {
    // [[timestamp, price], ...]
    prices: Vec<(f64, f64)>,
}

fn first_price(chart: &MarketChart) -> Option<f64> {
    chart.prices.first().map(|(_, price)| *price)
}

pub struct MarketClient {
    http: reqwest::Client,
    base_url: String,
    /// Asset platform the token contracts live on, e.g. "ethereum".
    platform: String,
}

impl MarketClient {
    pub fn new(platform: &str) -> Self {
        Self::with_base_url(platform, DEFAULT_MARKET_API_URL)
    }

    pub fn with_base_url(platform: &str, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            platform: platform.to_string(),
        }
    }

    /// Today's USD price for a token contract.
    pub async fn token_price_usd(&self, token: EthAddress) -> AuditResult<f64> {
        let url = format!(
            "{}/coins/{}/contract/{:?}/market_chart/?vs_currency=usd&days=0",
            self.base_url, self.platform, token
        );
        debug!(%url, "fetching token price");
        let chart: MarketChart = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuditError::LedgerQueryFailed(e.to_string()))?;
        first_price(&chart).ok_or_else(|| {
            AuditError::LedgerQueryFailed(format!("no price points returned for {token:?}"))
        })
    }
}
