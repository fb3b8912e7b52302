use std::collections::HashMap;

use reqwest::Client;
use serde_json::Value;

use common::{Candle, Provider, QuoteFields, Result};

use crate::http::fetch_json;
use crate::response::{collect_rows, value_f64, ProviderResponse, QuoteBatch};

/// CoinGecko public API payloads.
#[derive(Debug, Clone)]
pub enum CoinGeckoPayload {
    /// `/simple/price` map of coin id to `{usd, usd_24h_change, usd_24h_vol}`.
    Prices(HashMap<String, Value>),
    /// `/coins/{id}/ohlc` rows: `[time, open, high, low, close]`.
    Ohlc(Vec<Value>),
}

pub struct CoinGeckoClient {
    http: Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_prices(&self, ids: &[String]) -> Result<ProviderResponse> {
        let request = self
            .http
            .get(format!("{}/api/v3/simple/price", self.base_url))
            .query(&[
                ("ids", ids.join(",").as_str()),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
                ("include_24hr_vol", "true"),
            ]);
        let map: HashMap<String, Value> = fetch_json(Provider::CoinGecko, request).await?;
        Ok(ProviderResponse::CoinGecko(CoinGeckoPayload::Prices(map)))
    }

    /// Multi-id lookups are native here; unknown ids are simply absent from
    /// the answer, so no per-symbol retry is needed.
    pub async fn quotes(&self, ids: &[String]) -> Result<QuoteBatch> {
        if ids.is_empty() {
            return Ok(QuoteBatch::default());
        }
        self.fetch_prices(ids).await?.into_quotes()
    }

    pub async fn fetch_ohlc(&self, id: &str, days: u32) -> Result<ProviderResponse> {
        let request = self
            .http
            .get(format!("{}/api/v3/coins/{id}/ohlc", self.base_url))
            .query(&[("vs_currency", "usd")])
            .query(&[("days", days.max(1))]);
        let rows: Vec<Value> = fetch_json(Provider::CoinGecko, request).await?;
        Ok(ProviderResponse::CoinGecko(CoinGeckoPayload::Ohlc(rows)))
    }

    pub async fn candles(&self, id: &str, days: u32) -> Result<Vec<Candle>> {
        self.fetch_ohlc(id, days).await?.into_candles()
    }
}

pub(crate) fn decode_prices(map: HashMap<String, Value>) -> QuoteBatch {
    let mut batch = QuoteBatch::default();
    for (id, entry) in map {
        match entry.get("usd").and_then(value_f64) {
            Some(price) => batch.insert(
                id,
                QuoteFields {
                    price,
                    change_pct: entry.get("usd_24h_change").and_then(value_f64).unwrap_or(0.0),
                    volume: entry.get("usd_24h_vol").and_then(value_f64),
                    ..QuoteFields::default()
                },
            ),
            None => batch.reject(id, "missing usd price"),
        }
    }
    batch
}

fn decode_row(row: &Value) -> Option<Candle> {
    let cells = row.as_array()?;
    if cells.len() < 5 {
        return None;
    }
    Some(Candle {
        timestamp: cells[0].as_i64().or_else(|| cells[0].as_f64().map(|t| t as i64))?,
        open: value_f64(&cells[1])?,
        high: value_f64(&cells[2])?,
        low: value_f64(&cells[3])?,
        close: value_f64(&cells[4])?,
        volume: None,
    })
}

pub(crate) fn decode_ohlc(rows: Vec<Value>) -> Result<Vec<Candle>> {
    collect_rows(Provider::CoinGecko, &rows, decode_row)
}
