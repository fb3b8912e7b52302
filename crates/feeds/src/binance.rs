use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use common::{Candle, Error, Provider, QuoteFields, Result};

use crate::http::fetch_json;
use crate::response::{batch_with_fallback, collect_rows, value_f64, ProviderResponse, QuoteBatch};

/// Binance market-data payloads.
#[derive(Debug, Clone)]
pub enum BinancePayload {
    /// `/api/v3/ticker/24hr` rows, kept raw so one bad row cannot fail the rest.
    Tickers(Vec<Value>),
    /// `/api/v3/klines` rows: `[openTime, open, high, low, close, volume, ...]`.
    Klines(Vec<Value>),
}

/// Public REST client for Binance spot market data. No credentials needed.
pub struct BinanceClient {
    http: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// One request for all `symbols`. Binance rejects the whole batch if any
    /// symbol is unknown.
    pub async fn fetch_tickers(&self, symbols: &[String]) -> Result<ProviderResponse> {
        let list = serde_json::to_string(symbols).map_err(|e| Error::malformed(Provider::Binance, e))?;
        let request = self
            .http
            .get(format!("{}/api/v3/ticker/24hr", self.base_url))
            .query(&[("symbols", list)]);
        let rows: Vec<Value> = fetch_json(Provider::Binance, request).await?;
        Ok(ProviderResponse::Binance(BinancePayload::Tickers(rows)))
    }

    pub async fn fetch_ticker(&self, symbol: &str) -> Result<ProviderResponse> {
        let request = self
            .http
            .get(format!("{}/api/v3/ticker/24hr", self.base_url))
            .query(&[("symbol", symbol)]);
        let row: Value = fetch_json(Provider::Binance, request).await?;
        Ok(ProviderResponse::Binance(BinancePayload::Tickers(vec![row])))
    }

    /// 24h tickers for `symbols`, batch first with per-symbol fallback.
    pub async fn quotes(&self, symbols: &[String]) -> Result<QuoteBatch> {
        batch_with_fallback(
            Provider::Binance,
            symbols,
            |all| async move { self.fetch_tickers(&all).await?.into_quotes() },
            |symbol| async move { self.fetch_ticker(&symbol).await?.into_quotes() },
        )
        .await
    }

    pub async fn fetch_klines(&self, symbol: &str, days: u32) -> Result<ProviderResponse> {
        let (interval, limit) = kline_window(days);
        debug!(%symbol, interval, limit, "fetching Binance klines");
        let request = self
            .http
            .get(format!("{}/api/v3/klines", self.base_url))
            .query(&[("symbol", symbol), ("interval", interval)])
            .query(&[("limit", limit)]);
        let rows: Vec<Value> = fetch_json(Provider::Binance, request).await?;
        Ok(ProviderResponse::Binance(BinancePayload::Klines(rows)))
    }

    pub async fn candles(&self, symbol: &str, days: u32) -> Result<Vec<Candle>> {
        self.fetch_klines(symbol, days).await?.into_candles()
    }
}

/// Candle interval and bucket count covering `days`: hourly up to one day,
/// 4-hourly up to a week, daily beyond. Capped at Binance's 1000-row limit.
pub fn kline_window(days: u32) -> (&'static str, u32) {
    let days = days.max(1);
    let (interval, per_day) = match days {
        1 => ("1h", 24),
        2..=7 => ("4h", 6),
        _ => ("1d", 1),
    };
    (interval, days.saturating_mul(per_day).min(1000))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    last_price: String,
    price_change_percent: String,
    #[serde(default)]
    price_change: Option<String>,
    #[serde(default)]
    open_price: Option<String>,
    #[serde(default)]
    high_price: Option<String>,
    #[serde(default)]
    low_price: Option<String>,
    #[serde(default)]
    volume: Option<String>,
    #[serde(default)]
    prev_close_price: Option<String>,
}

fn opt(raw: &Option<String>) -> Option<f64> {
    raw.as_deref().and_then(|s| s.parse().ok())
}

pub(crate) fn decode_tickers(rows: Vec<Value>) -> QuoteBatch {
    let mut batch = QuoteBatch::default();
    for row in rows {
        let label = row
            .get("symbol")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
            .to_string();
        let ticker: Ticker24h = match serde_json::from_value(row) {
            Ok(t) => t,
            Err(e) => {
                batch.reject(label, e);
                continue;
            }
        };
        let (Ok(price), Ok(change_pct)) = (
            ticker.last_price.parse::<f64>(),
            ticker.price_change_percent.parse::<f64>(),
        ) else {
            batch.reject(ticker.symbol, "non-numeric lastPrice or priceChangePercent");
            continue;
        };
        let fields = QuoteFields {
            price,
            change_pct,
            change: opt(&ticker.price_change),
            open: opt(&ticker.open_price),
            high: opt(&ticker.high_price),
            low: opt(&ticker.low_price),
            volume: opt(&ticker.volume),
            prev_close: opt(&ticker.prev_close_price),
        };
        batch.insert(ticker.symbol, fields);
    }
    batch
}

fn decode_kline(row: &Value) -> Option<Candle> {
    let cells = row.as_array()?;
    if cells.len() < 6 {
        return None;
    }
    Some(Candle {
        timestamp: cells[0].as_i64()?,
        open: value_f64(&cells[1])?,
        high: value_f64(&cells[2])?,
        low: value_f64(&cells[3])?,
        close: value_f64(&cells[4])?,
        volume: value_f64(&cells[5]),
    })
}

pub(crate) fn decode_klines(rows: Vec<Value>) -> Result<Vec<Candle>> {
    collect_rows(Provider::Binance, &rows, decode_kline)
}
