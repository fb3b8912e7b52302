//! Provider payloads as a tagged union with explicit decoders into common types.

use std::collections::HashMap;
use std::future::Future;

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use common::{Candle, Error, Provider, QuoteFields, Result};

use crate::binance::{self, BinancePayload};
use crate::coingecko::{self, CoinGeckoPayload};
use crate::tencent::{self, TencentPayload};

/// Raw response from one upstream call, tagged by provider and payload kind.
#[derive(Debug, Clone)]
pub enum ProviderResponse {
    Binance(BinancePayload),
    TencentBatch(TencentPayload),
    CoinGecko(CoinGeckoPayload),
}

impl ProviderResponse {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderResponse::Binance(_) => Provider::Binance,
            ProviderResponse::TencentBatch(_) => Provider::Tencent,
            ProviderResponse::CoinGecko(_) => Provider::CoinGecko,
        }
    }

    /// Decode a quote payload. Bad records are isolated into `QuoteBatch::rejected`.
    pub fn into_quotes(self) -> Result<QuoteBatch> {
        let provider = self.provider();
        match self {
            ProviderResponse::Binance(BinancePayload::Tickers(rows)) => {
                Ok(binance::decode_tickers(rows))
            }
            ProviderResponse::TencentBatch(TencentPayload::Quotes(text)) => {
                Ok(tencent::parse_batch(&text))
            }
            ProviderResponse::CoinGecko(CoinGeckoPayload::Prices(map)) => {
                Ok(coingecko::decode_prices(map))
            }
            _ => Err(Error::malformed(provider, "expected a quote payload")),
        }
    }

    /// Decode a candle payload, oldest first.
    pub fn into_candles(self) -> Result<Vec<Candle>> {
        let provider = self.provider();
        match self {
            ProviderResponse::Binance(BinancePayload::Klines(rows)) => binance::decode_klines(rows),
            ProviderResponse::TencentBatch(TencentPayload::Klines { code, body }) => {
                tencent::decode_klines(&code, &body)
            }
            ProviderResponse::CoinGecko(CoinGeckoPayload::Ohlc(rows)) => {
                coingecko::decode_ohlc(rows)
            }
            _ => Err(Error::malformed(provider, "expected a candle payload")),
        }
    }
}

/// Quotes decoded from one or more provider calls, keyed by provider code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteBatch {
    pub quotes: HashMap<String, QuoteFields>,
    /// `(code, reason)` for every record that could not be decoded.
    pub rejected: Vec<(String, String)>,
}

impl QuoteBatch {
    pub fn insert(&mut self, code: impl Into<String>, fields: QuoteFields) {
        self.quotes.insert(code.into(), fields);
    }

    pub fn reject(&mut self, code: impl Into<String>, reason: impl ToString) {
        self.rejected.push((code.into(), reason.to_string()));
    }

    pub fn merge(&mut self, other: QuoteBatch) {
        self.quotes.extend(other.quotes);
        self.rejected.extend(other.rejected);
        let quotes = &self.quotes;
        self.rejected.retain(|(code, _)| !quotes.contains_key(code));
    }

    /// Requested codes with no decoded quote.
    pub fn missing(&self, codes: &[String]) -> Vec<String> {
        codes
            .iter()
            .filter(|c| !self.quotes.contains_key(c.as_str()))
            .cloned()
            .collect()
    }
}

/// Fetch `codes` in one batch call, then retry whatever the batch did not
/// yield one symbol at a time.
///
/// If the batch call itself fails every code is retried individually. The
/// batch error is returned only when no individual fetch succeeds either.
pub(crate) async fn batch_with_fallback<B, FB, S, FS>(
    provider: Provider,
    codes: &[String],
    batch: B,
    single: S,
) -> Result<QuoteBatch>
where
    B: FnOnce(Vec<String>) -> FB,
    FB: Future<Output = Result<QuoteBatch>>,
    S: Fn(String) -> FS,
    FS: Future<Output = Result<QuoteBatch>>,
{
    if codes.is_empty() {
        return Ok(QuoteBatch::default());
    }

    let (mut out, batch_err) = match batch(codes.to_vec()).await {
        Ok(found) => (found, None),
        Err(err) => {
            warn!(%provider, error = %err, "batch fetch failed, falling back to per-symbol requests");
            (QuoteBatch::default(), Some(err))
        }
    };

    let retry = out.missing(codes);
    if retry.is_empty() {
        return Ok(out);
    }
    debug!(%provider, count = retry.len(), "fetching symbols individually");

    let attempts = retry.into_iter().map(|code| {
        let fut = single(code.clone());
        async move { (code, fut.await) }
    });
    for (code, result) in join_all(attempts).await {
        match result {
            Ok(mut found) => match found.quotes.remove(&code) {
                Some(fields) => {
                    let mut hit = QuoteBatch::default();
                    hit.insert(code, fields);
                    out.merge(hit);
                }
                // Whatever record came back, it is reported under the code asked for.
                None => {
                    let reason = found
                        .rejected
                        .into_iter()
                        .next()
                        .map(|(_, reason)| reason)
                        .unwrap_or_else(|| "no quote returned".to_string());
                    out.rejected.retain(|(c, _)| c != &code);
                    out.reject(code, reason);
                }
            },
            Err(err) => {
                warn!(%provider, %code, error = %err, "per-symbol fetch failed");
                out.rejected.retain(|(c, _)| c != &code);
                out.reject(code, err);
            }
        }
    }

    match batch_err {
        Some(err) if out.quotes.is_empty() => Err(err),
        _ => Ok(out),
    }
}

/// Numeric JSON value that may arrive as a number or a numeric string.
pub(crate) fn value_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Keep well-formed rows; fail only if a non-empty payload had none.
pub(crate) fn collect_rows<F>(provider: Provider, rows: &[Value], decode: F) -> Result<Vec<Candle>>
where
    F: Fn(&Value) -> Option<Candle>,
{
    let mut candles: Vec<Candle> = rows.iter().filter_map(&decode).collect();
    let skipped = rows.len() - candles.len();
    if skipped > 0 {
        if candles.is_empty() {
            return Err(Error::malformed(provider, format!("all {skipped} candle rows are malformed")));
        }
        debug!(%provider, skipped, "skipped malformed candle rows");
    }
    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}
