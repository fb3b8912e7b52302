use chrono::{NaiveDate, TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use common::{Candle, Error, Provider, QuoteFields, Result};

use crate::http::fetch_bytes;
use crate::response::{batch_with_fallback, collect_rows, value_f64, ProviderResponse, QuoteBatch};

/// Minimum `~`-separated fields a quote record needs to be usable.
const MIN_FIELDS: usize = 10;

/// Tencent quote payloads, already decoded from GBK.
#[derive(Debug, Clone)]
pub enum TencentPayload {
    /// `v_<code>="f0~f1~...";` records, one per requested code.
    Quotes(String),
    /// Forward-adjusted daily kline document for `code`.
    Klines { code: String, body: Value },
}

/// Client for the Tencent A-share/H-share quote and kline endpoints.
pub struct TencentClient {
    http: Client,
    quote_url: String,
    kline_url: String,
}

impl TencentClient {
    /// `quote_url` is the prefix codes are appended to, e.g. `http://qt.gtimg.cn/q=`.
    pub fn new(http: Client, quote_url: impl Into<String>, kline_url: impl Into<String>) -> Self {
        Self {
            http,
            quote_url: quote_url.into(),
            kline_url: kline_url.into(),
        }
    }

    /// One request for a comma-joined list of codes.
    pub async fn fetch_batch(&self, codes: &[String]) -> Result<ProviderResponse> {
        let url = format!("{}{}", self.quote_url, codes.join(","));
        let body = fetch_bytes(Provider::Tencent, self.http.get(url)).await?;
        Ok(ProviderResponse::TencentBatch(TencentPayload::Quotes(decode_gbk(&body))))
    }

    /// Batch first; codes the batch did not yield are fetched one by one.
    pub async fn quotes(&self, codes: &[String]) -> Result<QuoteBatch> {
        batch_with_fallback(
            Provider::Tencent,
            codes,
            |all| async move { self.fetch_batch(&all).await?.into_quotes() },
            |code| async move {
                self.fetch_batch(std::slice::from_ref(&code))
                    .await?
                    .into_quotes()
            },
        )
        .await
    }

    pub async fn fetch_klines(&self, code: &str, days: u32) -> Result<ProviderResponse> {
        let param = format!("{code},day,,,{},qfq", days.max(1));
        debug!(%code, days, "fetching Tencent klines");
        let request = self.http.get(&self.kline_url).query(&[("param", param)]);
        let raw = fetch_bytes(Provider::Tencent, request).await?;
        let body: Value = serde_json::from_str(&decode_gbk(&raw))
            .map_err(|e| Error::malformed(Provider::Tencent, e))?;
        Ok(ProviderResponse::TencentBatch(TencentPayload::Klines {
            code: code.to_string(),
            body,
        }))
    }

    pub async fn candles(&self, code: &str, days: u32) -> Result<Vec<Candle>> {
        self.fetch_klines(code, days).await?.into_candles()
    }
}

/// Decode a GBK body. Unmappable bytes become U+FFFD rather than failing.
pub fn decode_gbk(bytes: &[u8]) -> String {
    let (text, _, had_errors) = encoding_rs::GBK.decode(bytes);
    if had_errors {
        debug!("GBK body contained unmappable bytes");
    }
    text.into_owned()
}

/// Parse every record in a batch response. A bad record is rejected on its
/// own and never fails its neighbours.
pub fn parse_batch(text: &str) -> QuoteBatch {
    let mut batch = QuoteBatch::default();
    for record in text.split(';').map(str::trim).filter(|r| !r.is_empty()) {
        match parse_record(record) {
            Ok((code, fields)) => batch.insert(code, fields),
            Err((code, reason)) => batch.reject(code, reason),
        }
    }
    batch
}

/// `v_sh600519="1~name~600519~price~prev_close~open~volume~amount~high~low~..."`
fn parse_record(record: &str) -> std::result::Result<(String, QuoteFields), (String, String)> {
    let (lhs, rhs) = record
        .split_once('=')
        .ok_or_else(|| (record.to_string(), "no '=' in record".to_string()))?;
    let code = lhs.trim().trim_start_matches("v_").to_string();
    let reject = |reason: &str| (code.clone(), reason.to_string());

    let payload = rhs.trim().trim_matches('"');
    let parts: Vec<&str> = payload.split('~').collect();
    if parts.len() < MIN_FIELDS {
        return Err(reject("too few fields"));
    }

    let num = |i: usize| parts[i].trim().parse::<f64>().ok().filter(|v| v.is_finite());
    let price = num(3).ok_or_else(|| reject("non-numeric price"))?;
    if price <= 0.0 {
        return Err(reject("zero price"));
    }

    let prev_close = num(4).unwrap_or(0.0);
    let change = price - prev_close;
    let change_pct = if prev_close > 0.0 {
        change / prev_close * 100.0
    } else {
        0.0
    };

    Ok((
        code.clone(),
        QuoteFields {
            price,
            change_pct,
            change: Some(change),
            open: num(5),
            high: num(8),
            low: num(9),
            volume: num(6),
            prev_close: Some(prev_close),
        },
    ))
}

/// Rows are `[date, open, close, high, low, volume, ...]` under
/// `data.<code>.qfqday` (or `day` for instruments without adjustment).
pub(crate) fn decode_klines(code: &str, body: &Value) -> Result<Vec<Candle>> {
    let node = &body["data"][code];
    let rows = match node.get("qfqday").or_else(|| node.get("day")) {
        Some(Value::Array(rows)) => rows.as_slice(),
        _ => {
            debug!(%code, "no kline rows in response");
            return Ok(Vec::new());
        }
    };
    collect_rows(Provider::Tencent, rows, decode_kline)
}

fn decode_kline(row: &Value) -> Option<Candle> {
    let cells = row.as_array()?;
    if cells.len() < 5 {
        return None;
    }
    let date = NaiveDate::parse_from_str(cells[0].as_str()?, "%Y-%m-%d").ok()?;
    let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    Some(Candle {
        timestamp: midnight.timestamp_millis(),
        open: value_f64(&cells[1])?,
        close: value_f64(&cells[2])?,
        high: value_f64(&cells[3])?,
        low: value_f64(&cells[4])?,
        volume: cells.get(5).and_then(value_f64),
    })
}
