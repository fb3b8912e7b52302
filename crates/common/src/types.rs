use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Market segment an instrument trades in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    Crypto,
    AShare,
    HShare,
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Market::Crypto => write!(f, "crypto"),
            Market::AShare => write!(f, "a_share"),
            Market::HShare => write!(f, "h_share"),
        }
    }
}

impl std::str::FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crypto" => Ok(Market::Crypto),
            "a_share" | "ashare" | "a" => Ok(Market::AShare),
            "h_share" | "hshare" | "hk" => Ok(Market::HShare),
            other => Err(format!("unknown market '{other}'")),
        }
    }
}

/// Upstream provider an instrument is quoted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Binance,
    Tencent,
    CoinGecko,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Binance => write!(f, "binance"),
            Provider::Tencent => write!(f, "tencent"),
            Provider::CoinGecko => write!(f, "coingecko"),
        }
    }
}

/// A tradable instrument from the static universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub id: String,
    /// Display symbol, e.g. "BTC" or "贵州茅台".
    pub symbol: String,
    pub name: String,
    pub market: Market,
    /// Exchange tag, e.g. "BINANCE", "SH", "HK".
    pub exchange: String,
    pub provider: Provider,
    /// Provider-specific code, e.g. "BTCUSDT" or "sh600519".
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
}

/// Where a quote's numbers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteOrigin {
    Live,
    Cache,
    Fixture,
    /// Zero-filled placeholder for a symbol the provider did not return.
    Missing,
}

impl std::fmt::Display for QuoteOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteOrigin::Live => write!(f, "live"),
            QuoteOrigin::Cache => write!(f, "cache"),
            QuoteOrigin::Fixture => write!(f, "fixture"),
            QuoteOrigin::Missing => write!(f, "missing"),
        }
    }
}

/// Provider-agnostic quote numbers, before instrument identity is attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteFields {
    pub price: f64,
    pub change_pct: f64,
    pub change: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
    pub prev_close: Option<f64>,
}

/// Normalized price quote returned by the price-list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub market: Market,
    pub exchange: String,
    pub price: f64,
    /// Percent change over the provider's reference window (24h or since previous close).
    #[serde(rename = "change24h")]
    pub change_pct: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_close: Option<f64>,
    pub origin: QuoteOrigin,
}

impl PriceQuote {
    pub fn from_fields(instrument: &Instrument, fields: QuoteFields, origin: QuoteOrigin) -> Self {
        Self {
            id: instrument.id.clone(),
            symbol: instrument.symbol.clone(),
            name: instrument.name.clone(),
            market: instrument.market,
            exchange: instrument.exchange.clone(),
            price: fields.price.max(0.0),
            change_pct: fields.change_pct,
            change: fields.change,
            open: fields.open,
            high: fields.high,
            low: fields.low,
            volume: fields.volume,
            prev_close: fields.prev_close,
            origin,
        }
    }

    /// Zero-valued placeholder for an instrument with no data.
    pub fn zero(instrument: &Instrument) -> Self {
        let fields = QuoteFields {
            change: Some(0.0),
            open: Some(0.0),
            high: Some(0.0),
            low: Some(0.0),
            volume: Some(0.0),
            ..QuoteFields::default()
        };
        Self::from_fields(instrument, fields, QuoteOrigin::Missing)
    }

    pub fn has_price(&self) -> bool {
        self.price > 0.0
    }
}

/// What to do with a requested symbol the provider did not return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingSymbolPolicy {
    /// Emit a zero-valued quote in its place.
    #[default]
    Zero,
    /// Leave it out of the result.
    Omit,
}

impl std::str::FromStr for MissingSymbolPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zero" => Ok(MissingSymbolPolicy::Zero),
            "omit" => Ok(MissingSymbolPolicy::Omit),
            other => Err(format!("expected 'zero' or 'omit', got '{other}'")),
        }
    }
}

/// Build the quote list in instrument order from provider results keyed by provider code.
pub fn assemble_quotes(
    instruments: &[Instrument],
    mut found: HashMap<String, QuoteFields>,
    origin: QuoteOrigin,
    policy: MissingSymbolPolicy,
) -> Vec<PriceQuote> {
    instruments
        .iter()
        .filter_map(|inst| match found.remove(&inst.code) {
            Some(fields) if fields.price > 0.0 => {
                Some(PriceQuote::from_fields(inst, fields, origin))
            }
            _ => match policy {
                MissingSymbolPolicy::Zero => Some(PriceQuote::zero(inst)),
                MissingSymbolPolicy::Omit => None,
            },
        })
        .collect()
}

/// One OHLC bucket. Series are kept oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket open time, Unix milliseconds.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

pub fn close_prices(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Discrete trading verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl SignalKind {
    /// Sort key: buy-class first, sell-class last.
    pub fn rank(self) -> u8 {
        match self {
            SignalKind::StrongBuy => 0,
            SignalKind::Buy => 1,
            SignalKind::Hold => 2,
            SignalKind::Sell => 3,
            SignalKind::StrongSell => 4,
        }
    }

    pub fn is_buy(self) -> bool {
        matches!(self, SignalKind::StrongBuy | SignalKind::Buy)
    }

    pub fn is_sell(self) -> bool {
        matches!(self, SignalKind::StrongSell | SignalKind::Sell)
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::StrongBuy => write!(f, "STRONG_BUY"),
            SignalKind::Buy => write!(f, "BUY"),
            SignalKind::Hold => write!(f, "HOLD"),
            SignalKind::Sell => write!(f, "SELL"),
            SignalKind::StrongSell => write!(f, "STRONG_SELL"),
        }
    }
}

/// Which rule set produces a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalPolicy {
    /// Classify by period percent change only.
    Threshold,
    /// RSI, MA stack and long-MA deviation rules over candle history.
    #[default]
    MultiFactor,
}

impl std::fmt::Display for SignalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalPolicy::Threshold => write!(f, "threshold"),
            SignalPolicy::MultiFactor => write!(f, "multi_factor"),
        }
    }
}

impl std::str::FromStr for SignalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "threshold" => Ok(SignalPolicy::Threshold),
            "multi_factor" | "multifactor" => Ok(SignalPolicy::MultiFactor),
            other => Err(format!("expected 'threshold' or 'multi_factor', got '{other}'")),
        }
    }
}

/// Ordering applied to the bulk signal list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSort {
    /// STRONG_BUY, BUY, HOLD, SELL, STRONG_SELL; ties by descending percent change.
    #[default]
    Signal,
    /// Descending percent change.
    Change,
}

impl std::str::FromStr for SignalSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "signal" => Ok(SignalSort::Signal),
            "change" => Ok(SignalSort::Change),
            other => Err(format!("expected 'signal' or 'change', got '{other}'")),
        }
    }
}

/// Latest feature values a signal was derived from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub price: Option<f64>,
    pub change_pct: Option<f64>,
    pub rsi: Option<f64>,
    pub ma_short: Option<f64>,
    pub ma_mid: Option<f64>,
    pub ma_long: Option<f64>,
}

/// A verdict together with the reasons and values behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    pub signal: SignalKind,
    pub reasons: Vec<String>,
    pub values: IndicatorSnapshot,
}

/// Per-instrument signal object served by the signal endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentSignal {
    pub instrument_id: String,
    pub symbol: String,
    pub name: String,
    pub market: Market,
    pub policy: SignalPolicy,
    pub signal: SignalKind,
    pub reasons: Vec<String>,
    pub indicator_values: IndicatorSnapshot,
    pub timestamp: DateTime<Utc>,
}

impl InstrumentSignal {
    pub fn new(instrument: &Instrument, policy: SignalPolicy, report: SignalReport) -> Self {
        Self {
            instrument_id: instrument.id.clone(),
            symbol: instrument.symbol.clone(),
            name: instrument.name.clone(),
            market: instrument.market,
            policy,
            signal: report.signal,
            reasons: report.reasons,
            indicator_values: report.values,
            timestamp: Utc::now(),
        }
    }
}
