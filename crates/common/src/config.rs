use std::ops::RangeInclusive;
use std::time::Duration;

use crate::{Error, MissingSymbolPolicy, Result, SignalPolicy, SignalSort};

/// All configuration loaded from environment variables at startup.
/// Every variable is optional; malformed values are reported as `Error::Config`.
#[derive(Debug, Clone)]
pub struct Config {
    // HTTP server
    pub port: u16,

    // Database (quote cache + history)
    pub database_url: String,

    // Upstream providers
    pub provider_timeout: Duration,
    pub binance_base_url: String,
    pub tencent_quote_url: String,
    pub tencent_kline_url: String,
    pub coingecko_base_url: String,
    pub on_missing_symbol: MissingSymbolPolicy,

    // Signals
    pub signal_policy: SignalPolicy,
    pub signal_sort: SignalSort,
    pub signal_days: u32,
    pub ohlc_days: u32,

    // Notifications
    pub feishu_webhook_url: Option<String>,

    /// Optional TOML file with `[[instrument]]` and `[signals]` sections.
    pub config_path: Option<String>,
}

impl Config {
    /// Load configuration from the process environment, reading `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            port: parse_or(&var, "PORT", 3002)?,
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://trendboard.db?mode=rwc".to_string()),
            provider_timeout: Duration::from_secs(bounded(
                "PROVIDER_TIMEOUT_SECS",
                parse_or(&var, "PROVIDER_TIMEOUT_SECS", 10)?,
                1..=u64::MAX,
            )?),
            binance_base_url: var("BINANCE_BASE_URL")
                .unwrap_or_else(|| "https://api.binance.com".to_string()),
            tencent_quote_url: var("TENCENT_QUOTE_URL")
                .unwrap_or_else(|| "http://qt.gtimg.cn/q=".to_string()),
            tencent_kline_url: var("TENCENT_KLINE_URL").unwrap_or_else(|| {
                "https://web.ifzq.gtimg.cn/appstock/app/fqkline/get".to_string()
            }),
            coingecko_base_url: var("COINGECKO_BASE_URL")
                .unwrap_or_else(|| "https://api.coingecko.com".to_string()),
            on_missing_symbol: parse_or(&var, "ON_MISSING_SYMBOL", MissingSymbolPolicy::Zero)?,
            signal_policy: parse_or(&var, "SIGNAL_POLICY", SignalPolicy::MultiFactor)?,
            signal_sort: parse_or(&var, "SIGNAL_SORT", SignalSort::Signal)?,
            signal_days: bounded("SIGNAL_DAYS", parse_or(&var, "SIGNAL_DAYS", 100)?, DAYS)?,
            ohlc_days: bounded("OHLC_DAYS", parse_or(&var, "OHLC_DAYS", 60)?, DAYS)?,
            feishu_webhook_url: var("FEISHU_WEBHOOK_URL"),
            config_path: var("TRENDBOARD_CONFIG"),
        })
    }
}

/// Lookback accepted for the default signal and candle windows.
const DAYS: RangeInclusive<u32> = 1..=1000;

fn bounded<T>(key: &str, value: T, range: RangeInclusive<T>) -> Result<T>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(Error::Config(format!(
            "{key}={value}: must be between {} and {}",
            range.start(),
            range.end()
        )))
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{key}='{raw}': {e}"))),
        None => Ok(default),
    }
}
