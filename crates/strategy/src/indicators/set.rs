use serde::Serialize;

use common::{Candle, Error, IndicatorSnapshot, Result};

use super::{series, Rsi, Sma};
use crate::SignalConfig;

/// MA and RSI series aligned 1:1 with a close-price series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSet {
    pub ma_short: Vec<Option<f64>>,
    pub ma_mid: Vec<Option<f64>>,
    pub ma_long: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
}

/// Fully-defined latest values of an [`IndicatorSet`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatestValues {
    pub price: f64,
    pub rsi: f64,
    pub ma_short: f64,
    pub ma_mid: f64,
    pub ma_long: f64,
}

/// Chart-ready series: candle timestamps and closes next to the indicator values.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSeries {
    pub timestamps: Vec<i64>,
    pub close: Vec<f64>,
    #[serde(flatten)]
    pub indicators: IndicatorSet,
}

impl IndicatorSet {
    pub fn compute(closes: &[f64], cfg: &SignalConfig) -> Self {
        Self {
            ma_short: series(&mut Sma::new(cfg.short_window), closes),
            ma_mid: series(&mut Sma::new(cfg.mid_window), closes),
            ma_long: series(&mut Sma::new(cfg.long_window), closes),
            rsi: series(&mut Rsi::new(cfg.rsi_period), closes),
        }
    }

    /// Latest value of every series, or `InsufficientHistory` if any is still undefined.
    pub fn latest(&self, closes: &[f64], cfg: &SignalConfig) -> Result<LatestValues> {
        let insufficient = || Error::InsufficientHistory {
            required: cfg.required_history(),
            available: closes.len(),
        };
        let last = |s: &[Option<f64>]| s.last().copied().flatten();

        Ok(LatestValues {
            price: closes.last().copied().ok_or_else(insufficient)?,
            rsi: last(&self.rsi).ok_or_else(insufficient)?,
            ma_short: last(&self.ma_short).ok_or_else(insufficient)?,
            ma_mid: last(&self.ma_mid).ok_or_else(insufficient)?,
            ma_long: last(&self.ma_long).ok_or_else(insufficient)?,
        })
    }

    /// Whatever latest values exist, undefined ones left as `None`.
    pub fn snapshot(&self, closes: &[f64]) -> IndicatorSnapshot {
        let last = |s: &[Option<f64>]| s.last().copied().flatten();
        IndicatorSnapshot {
            price: closes.last().copied(),
            change_pct: period_change_pct(closes),
            rsi: last(&self.rsi),
            ma_short: last(&self.ma_short),
            ma_mid: last(&self.ma_mid),
            ma_long: last(&self.ma_long),
        }
    }
}

impl IndicatorSeries {
    pub fn from_candles(candles: &[Candle], cfg: &SignalConfig) -> Self {
        let close = common::close_prices(candles);
        Self {
            timestamps: candles.iter().map(|c| c.timestamp).collect(),
            indicators: IndicatorSet::compute(&close, cfg),
            close,
        }
    }
}

/// Percent change of the last close against the one before it.
pub fn period_change_pct(closes: &[f64]) -> Option<f64> {
    match closes {
        [.., prev, last] if *prev > 0.0 => Some((last - prev) / prev * 100.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cfg() -> SignalConfig {
        SignalConfig {
            short_window: 2,
            mid_window: 3,
            long_window: 4,
            rsi_period: 2,
            ..SignalConfig::default()
        }
    }

    #[test]
    fn series_are_aligned_with_closes() {
        let closes: Vec<f64> = (1..=10).map(f64::from).collect();
        let set = IndicatorSet::compute(&closes, &SignalConfig::default());
        assert_eq!(set.ma_short.len(), 10);
        assert_eq!(set.ma_mid.len(), 10);
        assert_eq!(set.ma_long.len(), 10);
        assert_eq!(set.rsi.len(), 10);
        assert_eq!(set.ma_short[6], Some(4.0));
        assert!(set.ma_long.iter().all(Option::is_none));
    }

    #[test]
    fn latest_reports_insufficient_history() {
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0];
        let cfg = SignalConfig::default();
        let set = IndicatorSet::compute(&closes, &cfg);
        let err = set.latest(&closes, &cfg).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientHistory { required: 99, available: 5 }
        ));
    }

    #[test]
    fn latest_defined_with_enough_history() {
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0];
        let cfg = small_cfg();
        let set = IndicatorSet::compute(&closes, &cfg);
        let latest = set.latest(&closes, &cfg).unwrap();
        assert_eq!(latest.price, 5.0);
        assert_eq!(latest.ma_short, 4.5);
        assert_eq!(latest.ma_mid, 4.0);
        assert_eq!(latest.ma_long, 3.5);
        assert_eq!(latest.rsi, 100.0);
    }

    #[test]
    fn snapshot_keeps_partial_values() {
        let closes = [10.0, 11.0, 12.0];
        let set = IndicatorSet::compute(&closes, &SignalConfig::default());
        let snap = set.snapshot(&closes);
        assert_eq!(snap.price, Some(12.0));
        assert_eq!(snap.ma_short, None);
        let change = snap.change_pct.unwrap();
        assert!((change - 100.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn period_change_needs_two_closes() {
        assert_eq!(period_change_pct(&[]), None);
        assert_eq!(period_change_pct(&[5.0]), None);
        assert_eq!(period_change_pct(&[0.0, 5.0]), None);
        assert_eq!(period_change_pct(&[4.0, 5.0]), Some(25.0));
    }

    #[test]
    fn series_flattens_indicator_keys() {
        let candles: Vec<Candle> = (0..3)
            .map(|i| Candle {
                timestamp: i * 1000,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0 + i as f64,
                volume: None,
            })
            .collect();
        let series = IndicatorSeries::from_candles(&candles, &small_cfg());
        let json = serde_json::to_value(&series).unwrap();
        assert_eq!(json["timestamps"][2], 2000);
        assert_eq!(json["maShort"][1], 1.5);
        assert!(json["maLong"][2].is_null());
    }
}
