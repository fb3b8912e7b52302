use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Parameters for both signal policies.
///
/// Read from the `[signals]` table of the TOML config file:
/// ```toml
/// [signals]
/// short_window = 7
/// mid_window = 25
/// long_window = 99
/// rsi_period = 14
/// oversold = 30.0
/// overbought = 70.0
/// deviation = 0.05
/// change_pct = 1.0
/// strong_change_pct = 3.0
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalConfig {
    pub short_window: usize,
    pub mid_window: usize,
    pub long_window: usize,
    pub rsi_period: usize,
    /// RSI below this is oversold.
    pub oversold: f64,
    /// RSI above this is overbought.
    pub overbought: f64,
    /// Fractional distance from the long MA that counts as stretched.
    pub deviation: f64,
    /// Threshold policy: |change| above this is BUY / SELL.
    pub change_pct: f64,
    /// Threshold policy: |change| above this is STRONG_BUY / STRONG_SELL.
    pub strong_change_pct: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            short_window: 7,
            mid_window: 25,
            long_window: 99,
            rsi_period: 14,
            oversold: 30.0,
            overbought: 70.0,
            deviation: 0.05,
            change_pct: 1.0,
            strong_change_pct: 3.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SignalFile {
    #[serde(default)]
    signals: SignalConfig,
}

impl SignalConfig {
    /// Parse the `[signals]` table; a missing table yields the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: SignalFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("invalid signal config: {e}")))?;
        file.signals.validate()?;
        Ok(file.signals)
    }

    pub fn validate(&self) -> Result<()> {
        if self.short_window == 0 || self.mid_window == 0 || self.long_window == 0 {
            return Err(Error::Config("MA windows must be > 0".into()));
        }
        if !(self.short_window < self.mid_window && self.mid_window < self.long_window) {
            return Err(Error::Config(format!(
                "MA windows must be increasing, got {}/{}/{}",
                self.short_window, self.mid_window, self.long_window
            )));
        }
        if self.rsi_period < 2 {
            return Err(Error::Config("rsi_period must be >= 2".into()));
        }
        if !(0.0..=100.0).contains(&self.oversold)
            || !(0.0..=100.0).contains(&self.overbought)
            || self.oversold >= self.overbought
        {
            return Err(Error::Config(format!(
                "RSI bounds must satisfy 0 <= oversold < overbought <= 100, got {}/{}",
                self.oversold, self.overbought
            )));
        }
        if !(0.0..1.0).contains(&self.deviation) {
            return Err(Error::Config("deviation must be in [0, 1)".into()));
        }
        if self.change_pct < 0.0 || self.strong_change_pct < self.change_pct {
            return Err(Error::Config(
                "threshold cut points must satisfy 0 <= change_pct <= strong_change_pct".into(),
            ));
        }
        Ok(())
    }

    /// Candles needed before every indicator has a latest value.
    pub fn required_history(&self) -> usize {
        self.long_window
            .max(self.mid_window)
            .max(self.short_window)
            .max(self.rsi_period + 1)
    }
}
