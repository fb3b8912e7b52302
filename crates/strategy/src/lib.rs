pub mod aggregator;
pub mod config;
pub mod indicators;
pub mod signal;

pub use aggregator::{sort_signals, IndicatorReport, SignalAggregator};
pub use config::SignalConfig;
pub use indicators::{Indicator, IndicatorSeries, IndicatorSet, Rsi, Sma};
