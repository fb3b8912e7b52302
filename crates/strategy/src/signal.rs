//! Rule sets that turn features into a [`SignalKind`].

use common::{Error, IndicatorSnapshot, SignalKind, SignalReport};

use crate::indicators::IndicatorSet;
use crate::SignalConfig;

/// Classify by percent change alone.
///
/// Cut points are strict: a change of exactly `change_pct` is HOLD, exactly
/// `strong_change_pct` is BUY (or SELL on the negative side).
pub fn threshold(change_pct: f64, cfg: &SignalConfig) -> SignalReport {
    let values = IndicatorSnapshot {
        change_pct: Some(change_pct),
        ..IndicatorSnapshot::default()
    };

    if !change_pct.is_finite() {
        return SignalReport {
            signal: SignalKind::Hold,
            reasons: vec!["insufficient data: no valid percent change".into()],
            values,
        };
    }

    let (signal, reason) = if change_pct > cfg.strong_change_pct {
        (
            SignalKind::StrongBuy,
            format!("change {change_pct:+.2}% above +{}%", cfg.strong_change_pct),
        )
    } else if change_pct > cfg.change_pct {
        (
            SignalKind::Buy,
            format!("change {change_pct:+.2}% above +{}%", cfg.change_pct),
        )
    } else if change_pct < -cfg.strong_change_pct {
        (
            SignalKind::StrongSell,
            format!("change {change_pct:+.2}% below -{}%", cfg.strong_change_pct),
        )
    } else if change_pct < -cfg.change_pct {
        (
            SignalKind::Sell,
            format!("change {change_pct:+.2}% below -{}%", cfg.change_pct),
        )
    } else {
        (
            SignalKind::Hold,
            format!("change {change_pct:+.2}% within ±{}%", cfg.change_pct),
        )
    };

    SignalReport {
        signal,
        reasons: vec![reason],
        values,
    }
}

/// RSI, MA-stack and long-MA deviation rules over a close-price history.
///
/// Rules run in a fixed order and the last applicable one wins, except that the
/// MA-stack and deviation rules never flip a verdict already pointing the other
/// way. A reason is recorded only when a rule actually assigns.
pub fn multi_factor(closes: &[f64], cfg: &SignalConfig) -> SignalReport {
    let set = IndicatorSet::compute(closes, cfg);
    let values = set.snapshot(closes);

    let latest = match set.latest(closes, cfg) {
        Ok(latest) => latest,
        Err(err) => return insufficient(&err, values),
    };

    let mut signal = SignalKind::Hold;
    let mut reasons = Vec::new();
    let (s, m, l) = (cfg.short_window, cfg.mid_window, cfg.long_window);

    if latest.rsi < cfg.oversold {
        signal = SignalKind::Buy;
        reasons.push(format!("RSI oversold ({:.1} < {})", latest.rsi, cfg.oversold));
    } else if latest.rsi > cfg.overbought {
        signal = SignalKind::Sell;
        reasons.push(format!("RSI overbought ({:.1} > {})", latest.rsi, cfg.overbought));
    }

    if latest.ma_short > latest.ma_mid && latest.ma_mid > latest.ma_long {
        if signal != SignalKind::Sell {
            signal = SignalKind::Buy;
            reasons.push(format!("bullish MA stack (MA{s} > MA{m} > MA{l})"));
        }
    } else if latest.ma_short < latest.ma_mid && latest.ma_mid < latest.ma_long {
        if signal != SignalKind::Buy {
            signal = SignalKind::Sell;
            reasons.push(format!("bearish MA stack (MA{s} < MA{m} < MA{l})"));
        }
    }

    let pct = cfg.deviation * 100.0;
    if latest.price < latest.ma_long * (1.0 - cfg.deviation) {
        if signal != SignalKind::Sell {
            signal = SignalKind::Buy;
            reasons.push(format!("price more than {pct:.0}% below MA{l}"));
        }
    } else if latest.price > latest.ma_long * (1.0 + cfg.deviation) {
        if signal != SignalKind::Buy {
            signal = SignalKind::Sell;
            reasons.push(format!("price more than {pct:.0}% above MA{l}"));
        }
    }

    SignalReport {
        signal,
        reasons,
        values,
    }
}

/// HOLD verdict for a series too short to evaluate.
pub fn insufficient(err: &Error, values: IndicatorSnapshot) -> SignalReport {
    let reason = match err {
        Error::InsufficientHistory {
            required,
            available,
        } => format!("insufficient data: need {required} candles, have {available}"),
        other => format!("insufficient data: {other}"),
    };
    SignalReport {
        signal: SignalKind::Hold,
        reasons: vec![reason],
        values,
    }
}

/// HOLD verdict when no market data could be obtained at all.
pub fn unavailable(err: &Error) -> SignalReport {
    SignalReport {
        signal: SignalKind::Hold,
        reasons: vec![format!("market data unavailable: {err}")],
        values: IndicatorSnapshot::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cfg() -> SignalConfig {
        SignalConfig {
            short_window: 2,
            mid_window: 3,
            long_window: 5,
            rsi_period: 3,
            ..SignalConfig::default()
        }
    }

    #[test]
    fn threshold_classes() {
        let cfg = SignalConfig::default();
        assert_eq!(threshold(3.5, &cfg).signal, SignalKind::StrongBuy);
        assert_eq!(threshold(1.5, &cfg).signal, SignalKind::Buy);
        assert_eq!(threshold(0.2, &cfg).signal, SignalKind::Hold);
        assert_eq!(threshold(-1.5, &cfg).signal, SignalKind::Sell);
        assert_eq!(threshold(-3.5, &cfg).signal, SignalKind::StrongSell);
    }

    #[test]
    fn threshold_boundaries_are_strict() {
        let cfg = SignalConfig::default();
        assert_eq!(threshold(1.0, &cfg).signal, SignalKind::Hold);
        assert_eq!(threshold(-1.0, &cfg).signal, SignalKind::Hold);
        assert_eq!(threshold(3.0, &cfg).signal, SignalKind::Buy);
        assert_eq!(threshold(-3.0, &cfg).signal, SignalKind::Sell);
    }

    #[test]
    fn threshold_is_idempotent() {
        let cfg = SignalConfig::default();
        assert_eq!(threshold(2.25, &cfg), threshold(2.25, &cfg));
    }

    #[test]
    fn threshold_nan_holds() {
        let report = threshold(f64::NAN, &SignalConfig::default());
        assert_eq!(report.signal, SignalKind::Hold);
        assert!(report.reasons[0].starts_with("insufficient data"));
    }

    #[test]
    fn five_candles_against_ma99_holds() {
        let report = multi_factor(&[10.0, 9.0, 8.0, 7.0, 6.0], &SignalConfig::default());
        assert_eq!(report.signal, SignalKind::Hold);
        assert_eq!(report.reasons, vec!["insufficient data: need 99 candles, have 5"]);
        assert_eq!(report.values.price, Some(6.0));
        assert_eq!(report.values.ma_long, None);
    }

    #[test]
    fn empty_history_holds() {
        let report = multi_factor(&[], &SignalConfig::default());
        assert_eq!(report.signal, SignalKind::Hold);
        assert!(report.reasons[0].contains("have 0"));
    }

    #[test]
    fn uptrend_is_overbought_and_guards_hold_sell() {
        // RSI 100 → SELL; bullish stack guarded; price far above MA5 keeps SELL.
        let closes = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0];
        let report = multi_factor(&closes, &small_cfg());
        assert_eq!(report.signal, SignalKind::Sell);
        assert_eq!(report.reasons.len(), 2);
        assert!(report.reasons[0].starts_with("RSI overbought"));
        assert!(report.reasons[1].contains("above MA5"));
    }

    #[test]
    fn downtrend_is_oversold_and_guards_hold_buy() {
        let closes = [17.0, 16.0, 15.0, 14.0, 13.0, 12.0, 11.0, 10.0];
        let report = multi_factor(&closes, &small_cfg());
        assert_eq!(report.signal, SignalKind::Buy);
        assert_eq!(report.reasons.len(), 2);
        assert!(report.reasons[0].starts_with("RSI oversold"));
        assert!(report.reasons[1].contains("below MA5"));
    }

    #[test]
    fn bullish_stack_with_neutral_rsi_buys() {
        // Rise then a pullback: RSI stays between 30 and 70, MAs stack upward,
        // price within 5% of the long MA.
        let closes = [100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 106.0, 107.0, 108.0, 106.5];
        let cfg = small_cfg();
        let report = multi_factor(&closes, &cfg);
        let rsi = report.values.rsi.unwrap();
        assert!(rsi > 30.0 && rsi < 70.0, "rsi {rsi}");
        assert_eq!(report.signal, SignalKind::Buy);
        assert_eq!(report.reasons, vec!["bullish MA stack (MA2 > MA3 > MA5)"]);
    }

    #[test]
    fn flat_series_is_overbought_by_saturation() {
        // Zero average loss saturates RSI at 100; flat MAs form no stack.
        let report = multi_factor(&[50.0; 10], &small_cfg());
        assert_eq!(report.signal, SignalKind::Sell);
        assert_eq!(report.reasons.len(), 1);
    }
}
