use std::cmp::Ordering;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use common::{
    close_prices, DataSource, Error, Instrument, InstrumentSignal, Result, SignalPolicy,
    SignalSort,
};

use crate::indicators::IndicatorSeries;
use crate::signal;
use crate::SignalConfig;

/// Signal plus the chart series it was computed from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorReport {
    #[serde(flatten)]
    pub signal: InstrumentSignal,
    /// `None` when candles could not be fetched or the threshold policy was used.
    pub series: Option<IndicatorSeries>,
}

/// Runs the signal policies over instruments pulled from a [`DataSource`].
pub struct SignalAggregator {
    source: Arc<dyn DataSource>,
    config: SignalConfig,
    sort: SignalSort,
}

impl SignalAggregator {
    pub fn new(source: Arc<dyn DataSource>, config: SignalConfig, sort: SignalSort) -> Self {
        Self {
            source,
            config,
            sort,
        }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Signal for one instrument. Provider failures degrade to HOLD; only
    /// non-provider errors (e.g. database) propagate.
    pub async fn evaluate(
        &self,
        instrument: &Instrument,
        policy: SignalPolicy,
        days: u32,
    ) -> Result<InstrumentSignal> {
        Ok(self.report(instrument, policy, days).await?.signal)
    }

    /// Like [`evaluate`](Self::evaluate), with the indicator series attached.
    pub async fn report(
        &self,
        instrument: &Instrument,
        policy: SignalPolicy,
        days: u32,
    ) -> Result<IndicatorReport> {
        match policy {
            SignalPolicy::Threshold => {
                let quotes = self.source.quotes(std::slice::from_ref(instrument)).await;
                let report = match quotes {
                    Ok(quotes) => match quotes.into_iter().find(|q| q.id == instrument.id) {
                        Some(q) if q.has_price() => signal::threshold(q.change_pct, &self.config),
                        _ => signal::unavailable(&Error::unavailable(
                            instrument.provider,
                            format!("no quote for {}", instrument.code),
                        )),
                    },
                    Err(e) if e.is_degradable() => {
                        warn!(id = %instrument.id, error = %e, "Quote fetch failed, holding");
                        signal::unavailable(&e)
                    }
                    Err(e) => return Err(e),
                };
                Ok(IndicatorReport {
                    signal: InstrumentSignal::new(instrument, policy, report),
                    series: None,
                })
            }
            SignalPolicy::MultiFactor => match self.source.candles(instrument, days).await {
                Ok(candles) => {
                    let closes = close_prices(&candles);
                    let report = signal::multi_factor(&closes, &self.config);
                    debug!(id = %instrument.id, signal = %report.signal, candles = candles.len(), "Signal computed");
                    Ok(IndicatorReport {
                        signal: InstrumentSignal::new(instrument, policy, report),
                        series: Some(IndicatorSeries::from_candles(&candles, &self.config)),
                    })
                }
                Err(e) if e.is_degradable() => {
                    warn!(id = %instrument.id, error = %e, "Candle fetch failed, holding");
                    Ok(IndicatorReport {
                        signal: InstrumentSignal::new(instrument, policy, signal::unavailable(&e)),
                        series: None,
                    })
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Signals for every instrument, sorted by the configured comparator.
    /// One instrument failing never removes the others.
    pub async fn evaluate_all(
        &self,
        instruments: &[Instrument],
        policy: SignalPolicy,
        days: u32,
    ) -> Vec<InstrumentSignal> {
        let mut signals = match policy {
            SignalPolicy::Threshold => self.threshold_all(instruments).await,
            SignalPolicy::MultiFactor => {
                let results = join_all(
                    instruments
                        .iter()
                        .map(|inst| self.evaluate(inst, policy, days)),
                )
                .await;
                instruments
                    .iter()
                    .zip(results)
                    .map(|(inst, result)| {
                        result.unwrap_or_else(|e| {
                            warn!(id = %inst.id, error = %e, "Signal evaluation failed");
                            InstrumentSignal::new(inst, policy, signal::unavailable(&e))
                        })
                    })
                    .collect()
            }
        };
        sort_signals(&mut signals, self.sort);
        signals
    }

    /// One batched quote fetch, classified per instrument.
    async fn threshold_all(&self, instruments: &[Instrument]) -> Vec<InstrumentSignal> {
        let policy = SignalPolicy::Threshold;
        let quotes = match self.source.quotes(instruments).await {
            Ok(quotes) => quotes,
            Err(e) => {
                warn!(error = %e, "Batch quote fetch failed, holding all");
                return instruments
                    .iter()
                    .map(|inst| InstrumentSignal::new(inst, policy, signal::unavailable(&e)))
                    .collect();
            }
        };

        instruments
            .iter()
            .map(|inst| {
                let report = match quotes.iter().find(|q| q.id == inst.id) {
                    Some(q) if q.has_price() => signal::threshold(q.change_pct, &self.config),
                    _ => signal::unavailable(&Error::unavailable(
                        inst.provider,
                        format!("no quote for {}", inst.code),
                    )),
                };
                InstrumentSignal::new(inst, policy, report)
            })
            .collect()
    }
}

/// Stable sort; instruments that compare equal keep universe order.
pub fn sort_signals(signals: &mut [InstrumentSignal], sort: SignalSort) {
    let change = |s: &InstrumentSignal| s.indicator_values.change_pct.unwrap_or(f64::NEG_INFINITY);
    let by_change_desc = |a: &InstrumentSignal, b: &InstrumentSignal| change(b).total_cmp(&change(a));

    match sort {
        SignalSort::Signal => signals.sort_by(|a, b| {
            a.signal
                .rank()
                .cmp(&b.signal.rank())
                .then_with(|| by_change_desc(a, b))
        }),
        SignalSort::Change => signals.sort_by(|a, b| match by_change_desc(a, b) {
            Ordering::Equal => a.signal.rank().cmp(&b.signal.rank()),
            other => other,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use common::{
        Candle, Market, PriceQuote, Provider, QuoteFields, QuoteOrigin, SignalKind, Universe,
    };

    use super::*;

    /// In-memory source: fixed candles and quotes per instrument id.
    struct StubSource {
        candles: HashMap<String, Vec<f64>>,
        changes: HashMap<String, f64>,
        fail: Vec<String>,
    }

    #[async_trait]
    impl DataSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }

        async fn quotes(&self, instruments: &[Instrument]) -> Result<Vec<PriceQuote>> {
            Ok(instruments
                .iter()
                .map(|inst| match self.changes.get(&inst.id) {
                    Some(&change_pct) => PriceQuote::from_fields(
                        inst,
                        QuoteFields {
                            price: 10.0,
                            change_pct,
                            ..QuoteFields::default()
                        },
                        QuoteOrigin::Live,
                    ),
                    None => PriceQuote::zero(inst),
                })
                .collect())
        }

        async fn candles(&self, instrument: &Instrument, _days: u32) -> Result<Vec<Candle>> {
            if self.fail.contains(&instrument.id) {
                return Err(Error::unavailable(instrument.provider, "timeout"));
            }
            let closes = self.candles.get(&instrument.id).cloned().unwrap_or_default();
            Ok(closes
                .into_iter()
                .enumerate()
                .map(|(i, close)| Candle {
                    timestamp: i as i64 * 86_400_000,
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: None,
                })
                .collect())
        }
    }

    fn small_cfg() -> SignalConfig {
        SignalConfig {
            short_window: 2,
            mid_window: 3,
            long_window: 5,
            rsi_period: 3,
            ..SignalConfig::default()
        }
    }

    fn instruments() -> Vec<Instrument> {
        Universe::builtin().select(Some(Market::Crypto))[..3].to_vec()
    }

    fn aggregator(source: StubSource, sort: SignalSort) -> SignalAggregator {
        SignalAggregator::new(Arc::new(source), small_cfg(), sort)
    }

    #[tokio::test]
    async fn multi_factor_sorts_buy_hold_sell_and_isolates_failures() {
        let insts = instruments();
        let source = StubSource {
            candles: HashMap::from([
                (insts[0].id.clone(), (10..18).map(f64::from).collect()), // overbought → SELL
                (insts[2].id.clone(), (10..18).rev().map(f64::from).collect()), // oversold → BUY
            ]),
            changes: HashMap::new(),
            fail: vec![insts[1].id.clone()],
        };
        let agg = aggregator(source, SignalSort::Signal);

        let signals = agg.evaluate_all(&insts, SignalPolicy::MultiFactor, 30).await;

        assert_eq!(signals.len(), 3);
        assert_eq!(signals[0].instrument_id, insts[2].id);
        assert_eq!(signals[0].signal, SignalKind::Buy);
        assert_eq!(signals[1].instrument_id, insts[1].id);
        assert_eq!(signals[1].signal, SignalKind::Hold);
        assert!(signals[1].reasons[0].starts_with("market data unavailable"));
        assert_eq!(signals[2].signal, SignalKind::Sell);
    }

    #[tokio::test]
    async fn threshold_uses_batch_quotes() {
        let insts = instruments();
        let source = StubSource {
            candles: HashMap::new(),
            changes: HashMap::from([
                (insts[0].id.clone(), -4.0),
                (insts[1].id.clone(), 0.5),
                (insts[2].id.clone(), 2.0),
            ]),
            fail: vec![],
        };
        let agg = aggregator(source, SignalSort::Signal);

        let signals = agg.evaluate_all(&insts, SignalPolicy::Threshold, 30).await;
        let kinds: Vec<_> = signals.iter().map(|s| s.signal).collect();
        assert_eq!(kinds, vec![SignalKind::Buy, SignalKind::Hold, SignalKind::StrongSell]);
    }

    #[tokio::test]
    async fn threshold_without_quote_holds() {
        let insts = instruments();
        let source = StubSource {
            candles: HashMap::new(),
            changes: HashMap::new(),
            fail: vec![],
        };
        let agg = aggregator(source, SignalSort::Signal);

        let signal = agg
            .evaluate(&insts[0], SignalPolicy::Threshold, 30)
            .await
            .unwrap();
        assert_eq!(signal.signal, SignalKind::Hold);
        assert!(signal.reasons[0].contains("no quote"));
    }

    #[tokio::test]
    async fn report_carries_series_for_multi_factor() {
        let insts = instruments();
        let source = StubSource {
            candles: HashMap::from([(insts[0].id.clone(), vec![1.0, 2.0, 3.0])]),
            changes: HashMap::new(),
            fail: vec![],
        };
        let agg = aggregator(source, SignalSort::Signal);

        let report = agg
            .report(&insts[0], SignalPolicy::MultiFactor, 30)
            .await
            .unwrap();
        assert_eq!(report.signal.signal, SignalKind::Hold);
        let series = report.series.unwrap();
        assert_eq!(series.close, vec![1.0, 2.0, 3.0]);
        assert_eq!(series.indicators.ma_short[1], Some(1.5));
    }

    fn signal_with(kind: SignalKind, change: Option<f64>, id: &str) -> InstrumentSignal {
        let inst = Instrument {
            id: id.into(),
            symbol: id.into(),
            name: id.into(),
            market: Market::Crypto,
            exchange: "BINANCE".into(),
            provider: Provider::Binance,
            code: id.into(),
            sector: None,
        };
        let report = common::SignalReport {
            signal: kind,
            reasons: vec![],
            values: common::IndicatorSnapshot {
                change_pct: change,
                ..Default::default()
            },
        };
        InstrumentSignal::new(&inst, SignalPolicy::Threshold, report)
    }

    #[test]
    fn signal_sort_breaks_ties_by_change() {
        let mut signals = vec![
            signal_with(SignalKind::Hold, Some(0.1), "a"),
            signal_with(SignalKind::Buy, Some(1.2), "b"),
            signal_with(SignalKind::Buy, Some(2.5), "c"),
            signal_with(SignalKind::StrongSell, None, "d"),
            signal_with(SignalKind::Hold, None, "e"),
        ];
        sort_signals(&mut signals, SignalSort::Signal);
        let ids: Vec<_> = signals.iter().map(|s| s.instrument_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a", "e", "d"]);
    }

    #[test]
    fn change_sort_is_descending() {
        let mut signals = vec![
            signal_with(SignalKind::Hold, Some(0.1), "a"),
            signal_with(SignalKind::Sell, Some(-2.0), "b"),
            signal_with(SignalKind::Buy, Some(2.5), "c"),
        ];
        sort_signals(&mut signals, SignalSort::Change);
        let ids: Vec<_> = signals.iter().map(|s| s.instrument_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
