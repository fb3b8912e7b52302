use std::collections::HashMap;

use async_trait::async_trait;
use tracing::warn;

use common::{Candle, DataSource, Instrument, PriceQuote, Result};

/// Serves from `primary`, switching to `secondary` when the primary fails with
/// a provider error. Quotes the primary leaves unpriced are filled per
/// instrument from `secondary`; an empty candle series is retried there too.
/// Other errors are passed through. No retries.
pub struct Failover<P, S> {
    primary: P,
    secondary: S,
}

impl<P, S> Failover<P, S>
where
    P: DataSource,
    S: DataSource,
{
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }

    /// Ask the secondary for every instrument the primary left unpriced or
    /// omitted, then merge in instrument order. A primary placeholder is kept
    /// when the secondary cannot price it either.
    async fn fill_gaps(
        &self,
        instruments: &[Instrument],
        primary: Vec<PriceQuote>,
    ) -> Result<Vec<PriceQuote>> {
        let mut primary: HashMap<String, PriceQuote> =
            primary.into_iter().map(|q| (q.id.clone(), q)).collect();
        let gaps: Vec<Instrument> = instruments
            .iter()
            .filter(|i| !primary.get(&i.id).is_some_and(PriceQuote::has_price))
            .cloned()
            .collect();
        if gaps.is_empty() {
            return Ok(instruments
                .iter()
                .filter_map(|i| primary.remove(&i.id))
                .collect());
        }

        warn!(
            primary = self.primary.name(),
            secondary = self.secondary.name(),
            missing = gaps.len(),
            "primary left instruments unpriced, filling from secondary"
        );
        let filled = self.secondary.quotes(&gaps).await;
        let mut secondary: HashMap<String, PriceQuote> = match filled {
            Ok(quotes) => quotes.into_iter().map(|q| (q.id.clone(), q)).collect(),
            // Nothing usable from either side: surface the secondary's failure.
            Err(err) if !primary.values().any(PriceQuote::has_price) => return Err(err),
            Err(err) => {
                warn!(secondary = self.secondary.name(), error = %err, "gap fill failed");
                HashMap::new()
            }
        };

        Ok(instruments
            .iter()
            .filter_map(|i| {
                let first = primary.remove(&i.id);
                let second = secondary.remove(&i.id);
                match (first, second) {
                    (Some(p), _) if p.has_price() => Some(p),
                    (_, Some(s)) if s.has_price() => Some(s),
                    (first, second) => first.or(second),
                }
            })
            .collect())
    }
}

#[async_trait]
impl<P, S> DataSource for Failover<P, S>
where
    P: DataSource,
    S: DataSource,
{
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn quotes(&self, instruments: &[Instrument]) -> Result<Vec<PriceQuote>> {
        if instruments.is_empty() {
            return Ok(Vec::new());
        }
        match self.primary.quotes(instruments).await {
            Ok(quotes) => self.fill_gaps(instruments, quotes).await,
            Err(err) if err.is_degradable() => {
                warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %err,
                    "primary failed, switching source"
                );
                self.secondary.quotes(instruments).await
            }
            Err(err) => Err(err),
        }
    }

    async fn candles(&self, instrument: &Instrument, days: u32) -> Result<Vec<Candle>> {
        match self.primary.candles(instrument, days).await {
            Ok(candles) if !candles.is_empty() => Ok(candles),
            // An empty series from the secondary is no worse than the primary's.
            Ok(candles) => match self.secondary.candles(instrument, days).await {
                Ok(fallback) => Ok(fallback),
                Err(_) => Ok(candles),
            },
            Err(err) if err.is_degradable() => {
                warn!(
                    id = %instrument.id,
                    error = %err,
                    "candle fetch failed, switching source"
                );
                self.secondary.candles(instrument, days).await
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use common::{Error, Provider, QuoteOrigin, Universe};

    use super::*;

    struct Fixed {
        name: &'static str,
        price: Option<f64>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, price: Option<f64>) -> Self {
            Self {
                name,
                price,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DataSource for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn quotes(&self, instruments: &[Instrument]) -> Result<Vec<PriceQuote>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.price {
                None => Err(Error::unavailable(Provider::Binance, "connection refused")),
                Some(p) => Ok(instruments
                    .iter()
                    .map(|i| {
                        let mut q = PriceQuote::zero(i);
                        q.price = p;
                        q
                    })
                    .collect()),
            }
        }

        async fn candles(&self, _instrument: &Instrument, _days: u32) -> Result<Vec<Candle>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.price {
                None => Err(Error::unavailable(Provider::Binance, "timeout")),
                Some(p) => Ok(vec![Candle {
                    timestamp: 0,
                    open: p,
                    high: p,
                    low: p,
                    close: p,
                    volume: None,
                }]),
            }
        }
    }

    fn instruments() -> Vec<Instrument> {
        Universe::builtin().all()[..2].to_vec()
    }

    #[tokio::test]
    async fn healthy_primary_is_used_alone() {
        let src = Failover::new(Fixed::new("live", Some(10.0)), Fixed::new("fallback", Some(1.0)));
        let quotes = src.quotes(&instruments()).await.unwrap();
        assert_eq!(quotes[0].price, 10.0);
        assert_eq!(src.secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unavailable_primary_switches() {
        let src = Failover::new(Fixed::new("live", None), Fixed::new("fallback", Some(1.0)));
        let quotes = src.quotes(&instruments()).await.unwrap();
        assert_eq!(quotes[0].price, 1.0);
    }

    #[tokio::test]
    async fn zero_priced_answer_switches() {
        let src = Failover::new(Fixed::new("live", Some(0.0)), Fixed::new("fallback", Some(2.0)));
        let quotes = src.quotes(&instruments()).await.unwrap();
        assert!(quotes.iter().all(|q| q.price == 2.0));
    }

    #[tokio::test]
    async fn candle_failure_switches() {
        let inst = &instruments()[0];
        let src = Failover::new(Fixed::new("live", None), Fixed::new("fallback", Some(3.0)));
        let candles = src.candles(inst, 30).await.unwrap();
        assert_eq!(candles[0].close, 3.0);
    }

    #[tokio::test]
    async fn non_provider_errors_pass_through() {
        struct Broken;

        #[async_trait]
        impl DataSource for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            async fn quotes(&self, _: &[Instrument]) -> Result<Vec<PriceQuote>> {
                Err(Error::Config("bad".into()))
            }
            async fn candles(&self, _: &Instrument, _: u32) -> Result<Vec<Candle>> {
                Err(Error::Config("bad".into()))
            }
        }

        let fallback = Fixed::new("fallback", Some(1.0));
        let src = Failover::new(Broken, fallback);
        assert!(matches!(src.quotes(&instruments()).await, Err(Error::Config(_))));
        assert_eq!(src.secondary.calls.load(Ordering::SeqCst), 0);
    }

    /// Prices only `bitcoin`; every other instrument is zero-filled.
    struct CryptoOnly;

    #[async_trait]
    impl DataSource for CryptoOnly {
        fn name(&self) -> &str {
            "live"
        }

        async fn quotes(&self, instruments: &[Instrument]) -> Result<Vec<PriceQuote>> {
            Ok(instruments
                .iter()
                .map(|i| {
                    let mut q = PriceQuote::zero(i);
                    if i.id == "bitcoin" {
                        q.price = 10.0;
                        q.origin = QuoteOrigin::Live;
                    }
                    q
                })
                .collect())
        }

        async fn candles(&self, _: &Instrument, _: u32) -> Result<Vec<Candle>> {
            Ok(vec![])
        }
    }

    /// Fixture-style secondary that records which ids it was asked for.
    #[derive(Default)]
    struct Fixtures {
        asked: Mutex<Vec<String>>,
        down: bool,
    }

    #[async_trait]
    impl DataSource for Fixtures {
        fn name(&self) -> &str {
            "fallback"
        }

        async fn quotes(&self, instruments: &[Instrument]) -> Result<Vec<PriceQuote>> {
            self.asked
                .lock()
                .unwrap()
                .extend(instruments.iter().map(|i| i.id.clone()));
            if self.down {
                return Err(Error::unavailable(Provider::Tencent, "cache empty"));
            }
            Ok(instruments
                .iter()
                .map(|i| {
                    let mut q = PriceQuote::zero(i);
                    q.price = 1485.30;
                    q.origin = QuoteOrigin::Fixture;
                    q
                })
                .collect())
        }

        async fn candles(&self, _: &Instrument, _: u32) -> Result<Vec<Candle>> {
            Ok(vec![])
        }
    }

    fn mixed() -> Vec<Instrument> {
        let universe = Universe::builtin();
        ["bitcoin", "sh600519", "ethereum"]
            .iter()
            .map(|id| universe.find(id).unwrap().clone())
            .collect()
    }

    #[tokio::test]
    async fn unpriced_instruments_are_filled_from_secondary() {
        let src = Failover::new(CryptoOnly, Fixtures::default());
        let quotes = src.quotes(&mixed()).await.unwrap();

        let ids: Vec<&str> = quotes.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["bitcoin", "sh600519", "ethereum"]);
        assert_eq!((quotes[0].price, quotes[0].origin), (10.0, QuoteOrigin::Live));
        assert_eq!((quotes[1].price, quotes[1].origin), (1485.30, QuoteOrigin::Fixture));
        assert_eq!(
            src.secondary.asked.lock().unwrap().as_slice(),
            &["sh600519".to_string(), "ethereum".to_string()]
        );
    }

    #[tokio::test]
    async fn placeholders_survive_a_failed_gap_fill() {
        let fixtures = Fixtures {
            down: true,
            ..Fixtures::default()
        };
        let src = Failover::new(CryptoOnly, fixtures);
        let quotes = src.quotes(&mixed()).await.unwrap();

        assert_eq!(quotes.len(), 3);
        assert_eq!(quotes[0].price, 10.0);
        assert_eq!(quotes[1].origin, QuoteOrigin::Missing);
    }
}
