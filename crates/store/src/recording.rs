use async_trait::async_trait;
use tracing::warn;

use common::{Candle, DataSource, Instrument, PriceQuote, Result};

use crate::QuoteCache;

/// Passes calls through to `inner` and snapshots every successful answer,
/// so a later outage can be served from the last good data.
///
/// Cache write failures are logged and never fail the call.
pub struct RecordingSource<S> {
    inner: S,
    cache: QuoteCache,
}

impl<S: DataSource> RecordingSource<S> {
    pub fn new(inner: S, cache: QuoteCache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<S: DataSource> DataSource for RecordingSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn quotes(&self, instruments: &[Instrument]) -> Result<Vec<PriceQuote>> {
        let quotes = self.inner.quotes(instruments).await?;
        if let Err(e) = self.cache.store_quotes(&quotes).await {
            warn!(error = %e, "Failed to cache quotes");
        }
        Ok(quotes)
    }

    async fn candles(&self, instrument: &Instrument, days: u32) -> Result<Vec<Candle>> {
        let candles = self.inner.candles(instrument, days).await?;
        if !candles.is_empty() {
            if let Err(e) = self.cache.store_candles(&instrument.id, &candles).await {
                warn!(id = %instrument.id, error = %e, "Failed to cache candles");
            }
        }
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use common::{Error, Provider, QuoteOrigin, Universe};

    use super::*;
    use crate::cache::tests::memory_cache;

    struct Upstream {
        up: bool,
    }

    #[async_trait]
    impl DataSource for Upstream {
        fn name(&self) -> &str {
            "upstream"
        }

        async fn quotes(&self, instruments: &[Instrument]) -> Result<Vec<PriceQuote>> {
            if !self.up {
                return Err(Error::unavailable(Provider::Binance, "down"));
            }
            Ok(instruments
                .iter()
                .map(|i| {
                    let mut q = PriceQuote::zero(i);
                    q.price = 42.0;
                    q.origin = QuoteOrigin::Live;
                    q
                })
                .collect())
        }

        async fn candles(&self, _: &Instrument, _: u32) -> Result<Vec<Candle>> {
            Ok(vec![Candle {
                timestamp: 1,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: None,
            }])
        }
    }

    #[tokio::test]
    async fn successful_answers_are_snapshotted() {
        let cache = memory_cache().await;
        let universe = Universe::builtin();
        let source = RecordingSource::new(Upstream { up: true }, cache.clone());

        source.quotes(&universe.all()[..3]).await.unwrap();
        source.candles(&universe.all()[0], 7).await.unwrap();

        let id = &universe.all()[1].id;
        assert_eq!(cache.cached_quote(id).await.unwrap().unwrap().value.price, 42.0);
        assert!(cache.cached_candles(&universe.all()[0].id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failures_pass_through_without_writes() {
        let cache = memory_cache().await;
        let universe = Universe::builtin();
        let source = RecordingSource::new(Upstream { up: false }, cache.clone());

        assert!(source.quotes(universe.all()).await.is_err());
        assert!(cache.cached_quote(&universe.all()[0].id).await.unwrap().is_none());
    }
}
