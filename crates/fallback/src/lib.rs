use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use common::{
    Candle, DataSource, Error, Instrument, MissingSymbolPolicy, PriceQuote, QuoteFields,
    QuoteOrigin, Result,
};
use store::QuoteCache;

pub mod fixtures;

/// Secondary data source used when the live providers are down.
///
/// Quotes come from the last cached snapshot, then from static fixtures;
/// instruments with neither are zero-filled or omitted per the missing-symbol
/// policy. Candles come from the cache only. Never touches the network.
pub struct FallbackSource {
    cache: Option<QuoteCache>,
    fixtures: HashMap<String, QuoteFields>,
    on_missing: MissingSymbolPolicy,
}

impl FallbackSource {
    pub fn new(cache: Option<QuoteCache>, on_missing: MissingSymbolPolicy) -> Self {
        Self::with_fixtures(cache, fixtures::builtin(), on_missing)
    }

    pub fn with_fixtures(
        cache: Option<QuoteCache>,
        fixtures: HashMap<String, QuoteFields>,
        on_missing: MissingSymbolPolicy,
    ) -> Self {
        info!(
            cached = cache.is_some(),
            fixtures = fixtures.len(),
            "FallbackSource initialized"
        );
        Self {
            cache,
            fixtures,
            on_missing,
        }
    }

    async fn cached(&self, inst: &Instrument) -> Option<PriceQuote> {
        let cache = self.cache.as_ref()?;
        match cache.cached_quote(&inst.id).await {
            Ok(Some(snapshot)) => {
                debug!(id = %inst.id, updated_at = %snapshot.updated_at, "Serving cached quote");
                Some(snapshot.value)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(id = %inst.id, error = %e, "Cache read failed");
                None
            }
        }
    }
}

#[async_trait]
impl DataSource for FallbackSource {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn quotes(&self, instruments: &[Instrument]) -> Result<Vec<PriceQuote>> {
        let mut quotes = Vec::with_capacity(instruments.len());
        for inst in instruments {
            if let Some(quote) = self.cached(inst).await {
                quotes.push(quote);
                continue;
            }
            match self.fixtures.get(&inst.id) {
                Some(fields) => quotes.push(PriceQuote::from_fields(
                    inst,
                    fields.clone(),
                    QuoteOrigin::Fixture,
                )),
                None if self.on_missing == MissingSymbolPolicy::Zero => {
                    quotes.push(PriceQuote::zero(inst))
                }
                None => {}
            }
        }
        Ok(quotes)
    }

    async fn candles(&self, instrument: &Instrument, _days: u32) -> Result<Vec<Candle>> {
        if let Some(cache) = &self.cache {
            match cache.cached_candles(&instrument.id).await {
                Ok(Some(snapshot)) => return Ok(snapshot.value),
                Ok(None) => {}
                Err(e) => warn!(id = %instrument.id, error = %e, "Cache read failed"),
            }
        }
        Err(Error::unavailable(
            instrument.provider,
            format!("no cached candles for {}", instrument.id),
        ))
    }
}

#[cfg(test)]
mod tests {
    use common::Universe;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn cache() -> QuoteCache {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        QuoteCache::from_pool(db).await.unwrap()
    }

    fn pick(ids: &[&str]) -> Vec<Instrument> {
        let universe = Universe::builtin();
        ids.iter().map(|id| universe.find(id).unwrap().clone()).collect()
    }

    #[tokio::test]
    async fn fixtures_cover_known_stocks() {
        let source = FallbackSource::new(None, MissingSymbolPolicy::Zero);
        let quotes = source.quotes(&pick(&["sh600519", "bitcoin"])).await.unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].price, 1485.30);
        assert_eq!(quotes[0].change_pct, -0.09);
        assert_eq!(quotes[0].origin, QuoteOrigin::Fixture);
        assert_eq!(quotes[1].price, 0.0);
        assert_eq!(quotes[1].origin, QuoteOrigin::Missing);
    }

    #[tokio::test]
    async fn omit_policy_drops_unknowns() {
        let source = FallbackSource::new(None, MissingSymbolPolicy::Omit);
        let quotes = source.quotes(&pick(&["bitcoin", "hk00700"])).await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].id, "hk00700");
    }

    #[tokio::test]
    async fn cache_wins_over_fixtures() {
        let cache = cache().await;
        let inst = pick(&["sh600519"]);
        let mut live = PriceQuote::zero(&inst[0]);
        live.price = 1500.0;
        live.origin = QuoteOrigin::Live;
        cache.store_quotes(&[live]).await.unwrap();

        let source = FallbackSource::new(Some(cache), MissingSymbolPolicy::Zero);
        let quotes = source.quotes(&inst).await.unwrap();
        assert_eq!(quotes[0].price, 1500.0);
        assert_eq!(quotes[0].origin, QuoteOrigin::Cache);
    }

    #[tokio::test]
    async fn candles_need_a_cached_series() {
        let cache = cache().await;
        let inst = &pick(&["bitcoin"])[0];
        let source = FallbackSource::new(Some(cache.clone()), MissingSymbolPolicy::Zero);

        let err = source.candles(inst, 30).await.unwrap_err();
        assert!(err.is_degradable());

        let series = vec![Candle {
            timestamp: 0,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: None,
        }];
        cache.store_candles(&inst.id, &series).await.unwrap();
        assert_eq!(source.candles(inst, 30).await.unwrap(), series);
    }
}
