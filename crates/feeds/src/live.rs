use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, warn};

use common::{
    assemble_quotes, Candle, Config, DataSource, Error, Instrument, MissingSymbolPolicy,
    PriceQuote, Provider, QuoteOrigin, Result,
};

use crate::{build_client, BinanceClient, CoinGeckoClient, QuoteBatch, TencentClient};

/// Fetches straight from the upstream providers.
///
/// Instruments are grouped by provider and each group is fetched concurrently.
/// A failed group only blanks its own instruments; the call as a whole fails
/// only when every group failed, so a wrapping [`Failover`](crate::Failover)
/// can switch sources.
pub struct LiveSource {
    binance: BinanceClient,
    tencent: TencentClient,
    coingecko: CoinGeckoClient,
    on_missing: MissingSymbolPolicy,
}

impl LiveSource {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = build_client(cfg.provider_timeout)?;
        Ok(Self::with_clients(
            BinanceClient::new(http.clone(), &cfg.binance_base_url),
            TencentClient::new(http.clone(), &cfg.tencent_quote_url, &cfg.tencent_kline_url),
            CoinGeckoClient::new(http, &cfg.coingecko_base_url),
            cfg.on_missing_symbol,
        ))
    }

    pub fn with_clients(
        binance: BinanceClient,
        tencent: TencentClient,
        coingecko: CoinGeckoClient,
        on_missing: MissingSymbolPolicy,
    ) -> Self {
        Self {
            binance,
            tencent,
            coingecko,
            on_missing,
        }
    }

    async fn fetch_group(&self, provider: Provider, codes: Vec<String>) -> Result<QuoteBatch> {
        match provider {
            Provider::Binance => self.binance.quotes(&codes).await,
            Provider::Tencent => self.tencent.quotes(&codes).await,
            Provider::CoinGecko => self.coingecko.quotes(&codes).await,
        }
    }
}

#[async_trait]
impl DataSource for LiveSource {
    fn name(&self) -> &str {
        "live"
    }

    async fn quotes(&self, instruments: &[Instrument]) -> Result<Vec<PriceQuote>> {
        let mut groups: HashMap<Provider, Vec<String>> = HashMap::new();
        for inst in instruments {
            groups.entry(inst.provider).or_default().push(inst.code.clone());
        }
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let attempted = groups.len();
        let results = join_all(groups.into_iter().map(|(provider, codes)| async move {
            (provider, self.fetch_group(provider, codes).await)
        }))
        .await;

        let mut found = HashMap::new();
        let mut first_err: Option<Error> = None;
        let mut failed = 0;
        for (provider, result) in results {
            match result {
                Ok(batch) => {
                    for (code, reason) in &batch.rejected {
                        debug!(%provider, %code, %reason, "symbol rejected");
                    }
                    found.extend(batch.quotes);
                }
                Err(err) => {
                    warn!(%provider, error = %err, "provider group failed");
                    failed += 1;
                    first_err.get_or_insert(err);
                }
            }
        }

        if failed == attempted {
            if let Some(err) = first_err {
                return Err(err);
            }
        }

        Ok(assemble_quotes(instruments, found, QuoteOrigin::Live, self.on_missing))
    }

    async fn candles(&self, instrument: &Instrument, days: u32) -> Result<Vec<Candle>> {
        match instrument.provider {
            Provider::Binance => self.binance.candles(&instrument.code, days).await,
            Provider::Tencent => self.tencent.candles(&instrument.code, days).await,
            Provider::CoinGecko => self.coingecko.candles(&instrument.code, days).await,
        }
    }
}
