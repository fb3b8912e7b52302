use async_trait::async_trait;

use crate::{Candle, Instrument, PriceQuote, Result};

/// Abstraction over where market data comes from.
///
/// `LiveSource` (crates/feeds) queries the upstream providers.
/// `FallbackSource` (crates/fallback) serves cached snapshots and fixtures.
/// `Failover` composes the two so handlers never branch on data origin.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short name used in logs and the health endpoint.
    fn name(&self) -> &str;

    /// Latest quotes for `instruments`, in the same order.
    ///
    /// Symbols the source cannot price are zero-filled or omitted according to
    /// the configured `MissingSymbolPolicy`.
    async fn quotes(&self, instruments: &[Instrument]) -> Result<Vec<PriceQuote>>;

    /// Candle history covering roughly the last `days` days, oldest first.
    async fn candles(&self, instrument: &Instrument, days: u32) -> Result<Vec<Candle>>;
}
