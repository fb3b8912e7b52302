use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use common::{Candle, Instrument, Market, PriceQuote, QuoteOrigin};
use store::PricePoint;

use super::{parse_days, parse_market};
use crate::{ApiError, AppState};

pub fn market_router() -> Router<AppState> {
    Router::new()
        .route("/api/instruments", get(list_instruments))
        .route("/api/prices", get(list_prices))
        .route("/api/prices/:id/history", get(price_history))
        .route("/api/ohlc/:id", get(get_ohlc))
        .route("/api/sectors", get(list_sectors))
}

#[derive(Deserialize)]
struct MarketQuery {
    market: Option<String>,
}

async fn list_instruments(
    State(state): State<AppState>,
    Query(q): Query<MarketQuery>,
) -> Result<Json<Vec<Instrument>>, ApiError> {
    let market = parse_market(q.market.as_deref())?;
    Ok(Json(state.universe.select(market)))
}

async fn list_prices(
    State(state): State<AppState>,
    Query(q): Query<MarketQuery>,
) -> Result<Json<Vec<PriceQuote>>, ApiError> {
    let market = parse_market(q.market.as_deref())?;
    let instruments = state.universe.select(market);
    Ok(Json(state.source.quotes(&instruments).await?))
}

/// Rows returned by the history endpoint unless `limit` says otherwise.
const DEFAULT_HISTORY: u32 = 100;
const MAX_HISTORY: u32 = 1000;

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

/// Recorded quotes for one instrument, newest first. Empty when no cache is attached.
async fn price_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<PricePoint>>, ApiError> {
    let inst = state.universe.find(&id)?;
    let limit = match q.limit {
        None => DEFAULT_HISTORY,
        Some(n) if (1..=MAX_HISTORY).contains(&n) => n,
        Some(n) => {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {MAX_HISTORY}, got {n}"
            )))
        }
    };
    let history = match &state.cache {
        Some(cache) => cache.price_history(&inst.id, limit).await?,
        None => Vec::new(),
    };
    Ok(Json(history))
}

// ─── OHLC ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct DaysQuery {
    days: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OhlcResponse {
    instrument_id: String,
    symbol: String,
    name: String,
    candles: Vec<Candle>,
}

/// Candle history. Provider failures degrade to an empty series.
async fn get_ohlc(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<DaysQuery>,
) -> Result<Json<OhlcResponse>, ApiError> {
    let inst = state.universe.find(&id)?;
    let days = parse_days(q.days, state.defaults.ohlc_days)?;

    let candles = match state.source.candles(inst, days).await {
        Ok(candles) => candles,
        Err(e) if e.is_degradable() => {
            warn!(%id, error = %e, "No candles available");
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(OhlcResponse {
        instrument_id: inst.id.clone(),
        symbol: inst.symbol.clone(),
        name: inst.name.clone(),
        candles,
    }))
}

// ─── Sectors ──────────────────────────────────────────────────────────────────

const OTHER_SECTOR: &str = "Other";

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SectorSummary {
    name: String,
    count: usize,
    avg_change: f64,
    up_count: usize,
    down_count: usize,
}

/// Per-sector breadth over equity instruments (or the requested market).
async fn list_sectors(
    State(state): State<AppState>,
    Query(q): Query<MarketQuery>,
) -> Result<Json<Vec<SectorSummary>>, ApiError> {
    let instruments: Vec<Instrument> = match parse_market(q.market.as_deref())? {
        Some(market) => state.universe.select(Some(market)),
        None => state
            .universe
            .all()
            .iter()
            .filter(|i| i.market != Market::Crypto)
            .cloned()
            .collect(),
    };
    let quotes = state.source.quotes(&instruments).await?;
    Ok(Json(summarize_sectors(&instruments, &quotes)))
}

/// Group priced quotes by sector, sorted by average change, highest first.
/// Zero-filled placeholders are left out.
pub(crate) fn summarize_sectors(
    instruments: &[Instrument],
    quotes: &[PriceQuote],
) -> Vec<SectorSummary> {
    let sector_of: HashMap<&str, &str> = instruments
        .iter()
        .map(|i| (i.id.as_str(), i.sector.as_deref().unwrap_or(OTHER_SECTOR)))
        .collect();

    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<f64>> = HashMap::new();
    for quote in quotes.iter().filter(|q| q.origin != QuoteOrigin::Missing) {
        let sector = sector_of.get(quote.id.as_str()).copied().unwrap_or(OTHER_SECTOR);
        let changes = groups.entry(sector).or_insert_with(|| {
            order.push(sector);
            Vec::new()
        });
        changes.push(quote.change_pct);
    }

    let mut sectors: Vec<SectorSummary> = order
        .into_iter()
        .map(|name| {
            let changes = &groups[name];
            SectorSummary {
                name: name.to_string(),
                count: changes.len(),
                avg_change: changes.iter().sum::<f64>() / changes.len() as f64,
                up_count: changes.iter().filter(|c| **c > 0.0).count(),
                down_count: changes.iter().filter(|c| **c < 0.0).count(),
            }
        })
        .collect();
    sectors.sort_by(|a, b| b.avg_change.total_cmp(&a.avg_change));
    sectors
}
