use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use common::InstrumentSignal;
use strategy::IndicatorReport;

use super::{parse_days, parse_market, parse_policy, record};
use crate::{ApiError, AppState};

pub fn signal_router() -> Router<AppState> {
    Router::new()
        .route("/api/indicators/:id", get(get_indicators))
        .route("/api/signals", get(list_signals))
        .route("/api/signals/:id", get(get_signal))
}

#[derive(Deserialize)]
struct SignalQuery {
    days: Option<u32>,
    policy: Option<String>,
    market: Option<String>,
}

/// Signal for one instrument plus the MA/RSI series behind it.
async fn get_indicators(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<SignalQuery>,
) -> Result<Json<IndicatorReport>, ApiError> {
    let inst = state.universe.find(&id)?;
    let policy = parse_policy(q.policy.as_deref(), state.defaults.policy)?;
    let days = parse_days(q.days, state.defaults.signal_days)?;

    let report = state.aggregator.report(inst, policy, days).await?;
    record(&state, std::slice::from_ref(&report.signal)).await;
    Ok(Json(report))
}

async fn get_signal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<SignalQuery>,
) -> Result<Json<InstrumentSignal>, ApiError> {
    let inst = state.universe.find(&id)?;
    let policy = parse_policy(q.policy.as_deref(), state.defaults.policy)?;
    let days = parse_days(q.days, state.defaults.signal_days)?;

    let signal = state.aggregator.evaluate(inst, policy, days).await?;
    record(&state, std::slice::from_ref(&signal)).await;
    Ok(Json(signal))
}

/// Every instrument (optionally one market), sorted by the configured comparator.
async fn list_signals(
    State(state): State<AppState>,
    Query(q): Query<SignalQuery>,
) -> Result<Json<Vec<InstrumentSignal>>, ApiError> {
    let market = parse_market(q.market.as_deref())?;
    let policy = parse_policy(q.policy.as_deref(), state.defaults.policy)?;
    let days = parse_days(q.days, state.defaults.signal_days)?;

    let instruments = state.universe.select(market);
    let signals = state.aggregator.evaluate_all(&instruments, policy, days).await;
    record(&state, &signals).await;
    Ok(Json(signals))
}
