use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use common::{Instrument, PriceQuote};
use notify::{daily_summary, signal_message, DeliveryOutcome, MsgType, SummaryEntry};

use crate::{ApiError, AppState};

const TEST_MESSAGE: &str = "✅ Test message: trendboard signal service is running";

pub fn notify_router() -> Router<AppState> {
    Router::new()
        .route("/api/notify/send", post(send_message))
        .route("/api/notify/test", post(send_test))
        .route("/api/notify/signal", post(send_signal))
        .route("/api/notify/daily", post(send_daily))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBody {
    message: String,
    #[serde(default)]
    msg_type: MsgType,
}

async fn send_message(
    State(state): State<AppState>,
    Json(body): Json<SendBody>,
) -> Result<Json<DeliveryOutcome>, ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }
    Ok(Json(state.notifier.send(&body.message, body.msg_type).await))
}

async fn send_test(State(state): State<AppState>) -> Json<DeliveryOutcome> {
    Json(state.notifier.send(TEST_MESSAGE, MsgType::Text).await)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalBody {
    instrument_id: String,
}

/// Best-effort live quote; the message falls back to indicator values.
async fn quote_for(state: &AppState, inst: &Instrument) -> Option<PriceQuote> {
    match state.source.quotes(std::slice::from_ref(inst)).await {
        Ok(quotes) => quotes.into_iter().find(|q| q.id == inst.id && q.has_price()),
        Err(e) => {
            warn!(id = %inst.id, error = %e, "No quote for notification");
            None
        }
    }
}

/// Compute the current signal for one instrument and push it.
async fn send_signal(
    State(state): State<AppState>,
    Json(body): Json<SignalBody>,
) -> Result<Json<DeliveryOutcome>, ApiError> {
    let inst = state.universe.find(&body.instrument_id)?;
    let signal = state
        .aggregator
        .evaluate(inst, state.defaults.policy, state.defaults.signal_days)
        .await?;
    let quote = quote_for(&state, inst).await;

    let text = signal_message(&signal, quote.as_ref(), Utc::now());
    Ok(Json(state.notifier.send(&text, MsgType::RichText).await))
}

/// Summarize buy-class and sell-class signals across the universe.
async fn send_daily(State(state): State<AppState>) -> Result<Json<DeliveryOutcome>, ApiError> {
    let instruments = state.universe.all();
    let quotes = state.source.quotes(instruments).await?;
    let signals = state
        .aggregator
        .evaluate_all(instruments, state.defaults.policy, state.defaults.signal_days)
        .await;

    let entries: Vec<SummaryEntry> = signals
        .iter()
        .filter_map(|s| {
            quotes
                .iter()
                .find(|q| q.id == s.instrument_id && q.has_price())
                .map(|q| SummaryEntry::new(q, s.signal))
        })
        .collect();
    info!(entries = entries.len(), "Sending daily summary");

    let text = daily_summary(&entries, Utc::now());
    Ok(Json(state.notifier.send(&text, MsgType::RichText).await))
}
