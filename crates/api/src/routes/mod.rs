mod alerts;
mod health;
mod market;
mod signals;

pub use alerts::notify_router;
pub use health::health_router;
pub use market::market_router;
pub use signals::signal_router;

use tracing::warn;

use common::{InstrumentSignal, Market, SignalPolicy};

use crate::{ApiError, AppState};

/// Largest lookback accepted by the `days` parameter.
const MAX_DAYS: u32 = 1000;

pub(crate) fn parse_market(raw: Option<&str>) -> Result<Option<Market>, ApiError> {
    raw.filter(|s| !s.is_empty())
        .map(|s| s.parse::<Market>().map_err(ApiError::BadRequest))
        .transpose()
}

pub(crate) fn parse_policy(raw: Option<&str>, default: SignalPolicy) -> Result<SignalPolicy, ApiError> {
    match raw.filter(|s| !s.is_empty()) {
        Some(s) => s.parse().map_err(ApiError::BadRequest),
        None => Ok(default),
    }
}

pub(crate) fn parse_days(raw: Option<u32>, default: u32) -> Result<u32, ApiError> {
    match raw {
        None => Ok(default),
        Some(d) if (1..=MAX_DAYS).contains(&d) => Ok(d),
        Some(d) => Err(ApiError::BadRequest(format!(
            "days must be between 1 and {MAX_DAYS}, got {d}"
        ))),
    }
}

/// Append to the signal audit log; failures are logged only.
pub(crate) async fn record(state: &AppState, signals: &[InstrumentSignal]) {
    if let Some(cache) = &state.cache {
        if let Err(e) = cache.record_signals(signals).await {
            warn!(error = %e, "Failed to record signals");
        }
    }
}
