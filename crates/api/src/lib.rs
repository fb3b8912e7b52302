mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::{DataSource, Result, SignalPolicy, Universe};
use notify::Notifier;
use store::QuoteCache;
use strategy::SignalAggregator;

pub use error::ApiError;

/// Request defaults taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct Defaults {
    pub policy: SignalPolicy,
    pub signal_days: u32,
    pub ohlc_days: u32,
}

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub universe: Arc<Universe>,
    pub source: Arc<dyn DataSource>,
    pub aggregator: Arc<SignalAggregator>,
    pub notifier: Arc<dyn Notifier>,
    /// Signal audit log. `None` disables recording.
    pub cache: Option<QuoteCache>,
    pub defaults: Defaults,
}

/// Every route, with CORS open for the dashboard.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::market_router())
        .merge(routes::signal_router())
        .merge(routes::notify_router())
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Trendboard API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
