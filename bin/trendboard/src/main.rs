use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use api::{AppState, Defaults};
use common::{Config, DataSource, Universe};
use fallback::FallbackSource;
use feeds::{build_client, Failover, LiveSource};
use notify::{FeishuNotifier, Notifier};
use store::{QuoteCache, RecordingSource};
use strategy::{SignalAggregator, SignalConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse()?)
                .add_directive("sqlx=warn".parse()?),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid configuration")?;
    let (universe, signal_cfg) = match &cfg.config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {path}"))?;
            (
                Universe::from_toml_str(&content)?,
                SignalConfig::from_toml_str(&content)?,
            )
        }
        None => (Universe::builtin(), SignalConfig::default()),
    };
    info!(
        instruments = universe.all().len(),
        policy = %cfg.signal_policy,
        on_missing = ?cfg.on_missing_symbol,
        "Trendboard starting"
    );

    // ── Database ──────────────────────────────────────────────────────────────
    let cache = QuoteCache::connect(&cfg.database_url)
        .await
        .context("failed to open quote cache")?;
    info!("Database ready");

    // ── Data source: live (recorded) with cache/fixture failover ──────────────
    let live = RecordingSource::new(LiveSource::new(&cfg)?, cache.clone());
    let fallback = FallbackSource::new(Some(cache.clone()), cfg.on_missing_symbol);
    let source: Arc<dyn DataSource> = Arc::new(Failover::new(live, fallback));

    // ── Signals & notifications ───────────────────────────────────────────────
    let aggregator = SignalAggregator::new(source.clone(), signal_cfg, cfg.signal_sort);
    let notifier = FeishuNotifier::new(
        build_client(cfg.provider_timeout)?,
        cfg.feishu_webhook_url.clone(),
    );
    if !notifier.is_configured() {
        info!("FEISHU_WEBHOOK_URL not set; notifications will report failure");
    }
    let notifier: Arc<dyn Notifier> = Arc::new(notifier);

    // ── HTTP API ──────────────────────────────────────────────────────────────
    let state = AppState {
        universe: Arc::new(universe),
        source,
        aggregator: Arc::new(aggregator),
        notifier,
        cache: Some(cache),
        defaults: Defaults {
            policy: cfg.signal_policy,
            signal_days: cfg.signal_days,
            ohlc_days: cfg.ohlc_days,
        },
    };

    api::serve(state, cfg.port).await?;
    info!("Exiting");
    Ok(())
}
