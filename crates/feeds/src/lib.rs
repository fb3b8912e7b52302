//! Upstream market-data providers and the live/failover [`DataSource`]s built on them.
//!
//! [`DataSource`]: common::DataSource

pub mod binance;
pub mod coingecko;
pub mod failover;
mod http;
pub mod live;
pub mod response;
pub mod tencent;

pub use binance::BinanceClient;
pub use coingecko::CoinGeckoClient;
pub use failover::Failover;
pub use http::build_client;
pub use live::LiveSource;
pub use response::{ProviderResponse, QuoteBatch};
pub use tencent::TencentClient;
