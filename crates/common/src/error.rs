use thiserror::Error;

use crate::Provider;

#[derive(Debug, Error)]
pub enum Error {
    /// Network failure, timeout or non-success status calling an upstream provider.
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable { provider: Provider, reason: String },

    /// Upstream answered, but the payload does not have the expected shape.
    #[error("{provider} returned a malformed response: {reason}")]
    ProviderMalformed { provider: Provider, reason: String },

    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    #[error("Insufficient history: need {required} candles, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn unavailable(provider: Provider, reason: impl ToString) -> Self {
        Error::ProviderUnavailable {
            provider,
            reason: reason.to_string(),
        }
    }

    pub fn malformed(provider: Provider, reason: impl ToString) -> Self {
        Error::ProviderMalformed {
            provider,
            reason: reason.to_string(),
        }
    }

    /// Errors a caller should answer with degraded data instead of failing.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable { .. } | Error::ProviderMalformed { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
