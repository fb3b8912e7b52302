//! Outbound chat notifications: webhook delivery and message formatting.

mod feishu;
pub mod message;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use feishu::FeishuNotifier;
pub use message::{daily_summary, signal_message, SummaryEntry};

/// How the message body is rendered by the chat client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsgType {
    #[default]
    Text,
    /// Titled post card.
    RichText,
}

/// Result of one delivery attempt, returned to API callers as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Delivers preformatted messages. Failures are reported in the outcome, never raised.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str, msg_type: MsgType) -> DeliveryOutcome;
}
