use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use common::{Error, Result};

use crate::{DeliveryOutcome, MsgType, Notifier};

const POST_TITLE: &str = "📈 Stock signal alert";

/// Feishu (Lark) custom-bot webhook client.
pub struct FeishuNotifier {
    http: Client,
    webhook_url: Option<String>,
}

impl FeishuNotifier {
    /// `webhook_url = None` leaves the notifier disabled; sends then report
    /// "Webhook not configured".
    pub fn new(http: Client, webhook_url: Option<String>) -> Self {
        if webhook_url.is_none() {
            info!("Feishu webhook not configured, notifications disabled");
        }
        Self { http, webhook_url }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn post(&self, url: &str, text: &str, msg_type: MsgType) -> Result<()> {
        let resp = self
            .http
            .post(url)
            .json(&payload(text, msg_type))
            .send()
            .await
            .map_err(|e| Error::Notify(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Notify(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Notify(format!("HTTP {status}: {body}")));
        }

        let reply: WebhookReply = serde_json::from_str(&body)?;
        match reply.code.or(reply.status_code) {
            Some(0) => Ok(()),
            _ => Err(Error::Notify(body)),
        }
    }
}

#[async_trait]
impl Notifier for FeishuNotifier {
    async fn send(&self, text: &str, msg_type: MsgType) -> DeliveryOutcome {
        let Some(url) = self.webhook_url.as_deref() else {
            warn!("Feishu webhook not configured, skipping notification");
            return DeliveryOutcome::failed("Webhook not configured");
        };
        match self.post(url, text, msg_type).await {
            Ok(()) => {
                info!(?msg_type, "Feishu notification sent");
                DeliveryOutcome::delivered()
            }
            Err(e) => {
                warn!(error = %e, "Failed to send Feishu notification");
                DeliveryOutcome::failed(e)
            }
        }
    }
}

/// Webhook request body for `msg_type`.
pub(crate) fn payload(text: &str, msg_type: MsgType) -> Value {
    match msg_type {
        MsgType::Text => json!({
            "msg_type": "text",
            "content": { "text": text }
        }),
        MsgType::RichText => json!({
            "msg_type": "post",
            "content": {
                "post": {
                    "zh_cn": {
                        "title": POST_TITLE,
                        "content": [[{ "tag": "text", "text": text }]]
                    }
                }
            }
        }),
    }
}

/// Newer bots answer `{code, msg}`, older ones `{StatusCode, StatusMessage}`.
#[derive(Deserialize)]
struct WebhookReply {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default, rename = "StatusCode")]
    status_code: Option<i64>,
}
