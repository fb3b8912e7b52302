use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use common::{Error, Provider, Result};

/// Shared HTTP client for all providers. Every outbound call is bounded by `timeout`.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .user_agent(concat!("trendboard/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))
}

/// Send a request and return the raw body of a successful response.
pub(crate) async fn fetch_bytes(provider: Provider, request: RequestBuilder) -> Result<Vec<u8>> {
    let resp = request
        .send()
        .await
        .map_err(|e| Error::unavailable(provider, e))?;

    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .map_err(|e| Error::unavailable(provider, e))?;

    if !status.is_success() {
        let text = String::from_utf8_lossy(&body);
        return Err(Error::unavailable(
            provider,
            format!("HTTP {status}: {}", text.chars().take(200).collect::<String>()),
        ));
    }
    Ok(body.to_vec())
}

pub(crate) async fn fetch_json<T: DeserializeOwned>(
    provider: Provider,
    request: RequestBuilder,
) -> Result<T> {
    let body = fetch_bytes(provider, request).await?;
    serde_json::from_slice(&body).map_err(|e| Error::malformed(provider, e))
}
