use anyhow::{Context, Result};
use emby_sync_config::ProxyConfig;
use reqwest::Client;
use std::time::Duration;

/// Browser-like agent; some RSSHub deployments reject unknown clients.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/101.0.4951.54 Safari/537.36";

/// HTTP client for upstream feeds, honouring the configured proxy.
pub fn build_client(proxy: &ProxyConfig, timeout: Duration) -> Result<Client> {
    let mut builder = Client::builder().user_agent(USER_AGENT).timeout(timeout);

    if proxy.enabled {
        builder = builder
            .proxy(reqwest::Proxy::http(&proxy.http).context("Invalid http proxy url")?)
            .proxy(reqwest::Proxy::https(&proxy.https).context("Invalid https proxy url")?);
    } else {
        builder = builder.no_proxy();
    }

    builder.build().context("Failed to create HTTP client")
}

/// GET `url` and return the body, mapping any failure to a readable reason.
pub async fn fetch_bytes(client: &Client, url: &str) -> std::result::Result<Vec<u8>, String> {
    let response = client.get(url).send().await.map_err(|e| format!("request failed: {}", e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status));
    }
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| format!("failed to read body: {}", e))
}
