use anyhow::{anyhow, Result};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::core::HoldingsConfig;

pub const SEC_HOST: &str = "www.sec.gov";

pub fn build_client(config: &HoldingsConfig) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.request_timeout)
        .gzip(true)
        .build()?)
}

/// GETs `url` as text. Non-success statuses are errors.
pub async fn fetch_text(client: &Client, url: &Url, user_agent: &str) -> Result<String> {
    log::debug!("Fetching URL: {}", url);

    let response = client
        .get(url.as_str())
        .header(reqwest::header::USER_AGENT, user_agent)
        .header(reqwest::header::ACCEPT_ENCODING, "gzip, deflate")
        .header(reqwest::header::HOST, url.host_str().unwrap_or(SEC_HOST))
        .send()
        .await?;

    log::debug!("Response status: {}", response.status());

    if !response.status().is_success() {
        return Err(anyhow!(
            "HTTP request for {} failed with status: {}",
            url,
            response.status()
        ));
    }

    let content = response.text().await?;
    log::debug!("Received content length: {}", content.len());
    Ok(content)
}

/// Retries timeouts and connection failures up to `max_tries` attempts in
/// total, waiting `backoff` between attempts.
pub async fn fetch_with_retries(
    client: &Client,
    url: &Url,
    user_agent: &str,
    max_tries: usize,
    backoff: Duration,
) -> Result<String> {
    let max_tries = max_tries.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match fetch_text(client, url, user_agent).await {
            Ok(content) => return Ok(content),
            Err(e) if attempt < max_tries && is_transient(&e) => {
                log::warn!(
                    "Attempt {}/{} for {} failed, retrying: {}",
                    attempt,
                    max_tries,
                    url,
                    e
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_transient(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<reqwest::Error>()
        .map(|e| e.is_timeout() || e.is_connect())
        .unwrap_or(false)
}

pub async fn fetch_and_save(
    client: &Client,
    url: &Url,
    filepath: &Path,
    user_agent: &str,
    max_tries: usize,
    backoff: Duration,
) -> Result<usize> {
    let content = fetch_with_retries(client, url, user_agent, max_tries, backoff).await?;
    if let Some(parent) = filepath.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(filepath, &content).await?;
    log::debug!("Saved {} bytes to {:?}", content.len(), filepath);
    Ok(content.len())
}
