//! Plain-HTTP retrieval
//!
//! A GET with a realistic user agent, bounded redirect chain, and compressed
//! transfer. Errors are classified into the typed failure kinds; nothing here
//! retries — that is the retry policy's job.

use crate::config::FetcherConfig;
use crate::fetch::{FetchError, FetchSuccess};
use chrono::Utc;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Builds the HTTP client used for all plain fetches in a run
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(config.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches one URL and classifies the outcome
pub async fn fetch_page(client: &Client, url: &str) -> Result<FetchSuccess, FetchError> {
    let response = client.get(url).send().await.map_err(classify_error)?;

    let status = response.status();
    let final_url = response.url().to_string();

    if !status.is_success() {
        return Err(FetchError::Http {
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(classify_error)?;

    Ok(FetchSuccess {
        final_url,
        status: status.as_u16(),
        body,
        fetched_at: Utc::now(),
    })
}

fn classify_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_redirect() {
        FetchError::Network("redirect limit exceeded".to_string())
    } else if error.is_connect() {
        FetchError::Network(format!("connection failed: {}", error))
    } else {
        FetchError::Network(error.to_string())
    }
}
