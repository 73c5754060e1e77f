//! Rendered-page retrieval through a browserless-style service
//!
//! Script-heavy sources are fetched by POSTing to the render service's
//! `/content` endpoint, which loads the page in a headless browser, waits for
//! the configured ready signal, and returns the rendered document. The
//! browser runtime itself lives behind that service; this is only its client.

use crate::config::RenderConfig;
use crate::fetch::{FetchError, FetchSuccess};
use chrono::Utc;
use std::time::Duration;

pub struct RenderClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    wait_for_selector: Option<String>,
}

impl RenderClient {
    pub fn new(config: &RenderConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            wait_for_selector: config.wait_for_selector.clone(),
        })
    }

    /// Fetches fully-rendered HTML for a URL via the `/content` endpoint
    pub async fn content(&self, url: &str) -> Result<FetchSuccess, FetchError> {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }

        let mut body = serde_json::json!({ "url": url });
        if let Some(ref selector) = self.wait_for_selector {
            body["waitForSelector"] = serde_json::json!({ "selector": selector });
        }

        let response = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Network(format!("render service unreachable: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Render(format!(
                "render service returned {}: {}",
                status.as_u16(),
                message
            )));
        }

        let html = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Render(e.to_string())
            }
        })?;

        Ok(FetchSuccess {
            final_url: url.to_string(),
            status: status.as_u16(),
            body: html,
            fetched_at: Utc::now(),
        })
    }
}
