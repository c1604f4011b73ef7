// HTTP trend endpoint for interest signals.
//
// Expects `GET {base_url}?keyword=<kw>` to answer `{"interest": <number>}`
// (or `{"interest": null}` when the keyword is unknown). A 404 is read as
// "no data" rather than an error.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::traits::{sanitize_interest, InterestProvider};

/// Client for a keyword trend/interest endpoint.
pub struct RemoteInterestProvider {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteInterestProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("keyplot/0.1 (keyword-clustering)")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl InterestProvider for RemoteInterestProvider {
    fn provider_id(&self) -> &str {
        &self.base_url
    }

    async fn interest(&self, keyword: &str) -> Result<Option<f64>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("keyword", keyword)])
            .send()
            .await
            .context("Interest API request failed")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Interest API returned {}: {}", status, body);
        }

        let parsed: InterestResponse = response
            .json()
            .await
            .context("Failed to parse interest API response")?;

        debug!(keyword, interest = ?parsed.interest, "Fetched interest");

        Ok(parsed.interest.map(sanitize_interest))
    }
}

#[derive(Debug, Deserialize)]
struct InterestResponse {
    interest: Option<f64>,
}
