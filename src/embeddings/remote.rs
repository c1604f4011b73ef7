// OpenAI-compatible remote embedding provider.
//
// Sends batches of keywords to `POST {base_url}/embeddings` and returns the
// vectors in input order. No retries here: a failed or slow call makes the
// pipeline fall back to the local embedder for the whole run, so embeddings
// from the two providers never mix.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::EmbeddingProvider;

/// Default endpoint root for OpenAI-compatible embedding APIs.
pub const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Remote embedding client.
pub struct RemoteEmbeddingProvider {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    id: String,
}

impl RemoteEmbeddingProvider {
    /// Build a client for the given endpoint and model.
    ///
    /// `dimension` is requested from the API (OpenAI's `dimensions` field) and
    /// every returned vector is checked against it.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing embedding API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        anyhow::ensure!(dimension > 0, "embedding dimension must be positive");

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid embedding API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent("keyplot/0.1 (keyword-clustering)")
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimension,
            batch_size: 64,
            id: format!("remote/{model}/{dimension}"),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn embed(&self, keyword: &str) -> Result<Vec<f64>> {
        let mut vectors = self.embed_batch(&[keyword.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Embedding API returned no vector"))
    }

    async fn embed_batch(&self, keywords: &[String]) -> Result<Vec<Vec<f64>>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: keywords,
            dimensions: Some(self.dimension),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .context("Failed to call embedding API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding API returned {}: {}", status, body);
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding API response")?;
        parsed.data.sort_by_key(|entry| entry.index);

        anyhow::ensure!(
            parsed.data.len() == keywords.len(),
            "Embedding API returned {} vectors for {} inputs",
            parsed.data.len(),
            keywords.len()
        );

        let vectors: Vec<Vec<f64>> = parsed
            .data
            .into_iter()
            .map(|entry| entry.embedding.into_iter().map(f64::from).collect())
            .collect();

        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            anyhow::bail!(
                "Embedding API returned a {}-dim vector, expected {}",
                bad.len(),
                self.dimension
            );
        }

        debug!(
            batch_size = keywords.len(),
            dim = self.dimension,
            model = %self.model,
            "Fetched remote embeddings"
        );

        Ok(vectors)
    }
}

// --- OpenAI embeddings request/response types ---

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}
