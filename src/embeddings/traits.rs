// Embedding provider trait — the swap-ready abstraction.
//
// A provider maps a keyword to a fixed-length vector. Vectors are only
// comparable when they come from the same provider, so every provider declares
// a `provider_id` that is stamped on the snapshot it produced.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for embedding keyword text. Implementations are async because the
/// remote variant makes HTTP calls.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier including model/version, e.g. `remote/text-embedding-3-small`.
    fn provider_id(&self) -> &str;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// How many keywords to send per `embed_batch` call.
    fn batch_size(&self) -> usize {
        32
    }

    /// Embed a single keyword.
    async fn embed(&self, keyword: &str) -> Result<Vec<f64>>;

    /// Embed multiple keywords, returning vectors in the same order.
    /// Default implementation calls `embed` sequentially; providers
    /// can override for batching if they support it.
    async fn embed_batch(&self, keywords: &[String]) -> Result<Vec<Vec<f64>>> {
        let mut vectors = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            vectors.push(self.embed(keyword).await?);
        }
        Ok(vectors)
    }
}
