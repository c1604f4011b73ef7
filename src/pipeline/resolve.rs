// Provider resolution — embeddings and interest for one run.
//
// Both stages fan out over the provider with ordered `buffered` streams and
// bound every call with a timeout. Failures never escape: the stage falls
// back for the whole keyword set and the run is flagged degraded. Falling
// back for everything (instead of per keyword) keeps one provider's values
// from being mixed with another's within a snapshot.

use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use indicatif::ProgressBar;
use tracing::{debug, warn};

use crate::embeddings::local::LocalFallbackProvider;
use crate::embeddings::traits::EmbeddingProvider;
use crate::error::EngineError;
use crate::interest::traits::{sanitize_interest, InterestProvider};
use crate::keywords::Keyword;

/// Vectors for every keyword, all from one provider.
pub struct EmbeddingOutcome {
    pub vectors: Vec<Vec<f64>>,
    pub provider_id: String,
    pub degraded: bool,
}

/// Interest for every keyword, aligned with the input.
pub struct InterestOutcome {
    pub values: Vec<f64>,
    pub degraded: bool,
}

fn timeout_error(provider: &str, timeout: Duration) -> anyhow::Error {
    EngineError::ProviderTimeout {
        provider: provider.to_string(),
        timeout_secs: timeout.as_secs_f64(),
    }
    .into()
}

/// Embed all keywords with `embedder`, or with `fallback` if any batch
/// fails, times out, or comes back malformed.
pub async fn embed_all(
    embedder: &dyn EmbeddingProvider,
    fallback: &LocalFallbackProvider,
    texts: &[String],
    concurrency: usize,
    timeout: Duration,
    progress: &ProgressBar,
) -> EmbeddingOutcome {
    let provider = embedder.provider_id().to_string();
    let batch_size = embedder.batch_size().max(1);

    let fetched: anyhow::Result<Vec<Vec<Vec<f64>>>> =
        stream::iter(texts.chunks(batch_size).map(|chunk| {
            let provider = provider.as_str();
            async move {
                let result = match tokio::time::timeout(timeout, embedder.embed_batch(chunk)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(timeout_error(provider, timeout)),
                };
                progress.inc(chunk.len() as u64);
                result
            }
        }))
        .buffered(concurrency.max(1))
        .try_collect()
        .await;

    let checked = fetched.and_then(|batches| {
        let vectors: Vec<Vec<f64>> = batches.into_iter().flatten().collect();
        anyhow::ensure!(
            vectors.len() == texts.len(),
            "provider returned {} vectors for {} keywords",
            vectors.len(),
            texts.len()
        );
        if let Some(bad) = vectors.iter().find(|v| v.len() != embedder.dimension()) {
            return Err(EngineError::DimensionMismatch {
                expected: embedder.dimension(),
                actual: bad.len(),
            }
            .into());
        }
        Ok(vectors)
    });

    match checked {
        Ok(vectors) => {
            debug!(provider = %provider, keywords = texts.len(), "Embedded keywords");
            EmbeddingOutcome {
                vectors,
                provider_id: provider,
                degraded: false,
            }
        }
        Err(e) => {
            warn!(
                provider = %provider,
                fallback = fallback.provider_id(),
                error = %e,
                "Embedding provider failed, re-embedding all keywords locally"
            );
            progress.set_position(texts.len() as u64);
            EmbeddingOutcome {
                vectors: texts.iter().map(|t| fallback.vectorize(t)).collect(),
                provider_id: fallback.provider_id().to_string(),
                degraded: true,
            }
        }
    }
}

/// The interest value a keyword's own metadata implies: its search volume,
/// or 0 when unknown.
pub fn volume_interest(keyword: &Keyword) -> f64 {
    keyword.volume.map_or(0.0, |v| v as f64)
}

/// Look up interest for every keyword. Without a provider, or when any
/// lookup fails, each keyword's search volume is used instead.
pub async fn resolve_interest(
    provider: Option<&dyn InterestProvider>,
    keywords: &[Keyword],
    concurrency: usize,
    timeout: Duration,
) -> InterestOutcome {
    let from_volume = || keywords.iter().map(volume_interest).collect::<Vec<f64>>();

    let Some(provider) = provider else {
        return InterestOutcome {
            values: from_volume(),
            degraded: false,
        };
    };

    let id = provider.provider_id().to_string();
    let fetched: anyhow::Result<Vec<f64>> = stream::iter(keywords.iter().map(|kw| {
        let id = id.as_str();
        async move {
            match tokio::time::timeout(timeout, provider.interest(&kw.text)).await {
                Ok(Ok(value)) => Ok(value.map_or(0.0, sanitize_interest)),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(timeout_error(id, timeout)),
            }
        }
    }))
    .buffered(concurrency.max(1))
    .try_collect()
    .await;

    match fetched {
        Ok(values) => {
            debug!(provider = %id, keywords = keywords.len(), "Resolved interest");
            InterestOutcome {
                values,
                degraded: false,
            }
        }
        Err(e) => {
            warn!(
                provider = %id,
                error = %e,
                "Interest provider failed, using search volume for all keywords"
            );
            InterestOutcome {
                values: from_volume(),
                degraded: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    struct SlowEmbedder;

    #[async_trait]
    impl EmbeddingProvider for SlowEmbedder {
        fn provider_id(&self) -> &str {
            "slow"
        }
        fn dimension(&self) -> usize {
            2
        }
        async fn embed(&self, _keyword: &str) -> Result<Vec<f64>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![1.0, 0.0])
        }
    }

    struct WrongDimension;

    #[async_trait]
    impl EmbeddingProvider for WrongDimension {
        fn provider_id(&self) -> &str {
            "wrong-dim"
        }
        fn dimension(&self) -> usize {
            3
        }
        async fn embed(&self, _keyword: &str) -> Result<Vec<f64>> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct FixedInterest;

    #[async_trait]
    impl InterestProvider for FixedInterest {
        fn provider_id(&self) -> &str {
            "fixed"
        }
        async fn interest(&self, keyword: &str) -> Result<Option<f64>> {
            match keyword {
                "known" => Ok(Some(42.0)),
                "negative" => Ok(Some(-5.0)),
                "broken" => anyhow::bail!("upstream 500"),
                _ => Ok(None),
            }
        }
    }

    fn texts(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_local() {
        let fallback = LocalFallbackProvider::new(8);
        let out = embed_all(
            &SlowEmbedder,
            &fallback,
            &texts(&["a", "b"]),
            2,
            Duration::from_millis(50),
            &ProgressBar::hidden(),
        )
        .await;
        assert!(out.degraded);
        assert_eq!(out.provider_id, "local-hash-v1/8");
        assert_eq!(out.vectors.len(), 2);
        assert_eq!(out.vectors[0], fallback.vectorize("a"));
    }

    #[tokio::test]
    async fn test_wrong_dimension_falls_back() {
        let fallback = LocalFallbackProvider::new(4);
        let out = embed_all(
            &WrongDimension,
            &fallback,
            &texts(&["x"]),
            1,
            Duration::from_secs(1),
            &ProgressBar::hidden(),
        )
        .await;
        assert!(out.degraded);
        assert!(out.vectors.iter().all(|v| v.len() == 4));
    }

    #[tokio::test]
    async fn test_local_embedder_is_not_degraded() {
        let local = LocalFallbackProvider::new(16);
        let fallback = LocalFallbackProvider::new(16);
        let out = embed_all(
            &local,
            &fallback,
            &texts(&["ats", "hiring"]),
            4,
            Duration::from_secs(1),
            &ProgressBar::hidden(),
        )
        .await;
        assert!(!out.degraded);
        assert_eq!(out.provider_id, "local-hash-v1/16");
    }

    #[tokio::test]
    async fn test_interest_missing_is_zero_and_negative_clamps() {
        let keywords = vec![
            Keyword::new("known"),
            Keyword::new("unknown").with_volume(900),
            Keyword::new("negative"),
        ];
        let out =
            resolve_interest(Some(&FixedInterest), &keywords, 2, Duration::from_secs(1)).await;
        assert!(!out.degraded);
        assert_eq!(out.values, vec![42.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_interest_failure_uses_volume_everywhere() {
        let keywords = vec![Keyword::new("known"), Keyword::new("broken").with_volume(70)];
        let out =
            resolve_interest(Some(&FixedInterest), &keywords, 2, Duration::from_secs(1)).await;
        assert!(out.degraded);
        assert_eq!(out.values, vec![0.0, 70.0]);
    }

    #[tokio::test]
    async fn test_no_interest_provider_uses_volume() {
        let keywords = vec![Keyword::new("a").with_volume(5), Keyword::new("b")];
        let out = resolve_interest(None, &keywords, 2, Duration::from_secs(1)).await;
        assert!(!out.degraded);
        assert_eq!(out.values, vec![5.0, 0.0]);
    }
}
