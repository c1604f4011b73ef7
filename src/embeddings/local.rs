// Local fallback embedder — signed feature hashing over lexical features.
//
// No model, no network. Each keyword is broken into word unigrams, word
// bigrams and character trigrams; every feature is hashed (FNV-1a) into one
// of `dimension` buckets with a hash-derived sign, and the result is
// L2-normalized. Keywords that share words or word stems land near each other,
// which is enough for clustering SEO keyword lists when no remote provider is
// configured or the remote one fails.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use stop_words::{get, LANGUAGE};

use super::traits::EmbeddingProvider;

/// Default vector length for the hashed projection.
pub const DEFAULT_DIMENSION: usize = 256;

const UNIGRAM_WEIGHT: f64 = 1.0;
const BIGRAM_WEIGHT: f64 = 0.5;
/// Total weight shared by all character trigrams of one token.
const TRIGRAM_WEIGHT: f64 = 0.6;

/// Deterministic bag-of-features embedder used when no remote provider is
/// available (or when the remote provider fails mid-run).
pub struct LocalFallbackProvider {
    dimension: usize,
    stop_words: HashSet<String>,
    id: String,
}

impl Default for LocalFallbackProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl LocalFallbackProvider {
    /// Create a fallback embedder producing vectors of the given length.
    /// A zero dimension is bumped to 1 so the projection is always defined.
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        let stop_words: Vec<String> = get(LANGUAGE::English);
        Self {
            dimension,
            stop_words: stop_words.into_iter().collect(),
            id: format!("local-hash-v1/{dimension}"),
        }
    }

    /// Project a keyword into the hashed feature space.
    pub fn vectorize(&self, keyword: &str) -> Vec<f64> {
        let mut vector = vec![0.0_f64; self.dimension];

        let all_tokens: Vec<&str> = keyword
            .split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
            .filter(|t| !t.is_empty())
            .collect();

        // Drop stop words unless that would leave nothing ("how to" still
        // needs some representation)
        let content: Vec<&str> = all_tokens
            .iter()
            .copied()
            .filter(|t| !self.stop_words.contains(*t))
            .collect();
        let tokens = if content.is_empty() { all_tokens } else { content };

        for token in &tokens {
            self.add_feature(&mut vector, &format!("w:{token}"), UNIGRAM_WEIGHT);

            let padded: Vec<char> = format!("#{token}#").chars().collect();
            if padded.len() >= 3 {
                let trigram_count = padded.len() - 2;
                let per_trigram = TRIGRAM_WEIGHT / trigram_count as f64;
                for window in padded.windows(3) {
                    let trigram: String = window.iter().collect();
                    self.add_feature(&mut vector, &format!("c:{trigram}"), per_trigram);
                }
            }
        }

        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, &format!("b:{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }

        let norm: f64 = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > f64::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }

    fn add_feature(&self, vector: &mut [f64], feature: &str, weight: f64) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
        vector[bucket] += sign * weight;
    }
}

#[async_trait]
impl EmbeddingProvider for LocalFallbackProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn batch_size(&self) -> usize {
        256
    }

    async fn embed(&self, keyword: &str) -> Result<Vec<f64>> {
        Ok(self.vectorize(keyword))
    }
}

/// 64-bit FNV-1a. Stable across platforms and toolchain versions, unlike
/// `DefaultHasher`.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
