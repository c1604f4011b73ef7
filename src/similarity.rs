// Similarity engine — cosine similarity over keyword embeddings.
//
// Small inputs get a dense upper-triangle similarity matrix. Above
// `knn_threshold` keywords a full matrix is too expensive, so we build an
// approximate nearest-neighbor graph with random-hyperplane LSH instead: each
// keyword is only compared against keywords that share a hash bucket in at
// least one table. Hyperplanes come from a seeded RNG, so the same input and
// seed always yield the same graph.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Tuning knobs for the similarity index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Above this many keywords, switch from a dense matrix to the LSH graph.
    pub knn_threshold: usize,
    /// Neighbors kept per keyword in LSH mode.
    pub neighbors: usize,
    /// Number of independent hash tables.
    pub lsh_tables: usize,
    /// Hyperplanes (signature bits) per table, at most 63.
    pub lsh_bits: usize,
    /// Seed for hyperplane generation.
    pub seed: u64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            knn_threshold: 1500,
            neighbors: 15,
            lsh_tables: 4,
            lsh_bits: 10,
            seed: 42,
        }
    }
}

impl SimilarityConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.neighbors == 0 {
            return Err(EngineError::invalid_config("neighbors must be at least 1"));
        }
        if self.lsh_tables == 0 {
            return Err(EngineError::invalid_config("lsh_tables must be at least 1"));
        }
        if self.lsh_bits == 0 || self.lsh_bits > 63 {
            return Err(EngineError::invalid_config("lsh_bits must be between 1 and 63"));
        }
        Ok(())
    }
}

/// Similarity structure over a fixed set of L2-normalized vectors.
pub struct SimilarityIndex {
    vectors: Vec<Vec<f64>>,
    dimension: usize,
    mode: IndexMode,
}

enum IndexMode {
    /// Upper triangle (i < j) stored row-major.
    Dense(Vec<f64>),
    /// Top neighbors per keyword, sorted by similarity descending.
    Neighbors(Vec<Vec<(usize, f64)>>),
}

impl SimilarityIndex {
    /// Build an index over the given embeddings.
    ///
    /// Fails with `EmptyInput` for zero vectors and `DimensionMismatch` when
    /// vectors of different lengths are mixed.
    pub fn build(embeddings: &[Vec<f64>], config: &SimilarityConfig) -> EngineResult<Self> {
        config.validate()?;
        let first = embeddings.first().ok_or(EngineError::EmptyInput)?;
        let dimension = first.len();

        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(EngineError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        let vectors: Vec<Vec<f64>> = embeddings.iter().map(|e| normalize(e)).collect();
        let n = vectors.len();

        let mode = if n <= config.knn_threshold {
            let mut upper = Vec::with_capacity(n * n.saturating_sub(1) / 2);
            for i in 0..n {
                for j in (i + 1)..n {
                    upper.push(unit_cosine(&vectors[i], &vectors[j]));
                }
            }
            debug!(keywords = n, pairs = upper.len(), "Built dense similarity matrix");
            IndexMode::Dense(upper)
        } else {
            let graph = lsh_neighbors(&vectors, dimension, config);
            debug!(
                keywords = n,
                tables = config.lsh_tables,
                bits = config.lsh_bits,
                "Built LSH neighbor graph"
            );
            IndexMode::Neighbors(graph)
        };

        Ok(Self {
            vectors,
            dimension,
            mode,
        })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The normalized vectors the index was built from.
    pub fn vectors(&self) -> &[Vec<f64>] {
        &self.vectors
    }

    /// True when every pair was precomputed.
    pub fn is_dense(&self) -> bool {
        matches!(self.mode, IndexMode::Dense(_))
    }

    /// Similarity in [0, 1] between keywords `i` and `j`.
    pub fn similarity(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return 1.0;
        }
        match &self.mode {
            IndexMode::Dense(upper) => {
                let (a, b) = if i < j { (i, j) } else { (j, i) };
                upper[self.upper_offset(a, b)]
            }
            IndexMode::Neighbors(_) => unit_cosine(&self.vectors[i], &self.vectors[j]),
        }
    }

    /// Keywords similar to `i` at or above `min_sim`, most similar first.
    ///
    /// Exact in dense mode; in LSH mode only the retained neighbors are
    /// considered.
    pub fn neighbors(&self, i: usize, min_sim: f64) -> Vec<(usize, f64)> {
        match &self.mode {
            IndexMode::Dense(_) => {
                let mut out: Vec<(usize, f64)> = (0..self.len())
                    .filter(|&j| j != i)
                    .map(|j| (j, self.similarity(i, j)))
                    .filter(|&(_, s)| s >= min_sim)
                    .collect();
                sort_neighbors(&mut out);
                out
            }
            IndexMode::Neighbors(graph) => graph[i]
                .iter()
                .copied()
                .filter(|&(_, s)| s >= min_sim)
                .collect(),
        }
    }

    /// Undirected edges (i < j) with similarity at or above `min_sim`.
    pub fn edges(&self, min_sim: f64) -> Vec<(usize, usize, f64)> {
        let mut edges = Vec::new();
        match &self.mode {
            IndexMode::Dense(_) => {
                for i in 0..self.len() {
                    for j in (i + 1)..self.len() {
                        let s = self.similarity(i, j);
                        if s >= min_sim {
                            edges.push((i, j, s));
                        }
                    }
                }
            }
            IndexMode::Neighbors(graph) => {
                for (i, list) in graph.iter().enumerate() {
                    for &(j, s) in list {
                        if s >= min_sim {
                            let (a, b) = if i < j { (i, j) } else { (j, i) };
                            edges.push((a, b, s));
                        }
                    }
                }
                // Neighbor lists are not symmetric, so one pair can appear twice
                edges.sort_by(|x, y| x.0.cmp(&y.0).then(x.1.cmp(&y.1)));
                edges.dedup_by(|x, y| x.0 == y.0 && x.1 == y.1);
            }
        }
        edges
    }

    /// Mean similarity over all pairs in the corpus. Only available in dense
    /// mode; a single keyword counts as perfectly self-similar.
    pub fn mean_similarity(&self) -> Option<f64> {
        match &self.mode {
            IndexMode::Dense(upper) if upper.is_empty() => Some(1.0),
            IndexMode::Dense(upper) => Some(upper.iter().sum::<f64>() / upper.len() as f64),
            IndexMode::Neighbors(_) => None,
        }
    }

    /// Mean pairwise similarity within a group of keywords (1.0 for singletons).
    pub fn mean_within(&self, members: &[usize]) -> f64 {
        if members.len() < 2 {
            return 1.0;
        }
        let mut sum = 0.0;
        let mut pairs = 0usize;
        for (a, &i) in members.iter().enumerate() {
            for &j in &members[a + 1..] {
                sum += self.similarity(i, j);
                pairs += 1;
            }
        }
        sum / pairs as f64
    }

    fn upper_offset(&self, i: usize, j: usize) -> usize {
        // Row i starts after sum_{r<i} (n - 1 - r) entries
        let n = self.len();
        i * (2 * n - i - 1) / 2 + (j - i - 1)
    }
}

/// Approximate k-nearest-neighbor lists via random-hyperplane LSH.
fn lsh_neighbors(
    vectors: &[Vec<f64>],
    dimension: usize,
    config: &SimilarityConfig,
) -> Vec<Vec<(usize, f64)>> {
    let n = vectors.len();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut candidates: Vec<Vec<usize>> = vec![Vec::new(); n];

    for _ in 0..config.lsh_tables {
        let planes: Vec<Vec<f64>> = (0..config.lsh_bits)
            .map(|_| (0..dimension).map(|_| rng.random_range(-1.0..1.0)).collect())
            .collect();

        let mut buckets: HashMap<u64, Vec<usize>> = HashMap::new();
        let signatures: Vec<u64> = vectors
            .iter()
            .map(|v| {
                planes.iter().enumerate().fold(0u64, |sig, (bit, plane)| {
                    if dot(v, plane) >= 0.0 {
                        sig | (1 << bit)
                    } else {
                        sig
                    }
                })
            })
            .collect();
        for (i, &sig) in signatures.iter().enumerate() {
            buckets.entry(sig).or_default().push(i);
        }
        for (i, sig) in signatures.iter().enumerate() {
            if let Some(bucket) = buckets.get(sig) {
                candidates[i].extend(bucket.iter().copied().filter(|&j| j != i));
            }
        }
    }

    candidates
        .into_iter()
        .enumerate()
        .map(|(i, mut cands)| {
            cands.sort_unstable();
            cands.dedup();
            let mut scored: Vec<(usize, f64)> = cands
                .into_iter()
                .map(|j| (j, unit_cosine(&vectors[i], &vectors[j])))
                .collect();
            sort_neighbors(&mut scored);
            scored.truncate(config.neighbors);
            scored
        })
        .collect()
}

fn sort_neighbors(list: &mut [(usize, f64)]) {
    list.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine of two already-normalized vectors, clamped to [0, 1].
fn unit_cosine(a: &[f64], b: &[f64]) -> f64 {
    dot(a, b).clamp(0.0, 1.0)
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn normalize(v: &[f64]) -> Vec<f64> {
    let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm < f64::EPSILON {
        v.to_vec()
    } else {
        v.iter().map(|x| x / norm).collect()
    }
}

/// Compute the mean of several vectors of equal length (the centroid of a
/// cluster). Returns an empty vector for empty input.
pub fn mean_vector(vectors: &[&[f64]]) -> Vec<f64> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };

    let n = vectors.len() as f64;
    let mut mean = vec![0.0_f64; first.len()];

    for v in vectors {
        for (i, &val) in v.iter().enumerate().take(mean.len()) {
            mean[i] += val;
        }
    }

    for val in &mut mean {
        *val /= n;
    }

    mean
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 to 1.0: opposite-direction vectors clamp to 0.0, and
/// mismatched or zero-length inputs score 0.0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot = dot(a, b);
    let mag_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    let denom = mag_a * mag_b;
    if denom < f64::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(0.0, 1.0)
    }
}
