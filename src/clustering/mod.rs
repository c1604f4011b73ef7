// Cluster builder — partitions keywords into groups over the similarity index.
//
// Three policies:
//   fixed-k    seeded k-means++ with bounded restarts, lowest inertia wins
//   threshold  greedy centroid agglomeration in descending-interest order
//   graph      connected components of the similarity graph at a threshold
//
// Whatever the policy, the result is a partition: every keyword lands in
// exactly one non-empty group.

pub mod graph;
pub mod kmeans;
pub mod threshold;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::similarity::SimilarityIndex;

pub const DEFAULT_K: usize = 5;
pub const DEFAULT_THRESHOLD: f64 = 0.5;
pub const DEFAULT_RESTARTS: usize = 5;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Upper bound on k-means restarts; keeps a misconfigured run from spinning.
pub const MAX_RESTARTS: usize = 100;

/// Clustering policy and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum ClusterMethod {
    FixedK {
        k: usize,
        restarts: usize,
        seed: u64,
        max_iterations: usize,
    },
    Threshold {
        threshold: f64,
    },
    Graph {
        threshold: f64,
    },
}

impl Default for ClusterMethod {
    fn default() -> Self {
        ClusterMethod::Threshold {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl ClusterMethod {
    /// Fixed-k with default restarts, seed and iteration cap.
    pub fn fixed_k(k: usize) -> Self {
        ClusterMethod::FixedK {
            k,
            restarts: DEFAULT_RESTARTS,
            seed: DEFAULT_SEED,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn threshold(threshold: f64) -> Self {
        ClusterMethod::Threshold { threshold }
    }

    pub fn graph(threshold: f64) -> Self {
        ClusterMethod::Graph { threshold }
    }

    /// Resolve a method by name. `kmeans` is accepted as an alias for
    /// `fixed-k`. Unknown names are an `InvalidConfig` error.
    pub fn from_name(name: &str, k: Option<usize>, threshold: Option<f64>) -> EngineResult<Self> {
        let method = match name.trim().to_ascii_lowercase().as_str() {
            "fixed-k" | "fixed_k" | "kmeans" => Self::fixed_k(k.unwrap_or(DEFAULT_K)),
            "threshold" => Self::threshold(threshold.unwrap_or(DEFAULT_THRESHOLD)),
            "graph" => Self::graph(threshold.unwrap_or(DEFAULT_THRESHOLD)),
            other => {
                return Err(EngineError::invalid_config(format!(
                    "unknown clustering method '{other}' (expected fixed-k, threshold or graph)"
                )))
            }
        };
        method.validate()?;
        Ok(method)
    }

    /// Override the fixed-k seed. Only fixed-k is randomized, so a seed
    /// given for any other method is an `InvalidConfig` error.
    pub fn with_seed(self, seed: Option<u64>) -> EngineResult<Self> {
        match (self, seed) {
            (method, None) => Ok(method),
            (
                ClusterMethod::FixedK {
                    k,
                    restarts,
                    max_iterations,
                    ..
                },
                Some(seed),
            ) => Ok(ClusterMethod::FixedK {
                k,
                restarts,
                seed,
                max_iterations,
            }),
            (method, Some(_)) => Err(EngineError::invalid_config(format!(
                "--seed only applies to fixed-k; the {} method is deterministic",
                method.name()
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClusterMethod::FixedK { .. } => "fixed-k",
            ClusterMethod::Threshold { .. } => "threshold",
            ClusterMethod::Graph { .. } => "graph",
        }
    }

    /// Reject out-of-range parameters before any work begins.
    pub fn validate(&self) -> EngineResult<()> {
        match self {
            ClusterMethod::FixedK {
                k,
                restarts,
                max_iterations,
                ..
            } => {
                if *k == 0 {
                    return Err(EngineError::invalid_config("k must be at least 1"));
                }
                if *restarts == 0 || *restarts > MAX_RESTARTS {
                    return Err(EngineError::invalid_config(format!(
                        "restarts must be between 1 and {MAX_RESTARTS}"
                    )));
                }
                if *max_iterations == 0 {
                    return Err(EngineError::invalid_config("max_iterations must be at least 1"));
                }
            }
            ClusterMethod::Threshold { threshold } | ClusterMethod::Graph { threshold } => {
                if !(0.0..=1.0).contains(threshold) {
                    return Err(EngineError::invalid_config(format!(
                        "similarity threshold must be within [0, 1], got {threshold}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Everything the builder needs about the keyword set, aligned by index.
pub struct ClusterInput<'a> {
    pub index: &'a SimilarityIndex,
    /// Aggregate interest per keyword (threshold processing order)
    pub interest: &'a [f64],
    /// Keyword text (deterministic tie-breaks)
    pub labels: &'a [String],
}

impl<'a> ClusterInput<'a> {
    pub fn new(
        index: &'a SimilarityIndex,
        interest: &'a [f64],
        labels: &'a [String],
    ) -> EngineResult<Self> {
        if interest.len() != index.len() || labels.len() != index.len() {
            return Err(EngineError::invalid_config(format!(
                "cluster input misaligned: {} vectors, {} interest values, {} labels",
                index.len(),
                interest.len(),
                labels.len()
            )));
        }
        Ok(Self {
            index,
            interest,
            labels,
        })
    }
}

/// Partition every keyword in the input.
pub fn build_all(input: &ClusterInput, method: &ClusterMethod) -> EngineResult<Vec<Vec<usize>>> {
    let members: Vec<usize> = (0..input.index.len()).collect();
    build_clusters(input, &members, method)
}

/// Partition a subset of the input's keywords (given as indices into the
/// index). Returned groups hold the same global indices, each group sorted
/// ascending and the groups ordered by their smallest member.
pub fn build_clusters(
    input: &ClusterInput,
    members: &[usize],
    method: &ClusterMethod,
) -> EngineResult<Vec<Vec<usize>>> {
    method.validate()?;
    if members.is_empty() {
        return Err(EngineError::EmptyInput);
    }
    if let Some(&bad) = members.iter().find(|&&m| m >= input.index.len()) {
        return Err(EngineError::invalid_config(format!(
            "member index {bad} out of range"
        )));
    }

    let vectors = input.index.vectors();
    let points: Vec<&[f64]> = members.iter().map(|&m| vectors[m].as_slice()).collect();

    let local_groups = match method {
        ClusterMethod::FixedK {
            k,
            restarts,
            seed,
            max_iterations,
        } => {
            let assignments = kmeans::assign(&points, *k, *restarts, *seed, *max_iterations);
            kmeans::groups_from_assignments(&assignments)
        }
        ClusterMethod::Threshold { threshold } => {
            let interest: Vec<f64> = members.iter().map(|&m| input.interest[m]).collect();
            let labels: Vec<&str> = members.iter().map(|&m| input.labels[m].as_str()).collect();
            threshold::partition(&points, &interest, &labels, *threshold)
        }
        ClusterMethod::Graph { threshold } => {
            graph::components(input.index, members, *threshold)
        }
    };

    let mut groups: Vec<Vec<usize>> = local_groups
        .into_iter()
        .filter(|g| !g.is_empty())
        .map(|g| {
            let mut global: Vec<usize> = g.into_iter().map(|local| members[local]).collect();
            global.sort_unstable();
            global
        })
        .collect();
    groups.sort_by_key(|g| g[0]);

    debug_assert!(covers_exactly(&groups, members));
    debug!(
        method = method.name(),
        keywords = members.len(),
        clusters = groups.len(),
        "Built clusters"
    );

    Ok(groups)
}

/// True when `groups` are non-empty, pairwise disjoint, and their union is
/// exactly `members`.
pub fn covers_exactly(groups: &[Vec<usize>], members: &[usize]) -> bool {
    let mut seen: Vec<usize> = groups.iter().flatten().copied().collect();
    let total = seen.len();
    seen.sort_unstable();
    seen.dedup();
    if seen.len() != total || groups.iter().any(|g| g.is_empty()) {
        return false;
    }
    let mut expected = members.to_vec();
    expected.sort_unstable();
    expected.dedup();
    seen == expected
}

/// Split a total k across intent buckets in proportion to their sizes.
///
/// Shares always sum to `min(k, total keywords)` and never exceed a bucket's
/// size. Every non-empty bucket gets at least one cluster while k allows;
/// when there are more non-empty buckets than clusters, the largest buckets
/// get one each and the rest get none. The remaining clusters go one at a
/// time to the bucket furthest below its proportional share (lowest index on
/// ties).
pub fn apportion_k(k: usize, bucket_sizes: &[usize]) -> Vec<usize> {
    let total: usize = bucket_sizes.iter().sum();
    let target = k.min(total);
    let mut shares = vec![0usize; bucket_sizes.len()];
    if target == 0 {
        return shares;
    }

    let mut by_size: Vec<usize> = (0..bucket_sizes.len())
        .filter(|&i| bucket_sizes[i] > 0)
        .collect();
    by_size.sort_by(|&a, &b| bucket_sizes[b].cmp(&bucket_sizes[a]).then(a.cmp(&b)));
    for &i in by_size.iter().take(target) {
        shares[i] = 1;
    }

    let mut assigned = by_size.len().min(target);
    while assigned < target {
        let mut best: Option<(usize, f64)> = None;
        for (i, &size) in bucket_sizes.iter().enumerate() {
            if shares[i] >= size {
                continue;
            }
            let ideal = target as f64 * size as f64 / total as f64;
            let deficit = ideal - shares[i] as f64;
            if best.map_or(true, |(_, d)| deficit > d) {
                best = Some((i, deficit));
            }
        }
        // Spare capacity always exists: target <= total
        let Some((i, _)) = best else { break };
        shares[i] += 1;
        assigned += 1;
    }

    shares
}
