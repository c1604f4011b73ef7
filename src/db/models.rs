// Data models — the values that flow from the pipeline into the ledger.
//
// Snapshots and their clusters are serialized to JSON for storage, so these
// types are kept free of rusqlite. A cluster's identity comes from its
// keyword set alone, which lets the ledger match clusters across runs even
// when their order or label changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::keywords::RankMetric;

/// Searcher goal category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    #[default]
    Informational,
    Commercial,
    Transactional,
    Navigational,
}

impl Intent {
    /// All intents, in tie-break priority order (strongest first).
    pub const PRIORITY: [Intent; 4] = [
        Intent::Transactional,
        Intent::Commercial,
        Intent::Navigational,
        Intent::Informational,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Informational => "informational",
            Intent::Commercial => "commercial",
            Intent::Transactional => "transactional",
            Intent::Navigational => "navigational",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "informational" => Some(Intent::Informational),
            "commercial" => Some(Intent::Commercial),
            "transactional" => Some(Intent::Transactional),
            "navigational" => Some(Intent::Navigational),
            _ => None,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One keyword inside a cluster, with the signals it was ranked by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMember {
    pub keyword: String,
    /// Aggregate interest signal (0 when the provider had no value)
    pub interest: f64,
    pub volume: Option<u64>,
    pub cpc: Option<f64>,
    pub competition: Option<f64>,
}

impl ClusterMember {
    fn metric(&self, metric: RankMetric) -> Option<f64> {
        match metric {
            RankMetric::Volume => self.volume.map(|v| v as f64),
            RankMetric::Cpc => self.cpc,
            RankMetric::Competition => self.competition,
            RankMetric::Interest => Some(self.interest),
        }
    }
}

/// A labeled group of keywords from one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Content-derived identity (see `cluster_id`)
    pub id: String,
    /// Human-readable label: top keywords by interest
    pub label: String,
    /// Members, highest interest first
    pub members: Vec<ClusterMember>,
    pub centroid: Vec<f64>,
    pub intent: Intent,
    pub profile: String,
    /// Sum of member interest
    pub interest: f64,
    /// Mean pairwise similarity between members (1.0 for singletons)
    pub cohesion: f64,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn keywords(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.keyword.as_str()).collect()
    }

    /// The `n` best members by a metric. Members without a value for the
    /// metric sort last; ties keep keyword order.
    pub fn top_keywords(&self, metric: RankMetric, n: usize) -> Vec<&ClusterMember> {
        let mut ranked: Vec<&ClusterMember> = self.members.iter().collect();
        ranked.sort_by(|a, b| {
            let (va, vb) = (a.metric(metric), b.metric(metric));
            match (va, vb) {
                (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then_with(|| a.keyword.cmp(&b.keyword))
        });
        ranked.truncate(n);
        ranked
    }
}

/// One run's complete clustering result. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    /// Embedding provider that produced the vectors for this run
    pub provider_id: String,
    /// Clustering method name
    pub method: String,
    /// True when any provider fell back during the run
    pub degraded: bool,
    pub keyword_count: usize,
    /// Mean similarity across the whole keyword set (dense mode only)
    pub corpus_similarity: Option<f64>,
    /// Clusters, highest interest first
    pub clusters: Vec<Cluster>,
}

impl Snapshot {
    pub fn cluster(&self, id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    pub fn total_interest(&self) -> f64 {
        self.clusters.iter().map(|c| c.interest).sum()
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            taken_at: self.taken_at,
            provider_id: self.provider_id.clone(),
            method: self.method.clone(),
            degraded: self.degraded,
            keyword_count: self.keyword_count,
            cluster_count: self.clusters.len(),
            total_interest: self.total_interest(),
        }
    }
}

/// One row of ledger history, without the cluster payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub taken_at: DateTime<Utc>,
    pub provider_id: String,
    pub method: String,
    pub degraded: bool,
    pub keyword_count: usize,
    pub cluster_count: usize,
    pub total_interest: f64,
}

/// Stable identity for a keyword set: the first 16 hex characters of the
/// SHA-256 of the sorted keywords joined by newlines. Order-independent.
pub fn cluster_id<S: AsRef<str>>(keywords: &[S]) -> String {
    let mut sorted: Vec<&str> = keywords.iter().map(|k| k.as_ref()).collect();
    sorted.sort_unstable();
    sorted.dedup();
    let digest = Sha256::digest(sorted.join("\n").as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(16);
    id
}

/// Label a cluster by its top three keywords (members are expected in
/// descending interest order).
pub fn cluster_label(members: &[ClusterMember]) -> String {
    members
        .iter()
        .take(3)
        .map(|m| m.keyword.as_str())
        .collect::<Vec<_>>()
        .join(" / ")
}
