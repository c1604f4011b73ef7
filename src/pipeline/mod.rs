// Pipeline orchestrator — one run from raw keywords to opportunity records.
//
// Stages, in order: normalize → embed → interest → similarity index →
// cluster (per intent bucket) → label → compare with the previous snapshot →
// record. Any stage error aborts the run before anything is written.
// Provider trouble never aborts: it degrades the run instead.

pub mod resolve;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clustering::{self, apportion_k, ClusterInput, ClusterMethod};
use crate::db::models::{cluster_id, cluster_label, Cluster, ClusterMember, Intent, Snapshot};
use crate::embeddings::local::LocalFallbackProvider;
use crate::embeddings::traits::EmbeddingProvider;
use crate::error::{EngineError, EngineResult};
use crate::intent::{central_members, keyword_intent, IntentClassifier};
use crate::interest::traits::InterestProvider;
use crate::keywords::{dedup_keywords, Keyword};
use crate::ledger::{compare, ChangePolicy, Ledger, OpportunityRecord, OpportunitySummary};
use crate::similarity::{mean_vector, SimilarityConfig, SimilarityIndex};

/// Default number of provider calls in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default bound on a single provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything that shapes one run. Passed in explicitly; the pipeline never
/// reads the environment.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub method: ClusterMethod,
    pub similarity: SimilarityConfig,
    pub change_policy: ChangePolicy,
    /// Cluster each keyword-level intent separately
    pub split_by_intent: bool,
    /// Bound on each embedding batch or interest lookup
    pub provider_timeout: Duration,
    /// Provider calls in flight at once
    pub concurrency: usize,
    /// Record the snapshot in the ledger (false for dry runs)
    pub persist: bool,
    /// Draw a progress bar for the embedding stage
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            method: ClusterMethod::default(),
            similarity: SimilarityConfig::default(),
            change_policy: ChangePolicy::default(),
            split_by_intent: true,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            persist: true,
            show_progress: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        self.method.validate()?;
        self.similarity.validate()?;
        self.change_policy.validate()?;
        if self.concurrency == 0 {
            return Err(EngineError::invalid_config("concurrency must be at least 1"));
        }
        if self.provider_timeout.is_zero() {
            return Err(EngineError::invalid_config("provider timeout must be positive"));
        }
        Ok(())
    }
}

/// The outcome of one run, handed to reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub snapshot: Snapshot,
    pub opportunities: Vec<OpportunityRecord>,
    /// Timestamp of the snapshot this run was compared against
    pub previous_taken_at: Option<DateTime<Utc>>,
    /// Whether the snapshot was written to the ledger
    pub persisted: bool,
}

impl RunResult {
    pub fn summary(&self) -> OpportunitySummary {
        OpportunitySummary::from_records(&self.opportunities)
    }
}

/// Sequences the engine for one invocation.
pub struct Pipeline {
    config: PipelineConfig,
    embedder: Box<dyn EmbeddingProvider>,
    fallback: LocalFallbackProvider,
    interest: Option<Box<dyn InterestProvider>>,
    classifier: IntentClassifier,
    ledger: Arc<Ledger>,
}

impl Pipeline {
    /// Build a pipeline. Fails with `InvalidConfig` before any work when the
    /// configuration is out of range.
    pub fn new(
        config: PipelineConfig,
        embedder: Box<dyn EmbeddingProvider>,
        ledger: Arc<Ledger>,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            embedder,
            fallback: LocalFallbackProvider::default(),
            interest: None,
            classifier: IntentClassifier::default(),
            ledger,
        })
    }

    pub fn with_interest(mut self, provider: Box<dyn InterestProvider>) -> Self {
        self.interest = Some(provider);
        self
    }

    pub fn with_classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_fallback(mut self, fallback: LocalFallbackProvider) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Run now. With no `previous` snapshot, the latest one in the ledger
    /// is used.
    pub async fn run(
        &self,
        keywords: Vec<Keyword>,
        previous: Option<Snapshot>,
    ) -> EngineResult<RunResult> {
        self.run_at(keywords, previous, Utc::now()).await
    }

    /// Run with an explicit snapshot timestamp.
    pub async fn run_at(
        &self,
        keywords: Vec<Keyword>,
        previous: Option<Snapshot>,
        taken_at: DateTime<Utc>,
    ) -> EngineResult<RunResult> {
        self.config.validate()?;

        let keywords = dedup_keywords(keywords);
        if keywords.is_empty() {
            return Err(EngineError::EmptyInput);
        }
        let texts: Vec<String> = keywords.iter().map(|k| k.text.clone()).collect();
        info!(
            keywords = texts.len(),
            method = self.config.method.name(),
            provider = self.embedder.provider_id(),
            "Starting run"
        );

        // Embeddings for every keyword must be in hand before similarity
        let progress = self.progress_bar(texts.len());
        let embedded = resolve::embed_all(
            self.embedder.as_ref(),
            &self.fallback,
            &texts,
            self.config.concurrency,
            self.config.provider_timeout,
            &progress,
        )
        .await;
        progress.finish_and_clear();

        let interest = resolve::resolve_interest(
            self.interest.as_deref(),
            &keywords,
            self.config.concurrency,
            self.config.provider_timeout,
        )
        .await;
        let degraded = embedded.degraded || interest.degraded;

        let index = SimilarityIndex::build(&embedded.vectors, &self.config.similarity)?;
        let input = ClusterInput::new(&index, &interest.values, &texts)?;

        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (members, method) in self.plan_buckets(&texts) {
            groups.extend(clustering::build_clusters(&input, &members, &method)?);
        }

        let mut clusters: Vec<Cluster> = groups
            .iter()
            .map(|group| self.build_cluster(group, &index, &keywords, &interest.values))
            .collect();
        clusters.sort_by(|a, b| {
            b.interest
                .partial_cmp(&a.interest)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let snapshot = Snapshot {
            taken_at,
            provider_id: embedded.provider_id,
            method: self.config.method.name().to_string(),
            degraded,
            keyword_count: texts.len(),
            corpus_similarity: index.mean_similarity(),
            clusters,
        };
        info!(
            clusters = snapshot.clusters.len(),
            degraded = snapshot.degraded,
            provider = %snapshot.provider_id,
            "Clustered keywords"
        );

        let previous = match previous {
            Some(snapshot) => Some(snapshot),
            None => self.ledger.latest().await?,
        };
        let opportunities = compare(&snapshot, previous.as_ref(), &self.config.change_policy);

        let snapshot = if self.config.persist {
            self.ledger.record(snapshot).await?
        } else {
            snapshot
        };

        let result = RunResult {
            snapshot,
            opportunities,
            previous_taken_at: previous.map(|p| p.taken_at),
            persisted: self.config.persist,
        };
        let summary = result.summary();
        info!(
            new = summary.new,
            growing = summary.growing,
            shrinking = summary.shrinking,
            stale = summary.stale,
            removed = summary.removed,
            persisted = result.persisted,
            "Run complete"
        );
        Ok(result)
    }

    /// Which keywords get clustered together, and with what method.
    ///
    /// With intent splitting, each keyword-level intent is its own bucket
    /// (no cue counts as informational) and a fixed k is shared out across
    /// buckets by size. A fixed k smaller than the bucket count keeps the
    /// k - 1 largest buckets and folds the rest into one, so the run still
    /// yields exactly `min(k, keywords)` clusters.
    fn plan_buckets(&self, texts: &[String]) -> Vec<(Vec<usize>, ClusterMethod)> {
        let all: Vec<usize> = (0..texts.len()).collect();
        if !self.config.split_by_intent {
            return vec![(all, self.config.method.clone())];
        }

        let mut by_intent: HashMap<Intent, Vec<usize>> = HashMap::new();
        for (i, text) in texts.iter().enumerate() {
            let intent = keyword_intent(text).unwrap_or_default();
            by_intent.entry(intent).or_default().push(i);
        }
        let buckets: Vec<Vec<usize>> = Intent::PRIORITY
            .iter()
            .filter_map(|intent| by_intent.remove(intent))
            .collect();

        match &self.config.method {
            ClusterMethod::FixedK {
                k,
                restarts,
                seed,
                max_iterations,
            } => {
                let buckets = fold_buckets(buckets, *k);
                let sizes: Vec<usize> = buckets.iter().map(Vec::len).collect();
                let shares = apportion_k(*k, &sizes);
                buckets
                    .into_iter()
                    .zip(shares)
                    .map(|(members, share)| {
                        let method = ClusterMethod::FixedK {
                            k: share,
                            restarts: *restarts,
                            seed: *seed,
                            max_iterations: *max_iterations,
                        };
                        (members, method)
                    })
                    .collect()
            }
            method => buckets
                .into_iter()
                .map(|members| (members, method.clone()))
                .collect(),
        }
    }

    fn build_cluster(
        &self,
        group: &[usize],
        index: &SimilarityIndex,
        keywords: &[Keyword],
        interest: &[f64],
    ) -> Cluster {
        let mut members: Vec<ClusterMember> = group
            .iter()
            .map(|&i| ClusterMember {
                keyword: keywords[i].text.clone(),
                interest: interest[i],
                volume: keywords[i].volume,
                cpc: keywords[i].cpc,
                competition: keywords[i].competition,
            })
            .collect();
        members.sort_by(|a, b| {
            b.interest
                .partial_cmp(&a.interest)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.keyword.cmp(&b.keyword))
        });

        let vectors = index.vectors();
        let refs: Vec<&[f64]> = group.iter().map(|&i| vectors[i].as_slice()).collect();
        let central: Vec<&str> =
            central_members(index, group, self.classifier.central_keywords())
                .into_iter()
                .map(|i| keywords[i].text.as_str())
                .collect();
        let label = self.classifier.classify(&central);

        let texts: Vec<&str> = members.iter().map(|m| m.keyword.as_str()).collect();
        Cluster {
            id: cluster_id(&texts),
            label: cluster_label(&members),
            interest: members.iter().map(|m| m.interest).sum(),
            members,
            centroid: mean_vector(&refs),
            intent: label.intent,
            profile: label.profile,
            cohesion: index.mean_within(group),
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  Embedding [{bar:30}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb
    }
}


/// Reduce the buckets to at most `k`: the k - 1 largest stay as they are
/// (earlier bucket on ties) and the rest merge into one.
fn fold_buckets(buckets: Vec<Vec<usize>>, k: usize) -> Vec<Vec<usize>> {
    if k == 0 || buckets.len() <= k {
        return buckets;
    }
    let mut order: Vec<usize> = (0..buckets.len()).collect();
    order.sort_by(|&a, &b| buckets[b].len().cmp(&buckets[a].len()).then(a.cmp(&b)));
    let keep = &order[..k - 1];

    let mut kept = Vec::with_capacity(k);
    let mut folded = Vec::new();
    for (i, bucket) in buckets.into_iter().enumerate() {
        if keep.contains(&i) {
            kept.push(bucket);
        } else {
            folded.extend(bucket);
        }
    }
    folded.sort_unstable();
    kept.push(folded);
    kept
}
