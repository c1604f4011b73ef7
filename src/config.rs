use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::clustering::{ClusterMethod, DEFAULT_RESTARTS};
use crate::embeddings::local::{LocalFallbackProvider, DEFAULT_DIMENSION};
use crate::embeddings::remote::{
    RemoteEmbeddingProvider, DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_URL,
};
use crate::embeddings::traits::EmbeddingProvider;
use crate::intent::{AudienceProfile, IntentClassifier};
use crate::interest::remote::RemoteInterestProvider;
use crate::interest::traits::InterestProvider;
use crate::ledger::{ChangePolicy, DEFAULT_CHANGE_THRESHOLD};
use crate::pipeline::{PipelineConfig, DEFAULT_CONCURRENCY, DEFAULT_PROVIDER_TIMEOUT};
use crate::similarity::SimilarityConfig;

/// Which embedding backend to use.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedderBackend {
    /// Local feature hashing (default); needs no API key or network
    Local,
    /// OpenAI-compatible embeddings endpoint; requires an API key
    Remote,
}

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
pub struct Config {
    pub db_path: String,
    /// Which embedder to use (default: Local)
    pub embedder_backend: EmbedderBackend,
    pub embedding_url: String,
    pub embedding_model: String,
    /// KEYPLOT_EMBEDDING_API_KEY, falling back to OPENAI_API_KEY
    pub embedding_api_key: String,
    /// Vector length for both the remote request and the local embedder
    pub embedding_dimension: usize,
    /// Trend endpoint for interest signals; search volume is used when unset
    pub interest_url: Option<String>,
    pub provider_timeout: Duration,
    pub concurrency: usize,
    pub profiles: Vec<AudienceProfile>,
    pub change_threshold: f64,
    pub kmeans_restarts: usize,
    pub knn_threshold: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default; only the remote embedder needs a key.
    pub fn load() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load from any key lookup (the environment in production).
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let embedder_backend = match var("KEYPLOT_EMBEDDER").as_deref() {
            Some("remote") | Some("openai") => EmbedderBackend::Remote,
            Some("local") | None => EmbedderBackend::Local,
            Some(other) => anyhow::bail!(
                "KEYPLOT_EMBEDDER must be 'local' or 'remote', got '{other}'"
            ),
        };

        let profiles = match var("KEYPLOT_PROFILES") {
            Some(raw) => AudienceProfile::parse_list(&raw).context("Invalid KEYPLOT_PROFILES")?,
            None => AudienceProfile::defaults(),
        };

        let timeout_secs: f64 = parse_var(&var, "KEYPLOT_PROVIDER_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_PROVIDER_TIMEOUT.as_secs_f64());
        if !timeout_secs.is_finite() || timeout_secs <= 0.0 {
            anyhow::bail!("KEYPLOT_PROVIDER_TIMEOUT_SECS must be a positive number of seconds");
        }

        Ok(Self {
            db_path: var("KEYPLOT_DB_PATH").unwrap_or_else(|| "./keyplot.db".to_string()),
            embedder_backend,
            embedding_url: var("KEYPLOT_EMBEDDING_URL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_URL.to_string()),
            embedding_model: var("KEYPLOT_EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_api_key: var("KEYPLOT_EMBEDDING_API_KEY")
                .or_else(|| var("OPENAI_API_KEY"))
                .unwrap_or_default(),
            embedding_dimension: parse_var(&var, "KEYPLOT_EMBEDDING_DIMENSION")?
                .unwrap_or(DEFAULT_DIMENSION),
            interest_url: var("KEYPLOT_INTEREST_URL"),
            provider_timeout: Duration::from_secs_f64(timeout_secs),
            concurrency: parse_var(&var, "KEYPLOT_CONCURRENCY")?.unwrap_or(DEFAULT_CONCURRENCY),
            profiles,
            change_threshold: parse_var(&var, "KEYPLOT_CHANGE_THRESHOLD")?
                .unwrap_or(DEFAULT_CHANGE_THRESHOLD),
            kmeans_restarts: parse_var(&var, "KEYPLOT_KMEANS_RESTARTS")?
                .unwrap_or(DEFAULT_RESTARTS),
            knn_threshold: parse_var(&var, "KEYPLOT_KNN_THRESHOLD")?
                .unwrap_or(SimilarityConfig::default().knn_threshold),
        })
    }

    /// Check that the remote embedding API key is configured.
    pub fn require_embedding_key(&self) -> Result<()> {
        if self.embedding_api_key.is_empty() {
            anyhow::bail!(
                "KEYPLOT_EMBEDDING_API_KEY (or OPENAI_API_KEY) not set. Add it to your .env file,\n\
                 or set KEYPLOT_EMBEDDER=local to use the local embedder instead."
            );
        }
        Ok(())
    }

    /// Validate that the chosen embedder backend has what it needs.
    pub fn require_embedder(&self) -> Result<()> {
        match self.embedder_backend {
            EmbedderBackend::Local => Ok(()),
            EmbedderBackend::Remote => self.require_embedding_key(),
        }
    }

    /// Build the configured embedder. Chosen once here; the pipeline only
    /// swaps to the local fallback when this one fails mid-run.
    pub fn build_embedder(&self) -> Result<Box<dyn EmbeddingProvider>> {
        self.require_embedder()?;
        match self.embedder_backend {
            EmbedderBackend::Local => Ok(Box::new(self.build_fallback())),
            EmbedderBackend::Remote => Ok(Box::new(RemoteEmbeddingProvider::new(
                &self.embedding_api_key,
                &self.embedding_url,
                &self.embedding_model,
                self.embedding_dimension,
                self.provider_timeout,
            )?)),
        }
    }

    pub fn build_fallback(&self) -> LocalFallbackProvider {
        LocalFallbackProvider::new(self.embedding_dimension)
    }

    /// The trend-endpoint interest provider, when one is configured.
    pub fn build_interest(&self) -> Result<Option<Box<dyn InterestProvider>>> {
        match &self.interest_url {
            Some(url) => Ok(Some(Box::new(RemoteInterestProvider::new(
                url,
                self.provider_timeout,
            )?))),
            None => Ok(None),
        }
    }

    pub fn classifier(&self) -> IntentClassifier {
        IntentClassifier::new(self.profiles.clone())
    }

    /// Pipeline settings for one run. The configured restart count replaces
    /// the method's default for fixed-k.
    pub fn pipeline_config(&self, method: ClusterMethod) -> Result<PipelineConfig> {
        let method = match method {
            ClusterMethod::FixedK {
                k,
                seed,
                max_iterations,
                ..
            } => ClusterMethod::FixedK {
                k,
                restarts: self.kmeans_restarts,
                seed,
                max_iterations,
            },
            other => other,
        };

        let config = PipelineConfig {
            method,
            similarity: SimilarityConfig {
                knn_threshold: self.knn_threshold,
                ..Default::default()
            },
            change_policy: ChangePolicy::new(self.change_threshold)?,
            provider_timeout: self.provider_timeout,
            concurrency: self.concurrency,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} has an invalid value: {raw}"))
        })
        .transpose()
}
