// Engine error taxonomy.
//
// Structural and configuration problems are fatal and propagate to the caller.
// Provider problems (timeouts, HTTP failures) are caught at the provider
// boundary and replaced with deterministic fallbacks; `ProviderTimeout` exists
// so those boundaries can describe what they recovered from in logs.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// No keywords survived normalization, or a stage was handed zero items.
    #[error("no keywords to process")]
    EmptyInput,

    /// An embedding or interest provider did not answer in time.
    #[error("provider {provider} did not respond within {timeout_secs:.1}s")]
    ProviderTimeout { provider: String, timeout_secs: f64 },

    /// A snapshot was recorded at or before the latest stored timestamp.
    #[error("snapshot at {taken_at} is not newer than the latest stored snapshot ({latest})")]
    DuplicateSnapshot {
        taken_at: DateTime<Utc>,
        latest: DateTime<Utc>,
    },

    /// Unknown clustering method or a parameter out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Embeddings of different lengths were mixed in one run.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Persistence failure underneath the ledger.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        EngineError::InvalidConfig(msg.into())
    }

    /// Short machine-friendly name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::EmptyInput => "empty_input",
            EngineError::ProviderTimeout { .. } => "provider_timeout",
            EngineError::DuplicateSnapshot { .. } => "duplicate_snapshot",
            EngineError::InvalidConfig(_) => "invalid_config",
            EngineError::DimensionMismatch { .. } => "dimension_mismatch",
            EngineError::Storage(_) => "storage",
        }
    }
}
