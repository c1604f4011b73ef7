// Opportunity ledger — append-only snapshot history plus week-over-week diffs.
//
// Timestamps are strictly increasing. The store checks the newest stored
// timestamp and appends in one write transaction, so concurrent runs in this
// process or in others sharing the database file can't interleave.

pub mod compare;

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::info;

use crate::db::models::{Snapshot, SnapshotSummary};
use crate::db::queries::{AppendOutcome, ClusterTrendPoint};
use crate::db::traits::SnapshotStore;
use crate::error::{EngineError, EngineResult};

pub use compare::{
    compare, ChangePolicy, OpportunityRecord, OpportunityStatus, OpportunitySummary,
    DEFAULT_CHANGE_THRESHOLD,
};

/// Snapshot history over a `SnapshotStore`.
pub struct Ledger {
    store: Arc<dyn SnapshotStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Append a snapshot and return it as stored.
    ///
    /// Timestamps are kept to microsecond precision. Fails with
    /// `DuplicateSnapshot` unless the snapshot is strictly newer than the
    /// latest one already stored.
    pub async fn record(&self, mut snapshot: Snapshot) -> EngineResult<Snapshot> {
        snapshot.taken_at = snapshot.taken_at.trunc_subsecs(6);

        if let AppendOutcome::NotNewer { latest } = self.store.append_snapshot(&snapshot).await? {
            return Err(EngineError::DuplicateSnapshot {
                taken_at: snapshot.taken_at,
                latest,
            });
        }
        info!(
            taken_at = %snapshot.taken_at,
            clusters = snapshot.clusters.len(),
            keywords = snapshot.keyword_count,
            degraded = snapshot.degraded,
            "Recorded snapshot"
        );
        Ok(snapshot)
    }

    /// The most recent snapshot, if any.
    pub async fn latest(&self) -> EngineResult<Option<Snapshot>> {
        Ok(self.store.latest_snapshot().await?)
    }

    /// The snapshot recorded at exactly `taken_at`.
    pub async fn at(&self, taken_at: &DateTime<Utc>) -> EngineResult<Option<Snapshot>> {
        Ok(self.store.snapshot_at(&taken_at.trunc_subsecs(6)).await?)
    }

    /// The newest snapshot strictly older than `before`.
    pub async fn previous(&self, before: &DateTime<Utc>) -> EngineResult<Option<Snapshot>> {
        Ok(self.store.previous_snapshot(before).await?)
    }

    /// Snapshot summaries, newest first.
    pub async fn history(&self, limit: u32) -> EngineResult<Vec<SnapshotSummary>> {
        Ok(self.store.list_snapshots(limit).await?)
    }

    /// One cluster identity's interest over time, oldest first.
    pub async fn cluster_history(&self, cluster_id: &str) -> EngineResult<Vec<ClusterTrendPoint>> {
        Ok(self.store.cluster_history(cluster_id).await?)
    }

    pub async fn count(&self) -> EngineResult<i64> {
        Ok(self.store.snapshot_count().await?)
    }

    /// Compare the latest snapshot with the one before it. `None` when the
    /// ledger is empty.
    pub async fn latest_opportunities(
        &self,
        policy: &ChangePolicy,
    ) -> EngineResult<Option<(Snapshot, Option<Snapshot>, Vec<OpportunityRecord>)>> {
        let Some(latest) = self.latest().await? else {
            return Ok(None);
        };
        let previous = self.previous(&latest.taken_at).await?;
        let records = compare(&latest, previous.as_ref(), policy);
        Ok(Some((latest, previous, records)))
    }
}
