// Snapshot store trait — backend-agnostic async interface for the ledger.
//
// Implementors: SqliteStore (wraps rusqlite). All methods are async so a
// sync backend behind a Mutex and a native async backend fit the same
// interface. The store only appends and reads. An append must be strictly
// newer than everything stored; the store checks this atomically with the
// write so it holds across processes sharing one database.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{Snapshot, SnapshotSummary};
use super::queries::{AppendOutcome, ClusterTrendPoint};

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Snapshots ---

    /// Append a snapshot unless one at or after its timestamp is stored.
    async fn append_snapshot(&self, snapshot: &Snapshot) -> Result<AppendOutcome>;

    /// The newest stored snapshot.
    async fn latest_snapshot(&self) -> Result<Option<Snapshot>>;

    /// The snapshot recorded at exactly this timestamp.
    async fn snapshot_at(&self, taken_at: &DateTime<Utc>) -> Result<Option<Snapshot>>;

    /// The newest snapshot strictly older than `before`.
    async fn previous_snapshot(&self, before: &DateTime<Utc>) -> Result<Option<Snapshot>>;

    /// Snapshot summaries, newest first.
    async fn list_snapshots(&self, limit: u32) -> Result<Vec<SnapshotSummary>>;

    async fn snapshot_count(&self) -> Result<i64>;

    // --- Clusters ---

    /// Every appearance of a cluster identity, oldest first.
    async fn cluster_history(&self, cluster_id: &str) -> Result<Vec<ClusterTrendPoint>>;
}
