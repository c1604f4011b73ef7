// SqliteStore — rusqlite backend implementing the SnapshotStore trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across .await points.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{Snapshot, SnapshotSummary};
use super::queries::{self, AppendOutcome, ClusterTrendPoint};
use super::traits::SnapshotStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// In-memory store with the schema applied. Handy for dry runs and tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::create_tables(&conn)?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn append_snapshot(&self, snapshot: &Snapshot) -> Result<AppendOutcome> {
        let conn = self.conn.lock().await;
        queries::insert_snapshot(&conn, snapshot)
    }

    async fn latest_snapshot(&self) -> Result<Option<Snapshot>> {
        let conn = self.conn.lock().await;
        queries::latest_snapshot(&conn)
    }

    async fn snapshot_at(&self, taken_at: &DateTime<Utc>) -> Result<Option<Snapshot>> {
        let conn = self.conn.lock().await;
        queries::snapshot_at(&conn, taken_at)
    }

    async fn previous_snapshot(&self, before: &DateTime<Utc>) -> Result<Option<Snapshot>> {
        let conn = self.conn.lock().await;
        queries::previous_snapshot(&conn, before)
    }

    async fn list_snapshots(&self, limit: u32) -> Result<Vec<SnapshotSummary>> {
        let conn = self.conn.lock().await;
        queries::list_snapshots(&conn, limit)
    }

    async fn snapshot_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::snapshot_count(&conn)
    }

    async fn cluster_history(&self, cluster_id: &str) -> Result<Vec<ClusterTrendPoint>> {
        let conn = self.conn.lock().await;
        queries::cluster_history(&conn, cluster_id)
    }
}
