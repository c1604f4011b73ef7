// Database queries — snapshot storage and lookup.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.
//
// Timestamps are written as fixed-width RFC3339 UTC with microseconds, so
// string order in SQL is chronological order.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

use super::models::{Snapshot, SnapshotSummary};

/// Canonical storage form of a snapshot timestamp.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid stored timestamp: {raw}"))?;
    Ok(parsed.with_timezone(&Utc))
}

// --- Snapshots ---

/// What happened to an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Written; carries the new row ID.
    Appended(i64),
    /// Nothing written: a snapshot at or after `latest` is already stored.
    NotNewer { latest: DateTime<Utc> },
}

/// Append a snapshot and its per-cluster rows in one transaction.
///
/// The transaction is IMMEDIATE, so the newest-timestamp check and the
/// insert hold the database write lock together. Another process appending
/// to the same file either commits before the check or waits for the commit.
pub fn insert_snapshot(conn: &Connection, snapshot: &Snapshot) -> Result<AppendOutcome> {
    let json = serde_json::to_string(snapshot).context("Failed to serialize snapshot")?;
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .context("Failed to start snapshot transaction")?;

    if let Some(latest) = latest_taken_at(&tx)? {
        if snapshot.taken_at <= latest {
            return Ok(AppendOutcome::NotNewer { latest });
        }
    }

    tx.execute(
        "INSERT INTO snapshots (taken_at, provider_id, method, degraded, keyword_count,
                                cluster_count, total_interest, snapshot_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            format_timestamp(&snapshot.taken_at),
            snapshot.provider_id,
            snapshot.method,
            snapshot.degraded,
            snapshot.keyword_count as i64,
            snapshot.clusters.len() as i64,
            snapshot.total_interest(),
            json,
        ],
    )
    .with_context(|| {
        format!(
            "Failed to insert snapshot taken at {}",
            format_timestamp(&snapshot.taken_at)
        )
    })?;
    let snapshot_id = tx.last_insert_rowid();

    {
        let mut stmt = tx.prepare(
            "INSERT INTO snapshot_clusters
                (snapshot_id, cluster_id, label, intent, profile, interest, keyword_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for cluster in &snapshot.clusters {
            stmt.execute(params![
                snapshot_id,
                cluster.id,
                cluster.label,
                cluster.intent.as_str(),
                cluster.profile,
                cluster.interest,
                cluster.members.len() as i64,
            ])?;
        }
    }

    tx.commit()?;
    Ok(AppendOutcome::Appended(snapshot_id))
}

/// Timestamp of the newest stored snapshot.
pub fn latest_taken_at(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT taken_at FROM snapshots ORDER BY taken_at DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    raw.as_deref().map(parse_timestamp).transpose()
}

/// The newest stored snapshot.
pub fn latest_snapshot(conn: &Connection) -> Result<Option<Snapshot>> {
    load_one(
        conn,
        "SELECT snapshot_json FROM snapshots ORDER BY taken_at DESC LIMIT 1",
        params![],
    )
}

/// The snapshot recorded at exactly `taken_at`.
pub fn snapshot_at(conn: &Connection, taken_at: &DateTime<Utc>) -> Result<Option<Snapshot>> {
    load_one(
        conn,
        "SELECT snapshot_json FROM snapshots WHERE taken_at = ?1",
        params![format_timestamp(taken_at)],
    )
}

/// The newest snapshot strictly older than `before`.
pub fn previous_snapshot(conn: &Connection, before: &DateTime<Utc>) -> Result<Option<Snapshot>> {
    load_one(
        conn,
        "SELECT snapshot_json FROM snapshots WHERE taken_at < ?1
         ORDER BY taken_at DESC LIMIT 1",
        params![format_timestamp(before)],
    )
}

fn load_one(conn: &Connection, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Option<Snapshot>> {
    let json: Option<String> = conn.query_row(sql, args, |row| row.get(0)).optional()?;
    match json {
        Some(json) => {
            let snapshot: Snapshot =
                serde_json::from_str(&json).context("Failed to decode stored snapshot")?;
            Ok(Some(snapshot))
        }
        None => Ok(None),
    }
}

/// Most recent snapshots first, without their cluster payloads.
pub fn list_snapshots(conn: &Connection, limit: u32) -> Result<Vec<SnapshotSummary>> {
    let mut stmt = conn.prepare(
        "SELECT taken_at, provider_id, method, degraded, keyword_count, cluster_count, total_interest
         FROM snapshots
         ORDER BY taken_at DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, bool>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, i64>(5)?,
            row.get::<_, f64>(6)?,
        ))
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        let (taken_at, provider_id, method, degraded, keyword_count, cluster_count, total_interest) =
            row?;
        summaries.push(SnapshotSummary {
            taken_at: parse_timestamp(&taken_at)?,
            provider_id,
            method,
            degraded,
            keyword_count: keyword_count.max(0) as usize,
            cluster_count: cluster_count.max(0) as usize,
            total_interest,
        });
    }
    Ok(summaries)
}

pub fn snapshot_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
    Ok(count)
}

// --- Cluster history ---

/// One appearance of a cluster in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterTrendPoint {
    pub taken_at: DateTime<Utc>,
    pub label: String,
    pub interest: f64,
    pub keyword_count: usize,
}

/// Every snapshot a cluster identity appeared in, oldest first.
pub fn cluster_history(conn: &Connection, cluster_id: &str) -> Result<Vec<ClusterTrendPoint>> {
    let mut stmt = conn.prepare(
        "SELECT s.taken_at, c.label, c.interest, c.keyword_count
         FROM snapshot_clusters c
         JOIN snapshots s ON s.id = c.snapshot_id
         WHERE c.cluster_id = ?1
         ORDER BY s.taken_at ASC",
    )?;
    let rows = stmt.query_map(params![cluster_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;

    let mut points = Vec::new();
    for row in rows {
        let (taken_at, label, interest, keyword_count) = row?;
        points.push(ClusterTrendPoint {
            taken_at: parse_timestamp(&taken_at)?,
            label,
            interest,
            keyword_count: keyword_count.max(0) as usize,
        });
    }
    Ok(points)
}
