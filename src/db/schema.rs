// Database schema — table creation and migrations.
//
// We use a simple version-based migration approach: a `schema_version` table
// tracks which migrations have run, and each migration is a function that
// executes SQL statements.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent and safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Append-only run history. The full snapshot is stored as JSON so the
        -- cluster structure can evolve without migrations.
        CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            taken_at TEXT NOT NULL UNIQUE,     -- RFC3339 UTC, fixed width, sorts lexically
            provider_id TEXT NOT NULL,         -- embedding provider for the run
            method TEXT NOT NULL,              -- fixed-k / threshold / graph
            degraded INTEGER NOT NULL DEFAULT 0,
            keyword_count INTEGER NOT NULL,
            cluster_count INTEGER NOT NULL,
            total_interest REAL NOT NULL,
            snapshot_json TEXT NOT NULL,
            recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )
    .context("Failed to create database tables")?;

    // Record initial schema version if not already set
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: per-cluster rows so one cluster's interest can be traced
    // across snapshots without decoding every snapshot's JSON.
    run_migration(conn, 2, |c| {
        c.execute_batch(
            "
            CREATE TABLE snapshot_clusters (
                snapshot_id INTEGER NOT NULL REFERENCES snapshots(id),
                cluster_id TEXT NOT NULL,      -- content-derived cluster identity
                label TEXT NOT NULL,
                intent TEXT NOT NULL,
                profile TEXT NOT NULL,
                interest REAL NOT NULL,
                keyword_count INTEGER NOT NULL,
                PRIMARY KEY (snapshot_id, cluster_id)
            );
            CREATE INDEX idx_snapshot_clusters_cluster
                ON snapshot_clusters(cluster_id);
            ",
        )
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
/// The migration function receives the connection and should execute its SQL.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        // Running create_tables twice should not error
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_table_count() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        // schema_version, snapshots, snapshot_clusters
        assert_eq!(table_count(&conn).unwrap(), 3i64);
    }

    #[test]
    fn test_taken_at_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let insert = "INSERT INTO snapshots
            (taken_at, provider_id, method, keyword_count, cluster_count, total_interest, snapshot_json)
            VALUES ('2024-01-01T00:00:00.000000Z', 'p', 'threshold', 1, 1, 0.0, '{}')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let versions: Vec<i64> = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(versions, vec![1, 2]);
    }
}
