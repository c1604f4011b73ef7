// Unit tests for snapshot comparison and the append-only ledger.
//
// Snapshots are built by hand so each test controls cluster identity and
// interest exactly. Ledger tests run against an in-memory SQLite store.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use keyplot::db;
use keyplot::db::models::{cluster_id, cluster_label, Cluster, ClusterMember, Intent, Snapshot};
use keyplot::db::sqlite::SqliteStore;
use keyplot::error::EngineError;
use keyplot::ledger::{compare, ChangePolicy, Ledger, OpportunityStatus, OpportunitySummary};

fn cluster(keywords: &[&str], interest: f64) -> Cluster {
    let per_keyword = interest / keywords.len() as f64;
    let members: Vec<ClusterMember> = keywords
        .iter()
        .map(|k| ClusterMember {
            keyword: k.to_string(),
            interest: per_keyword,
            volume: None,
            cpc: None,
            competition: None,
        })
        .collect();
    Cluster {
        id: cluster_id(keywords),
        label: cluster_label(&members),
        members,
        centroid: vec![1.0, 0.0],
        intent: Intent::Commercial,
        profile: "recruiter".to_string(),
        interest,
        cohesion: 1.0,
    }
}

fn snapshot(taken_at: DateTime<Utc>, clusters: Vec<Cluster>) -> Snapshot {
    Snapshot {
        taken_at,
        provider_id: "local-hash-v1/256".to_string(),
        method: "threshold".to_string(),
        degraded: false,
        keyword_count: clusters.iter().map(|c| c.len()).sum(),
        corpus_similarity: Some(0.5),
        clusters,
    }
}

fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn status_of(
    records: &[keyplot::ledger::OpportunityRecord],
    keywords: &[&str],
) -> OpportunityStatus {
    let id = cluster_id(keywords);
    records
        .iter()
        .find(|r| r.cluster_id == id)
        .map(|r| r.status)
        .unwrap_or_else(|| panic!("no record for {keywords:?}"))
}

// ============================================================
// compare — pure snapshot comparison
// ============================================================

#[test]
fn first_run_labels_everything_new() {
    let current = snapshot(
        monday(),
        vec![cluster(&["ats software"], 50.0), cluster(&["hr jobs"], 10.0)],
    );
    let records = compare(&current, None, &ChangePolicy::default());
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.status == OpportunityStatus::New));
    assert!(records.iter().all(|r| r.previous_interest.is_none()));
}

#[test]
fn comparing_a_snapshot_with_itself_is_all_stale() {
    let s = snapshot(
        monday(),
        vec![
            cluster(&["ats software", "ats pricing"], 80.0),
            cluster(&["hr jobs"], 10.0),
            cluster(&["payroll"], 0.0),
        ],
    );
    let records = compare(&s, Some(&s), &ChangePolicy::default());
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.status == OpportunityStatus::Stale));
}

#[test]
fn growth_beyond_the_band_is_growing() {
    let before = snapshot(monday(), vec![cluster(&["ats software"], 100.0)]);
    let after = snapshot(
        monday() + Duration::weeks(1),
        vec![cluster(&["ats software"], 140.0)],
    );
    let records = compare(&after, Some(&before), &ChangePolicy::default());
    assert_eq!(records[0].status, OpportunityStatus::Growing);
    assert!((records[0].change.unwrap() - 0.4).abs() < 1e-9);
}

#[test]
fn change_inside_the_band_is_stale() {
    let before = snapshot(monday(), vec![cluster(&["ats software"], 100.0)]);
    let after = snapshot(
        monday() + Duration::weeks(1),
        vec![cluster(&["ats software"], 110.0)],
    );
    let records = compare(&after, Some(&before), &ChangePolicy::default());
    assert_eq!(records[0].status, OpportunityStatus::Stale);
}

#[test]
fn wider_band_keeps_twenty_percent_stale() {
    let before = snapshot(monday(), vec![cluster(&["ats software"], 100.0)]);
    let after = snapshot(
        monday() + Duration::weeks(1),
        vec![cluster(&["ats software"], 120.0)],
    );

    let default = compare(&after, Some(&before), &ChangePolicy::default());
    assert_eq!(default[0].status, OpportunityStatus::Growing);

    let wide = ChangePolicy::new(0.2).unwrap();
    let records = compare(&after, Some(&before), &wide);
    assert_eq!(records[0].status, OpportunityStatus::Stale);
}

#[test]
fn drop_beyond_the_band_is_shrinking() {
    let before = snapshot(monday(), vec![cluster(&["ats software"], 100.0)]);
    let after = snapshot(
        monday() + Duration::weeks(1),
        vec![cluster(&["ats software"], 60.0)],
    );
    let records = compare(&after, Some(&before), &ChangePolicy::default());
    assert_eq!(records[0].status, OpportunityStatus::Shrinking);
}

#[test]
fn interest_appearing_from_zero_is_growing() {
    let before = snapshot(monday(), vec![cluster(&["ats software"], 0.0)]);
    let after = snapshot(
        monday() + Duration::weeks(1),
        vec![cluster(&["ats software"], 5.0)],
    );
    let records = compare(&after, Some(&before), &ChangePolicy::default());
    assert_eq!(records[0].status, OpportunityStatus::Growing);
    assert!(records[0].change.is_none());
}

#[test]
fn unmatched_clusters_are_new_or_removed() {
    let before = snapshot(
        monday(),
        vec![
            cluster(&["ats software", "ats pricing"], 80.0),
            cluster(&["hr jobs"], 10.0),
        ],
    );
    // "ats pricing" moved out, so the first cluster has a new identity
    let after = snapshot(
        monday() + Duration::weeks(1),
        vec![
            cluster(&["ats software"], 40.0),
            cluster(&["ats pricing"], 40.0),
            cluster(&["hr jobs"], 10.0),
        ],
    );

    let records = compare(&after, Some(&before), &ChangePolicy::default());
    assert_eq!(records.len(), 4);
    assert_eq!(status_of(&records, &["ats software"]), OpportunityStatus::New);
    assert_eq!(status_of(&records, &["ats pricing"]), OpportunityStatus::New);
    assert_eq!(status_of(&records, &["hr jobs"]), OpportunityStatus::Stale);
    assert_eq!(
        status_of(&records, &["ats software", "ats pricing"]),
        OpportunityStatus::Removed
    );
    // Removed records come last
    assert_eq!(records[3].status, OpportunityStatus::Removed);

    let summary = OpportunitySummary::from_records(&records);
    assert_eq!(summary.new, 2);
    assert_eq!(summary.stale, 1);
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.total(), 4);
}

#[test]
fn cluster_identity_ignores_member_order() {
    assert_eq!(
        cluster_id(&["ats pricing", "ats software"]),
        cluster_id(&["ats software", "ats pricing"])
    );
    assert_ne!(cluster_id(&["ats software"]), cluster_id(&["ats pricing"]));
}

#[test]
fn negative_change_threshold_is_rejected() {
    assert!(matches!(
        ChangePolicy::new(-0.1),
        Err(EngineError::InvalidConfig(_))
    ));
}

// ============================================================
// Ledger — append-only, strictly increasing timestamps
// ============================================================

fn ledger() -> Ledger {
    Ledger::new(Arc::new(SqliteStore::in_memory().unwrap()))
}

#[tokio::test]
async fn record_then_read_back() {
    let ledger = ledger();
    let s = snapshot(monday(), vec![cluster(&["ats software"], 12.5)]);
    let stored = ledger.record(s.clone()).await.unwrap();
    assert_eq!(stored, s);

    let latest = ledger.latest().await.unwrap().unwrap();
    assert_eq!(latest, s);
    assert_eq!(ledger.count().await.unwrap(), 1);
}

#[tokio::test]
async fn duplicate_timestamp_is_rejected() {
    let ledger = ledger();
    ledger.record(snapshot(monday(), vec![])).await.unwrap();

    let err = ledger.record(snapshot(monday(), vec![])).await.unwrap_err();
    assert!(matches!(err, EngineError::DuplicateSnapshot { .. }));

    let err = ledger
        .record(snapshot(monday() - Duration::days(1), vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateSnapshot { .. }));
    assert_eq!(ledger.count().await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_records_with_one_timestamp_admit_one() {
    let ledger = Arc::new(ledger());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = Arc::clone(&ledger);
        handles.push(tokio::spawn(async move {
            ledger.record(snapshot(monday(), vec![])).await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(ledger.count().await.unwrap(), 1);
}

#[tokio::test]
async fn second_writer_on_one_file_blocks_older_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let path = path.to_str().unwrap();
    let ours = Ledger::new(Arc::new(SqliteStore::new(db::initialize(path).unwrap())));
    let theirs = Ledger::new(Arc::new(SqliteStore::new(db::open(path).unwrap())));

    // The other writer lands a newer snapshot first
    let later = monday() + Duration::weeks(1);
    theirs
        .record(snapshot(later, vec![cluster(&["ats software"], 140.0)]))
        .await
        .unwrap();

    let err = ours
        .record(snapshot(monday(), vec![cluster(&["ats software"], 100.0)]))
        .await
        .unwrap_err();
    match err {
        EngineError::DuplicateSnapshot { taken_at, latest } => {
            assert_eq!(taken_at, monday());
            assert_eq!(latest, later);
        }
        other => panic!("expected DuplicateSnapshot, got {other:?}"),
    }
    assert_eq!(ours.count().await.unwrap(), 1);
    assert_eq!(ours.latest().await.unwrap().unwrap().taken_at, later);
}

#[tokio::test]
async fn latest_opportunities_compares_last_two() {
    let ledger = ledger();
    assert!(ledger
        .latest_opportunities(&ChangePolicy::default())
        .await
        .unwrap()
        .is_none());

    ledger
        .record(snapshot(monday(), vec![cluster(&["ats software"], 100.0)]))
        .await
        .unwrap();
    ledger
        .record(snapshot(
            monday() + Duration::weeks(1),
            vec![cluster(&["ats software"], 140.0)],
        ))
        .await
        .unwrap();

    let (latest, previous, records) = ledger
        .latest_opportunities(&ChangePolicy::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.taken_at, monday() + Duration::weeks(1));
    assert_eq!(previous.unwrap().taken_at, monday());
    assert_eq!(records[0].status, OpportunityStatus::Growing);
}

#[tokio::test]
async fn cluster_history_follows_one_identity() {
    let ledger = ledger();
    for (week, interest) in [(0, 100.0), (1, 120.0), (2, 90.0)] {
        ledger
            .record(snapshot(
                monday() + Duration::weeks(week),
                vec![cluster(&["ats software"], interest), cluster(&["hr jobs"], 1.0)],
            ))
            .await
            .unwrap();
    }

    let points = ledger
        .cluster_history(&cluster_id(&["ats software"]))
        .await
        .unwrap();
    let interest: Vec<f64> = points.iter().map(|p| p.interest).collect();
    assert_eq!(interest, vec![100.0, 120.0, 90.0]);

    let history = ledger.history(2).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].taken_at, monday() + Duration::weeks(2));
}
