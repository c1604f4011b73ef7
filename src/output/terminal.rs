// Colored terminal output for clusters, opportunities, and ledger history.
//
// This module handles all terminal-specific formatting: colors and tables.
// The main.rs command handlers delegate here.

use colored::Colorize;

use super::{format_change, truncate_chars};
use crate::db::models::{Cluster, Intent, Snapshot, SnapshotSummary};
use crate::db::queries::ClusterTrendPoint;
use crate::keywords::RankMetric;
use crate::ledger::{OpportunityRecord, OpportunityStatus, OpportunitySummary};
use crate::pipeline::RunResult;

/// Display a full run: clusters, then opportunities.
pub fn display_run(result: &RunResult, metric: RankMetric, top_n: usize) {
    display_clusters(&result.snapshot, metric, top_n);
    display_opportunities(&result.opportunities, result.previous_taken_at.is_some());

    if result.persisted {
        println!(
            "  Snapshot recorded at {}",
            result.snapshot.taken_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    } else {
        println!("  {}", "Dry run: snapshot not recorded".dimmed());
    }
}

/// Display the clusters of a snapshot with their top keywords.
pub fn display_clusters(snapshot: &Snapshot, metric: RankMetric, top_n: usize) {
    println!(
        "\n{}",
        format!(
            "=== Keyword Clusters ({} clusters, {} keywords) ===",
            snapshot.clusters.len(),
            snapshot.keyword_count
        )
        .bold()
    );
    println!(
        "  Provider: {}  Method: {}{}",
        snapshot.provider_id,
        snapshot.method,
        match snapshot.corpus_similarity {
            Some(mean) => format!("  Corpus similarity: {mean:.2}"),
            None => String::new(),
        }
    );
    if snapshot.degraded {
        println!(
            "  {} a provider failed during this run; fallback values were used",
            "degraded:".yellow().bold()
        );
    }
    println!();

    println!(
        "  {:>3}  {:<16} {:<40} {:<14} {:<20} {:>9}  {:>8}  {:>4}",
        "#".dimmed(),
        "Id".dimmed(),
        "Cluster".dimmed(),
        "Intent".dimmed(),
        "Profile".dimmed(),
        "Interest".dimmed(),
        "Cohesion".dimmed(),
        "Size".dimmed(),
    );
    println!("  {}", "-".repeat(126).dimmed());

    for (i, cluster) in snapshot.clusters.iter().enumerate() {
        println!("{}", cluster_row(i + 1, cluster));
        if top_n > 0 && cluster.len() > 1 {
            let top: Vec<String> = cluster
                .top_keywords(metric, top_n)
                .iter()
                .map(|m| m.keyword.clone())
                .collect();
            println!("        {}", top.join(", ").dimmed());
        }
    }
    println!(
        "  {}",
        "Follow one cluster over time: keyplot history --cluster <id>".dimmed()
    );
    println!();
}

/// One line of the cluster table.
fn cluster_row(rank: usize, cluster: &Cluster) -> String {
    format!(
        "  {:>3}. {:<16} {:<40} {:<14} {:<20} {:>9.1}  {:>8.2}  {:>4}",
        rank,
        cluster.id,
        truncate_chars(&cluster.label, 37),
        colorize_intent(cluster.intent),
        truncate_chars(&cluster.profile, 20),
        cluster.interest,
        cluster.cohesion,
        cluster.len(),
    )
}

/// Display opportunity records grouped by status.
pub fn display_opportunities(records: &[OpportunityRecord], has_previous: bool) {
    let summary = OpportunitySummary::from_records(records);

    println!("{}", "=== Opportunities ===".bold());
    if !has_previous {
        println!("  First snapshot: every cluster is new.");
    }
    println!(
        "  {} new  {} growing  {} shrinking  {} stale  {} removed",
        summary.new.to_string().cyan(),
        summary.growing.to_string().green(),
        summary.shrinking.to_string().red(),
        summary.stale.to_string().dimmed(),
        summary.removed.to_string().magenta(),
    );
    println!();

    if records.is_empty() {
        return;
    }

    println!(
        "  {:<10} {:<16}  {:<40} {:>10} {:>10} {:>9}",
        "Status".dimmed(),
        "Id".dimmed(),
        "Cluster".dimmed(),
        "Before".dimmed(),
        "Now".dimmed(),
        "Change".dimmed(),
    );
    println!("  {}", "-".repeat(102).dimmed());

    // Movers first, then new, stale and removed
    let order = [
        OpportunityStatus::Growing,
        OpportunityStatus::Shrinking,
        OpportunityStatus::New,
        OpportunityStatus::Stale,
        OpportunityStatus::Removed,
    ];
    for status in order {
        for record in records.iter().filter(|r| r.status == status) {
            println!("{}", opportunity_row(record));
        }
    }
    println!();
}

/// One line of the opportunity table.
fn opportunity_row(record: &OpportunityRecord) -> String {
    format!(
        "  {:<10} {:<16}  {:<40} {:>10} {:>10} {:>9}",
        colorize_status(record.status),
        record.cluster_id,
        truncate_chars(&record.label, 37),
        format_interest(record.previous_interest),
        format_interest(record.current_interest),
        format_change(record.change),
    )
}

/// Display ledger history, newest first.
pub fn display_history(summaries: &[SnapshotSummary]) {
    if summaries.is_empty() {
        println!("No snapshots recorded yet. Run `keyplot cluster` first.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Snapshot History ({} shown) ===", summaries.len()).bold()
    );
    println!();
    println!(
        "  {:<20} {:<10} {:>8} {:>8} {:>10}  {}",
        "Taken at".dimmed(),
        "Method".dimmed(),
        "Keywords".dimmed(),
        "Clusters".dimmed(),
        "Interest".dimmed(),
        "Provider".dimmed(),
    );
    println!("  {}", "-".repeat(84).dimmed());

    for s in summaries {
        let provider = if s.degraded {
            format!("{} {}", s.provider_id, "(degraded)".yellow())
        } else {
            s.provider_id.clone()
        };
        println!(
            "  {:<20} {:<10} {:>8} {:>8} {:>10.1}  {}",
            s.taken_at.format("%Y-%m-%d %H:%M:%S"),
            s.method,
            s.keyword_count,
            s.cluster_count,
            s.total_interest,
            provider,
        );
    }
    println!();
}

/// Display one cluster's interest across snapshots.
pub fn display_cluster_trend(cluster_id: &str, points: &[ClusterTrendPoint]) {
    if points.is_empty() {
        println!("Cluster {cluster_id} does not appear in any recorded snapshot.");
        return;
    }

    let label = points.last().map(|p| p.label.as_str()).unwrap_or_default();
    println!(
        "\n{}",
        format!("=== Cluster {cluster_id}: {} ===", truncate_chars(label, 50)).bold()
    );
    println!();

    let mut previous: Option<f64> = None;
    for point in points {
        let change = previous
            .filter(|p| *p > 0.0)
            .map(|p| (point.interest - p) / p);
        println!(
            "  {}  {:>10.1}  {:>9}  ({} keywords)",
            point.taken_at.format("%Y-%m-%d %H:%M"),
            point.interest,
            format_change(change),
            point.keyword_count,
        );
        previous = Some(point.interest);
    }
    println!();
}

fn format_interest(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
}

/// Colorize an opportunity status.
fn colorize_status(status: OpportunityStatus) -> colored::ColoredString {
    let text = status.as_str();
    match status {
        OpportunityStatus::New => text.cyan().bold(),
        OpportunityStatus::Growing => text.green().bold(),
        OpportunityStatus::Shrinking => text.red(),
        OpportunityStatus::Stale => text.dimmed(),
        OpportunityStatus::Removed => text.magenta(),
    }
}

/// Colorize an intent label.
fn colorize_intent(intent: Intent) -> colored::ColoredString {
    let text = intent.as_str();
    match intent {
        Intent::Transactional => text.green(),
        Intent::Commercial => text.yellow(),
        Intent::Navigational => text.blue(),
        Intent::Informational => text.normal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{cluster_id, ClusterMember};

    fn ats_cluster() -> Cluster {
        let keywords = ["ats software", "ats pricing"];
        Cluster {
            id: cluster_id(&keywords),
            label: "ats software / ats pricing".to_string(),
            members: keywords
                .iter()
                .map(|k| ClusterMember {
                    keyword: k.to_string(),
                    interest: 50.0,
                    volume: None,
                    cpc: None,
                    competition: None,
                })
                .collect(),
            centroid: vec![1.0, 0.0],
            intent: Intent::Commercial,
            profile: "recruiter".to_string(),
            interest: 100.0,
            cohesion: 0.8,
        }
    }

    #[test]
    fn test_cluster_row_shows_full_id() {
        let cluster = ats_cluster();
        let row = cluster_row(1, &cluster);
        assert_eq!(cluster.id.len(), 16);
        assert!(row.contains(&cluster.id), "{row}");
        assert!(row.contains("ats software / ats pricing"));
    }

    #[test]
    fn test_opportunity_row_shows_id_usable_for_history() {
        let cluster = ats_cluster();
        let record = OpportunityRecord {
            cluster_id: cluster.id.clone(),
            label: cluster.label.clone(),
            intent: cluster.intent,
            profile: cluster.profile.clone(),
            keywords: vec!["ats software".into(), "ats pricing".into()],
            status: OpportunityStatus::Growing,
            previous_interest: Some(100.0),
            current_interest: Some(140.0),
            change: Some(0.4),
        };
        let row = opportunity_row(&record);
        assert!(row.contains(&cluster_id(&["ats pricing", "ats software"])), "{row}");
        assert!(row.contains("+40.0%"));
    }
}
