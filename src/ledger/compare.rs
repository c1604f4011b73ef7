// Snapshot comparison — week-over-week opportunity status per cluster.
//
// Pure function of its two snapshots. Clusters are matched by identity;
// matched clusters are classified by the relative change in aggregate
// interest against a symmetric band.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::db::models::{Cluster, Intent, Snapshot};
use crate::error::{EngineError, EngineResult};

/// Default relative-change band (±15%).
pub const DEFAULT_CHANGE_THRESHOLD: f64 = 0.15;

/// How much interest has to move before a cluster counts as growing or
/// shrinking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangePolicy {
    /// Relative change (fraction of previous interest). Changes with an
    /// absolute value at or below this are stale.
    pub threshold: f64,
}

impl Default for ChangePolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CHANGE_THRESHOLD,
        }
    }
}

impl ChangePolicy {
    pub fn new(threshold: f64) -> EngineResult<Self> {
        let policy = Self { threshold };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(EngineError::invalid_config(format!(
                "change threshold must be a non-negative number, got {}",
                self.threshold
            )));
        }
        Ok(())
    }

    /// Classify a matched cluster's interest change. Returns the status and
    /// the relative change when it is defined (previous interest above 0).
    pub fn classify(&self, previous: f64, current: f64) -> (OpportunityStatus, Option<f64>) {
        if previous <= 0.0 {
            let status = if current > 0.0 {
                OpportunityStatus::Growing
            } else {
                OpportunityStatus::Stale
            };
            return (status, None);
        }

        let change = (current - previous) / previous;
        let status = if change > self.threshold {
            OpportunityStatus::Growing
        } else if change < -self.threshold {
            OpportunityStatus::Shrinking
        } else {
            OpportunityStatus::Stale
        };
        (status, Some(change))
    }
}

/// Where a cluster stands relative to the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityStatus {
    New,
    Growing,
    Shrinking,
    Stale,
    Removed,
}

impl OpportunityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityStatus::New => "new",
            OpportunityStatus::Growing => "growing",
            OpportunityStatus::Shrinking => "shrinking",
            OpportunityStatus::Stale => "stale",
            OpportunityStatus::Removed => "removed",
        }
    }
}

impl std::fmt::Display for OpportunityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One cluster's status for this run. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityRecord {
    pub cluster_id: String,
    pub label: String,
    pub intent: Intent,
    pub profile: String,
    pub keywords: Vec<String>,
    pub status: OpportunityStatus,
    /// Interest in the previous snapshot (absent for new clusters)
    pub previous_interest: Option<f64>,
    /// Interest in the current snapshot (absent for removed clusters)
    pub current_interest: Option<f64>,
    /// Relative change, when both sides exist and previous interest > 0
    pub change: Option<f64>,
}

impl OpportunityRecord {
    fn from_cluster(
        cluster: &Cluster,
        status: OpportunityStatus,
        previous_interest: Option<f64>,
        current_interest: Option<f64>,
        change: Option<f64>,
    ) -> Self {
        Self {
            cluster_id: cluster.id.clone(),
            label: cluster.label.clone(),
            intent: cluster.intent,
            profile: cluster.profile.clone(),
            keywords: cluster.members.iter().map(|m| m.keyword.clone()).collect(),
            status,
            previous_interest,
            current_interest,
            change,
        }
    }
}

/// Compare `current` against `previous`.
///
/// Records for current clusters come first, in current order, followed by
/// `removed` records in previous order. With no previous snapshot every
/// cluster is `new`.
pub fn compare(
    current: &Snapshot,
    previous: Option<&Snapshot>,
    policy: &ChangePolicy,
) -> Vec<OpportunityRecord> {
    let Some(previous) = previous else {
        return current
            .clusters
            .iter()
            .map(|c| {
                OpportunityRecord::from_cluster(c, OpportunityStatus::New, None, Some(c.interest), None)
            })
            .collect();
    };

    let prior: HashMap<&str, &Cluster> = previous
        .clusters
        .iter()
        .map(|c| (c.id.as_str(), c))
        .collect();
    let current_ids: HashSet<&str> = current.clusters.iter().map(|c| c.id.as_str()).collect();

    let mut records: Vec<OpportunityRecord> = current
        .clusters
        .iter()
        .map(|c| match prior.get(c.id.as_str()) {
            Some(before) => {
                let (status, change) = policy.classify(before.interest, c.interest);
                OpportunityRecord::from_cluster(
                    c,
                    status,
                    Some(before.interest),
                    Some(c.interest),
                    change,
                )
            }
            None => OpportunityRecord::from_cluster(
                c,
                OpportunityStatus::New,
                None,
                Some(c.interest),
                None,
            ),
        })
        .collect();

    records.extend(
        previous
            .clusters
            .iter()
            .filter(|c| !current_ids.contains(c.id.as_str()))
            .map(|c| {
                OpportunityRecord::from_cluster(
                    c,
                    OpportunityStatus::Removed,
                    Some(c.interest),
                    None,
                    None,
                )
            }),
    );

    records
}

/// Record counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunitySummary {
    pub new: usize,
    pub growing: usize,
    pub shrinking: usize,
    pub stale: usize,
    pub removed: usize,
}

impl OpportunitySummary {
    pub fn from_records(records: &[OpportunityRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            match record.status {
                OpportunityStatus::New => summary.new += 1,
                OpportunityStatus::Growing => summary.growing += 1,
                OpportunityStatus::Shrinking => summary.shrinking += 1,
                OpportunityStatus::Stale => summary.stale += 1,
                OpportunityStatus::Removed => summary.removed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.new + self.growing + self.shrinking + self.stale + self.removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_band() {
        let policy = ChangePolicy::default();
        assert_eq!(policy.classify(100.0, 110.0).0, OpportunityStatus::Stale);
        assert_eq!(policy.classify(100.0, 115.0).0, OpportunityStatus::Stale);
        assert_eq!(policy.classify(100.0, 140.0).0, OpportunityStatus::Growing);
        assert_eq!(policy.classify(100.0, 80.0).0, OpportunityStatus::Shrinking);
        assert_eq!(policy.classify(100.0, 90.0).0, OpportunityStatus::Stale);
    }

    #[test]
    fn test_classify_reports_relative_change() {
        let (_, change) = ChangePolicy::default().classify(100.0, 140.0);
        assert!((change.unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_classify_from_zero() {
        let policy = ChangePolicy::default();
        assert_eq!(policy.classify(0.0, 5.0), (OpportunityStatus::Growing, None));
        assert_eq!(policy.classify(0.0, 0.0), (OpportunityStatus::Stale, None));
    }

    #[test]
    fn test_policy_validation() {
        assert!(ChangePolicy::new(0.2).is_ok());
        assert!(ChangePolicy::new(-0.1).is_err());
        assert!(ChangePolicy::new(f64::NAN).is_err());
        assert!(ChangePolicy::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&OpportunityStatus::Shrinking).unwrap();
        assert_eq!(json, "\"shrinking\"");
        assert_eq!(OpportunityStatus::Removed.to_string(), "removed");
    }
}
