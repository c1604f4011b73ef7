// Threshold clustering — greedy single-pass centroid agglomeration.
//
// Keywords are visited in descending interest (ties by text). Each joins the
// existing cluster whose centroid it is most similar to, provided that
// similarity is strictly above the threshold; otherwise it starts a new
// cluster. Re-running on the members of any one output cluster reproduces
// that cluster unchanged.

use std::cmp::Ordering;

use crate::similarity::cosine_similarity;

/// Partition `points` at the given similarity threshold.
///
/// `interest` and `labels` are aligned with `points`. Returned groups hold
/// positions into `points`, in order of cluster creation.
pub fn partition(
    points: &[&[f64]],
    interest: &[f64],
    labels: &[&str],
    threshold: f64,
) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| {
        interest[b]
            .partial_cmp(&interest[a])
            .unwrap_or(Ordering::Equal)
            .then_with(|| labels[a].cmp(labels[b]))
    });

    // Running vector sums stand in for centroids: cosine ignores scale
    let mut sums: Vec<Vec<f64>> = Vec::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for i in order {
        let point = points[i];
        let mut best: Option<(usize, f64)> = None;
        for (c, sum) in sums.iter().enumerate() {
            let sim = cosine_similarity(point, sum);
            if sim > threshold && best.map_or(true, |(_, b)| sim > b) {
                best = Some((c, sim));
            }
        }

        match best {
            Some((c, _)) => {
                for (s, x) in sums[c].iter_mut().zip(point.iter()) {
                    *s += x;
                }
                groups[c].push(i);
            }
            None => {
                sums.push(point.to_vec());
                groups.push(vec![i]);
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(v: &[Vec<f64>]) -> Vec<&[f64]> {
        v.iter().map(|p| p.as_slice()).collect()
    }

    #[test]
    fn test_groups_by_direction() {
        let data = vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.95, 0.1],
            vec![0.1, 0.95],
        ];
        let groups = partition(&refs(&data), &[4.0, 3.0, 2.0, 1.0], &["a", "b", "c", "d"], 0.8);
        assert_eq!(groups, vec![vec![0, 2], vec![1, 3]]);
    }

    #[test]
    fn test_threshold_one_gives_singletons() {
        let data = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let groups = partition(&refs(&data), &[0.0; 3], &["a", "b", "c"], 1.0);
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn test_threshold_zero_merges_any_overlap() {
        let data = vec![vec![1.0, 0.1], vec![0.1, 1.0], vec![0.5, 0.5]];
        let groups = partition(&refs(&data), &[0.0; 3], &["a", "b", "c"], 0.0);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_interest_sets_processing_order() {
        // The highest-interest keyword seeds the first cluster
        let data = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let groups = partition(&refs(&data), &[1.0, 9.0], &["a", "b"], 0.5);
        assert_eq!(groups, vec![vec![1], vec![0]]);
    }

    #[test]
    fn test_rerun_on_cluster_is_stable() {
        let data = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.9, 0.3, 0.0],
            vec![0.8, 0.0, 0.5],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.7, 0.7],
        ];
        let labels = ["a", "b", "c", "d", "e"];
        let interest = [5.0, 4.0, 3.0, 2.0, 1.0];
        let groups = partition(&refs(&data), &interest, &labels, 0.6);

        for group in &groups {
            let sub: Vec<&[f64]> = group.iter().map(|&i| data[i].as_slice()).collect();
            let sub_interest: Vec<f64> = group.iter().map(|&i| interest[i]).collect();
            let sub_labels: Vec<&str> = group.iter().map(|&i| labels[i]).collect();
            let again = partition(&sub, &sub_interest, &sub_labels, 0.6);
            assert_eq!(again.len(), 1, "group {group:?} split on re-run");
        }
    }
}
