// Fixed-k clustering — k-means over unit vectors with k-means++ seeding.
//
// Each restart draws its own seeded RNG (`seed + restart`), so a given seed
// always reproduces the same partition. The restart with the lowest total
// squared error wins; on a tie the earlier restart is kept.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Assign each point to one of at most `k` clusters.
///
/// Returns one cluster index per point. When `k >= points.len()` every point
/// gets its own cluster. Cluster indices may skip values when a centroid ends
/// up empty; `groups_from_assignments` compacts them.
pub fn assign(
    points: &[&[f64]],
    k: usize,
    restarts: usize,
    seed: u64,
    max_iterations: usize,
) -> Vec<usize> {
    let n = points.len();
    if n == 0 {
        return Vec::new();
    }
    if k >= n {
        return (0..n).collect();
    }
    let k = k.max(1);

    let mut best: Option<(f64, Vec<usize>)> = None;
    for restart in 0..restarts.max(1) {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(restart as u64));
        let centroids = plus_plus_init(points, k, &mut rng);
        let assignments = lloyd(points, centroids, max_iterations);
        let inertia = inertia(points, &assignments, k);

        let better = match &best {
            Some((best_inertia, _)) => inertia < *best_inertia,
            None => true,
        };
        if better {
            best = Some((inertia, assignments));
        }
    }

    best.map(|(_, assignments)| assignments).unwrap_or_default()
}

/// Group point indices by cluster index, dropping empty clusters.
/// Groups come out in cluster-index order, members ascending.
pub fn groups_from_assignments(assignments: &[usize]) -> Vec<Vec<usize>> {
    let clusters = assignments.iter().copied().max().map_or(0, |m| m + 1);
    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); clusters];
    for (point, &cluster) in assignments.iter().enumerate() {
        groups[cluster].push(point);
    }
    groups.retain(|g| !g.is_empty());
    groups
}

/// k-means++ seeding: first centroid uniformly at random, each later one
/// with probability proportional to squared distance from the nearest chosen
/// centroid.
fn plus_plus_init(points: &[&[f64]], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let first = rng.random_range(0..n);
    let mut chosen = vec![false; n];
    chosen[first] = true;

    let mut centroids = vec![points[first].to_vec()];
    let mut nearest: Vec<f64> = points.iter().map(|p| squared_distance(p, points[first])).collect();

    while centroids.len() < k {
        let total: f64 = nearest.iter().sum();
        let pick = if total <= f64::EPSILON {
            // Every remaining point coincides with a centroid
            (0..n).find(|&i| !chosen[i]).unwrap_or(0)
        } else {
            let target = rng.random::<f64>() * total;
            let mut acc = 0.0;
            let mut pick = None;
            for (i, &d) in nearest.iter().enumerate() {
                if d <= 0.0 {
                    continue;
                }
                acc += d;
                pick = Some(i);
                if acc > target {
                    break;
                }
            }
            pick.unwrap_or(0)
        };

        chosen[pick] = true;
        centroids.push(points[pick].to_vec());
        for (i, p) in points.iter().enumerate() {
            let d = squared_distance(p, points[pick]);
            if d < nearest[i] {
                nearest[i] = d;
            }
        }
    }

    centroids
}

/// Lloyd iterations until assignments stop changing or the cap is hit.
fn lloyd(points: &[&[f64]], mut centroids: Vec<Vec<f64>>, max_iterations: usize) -> Vec<usize> {
    let n = points.len();
    let k = centroids.len();
    let dim = points.first().map_or(0, |p| p.len());
    let mut assignments = vec![usize::MAX; n];

    for _ in 0..max_iterations {
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let c = nearest_centroid(p, &centroids);
            if assignments[i] != c {
                assignments[i] = c;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![vec![0.0_f64; dim]; k];
        let mut counts = vec![0usize; k];
        for (i, p) in points.iter().enumerate() {
            let c = assignments[i];
            counts[c] += 1;
            for (s, x) in sums[c].iter_mut().zip(p.iter()) {
                *s += x;
            }
        }

        let mut taken = vec![false; n];
        for c in 0..k {
            if counts[c] > 0 {
                centroids[c] = sums[c].iter().map(|s| s / counts[c] as f64).collect();
                continue;
            }
            // Empty centroid: move it onto the point worst served by its own
            if let Some(far) = farthest_point(points, &assignments, &centroids, &counts, &taken) {
                taken[far] = true;
                centroids[c] = points[far].to_vec();
            }
        }
    }

    assignments
}

/// Point farthest from its assigned centroid, among points whose cluster
/// would not be emptied by losing them. Lowest index wins ties.
fn farthest_point(
    points: &[&[f64]],
    assignments: &[usize],
    centroids: &[Vec<f64>],
    counts: &[usize],
    taken: &[bool],
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, p) in points.iter().enumerate() {
        let c = assignments[i];
        if taken[i] || counts[c] < 2 {
            continue;
        }
        let d = squared_distance(p, &centroids[c]);
        if best.map_or(true, |(_, bd)| d > bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

fn nearest_centroid(p: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(p, centroid);
        if d < best_d {
            best = c;
            best_d = d;
        }
    }
    best
}

/// Total squared distance from each point to the mean of its cluster.
fn inertia(points: &[&[f64]], assignments: &[usize], k: usize) -> f64 {
    let dim = points.first().map_or(0, |p| p.len());
    let mut sums = vec![vec![0.0_f64; dim]; k];
    let mut counts = vec![0usize; k];
    for (p, &c) in points.iter().zip(assignments) {
        counts[c] += 1;
        for (s, x) in sums[c].iter_mut().zip(p.iter()) {
            *s += x;
        }
    }
    let means: Vec<Vec<f64>> = sums
        .into_iter()
        .zip(&counts)
        .map(|(s, &count)| {
            if count == 0 {
                s
            } else {
                s.into_iter().map(|x| x / count as f64).collect()
            }
        })
        .collect();

    points
        .iter()
        .zip(assignments)
        .map(|(p, &c)| squared_distance(p, &means[c]))
        .sum()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 0.0, 0.0],
            vec![0.98, 0.1, 0.0],
            vec![0.97, 0.0, 0.12],
            vec![0.0, 1.0, 0.0],
            vec![0.1, 0.99, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.05, 0.1, 0.99],
        ]
    }

    fn refs(v: &[Vec<f64>]) -> Vec<&[f64]> {
        v.iter().map(|p| p.as_slice()).collect()
    }

    #[test]
    fn test_separates_obvious_blobs() {
        let data = blobs();
        let groups = groups_from_assignments(&assign(&refs(&data), 3, 5, 42, 100));
        let mut sorted: Vec<Vec<usize>> = groups;
        sorted.sort();
        assert_eq!(sorted, vec![vec![0, 1, 2], vec![3, 4], vec![5, 6]]);
    }

    #[test]
    fn test_same_seed_same_assignments() {
        let data = blobs();
        let a = assign(&refs(&data), 2, 3, 7, 100);
        let b = assign(&refs(&data), 2, 3, 7, 100);
        assert_eq!(a, b);
    }

    #[test]
    fn test_k_at_least_n_gives_singletons() {
        let data = blobs();
        let assignments = assign(&refs(&data), 10, 5, 42, 100);
        assert_eq!(assignments, (0..data.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_identical_points_do_not_panic() {
        let data = vec![vec![1.0, 0.0]; 5];
        let groups = groups_from_assignments(&assign(&refs(&data), 3, 2, 1, 50));
        let total: usize = groups.iter().map(|g| g.len()).sum();
        assert_eq!(total, 5);
        assert!(groups.iter().all(|g| !g.is_empty()));
    }

    #[test]
    fn test_groups_from_assignments_compacts() {
        assert_eq!(
            groups_from_assignments(&[2, 0, 2, 0]),
            vec![vec![1, 3], vec![0, 2]]
        );
        assert!(groups_from_assignments(&[]).is_empty());
    }
}
