// Graph clustering — connected components of the similarity graph.
//
// Two keywords are linked when their similarity is at or above the
// threshold. Components are found with union-find; in LSH mode only the
// retained neighbor edges are considered.

use crate::similarity::SimilarityIndex;

/// Components over `members` (indices into `index`). Returned groups hold
/// positions into `members`, ordered by their smallest position.
pub fn components(index: &SimilarityIndex, members: &[usize], threshold: f64) -> Vec<Vec<usize>> {
    // Global index -> position in `members`
    let mut position = vec![usize::MAX; index.len()];
    for (pos, &m) in members.iter().enumerate() {
        position[m] = pos;
    }

    let mut sets = DisjointSet::new(members.len());
    for (pos, &m) in members.iter().enumerate() {
        for (other, _) in index.neighbors(m, threshold) {
            let other_pos = position[other];
            if other_pos != usize::MAX {
                sets.union(pos, other_pos);
            }
        }
    }

    let mut root_group: Vec<Option<usize>> = vec![None; members.len()];
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for pos in 0..members.len() {
        let root = sets.find(pos);
        match root_group[root] {
            Some(g) => groups[g].push(pos),
            None => {
                root_group[root] = Some(groups.len());
                groups.push(vec![pos]);
            }
        }
    }
    groups
}

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}
