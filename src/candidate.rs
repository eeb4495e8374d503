use crate::cluster::ClusterIndex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A scored feature set.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    /// Feature ids, strictly ascending
    pub features: Vec<usize>,
    /// Oracle evaluation of `features`
    pub score: f64,
    /// Generation in which the candidate appeared (0 for the seed bank)
    pub epoch: usize,
}

impl Candidate {
    /// Creates a candidate from an already scored feature set, canonicalizing it first.
    pub fn new(mut features: Vec<usize>, score: f64, epoch: usize) -> Candidate {
        canonicalize(&mut features);
        Candidate { features, score, epoch }
    }

    pub fn k(&self) -> usize {
        self.features.len()
    }

    /// Bank order: higher score first, then the lexicographically greater feature set.
    pub fn rank_cmp(&self, other: &Candidate) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.features.cmp(&self.features))
    }

    pub fn is_canonical(&self) -> bool {
        self.features.windows(2).all(|w| w[0] < w[1])
    }

    pub fn feature_names(&self, clusters: &ClusterIndex) -> Vec<String> {
        clusters.names(&self.features)
    }

    pub fn display(&self, clusters: &ClusterIndex) -> String {
        let features: Vec<String> = self
            .features
            .iter()
            .map(|&f| format!("{}[c{}]", clusters.feature_name(f), clusters.cluster_of(f) + 1))
            .collect();
        format!("{:.6} k={} (gen {}) [{}]", self.score, self.k(), self.epoch, features.join(", "))
    }
}

/// Sorts ascending and removes repeated features.
pub fn canonicalize(features: &mut Vec<usize>) {
    features.sort_unstable();
    features.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_canonicalizes_features() {
        let candidate = Candidate::new(vec![5, 1, 3, 1], 0.5, 2);
        assert_eq!(candidate.features, vec![1, 3, 5]);
        assert!(candidate.is_canonical());
        assert_eq!(candidate.k(), 3);
        assert_eq!(candidate.epoch, 2);
    }

    #[test]
    fn test_rank_cmp_orders_by_score_then_features_descending() {
        let low = Candidate::new(vec![9], 0.1, 0);
        let high = Candidate::new(vec![0], 0.9, 0);
        assert_eq!(high.rank_cmp(&low), Ordering::Less, "higher score ranks first");

        let tie_small = Candidate::new(vec![0, 4], 0.5, 0);
        let tie_big = Candidate::new(vec![1, 2], 0.5, 0);
        assert_eq!(tie_big.rank_cmp(&tie_small), Ordering::Less, "ties go to the greater feature set");
        assert_eq!(tie_big.rank_cmp(&tie_big.clone()), Ordering::Equal);
    }

    #[test]
    fn test_display_names_features_and_clusters() {
        let clusters = ClusterIndex::from_assignment(&[("a", 1), ("b", 2)]).unwrap();
        let candidate = Candidate::new(vec![1, 0], 0.25, 3);
        let shown = candidate.display(&clusters);
        assert!(shown.contains("a[c1], b[c2]"), "unexpected display: {}", shown);
        assert!(shown.contains("gen 3"));
        assert_eq!(candidate.feature_names(&clusters), vec!["a", "b"]);
    }
}
