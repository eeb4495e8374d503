use crate::candidate::Candidate;
use crate::cluster::ClusterIndex;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::HashSet;

/// The surviving candidates, always kept in rank order (see `Candidate::rank_cmp`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Bank {
    pub candidates: Vec<Candidate>,
}

impl Bank {
    pub fn new() -> Bank {
        Bank { candidates: Vec::new() }
    }

    pub fn from_candidates(candidates: Vec<Candidate>) -> Bank {
        Bank { candidates }.sort()
    }

    pub fn sort(mut self) -> Self {
        self.candidates.sort_by(|a, b| a.rank_cmp(b));
        self
    }

    /// Elitist merge: parents and offspring compete together and the best
    /// `bank_size` survive, whatever their generation. Identical feature sets
    /// are not merged here, only at initialization.
    pub fn select(mut self, offspring: Vec<Candidate>, bank_size: usize) -> Bank {
        self.candidates.extend(offspring);
        let mut bank = self.sort();
        bank.candidates.truncate(bank_size);
        bank
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.candidates
            .windows(2)
            .all(|w| w[0].rank_cmp(&w[1]) != std::cmp::Ordering::Greater)
    }

    /// Number of candidates whose feature set already appears earlier in the bank
    pub fn count_duplicates(&self) -> usize {
        let mut seen: HashSet<&[usize]> = HashSet::new();
        self.candidates
            .iter()
            .filter(|c| !seen.insert(c.features.as_slice()))
            .count()
    }

    /// Mean and standard deviation of the bank scores
    pub fn score_stats(&self) -> (f64, f64) {
        if self.candidates.is_empty() {
            return (0.0, 0.0);
        }
        let scores: Vec<f64> = self.candidates.iter().map(|c| c.score).collect();
        let mean = scores.iter().mean();
        let std = if scores.len() > 1 { scores.iter().std_dev() } else { 0.0 };
        (mean, std)
    }

    pub fn display(&self, clusters: &ClusterIndex, n: usize) -> String {
        let (mean, std) = self.score_stats();
        let mut str = format!(
            "Bank of {} candidates | mean score {:.4} ± {:.4} | {} duplicated feature sets",
            self.len(),
            mean,
            std,
            self.count_duplicates()
        );
        for (rank, candidate) in self.candidates.iter().take(n).enumerate() {
            str = format!("{}\n  #{} {}", str, rank + 1, candidate.display(clusters));
        }
        str
    }
}

impl Default for Bank {
    fn default() -> Self {
        Bank::new()
    }
}
