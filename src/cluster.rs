use crate::data::read_table;
use crate::error::{Result, SelectionError};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Inverted cluster assignment: cluster id (0-based) to its member features.
///
/// Features are identified by their position in `features`, which is sorted by
/// name, so ordering feature ids is ordering feature names. Every cluster id in
/// `0..len()` owns at least one feature.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClusterIndex {
    pub features: Vec<String>,
    pub feature_cluster: Vec<usize>,
    pub clusters: Vec<Vec<usize>>,
}

impl ClusterIndex {
    /// Builds the index from `feature -> cluster id` pairs, cluster ids counting from 1.
    pub fn from_assignment<S: AsRef<str>>(assignment: &[(S, usize)]) -> Result<ClusterIndex> {
        if assignment.is_empty() {
            return Err(SelectionError::Configuration("cluster assignment is empty".to_string()));
        }

        let mut by_feature: BTreeMap<&str, usize> = BTreeMap::new();
        for (feature, cluster) in assignment {
            let feature = feature.as_ref();
            if *cluster == 0 {
                return Err(SelectionError::Configuration(format!(
                    "feature {} has cluster id 0, cluster ids start at 1",
                    feature
                )));
            }
            match by_feature.insert(feature, *cluster) {
                Some(previous) if previous != *cluster => {
                    return Err(SelectionError::Configuration(format!(
                        "feature {} assigned to both cluster {} and {}",
                        feature, previous, cluster
                    )));
                }
                _ => {}
            }
        }

        let n_clusters = by_feature.values().copied().max().unwrap_or(0);
        let mut clusters: Vec<Vec<usize>> = vec![Vec::new(); n_clusters];
        let mut features = Vec::with_capacity(by_feature.len());
        let mut feature_cluster = Vec::with_capacity(by_feature.len());

        for (id, (feature, cluster)) in by_feature.into_iter().enumerate() {
            features.push(feature.to_string());
            feature_cluster.push(cluster - 1);
            clusters[cluster - 1].push(id);
        }

        if let Some(empty) = clusters.iter().position(|members| members.is_empty()) {
            return Err(SelectionError::Configuration(format!(
                "cluster {} has no member while cluster ids go up to {}",
                empty + 1,
                n_clusters
            )));
        }

        debug!("{} features spread over {} clusters", features.len(), n_clusters);

        Ok(ClusterIndex {
            features,
            feature_cluster,
            clusters,
        })
    }

    /// Loads a `feature<TAB>cluster` file with a header line.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ClusterIndex> {
        info!("Loading cluster assignment {}...", path.as_ref().display());
        let assignment = read_assignment(path.as_ref())?;
        ClusterIndex::from_assignment(&assignment)
    }

    /// Number of clusters. This is the single cluster count used by the search.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn feature_len(&self) -> usize {
        self.features.len()
    }

    pub fn members(&self, cluster: usize) -> &[usize] {
        &self.clusters[cluster]
    }

    pub fn cluster_of(&self, feature: usize) -> usize {
        self.feature_cluster[feature]
    }

    pub fn feature_name(&self, feature: usize) -> &str {
        &self.features[feature]
    }

    #[cfg(test)]
    fn feature_id(&self, name: &str) -> Option<usize> {
        self.features.binary_search_by(|f| f.as_str().cmp(name)).ok()
    }

    pub fn names(&self, features: &[usize]) -> Vec<String> {
        features.iter().map(|&f| self.features[f].clone()).collect()
    }

    /// Cluster ids represented in a feature set, sorted and deduplicated.
    pub fn clusters_of(&self, features: &[usize]) -> Vec<usize> {
        let mut used: Vec<usize> = features.iter().map(|&f| self.feature_cluster[f]).collect();
        used.sort_unstable();
        used.dedup();
        used
    }

    /// Cluster sizes keyed by 1-based cluster id, for display
    pub fn summary(&self) -> HashMap<usize, usize> {
        self.clusters
            .iter()
            .enumerate()
            .map(|(c, members)| (c + 1, members.len()))
            .collect()
    }
}

fn read_assignment(path: &Path) -> Result<Vec<(String, usize)>> {
    let (_, rows) = read_table(path)?;
    rows.into_iter()
        .enumerate()
        .map(|(line, record)| {
            if record.len() < 2 {
                return Err(SelectionError::Data(format!(
                    "{}: line {} should hold a feature and a cluster id",
                    path.display(),
                    line + 2
                )));
            }
            let cluster = record[1].trim().parse::<usize>().map_err(|_| {
                SelectionError::Data(format!(
                    "{}: invalid cluster id {:?} for {}",
                    path.display(),
                    record[1],
                    record[0]
                ))
            })?;
            Ok((record[0].trim().to_string(), cluster))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_assignment() -> Vec<(&'static str, usize)> {
        vec![("f1", 1), ("f2", 1), ("f3", 2), ("f4", 2), ("f5", 3), ("f6", 3)]
    }

    #[test]
    fn test_from_assignment_inverts_exactly() {
        let index = ClusterIndex::from_assignment(&scenario_assignment()).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.feature_len(), 6);
        for (name, cluster) in scenario_assignment() {
            let id = index.feature_id(name).unwrap();
            assert_eq!(index.cluster_of(id), cluster - 1, "cluster ids are normalized to 0-based");
            assert!(index.members(cluster - 1).contains(&id));
        }
        let total: usize = index.clusters.iter().map(|m| m.len()).sum();
        assert_eq!(total, index.feature_len(), "every feature belongs to exactly one cluster");
    }

    #[test]
    fn test_feature_ids_follow_name_order() {
        let index = ClusterIndex::from_assignment(&[("zeta", 1), ("alpha", 2), ("mid", 1)]).unwrap();
        assert_eq!(index.features, vec!["alpha", "mid", "zeta"]);
        assert_eq!(index.members(0), &[1, 2]);
        assert_eq!(index.members(1), &[0]);
        assert_eq!(index.names(&[0, 2]), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_empty_assignment_is_fatal() {
        let empty: Vec<(String, usize)> = Vec::new();
        assert!(matches!(
            ClusterIndex::from_assignment(&empty),
            Err(SelectionError::Configuration(_))
        ));
    }

    #[test]
    fn test_cluster_gap_is_fatal() {
        let result = ClusterIndex::from_assignment(&[("a", 1), ("b", 3)]);
        assert!(
            matches!(result, Err(SelectionError::Configuration(ref m)) if m.contains("cluster 2")),
            "an unused cluster id would make the cluster count ambiguous, got {:?}",
            result
        );
    }

    #[test]
    fn test_zero_cluster_id_is_fatal() {
        assert!(ClusterIndex::from_assignment(&[("a", 0)]).is_err());
    }

    #[test]
    fn test_conflicting_assignment_is_fatal() {
        assert!(ClusterIndex::from_assignment(&[("a", 1), ("a", 2)]).is_err());
        assert!(
            ClusterIndex::from_assignment(&[("a", 1), ("a", 1)]).is_ok(),
            "repeating the same assignment is harmless"
        );
    }

    #[test]
    fn test_clusters_of_dedups() {
        let index = ClusterIndex::from_assignment(&scenario_assignment()).unwrap();
        let f1 = index.feature_id("f1").unwrap();
        let f2 = index.feature_id("f2").unwrap();
        let f5 = index.feature_id("f5").unwrap();
        assert_eq!(index.clusters_of(&[f1, f2, f5]), vec![0, 2]);
    }

    #[test]
    fn test_load_reads_tsv() {
        let dir = std::env::temp_dir().join(format!("copheselect_cluster_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("clusters.tsv");
        std::fs::write(&path, "feature\tcluster\nb\t2\na\t1\nc\t2\n").unwrap();

        let index = ClusterIndex::load(&path).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.features, vec!["a", "b", "c"]);
        assert_eq!(index.summary().get(&2), Some(&2));
    }
}
