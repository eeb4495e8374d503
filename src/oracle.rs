use crate::cluster::ClusterIndex;
use crate::data::Data;
use crate::error::{Result, SelectionError};
use crate::param::{Mode, Param};
use crate::regression::LinearRegression;
use crate::svm::SvmClassifier;

/// Scores one feature set. Higher is better.
///
/// `design` holds one column per feature id of the search (column `i` is feature `i`
/// of the cluster index), `features` is a canonical feature set. Implementations must
/// be pure: the search calls them concurrently from the worker pool.
pub trait Oracle: Send + Sync {
    fn score(&self, design: &Data, features: &[usize]) -> std::result::Result<f64, String>;

    fn name(&self) -> &'static str;
}

/// Read-only bundle shared by every evaluation task.
pub struct EvaluationContext<'a> {
    pub design: &'a Data,
    pub clusters: &'a ClusterIndex,
    pub oracle: &'a dyn Oracle,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(design: &'a Data, clusters: &'a ClusterIndex, oracle: &'a dyn Oracle) -> Result<Self> {
        if design.features != clusters.features {
            return Err(SelectionError::Configuration(
                "design columns must follow the cluster index feature order".to_string(),
            ));
        }
        Ok(EvaluationContext {
            design,
            clusters,
            oracle,
        })
    }

    /// Scores a feature set, turning oracle errors and non finite scores into `OracleFailure`.
    pub fn score(&self, features: &[usize]) -> Result<f64> {
        match self.oracle.score(self.design, features) {
            Ok(score) if score.is_finite() => Ok(score),
            Ok(score) => Err(SelectionError::OracleFailure {
                features: self.clusters.names(features),
                reason: format!("{} returned a non finite score ({})", self.oracle.name(), score),
            }),
            Err(reason) => Err(SelectionError::OracleFailure {
                features: self.clusters.names(features),
                reason,
            }),
        }
    }
}

/// Instantiates the oracle matching `param.general.mode`.
pub fn build_oracle(param: &Param) -> Box<dyn Oracle> {
    match param.general.mode {
        Mode::regression => Box::new(LinearRegression::new()),
        Mode::classification => Box::new(SvmClassifier::new(
            param.svm.c,
            param.svm.gamma,
            param.svm.tolerance,
            param.svm.max_passes,
            param.svm.max_iterations,
            param.general.seed,
        )),
    }
}

/// Gathers the selected columns row by row.
pub fn rows_of(design: &Data, features: &[usize]) -> Vec<Vec<f64>> {
    (0..design.sample_len)
        .map(|s| features.iter().map(|&f| design.X[f][s]).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(f64);

    impl Oracle for Fixed {
        fn score(&self, _design: &Data, _features: &[usize]) -> std::result::Result<f64, String> {
            Ok(self.0)
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    struct Broken;

    impl Oracle for Broken {
        fn score(&self, _design: &Data, _features: &[usize]) -> std::result::Result<f64, String> {
            Err("singular".to_string())
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    fn create_test_context_parts() -> (Data, ClusterIndex) {
        let clusters = ClusterIndex::from_assignment(&[("a", 1), ("b", 2)]).unwrap();
        let design = Data::from_columns(
            vec!["a".to_string(), "b".to_string()],
            vec!["s1".to_string(), "s2".to_string()],
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            vec![0.0, 1.0],
        )
        .unwrap();
        (design, clusters)
    }

    #[test]
    fn test_context_requires_aligned_design() {
        let (design, clusters) = create_test_context_parts();
        let shuffled = design.restrict_to(&["b".to_string(), "a".to_string()]).unwrap();
        let oracle = Fixed(1.0);
        assert!(EvaluationContext::new(&design, &clusters, &oracle).is_ok());
        assert!(matches!(
            EvaluationContext::new(&shuffled, &clusters, &oracle),
            Err(SelectionError::Configuration(_))
        ));
    }

    #[test]
    fn test_score_wraps_failures_with_feature_names() {
        let (design, clusters) = create_test_context_parts();
        let oracle = Broken;
        let context = EvaluationContext::new(&design, &clusters, &oracle).unwrap();
        match context.score(&[0, 1]) {
            Err(SelectionError::OracleFailure { features, reason }) => {
                assert_eq!(features, vec!["a", "b"]);
                assert_eq!(reason, "singular");
            }
            other => panic!("expected an oracle failure, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_score_is_a_failure() {
        let (design, clusters) = create_test_context_parts();
        let oracle = Fixed(f64::NAN);
        let context = EvaluationContext::new(&design, &clusters, &oracle).unwrap();
        assert!(matches!(context.score(&[0]), Err(SelectionError::OracleFailure { .. })));
    }

    #[test]
    fn test_rows_of_transposes_selection() {
        let (design, _) = create_test_context_parts();
        assert_eq!(rows_of(&design, &[1, 0]), vec![vec![3.0, 1.0], vec![4.0, 2.0]]);
    }

    #[test]
    fn test_build_oracle_follows_mode() {
        let mut param = Param::default();
        assert_eq!(build_oracle(&param).name(), "linear regression");
        param.general.mode = Mode::classification;
        assert_eq!(build_oracle(&param).name(), "rbf svc");
    }
}
