use crate::data::Data;
use crate::oracle::{rows_of, Oracle};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// C-support vector classifier with an RBF kernel, scored by its accuracy on the
/// training samples.
///
/// Binary problems are trained with simplified SMO; more than two classes use
/// one-vs-one voting. Ties in the vote go to the smallest class label. SMO draws
/// its second multiplier from a generator reseeded for every fit, so the score is
/// a pure function of the feature set.
#[derive(Debug, Clone)]
pub struct SvmClassifier {
    pub c: f64,
    pub gamma: f64,
    pub tolerance: f64,
    pub max_passes: usize,
    pub max_iterations: usize,
    pub seed: u64,
}

struct BinaryModel {
    support: Vec<(usize, f64)>, // (sample, alpha * label)
    b: f64,
}

impl SvmClassifier {
    pub fn new(c: f64, gamma: f64, tolerance: f64, max_passes: usize, max_iterations: usize, seed: u64) -> SvmClassifier {
        SvmClassifier {
            c,
            gamma,
            tolerance,
            max_passes,
            max_iterations,
            seed,
        }
    }

    fn kernel_matrix(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let n = rows.len();
        let mut kernel = vec![vec![1.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d2: f64 = rows[i].iter().zip(&rows[j]).map(|(a, b)| (a - b) * (a - b)).sum();
                let k = (-self.gamma * d2).exp();
                kernel[i][j] = k;
                kernel[j][i] = k;
            }
        }
        kernel
    }

    /// Simplified SMO on the samples listed in `subset`, with labels in {-1, +1}.
    fn train_binary(&self, kernel: &[Vec<f64>], subset: &[usize], labels: &[f64]) -> BinaryModel {
        let n = subset.len();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut alpha = vec![0.0; n];
        let mut b = 0.0;
        let k = |i: usize, j: usize| kernel[subset[i]][subset[j]];
        let f = |alpha: &[f64], b: f64, i: usize| -> f64 {
            (0..n).filter(|&m| alpha[m] > 0.0).map(|m| alpha[m] * labels[m] * k(m, i)).sum::<f64>() + b
        };

        let mut passes = 0;
        let mut iterations = 0;
        while passes < self.max_passes && iterations < self.max_iterations {
            let mut changed = 0;
            for i in 0..n {
                let e_i = f(&alpha, b, i) - labels[i];
                let violates = (labels[i] * e_i < -self.tolerance && alpha[i] < self.c)
                    || (labels[i] * e_i > self.tolerance && alpha[i] > 0.0);
                if !violates || n < 2 {
                    continue;
                }

                let mut j = rng.gen_range(0..n - 1);
                if j >= i {
                    j += 1;
                }
                let e_j = f(&alpha, b, j) - labels[j];
                let (a_i_old, a_j_old) = (alpha[i], alpha[j]);

                let (low, high) = if labels[i] != labels[j] {
                    ((a_j_old - a_i_old).max(0.0), (self.c + a_j_old - a_i_old).min(self.c))
                } else {
                    ((a_i_old + a_j_old - self.c).max(0.0), (a_i_old + a_j_old).min(self.c))
                };
                if low == high {
                    continue;
                }

                let eta = 2.0 * k(i, j) - k(i, i) - k(j, j);
                if eta >= 0.0 {
                    continue;
                }

                let a_j = (a_j_old - labels[j] * (e_i - e_j) / eta).clamp(low, high);
                if (a_j - a_j_old).abs() < 1e-5 {
                    continue;
                }
                let a_i = a_i_old + labels[i] * labels[j] * (a_j_old - a_j);

                let b1 = b - e_i - labels[i] * (a_i - a_i_old) * k(i, i) - labels[j] * (a_j - a_j_old) * k(i, j);
                let b2 = b - e_j - labels[i] * (a_i - a_i_old) * k(i, j) - labels[j] * (a_j - a_j_old) * k(j, j);
                b = if a_i > 0.0 && a_i < self.c {
                    b1
                } else if a_j > 0.0 && a_j < self.c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                alpha[i] = a_i;
                alpha[j] = a_j;
                changed += 1;
            }

            iterations += 1;
            passes = if changed == 0 { passes + 1 } else { 0 };
        }

        BinaryModel {
            support: (0..n)
                .filter(|&m| alpha[m] > 0.0)
                .map(|m| (subset[m], alpha[m] * labels[m]))
                .collect(),
            b,
        }
    }

    /// Training accuracy of the classifier on the given rows and class labels.
    pub fn accuracy(&self, rows: &[Vec<f64>], y: &[f64]) -> Result<f64, String> {
        if let Some(label) = y.iter().find(|v| !v.is_finite()) {
            return Err(format!("class label {} is not a finite number", label));
        }
        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        if classes.len() < 2 {
            return Err(format!("classification needs at least 2 classes, found {}", classes.len()));
        }

        let class_of: Vec<usize> = y
            .iter()
            .map(|v| classes.iter().position(|c| c == v).ok_or_else(|| format!("unknown class label {}", v)))
            .collect::<Result<Vec<usize>, String>>()?;
        let kernel = self.kernel_matrix(rows);
        let mut votes = vec![vec![0usize; classes.len()]; y.len()];

        for first in 0..classes.len() {
            for second in (first + 1)..classes.len() {
                let subset: Vec<usize> = (0..y.len())
                    .filter(|&s| class_of[s] == first || class_of[s] == second)
                    .collect();
                let labels: Vec<f64> = subset
                    .iter()
                    .map(|&s| if class_of[s] == first { 1.0 } else { -1.0 })
                    .collect();
                let model = self.train_binary(&kernel, &subset, &labels);

                for (s, vote) in votes.iter_mut().enumerate() {
                    let decision: f64 = model.support.iter().map(|&(m, w)| w * kernel[m][s]).sum::<f64>() + model.b;
                    if decision >= 0.0 {
                        vote[first] += 1;
                    } else {
                        vote[second] += 1;
                    }
                }
            }
        }

        let correct = votes
            .iter()
            .zip(&class_of)
            .filter(|(vote, &truth)| {
                let best = vote.iter().copied().max().unwrap_or(0);
                vote.iter().position(|&v| v == best) == Some(truth)
            })
            .count();

        Ok(correct as f64 / y.len() as f64)
    }
}

impl Oracle for SvmClassifier {
    fn score(&self, design: &Data, features: &[usize]) -> Result<f64, String> {
        self.accuracy(&rows_of(design, features), &design.y)
    }

    fn name(&self) -> &'static str {
        "rbf svc"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_classifier() -> SvmClassifier {
        SvmClassifier::new(1.0, 0.1, 1e-3, 5, 10_000, 42)
    }

    #[test]
    fn test_separable_classes_are_learned() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![if i < 10 { -3.0 } else { 3.0 } + (i % 5) as f64 * 0.1]).collect();
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { 0.0 } else { 1.0 }).collect();
        let accuracy = create_test_classifier().accuracy(&rows, &y).unwrap();
        assert_eq!(accuracy, 1.0, "well separated classes should be fully recovered");
    }

    #[test]
    fn test_noise_feature_scores_below_signal() {
        let y: Vec<f64> = (0..30).map(|i| (i % 2) as f64).collect();
        let signal: Vec<Vec<f64>> = y.iter().map(|&c| vec![c * 4.0 - 2.0]).collect();
        let noise: Vec<Vec<f64>> = (0..30).map(|i| vec![((i / 2) % 3) as f64]).collect();
        let svc = create_test_classifier();
        let good = svc.accuracy(&signal, &y).unwrap();
        let bad = svc.accuracy(&noise, &y).unwrap();
        assert!(good > bad, "signal accuracy {} should beat noise accuracy {}", good, bad);
    }

    #[test]
    fn test_three_classes_use_one_vs_one() {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for (class, center) in [(0.0, -6.0), (1.0, 0.0), (2.0, 6.0)] {
            for i in 0..8 {
                rows.push(vec![center + i as f64 * 0.05]);
                y.push(class);
            }
        }
        let accuracy = create_test_classifier().accuracy(&rows, &y).unwrap();
        assert!(accuracy > 0.9, "three separated groups should be recognised, got {}", accuracy);
    }

    #[test]
    fn test_single_class_is_an_error() {
        let rows = vec![vec![1.0], vec![2.0]];
        assert!(create_test_classifier().accuracy(&rows, &[1.0, 1.0]).is_err());
    }

    #[test]
    fn test_nan_label_is_an_error() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0]];
        let result = create_test_classifier().accuracy(&rows, &[0.0, f64::NAN, 1.0]);
        assert!(result.is_err(), "a NaN label must not be counted as a class");
    }

    #[test]
    fn test_score_is_deterministic() {
        let design = Data::from_columns(
            vec!["a".to_string(), "b".to_string()],
            (0..12).map(|i| format!("s{}", i)).collect(),
            vec![
                (0..12).map(|i| (i % 4) as f64).collect(),
                (0..12).map(|i| ((i * 7) % 5) as f64).collect(),
            ],
            (0..12).map(|i| (i % 2) as f64).collect(),
        )
        .unwrap();
        let svc = create_test_classifier();
        assert_eq!(svc.score(&design, &[0, 1]), svc.score(&design, &[0, 1]));
    }
}
