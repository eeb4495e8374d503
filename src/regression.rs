use crate::data::Data;
use crate::oracle::Oracle;
use statrs::statistics::Statistics;

// Relative norm under which a column is treated as a linear combination of the previous ones
const COLLINEARITY_EPSILON: f64 = 1e-10;

/// Ordinary least squares with intercept, scored by the coefficient of
/// determination (R²) on the training samples.
///
/// The fit projects the centered target onto an orthonormal basis of the
/// centered columns (modified Gram-Schmidt). Columns that are linear
/// combinations of earlier ones add nothing to the basis, so collinear sets get
/// the same R² a least-squares solver would report instead of failing.
#[derive(Debug, Clone, Default)]
pub struct LinearRegression;

impl LinearRegression {
    pub fn new() -> LinearRegression {
        LinearRegression
    }

    pub fn r2(&self, columns: &[&[f64]], y: &[f64]) -> Result<f64, String> {
        if y.len() < 2 {
            return Err(format!("cannot fit a regression on {} sample(s)", y.len()));
        }

        let y_mean = y.iter().mean();
        let mut residual: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
        let ss_tot: f64 = residual.iter().map(|r| r * r).sum();
        if ss_tot <= f64::EPSILON * y.len() as f64 {
            return Err("target has zero variance".to_string());
        }

        let mut basis: Vec<Vec<f64>> = Vec::with_capacity(columns.len());
        for column in columns {
            if column.len() != y.len() {
                return Err(format!("column has {} values for {} targets", column.len(), y.len()));
            }
            let mean = column.iter().mean();
            let mut v: Vec<f64> = column.iter().map(|x| x - mean).collect();
            let norm0 = dot(&v, &v).sqrt();
            if norm0 == 0.0 {
                continue;
            }
            for q in &basis {
                let p = dot(&v, q);
                v.iter_mut().zip(q).for_each(|(vi, qi)| *vi -= p * qi);
            }
            let norm = dot(&v, &v).sqrt();
            if norm <= COLLINEARITY_EPSILON * norm0 {
                continue;
            }
            v.iter_mut().for_each(|vi| *vi /= norm);

            let p = dot(&residual, &v);
            residual.iter_mut().zip(&v).for_each(|(ri, qi)| *ri -= p * qi);
            basis.push(v);
        }

        let ss_res: f64 = residual.iter().map(|r| r * r).sum();
        Ok(1.0 - ss_res / ss_tot)
    }
}

impl Oracle for LinearRegression {
    fn score(&self, design: &Data, features: &[usize]) -> Result<f64, String> {
        let columns: Vec<&[f64]> = features.iter().map(|&f| design.X[f].as_slice()).collect();
        self.r2(&columns, &design.y)
    }

    fn name(&self) -> &'static str {
        "linear regression"
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {} to be close to {}", a, b);
    }

    #[test]
    fn test_perfect_linear_fit_scores_one() {
        let x1 = [1.0, 2.0, 3.0, 4.0, 5.0];
        let x2 = [2.0, 1.0, 0.0, 1.0, 2.0];
        let y: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| 3.0 * a - 2.0 * b + 7.0).collect();
        let r2 = LinearRegression::new().r2(&[&x1, &x2], &y).unwrap();
        assert_close(r2, 1.0);
    }

    #[test]
    fn test_simple_regression_matches_squared_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 3.0, 2.0, 4.0];
        let r2 = LinearRegression::new().r2(&[&x], &y).unwrap();
        assert_close(r2, 0.64);
    }

    #[test]
    fn test_collinear_columns_do_not_fail() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let twice = [2.0, 4.0, 6.0, 8.0];
        let y = [1.0, 3.0, 2.0, 4.0];
        let model = LinearRegression::new();
        let single = model.r2(&[&x], &y).unwrap();
        let both = model.r2(&[&x, &twice], &y).unwrap();
        assert_close(single, both);
    }

    #[test]
    fn test_constant_column_adds_nothing() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let flat = [5.0, 5.0, 5.0, 5.0];
        let y = [1.0, 3.0, 2.0, 4.0];
        let model = LinearRegression::new();
        assert_close(model.r2(&[&flat], &y).unwrap(), 0.0);
        assert_close(model.r2(&[&x, &flat], &y).unwrap(), model.r2(&[&x], &y).unwrap());
    }

    #[test]
    fn test_degenerate_target_is_an_error() {
        let x = [1.0, 2.0, 3.0];
        let y = [2.0, 2.0, 2.0];
        assert!(LinearRegression::new().r2(&[&x], &y).is_err());
        assert!(LinearRegression::new().r2(&[&x[..1]], &y[..1]).is_err());
    }

    #[test]
    fn test_oracle_uses_design_columns() {
        let design = Data::from_columns(
            vec!["a".to_string(), "b".to_string()],
            (0..4).map(|i| format!("s{}", i)).collect(),
            vec![vec![1.0, 2.0, 3.0, 4.0], vec![0.0, 1.0, 0.0, 1.0]],
            vec![2.0, 4.0, 6.0, 8.0],
        )
        .unwrap();
        let model = LinearRegression::new();
        assert_close(model.score(&design, &[0]).unwrap(), 1.0);
        assert!(model.score(&design, &[1]).unwrap() < 1.0);
    }
}
