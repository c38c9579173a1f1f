use crate::config::{RISK_EPSILON, VARIANCE_TOLERANCE};
use crate::error::{OptimizerError, Result};
use serde::Serialize;

/// One scored candidate portfolio.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrialResult {
    pub weights: Vec<f64>,
    pub expected_return: f64,
    /// Annualized standard deviation; never negative.
    pub risk: f64,
    /// Excess return per unit of risk; 0.0 when risk is zero.
    pub score: f64,
}

pub fn portfolio_return(weights: &[f64], means: &[f64]) -> f64 {
    weights.iter().zip(means.iter()).map(|(w, r)| w * r).sum()
}

pub fn portfolio_variance(weights: &[f64], cov: &[Vec<f64>]) -> f64 {
    let n = weights.len();
    let mut var = 0.0;
    for i in 0..n {
        for j in 0..n {
            var += weights[i] * weights[j] * cov[i][j];
        }
    }
    var
}

/// Scores `weights` against annualized mean returns and covariance.
pub fn evaluate(
    weights: Vec<f64>,
    mean: &[f64],
    cov: &[Vec<f64>],
    risk_free_rate: f64,
) -> Result<TrialResult> {
    let n = weights.len();
    if mean.len() != n || cov.len() != n || cov.iter().any(|row| row.len() != n) {
        return Err(OptimizerError::InvalidParameter(format!(
            "dimension mismatch: {} weights, {} mean returns, {}x{} covariance",
            n,
            mean.len(),
            cov.len(),
            cov.first().map_or(0, Vec::len)
        )));
    }

    let expected_return = portfolio_return(&weights, mean);
    let variance = portfolio_variance(&weights, cov);
    if !variance.is_finite() || variance < -VARIANCE_TOLERANCE {
        return Err(OptimizerError::NumericalInstability { variance });
    }
    let risk = variance.max(0.0).sqrt();

    let score = if risk > RISK_EPSILON {
        (expected_return - risk_free_rate) / risk
    } else {
        0.0
    };

    Ok(TrialResult {
        weights,
        expected_return,
        risk,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_asset_cov() -> Vec<Vec<f64>> {
        vec![vec![0.04, 0.006], vec![0.006, 0.09]]
    }

    #[test]
    fn test_evaluate_two_assets() {
        let mean = vec![0.10, 0.15];
        let result = evaluate(vec![0.5, 0.5], &mean, &two_asset_cov(), 0.02).unwrap();

        let expected_var: f64 = 0.25 * 0.04 + 2.0 * 0.25 * 0.006 + 0.25 * 0.09;
        assert!((result.expected_return - 0.125).abs() < 1e-15);
        assert!((result.risk - expected_var.sqrt()).abs() < 1e-15);
        assert!((result.score - (0.125 - 0.02) / expected_var.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_portfolio_variance_is_non_negative() {
        let cov = two_asset_cov();
        for w in [[1.0, 0.0], [0.0, 1.0], [0.3, 0.7]] {
            assert!(portfolio_variance(&w, &cov) >= 0.0);
        }
    }

    #[test]
    fn test_zero_risk_scores_zero() {
        let cov = vec![vec![0.0, 0.0], vec![0.0, 0.0]];
        let result = evaluate(vec![0.4, 0.6], &[0.05, 0.08], &cov, 0.0).unwrap();
        assert_eq!(result.risk, 0.0);
        assert_eq!(result.score, 0.0);
        assert!((result.expected_return - 0.068).abs() < 1e-15);
    }

    #[test]
    fn test_tiny_negative_variance_is_clamped() {
        let cov = vec![vec![-1e-14]];
        let result = evaluate(vec![1.0], &[0.1], &cov, 0.0).unwrap();
        assert_eq!(result.risk, 0.0);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_negative_variance_beyond_tolerance_fails() {
        let cov = vec![vec![0.01, 0.05], vec![0.05, 0.01]];
        let err = evaluate(vec![0.5, 0.5], &[0.1, 0.1], &[vec![0.01, -0.05], vec![-0.05, 0.01]], 0.0)
            .unwrap_err();
        assert!(matches!(err, OptimizerError::NumericalInstability { variance } if variance < 0.0));
        assert!(evaluate(vec![0.5, 0.5], &[0.1, 0.1], &cov, 0.0).is_ok());
    }

    #[test]
    fn test_non_finite_covariance_fails() {
        let cov = vec![vec![f64::NAN]];
        assert!(matches!(
            evaluate(vec![1.0], &[0.1], &cov, 0.0),
            Err(OptimizerError::NumericalInstability { .. })
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = evaluate(vec![1.0], &[0.1, 0.2], &two_asset_cov(), 0.0).unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidParameter(_)));
    }

    #[test]
    fn test_negative_excess_return_gives_negative_score() {
        let result = evaluate(vec![1.0], &[0.01], &[vec![0.04]], 0.05).unwrap();
        assert!((result.score - (-0.04 / 0.2)).abs() < 1e-12);
    }
}
