//! Log returns and annualized mean/covariance estimation.

use crate::data::PriceMatrix;
use crate::error::{OptimizerError, Result};
use std::borrow::Cow;
use tracing::{debug, warn};

/// Per-period log returns; one row fewer than the prices they came from
/// (less any rows dropped for non-positive prices or non-finite values).
#[derive(Clone, Debug, PartialEq)]
pub struct LogReturnMatrix {
    pub dates: Vec<String>,
    pub assets: Vec<String>,
    pub returns: Vec<Vec<f64>>,
}

impl LogReturnMatrix {
    pub fn num_rows(&self) -> usize {
        self.returns.len()
    }

    pub fn num_assets(&self) -> usize {
        self.assets.len()
    }
}

/// Annualized return statistics shared read-only by every trial.
#[derive(Clone, Debug, PartialEq)]
pub struct Statistics {
    pub assets: Vec<String>,
    pub mean_returns: Vec<f64>,
    pub covariance: Vec<Vec<f64>>,
    pub periods_per_year: u32,
    /// Number of return rows the statistics were estimated from.
    pub observations: usize,
}

impl Statistics {
    pub fn num_assets(&self) -> usize {
        self.mean_returns.len()
    }

    /// Annualized standard deviation of each asset on its own.
    pub fn asset_volatilities(&self) -> Vec<f64> {
        (0..self.num_assets())
            .map(|i| self.covariance[i][i].max(0.0).sqrt())
            .collect()
    }
}

fn check_shape(prices: &PriceMatrix) -> Result<()> {
    if prices.num_rows() < 2 || prices.num_assets() == 0 {
        return Err(OptimizerError::InsufficientData {
            rows: prices.num_rows(),
            assets: prices.num_assets(),
        });
    }
    Ok(())
}

/// ln(p_t / p_{t-1}) for every consecutive pair of rows, after ordering rows by
/// time index. A return row is dropped when either price is zero or negative or
/// the result is not finite.
pub fn log_returns(prices: &PriceMatrix) -> Result<LogReturnMatrix> {
    check_shape(prices)?;

    let prices: Cow<'_, PriceMatrix> = if prices.is_chronological() {
        Cow::Borrowed(prices)
    } else {
        debug!("Price rows are not in time order; sorting before differencing");
        let mut sorted = prices.clone();
        sorted.sort_chronologically();
        Cow::Owned(sorted)
    };

    let rows = prices.rows();
    let mut dates = Vec::with_capacity(rows.len() - 1);
    let mut returns = Vec::with_capacity(rows.len() - 1);
    let mut dropped = 0usize;

    for t in 1..rows.len() {
        let positive = rows[t]
            .iter()
            .chain(rows[t - 1].iter())
            .all(|&p| p > 0.0);
        let row: Vec<f64> = rows[t]
            .iter()
            .zip(rows[t - 1].iter())
            .map(|(curr, prev)| (curr / prev).ln())
            .collect();

        if positive && row.iter().all(|r| r.is_finite()) {
            dates.push(prices.dates()[t].clone());
            returns.push(row);
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        warn!("Dropped {} return rows with non-positive prices or non-finite values", dropped);
    }
    if returns.is_empty() {
        return Err(OptimizerError::InsufficientData {
            rows: prices.num_rows() - dropped,
            assets: prices.num_assets(),
        });
    }

    Ok(LogReturnMatrix {
        dates,
        assets: prices.assets().to_vec(),
        returns,
    })
}

/// Annualized column means and sample covariance (N-1 denominator) of log returns.
///
/// A single return row has no sample covariance; the covariance is then the zero
/// matrix, which makes every trial's risk zero and its score zero.
pub fn compute_statistics(prices: &PriceMatrix, periods_per_year: u32) -> Result<Statistics> {
    if periods_per_year == 0 {
        return Err(OptimizerError::InvalidParameter(
            "periods per year must be at least 1".to_string(),
        ));
    }

    let log_ret = log_returns(prices)?;
    let n = log_ret.num_assets();
    let obs = log_ret.num_rows();
    let scale = periods_per_year as f64;

    let means: Vec<f64> = (0..n)
        .map(|j| log_ret.returns.iter().map(|row| row[j]).sum::<f64>() / obs as f64)
        .collect();

    let mut cov = vec![vec![0.0; n]; n];
    if obs > 1 {
        for i in 0..n {
            for j in i..n {
                let sum: f64 = log_ret
                    .returns
                    .iter()
                    .map(|row| (row[i] - means[i]) * (row[j] - means[j]))
                    .sum();
                let covariance = sum / (obs as f64 - 1.0) * scale;
                cov[i][j] = covariance;
                cov[j][i] = covariance;
            }
        }
    } else {
        warn!("Only one return observation; covariance is undefined and set to zero");
    }

    let mean_returns: Vec<f64> = means.iter().map(|m| m * scale).collect();

    debug!(
        "Estimated statistics for {} assets over {} periods: mean={:?}",
        n, obs, mean_returns
    );

    Ok(Statistics {
        assets: log_ret.assets,
        mean_returns,
        covariance: cov,
        periods_per_year,
        observations: obs,
    })
}
