//! Monte Carlo runner: N independent sample → evaluate trials over shared statistics.

use crate::config::{
    self, ExecutionStrategy, DEFAULT_RF_RATE, DEFAULT_NUM_PORT, DEFAULT_SEED, MAX_TRIALS, MIN_TRIALS,
    TRADING_DAYS_PER_YEAR,
};
use crate::data::PriceMatrix;
use crate::error::{OptimizerError, Result};
use crate::evaluator::{evaluate, TrialResult};
use crate::returns::{compute_statistics, Statistics};
use crate::sampler::PortfolioSampler;
use rayon::prelude::*;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationParams {
    pub trial_count: usize,
    pub risk_free_rate: f64,
    pub seed: u64,
    pub periods_per_year: u32,
    pub execution: ExecutionStrategy,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            trial_count: DEFAULT_NUM_PORT,
            risk_free_rate: DEFAULT_RF_RATE,
            seed: DEFAULT_SEED,
            periods_per_year: TRADING_DAYS_PER_YEAR,
            execution: ExecutionStrategy::Auto,
        }
    }
}

impl SimulationParams {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_TRIALS..=MAX_TRIALS).contains(&self.trial_count) {
            return Err(OptimizerError::InvalidParameter(format!(
                "number of simulations must be between {} and {}, got {}",
                MIN_TRIALS, MAX_TRIALS, self.trial_count
            )));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(OptimizerError::InvalidParameter(format!(
                "risk-free rate must be finite, got {}",
                self.risk_free_rate
            )));
        }
        if self.periods_per_year == 0 {
            return Err(OptimizerError::InvalidParameter(
                "periods per year must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// All trials of one run, in generation order, plus the statistics behind them.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationResultSet {
    trials: Vec<TrialResult>,
    statistics: Statistics,
    risk_free_rate: f64,
}

impl SimulationResultSet {
    pub fn new(trials: Vec<TrialResult>, statistics: Statistics, risk_free_rate: f64) -> Self {
        Self {
            trials,
            statistics,
            risk_free_rate,
        }
    }

    pub fn trials(&self) -> &[TrialResult] {
        &self.trials
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn expected_returns(&self) -> Vec<f64> {
        self.trials.iter().map(|t| t.expected_return).collect()
    }

    pub fn risks(&self) -> Vec<f64> {
        self.trials.iter().map(|t| t.risk).collect()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.trials.iter().map(|t| t.score).collect()
    }

    pub fn weights(&self) -> Vec<&[f64]> {
        self.trials.iter().map(|t| t.weights.as_slice()).collect()
    }
}

fn run_trial(
    trial: usize,
    sampler: &PortfolioSampler,
    stats: &Statistics,
    risk_free_rate: f64,
) -> Result<TrialResult> {
    let weights = sampler.sample(trial);
    evaluate(weights, &stats.mean_returns, &stats.covariance, risk_free_rate)
}

/// Runs `params.trial_count` trials against statistics estimated from `prices`.
///
/// Sequential and parallel execution produce identical result sets for the same seed.
pub fn run(prices: &PriceMatrix, params: &SimulationParams) -> Result<SimulationResultSet> {
    params.validate()?;
    let stats = compute_statistics(prices, params.periods_per_year)?;
    run_with_statistics(stats, params)
}

pub fn run_with_statistics(stats: Statistics, params: &SimulationParams) -> Result<SimulationResultSet> {
    params.validate()?;

    let sampler = PortfolioSampler::new(params.seed, stats.num_assets());
    let strategy = config::resolve_execution_strategy(params.execution);
    let rf = params.risk_free_rate;
    let started = std::time::Instant::now();

    info!(
        "Running {} trials over {} assets (strategy={}, seed={})",
        params.trial_count,
        stats.num_assets(),
        strategy.as_str(),
        params.seed
    );

    let trials = match strategy {
        ExecutionStrategy::Parallel => (0..params.trial_count)
            .into_par_iter()
            .map(|trial| run_trial(trial, &sampler, &stats, rf))
            .collect::<Result<Vec<_>>>()?,
        _ => (0..params.trial_count)
            .map(|trial| run_trial(trial, &sampler, &stats, rf))
            .collect::<Result<Vec<_>>>()?,
    };

    info!(
        "Completed {} trials in {:.1} ms",
        trials.len(),
        started.elapsed().as_secs_f64() * 1000.0
    );

    Ok(SimulationResultSet::new(trials, stats, rf))
}
