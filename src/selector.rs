use crate::error::{OptimizerError, Result};
use crate::evaluator::TrialResult;
use crate::simulation::SimulationResultSet;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;

/// A selected trial together with its position in the result set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OptimalPortfolio {
    pub index: usize,
    pub weights: Vec<f64>,
    pub expected_return: f64,
    pub risk: f64,
    pub score: f64,
}

impl OptimalPortfolio {
    fn from_trial(index: usize, trial: &TrialResult) -> Self {
        Self {
            index,
            weights: trial.weights.clone(),
            expected_return: trial.expected_return,
            risk: trial.risk,
            score: trial.score,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OptimalPortfolios {
    pub best_score: OptimalPortfolio,
    pub min_risk: OptimalPortfolio,
}

/// Single pass over the trials; the first maximum score and the first minimum
/// risk win ties.
pub fn select(results: &SimulationResultSet) -> Result<OptimalPortfolios> {
    let trials = results.trials();
    let first = trials.first().ok_or(OptimizerError::EmptyResultSet)?;

    let mut best_idx = 0;
    let mut best_score = first.score;
    let mut min_idx = 0;
    let mut min_risk = first.risk;

    for (i, trial) in trials.iter().enumerate().skip(1) {
        if trial.score > best_score {
            best_score = trial.score;
            best_idx = i;
        }
        if trial.risk < min_risk {
            min_risk = trial.risk;
            min_idx = i;
        }
    }

    Ok(OptimalPortfolios {
        best_score: OptimalPortfolio::from_trial(best_idx, &trials[best_idx]),
        min_risk: OptimalPortfolio::from_trial(min_idx, &trials[min_idx]),
    })
}

#[derive(Clone, Copy)]
struct Candidate {
    best: (usize, f64),
    min: (usize, f64),
}

// Larger value wins; equal values keep the smaller index.
fn keep_max(a: (usize, f64), b: (usize, f64)) -> (usize, f64) {
    match a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal) {
        Ordering::Less => b,
        Ordering::Greater => a,
        Ordering::Equal => if a.0 <= b.0 { a } else { b },
    }
}

fn keep_min(a: (usize, f64), b: (usize, f64)) -> (usize, f64) {
    match a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal) {
        Ordering::Less => a,
        Ordering::Greater => b,
        Ordering::Equal => if a.0 <= b.0 { a } else { b },
    }
}

/// Parallel reduction with the same tie-breaking as [`select`], independent of
/// how rayon splits and joins the work.
pub fn select_parallel(results: &SimulationResultSet) -> Result<OptimalPortfolios> {
    let trials = results.trials();
    if trials.is_empty() {
        return Err(OptimizerError::EmptyResultSet);
    }

    let winner = trials
        .par_iter()
        .enumerate()
        .map(|(i, t)| Candidate {
            best: (i, t.score),
            min: (i, t.risk),
        })
        .reduce_with(|a, b| Candidate {
            best: keep_max(a.best, b.best),
            min: keep_min(a.min, b.min),
        })
        .ok_or(OptimizerError::EmptyResultSet)?;

    Ok(OptimalPortfolios {
        best_score: OptimalPortfolio::from_trial(winner.best.0, &trials[winner.best.0]),
        min_risk: OptimalPortfolio::from_trial(winner.min.0, &trials[winner.min.0]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionStrategy;
    use crate::data::PriceMatrix;
    use crate::evaluator::evaluate;
    use crate::returns::compute_statistics;
    use crate::simulation::{run, SimulationParams};

    fn trial(risk: f64, score: f64) -> TrialResult {
        TrialResult {
            weights: vec![1.0],
            expected_return: risk * score,
            risk,
            score,
        }
    }

    fn result_set(trials: Vec<TrialResult>) -> SimulationResultSet {
        let prices = PriceMatrix::new(
            vec!["t0".into(), "t1".into(), "t2".into()],
            vec!["A".into()],
            vec![vec![1.0], vec![1.1], vec![1.05]],
        )
        .unwrap();
        SimulationResultSet::new(trials, compute_statistics(&prices, 252).unwrap(), 0.0)
    }

    #[test]
    fn test_empty_result_set_fails() {
        let empty = result_set(vec![]);
        assert_eq!(select(&empty), Err(OptimizerError::EmptyResultSet));
        assert_eq!(select_parallel(&empty), Err(OptimizerError::EmptyResultSet));
    }

    #[test]
    fn test_ties_resolve_to_first_occurrence() {
        let set = result_set(vec![
            trial(0.3, 1.0),
            trial(0.1, 2.0),
            trial(0.2, 0.5),
            trial(0.1, 2.0),
            trial(0.4, 2.0),
        ]);
        let seq = select(&set).unwrap();
        assert_eq!(seq.best_score.index, 1);
        assert_eq!(seq.min_risk.index, 1);
        assert_eq!(select_parallel(&set).unwrap(), seq);
    }

    #[test]
    fn test_selection_bounds_every_trial() {
        let prices = PriceMatrix::new_mock(5, 250, 21).unwrap();
        let params = SimulationParams {
            trial_count: 3000,
            execution: ExecutionStrategy::Sequential,
            ..SimulationParams::default()
        };
        let results = run(&prices, &params).unwrap();
        let optimal = select(&results).unwrap();

        for t in results.trials() {
            assert!(optimal.min_risk.risk <= t.risk);
            assert!(optimal.best_score.score >= t.score);
        }
        assert_eq!(results.trials()[optimal.best_score.index].score, optimal.best_score.score);
        assert_eq!(results.trials()[optimal.min_risk.index].risk, optimal.min_risk.risk);
    }

    #[test]
    fn test_parallel_selection_matches_sequential() {
        let prices = PriceMatrix::new_mock(3, 180, 5).unwrap();
        let results = run(&prices, &SimulationParams::default()).unwrap();
        assert_eq!(select(&results).unwrap(), select_parallel(&results).unwrap());
    }

    #[test]
    fn test_reevaluating_optimal_weights_reproduces_scores() {
        let prices = PriceMatrix::new_mock(4, 200, 8).unwrap();
        let params = SimulationParams {
            risk_free_rate: 0.01,
            ..SimulationParams::default()
        };
        let results = run(&prices, &params).unwrap();
        let optimal = select(&results).unwrap();
        let stats = results.statistics();

        for pick in [&optimal.best_score, &optimal.min_risk] {
            let again = evaluate(pick.weights.clone(), &stats.mean_returns, &stats.covariance, 0.01).unwrap();
            assert!((again.expected_return - pick.expected_return).abs() < 1e-12);
            assert!((again.risk - pick.risk).abs() < 1e-12);
            assert!((again.score - pick.score).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_scores_pick_first_trial() {
        let set = result_set(vec![trial(0.0, 0.0), trial(0.0, 0.0), trial(0.0, 0.0)]);
        let optimal = select(&set).unwrap();
        assert_eq!(optimal.best_score.index, 0);
        assert_eq!(optimal.min_risk.index, 0);
    }
}
