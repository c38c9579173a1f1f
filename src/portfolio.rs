use crate::config::ExecutionStrategy;
use crate::data::{load_prices, PriceMatrix, PriceSource};
use crate::selector::{select, select_parallel, OptimalPortfolio, OptimalPortfolios};
use crate::simulation::{run, SimulationParams, SimulationResultSet};
use anyhow::Result;
use serde::Serialize;
use tracing::info;

// ──────────────────────────────────────────────────────────────────────────────
// Data Structures
// ──────────────────────────────────────────────────────────────────────────────

/// Annualized statistics of a single asset held on its own.
#[derive(Clone, Debug, Serialize)]
pub struct AssetSummary {
    pub symbol: String,
    pub annual_return: f64,
    pub annual_vol: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct PortfolioSummary {
    pub index: usize,
    pub expected_return: f64,
    pub risk: f64,
    pub score: f64,
    pub weights: Vec<(String, f64)>, // (symbol, weight 0-1)
}

/// One simulated portfolio in risk/return space, for frontier plots.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct FrontierPoint {
    pub risk: f64,
    pub expected_return: f64,
    pub score: f64,
}

/// Everything a presentation layer needs: optimal portfolios, per-asset stats
/// and the full cloud of simulated portfolios.
#[derive(Clone, Debug, Serialize)]
pub struct OptimizationReport {
    pub assets: Vec<String>,
    pub num_port: usize,
    pub rf_rate: f64,
    pub seed: u64,
    pub periods_per_year: u32,
    pub observations: usize,
    pub asset_stats: Vec<AssetSummary>,
    pub best_score: PortfolioSummary,
    pub min_risk: PortfolioSummary,
    pub frontier: Vec<FrontierPoint>,
}

fn summarize(pick: &OptimalPortfolio, assets: &[String]) -> PortfolioSummary {
    PortfolioSummary {
        index: pick.index,
        expected_return: pick.expected_return,
        risk: pick.risk,
        score: pick.score,
        weights: assets.iter().cloned().zip(pick.weights.iter().copied()).collect(),
    }
}

pub fn build_report(
    results: &SimulationResultSet,
    optimal: &OptimalPortfolios,
    params: &SimulationParams,
) -> OptimizationReport {
    let stats = results.statistics();
    let asset_stats = stats
        .assets
        .iter()
        .zip(stats.mean_returns.iter())
        .zip(stats.asset_volatilities())
        .map(|((symbol, &annual_return), annual_vol)| AssetSummary {
            symbol: symbol.clone(),
            annual_return,
            annual_vol,
        })
        .collect();

    let frontier = results
        .trials()
        .iter()
        .map(|t| FrontierPoint {
            risk: t.risk,
            expected_return: t.expected_return,
            score: t.score,
        })
        .collect();

    OptimizationReport {
        assets: stats.assets.clone(),
        num_port: results.len(),
        rf_rate: results.risk_free_rate(),
        seed: params.seed,
        periods_per_year: stats.periods_per_year,
        observations: stats.observations,
        asset_stats,
        best_score: summarize(&optimal.best_score, &stats.assets),
        min_risk: summarize(&optimal.min_risk, &stats.assets),
        frontier,
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Pipeline
// ──────────────────────────────────────────────────────────────────────────────

/// Simulate → select → report, on an already-loaded price matrix.
pub fn optimize_prices(prices: &PriceMatrix, params: &SimulationParams) -> Result<OptimizationReport> {
    let results = run(prices, params)?;
    let optimal = match crate::config::resolve_execution_strategy(params.execution) {
        ExecutionStrategy::Parallel => select_parallel(&results)?,
        _ => select(&results)?,
    };

    info!(
        "Best score portfolio #{}: E[r]={:.4}, σ={:.4}, score={:.3}",
        optimal.best_score.index, optimal.best_score.expected_return, optimal.best_score.risk, optimal.best_score.score
    );
    info!(
        "Min risk portfolio #{}: E[r]={:.4}, σ={:.4}, score={:.3}",
        optimal.min_risk.index, optimal.min_risk.expected_return, optimal.min_risk.risk, optimal.min_risk.score
    );

    Ok(build_report(&results, &optimal, params))
}

/// Full pipeline: load prices → optimize on a blocking thread → report.
pub async fn run_portfolio_optimization(
    source: &PriceSource,
    params: SimulationParams,
) -> Result<OptimizationReport> {
    params.validate()?;
    info!(
        "=== Monte Carlo Portfolio Optimizer ===\n  Source: {}\n  Portfolios: {}\n  Risk-free rate: {:.4}\n  Seed: {}",
        source, params.trial_count, params.risk_free_rate, params.seed
    );

    let prices = load_prices(source).await?;
    tokio::task::spawn_blocking(move || optimize_prices(&prices, &params))
        .await
        .map_err(|e| anyhow::anyhow!("optimization task failed: {}", e))?
}

// ──────────────────────────────────────────────────────────────────────────────
// Console Output
// ──────────────────────────────────────────────────────────────────────────────

fn print_portfolio(title: &str, summary: &PortfolioSummary) {
    println!("║  {:<58}║", title);
    println!("╠════════════════════════════════════════════════════════════╣");
    println!(
        "║  Expected Annual Return : {:>+8.2}%   (portfolio #{:<6})  ║",
        summary.expected_return * 100.0,
        summary.index
    );
    println!("║  Annual Risk (Std Dev)  : {:>8.2}%                        ║", summary.risk * 100.0);
    println!("║  Risk-Adjusted Score    : {:>8.3}                         ║", summary.score);
    println!("║  Allocation:                                              ║");

    let mut sorted = summary.weights.clone();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (sym, w) in &sorted {
        println!("║    {:<12} {:>7.2}%                                    ║", sym, w * 100.0);
    }
    println!("╠════════════════════════════════════════════════════════════╣");
}

/// Pretty-prints both optimal portfolios and per-asset statistics to stdout.
pub fn print_report(report: &OptimizationReport) {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║           Monte Carlo Portfolio Optimization              ║");
    println!("╠════════════════════════════════════════════════════════════╣");
    println!(
        "║  Portfolios: {:>6}   Risk-free: {:>6.2}%   Seed: {:<10}  ║",
        report.num_port,
        report.rf_rate * 100.0,
        report.seed
    );
    println!(
        "║  Observations: {:>5} periods ({} per year)                 ║",
        report.observations, report.periods_per_year
    );
    println!("╠════════════════════════════════════════════════════════════╣");

    print_portfolio("Max Risk-Adjusted Return Portfolio", &report.best_score);
    print_portfolio("Min Risk Portfolio", &report.min_risk);

    println!("║  Symbol        E[Ann.Ret]   Ann.Vol                       ║");
    for a in &report.asset_stats {
        println!(
            "║  {:<12} {:>+8.2}%   {:>7.2}%                       ║",
            a.symbol,
            a.annual_return * 100.0,
            a.annual_vol * 100.0
        );
    }
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
    println!("⚠  Educational use only. Not financial advice.");
}

// ──────────────────────────────────────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────────────────────────────────────
