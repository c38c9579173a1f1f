//! Monte Carlo portfolio optimization.
//!
//! ```text
//! PriceMatrix → returns (mean, covariance) → sampler → evaluator → SimulationResultSet → selector
//! ```
//!
//! The core (`returns`, `sampler`, `evaluator`, `simulation`, `selector`) is synchronous
//! and free of I/O. `data`, `portfolio` and `webui` are the loading and presentation glue.

pub mod config;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod portfolio;
pub mod returns;
pub mod sampler;
pub mod selector;
pub mod simulation;
pub mod webui;

pub use data::{PriceMatrix, PriceSource};
pub use error::OptimizerError;
pub use evaluator::{evaluate, TrialResult};
pub use returns::{compute_statistics, LogReturnMatrix, Statistics};
pub use sampler::{sample_weights, PortfolioSampler};
pub use selector::{select, select_parallel, OptimalPortfolio, OptimalPortfolios};
pub use simulation::{run, SimulationParams, SimulationResultSet};
