use rayon::ThreadPoolBuilder;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::{info, warn};

static RAYON_INIT: OnceLock<()> = OnceLock::new();

/// Trading periods per year used to annualize daily statistics.
pub const TRADING_DAYS_PER_YEAR: u32 = 252;
pub const DEFAULT_NUM_PORT: usize = 5000;
pub const DEFAULT_RF_RATE: f64 = 0.0;
pub const DEFAULT_SEED: u64 = 42;

/// Inclusive bounds on the number of random portfolios per request.
pub const MIN_TRIALS: usize = 1000;
pub const MAX_TRIALS: usize = 20_000;

/// Risk at or below this is treated as zero when computing the score.
pub const RISK_EPSILON: f64 = 1e-12;
/// Largest negative quadratic form still accepted as rounding noise.
pub const VARIANCE_TOLERANCE: f64 = 1e-10;

/// Dataset used when no local file or URL is configured.
pub const DEFAULT_DATA_URL: &str = "https://raw.githubusercontent.com/gahoccode/Datasets/main/myport2.csv";
/// Fetched CSVs older than this are re-downloaded.
pub const CACHE_MAX_AGE_SECS: u64 = 86_400;
pub const DEFAULT_WEBUI_PORT: u16 = 8080;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    #[default]
    Auto,
    Sequential,
    Parallel,
}

impl ExecutionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }
}

impl FromStr for ExecutionStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "sequential" | "seq" => Ok(Self::Sequential),
            "parallel" | "par" => Ok(Self::Parallel),
            other => Err(anyhow::anyhow!(
                "unknown execution strategy '{}'. Allowed values: auto | sequential | parallel",
                other
            )),
        }
    }
}

pub fn init_cpu_parallelism(threads: Option<usize>) {
    RAYON_INIT.get_or_init(|| {
        let num_threads = threads.unwrap_or_else(num_cpus::get).max(1);
        match ThreadPoolBuilder::new().num_threads(num_threads).build_global() {
            Ok(_) => info!("Initialized Rayon thread pool with {} threads", num_threads),
            Err(e) => warn!(
                "Rayon thread pool already initialized or unavailable ({}). Using existing configuration.",
                e
            ),
        }
    });
}

/// Picks a concrete strategy. Results are identical either way; this only decides
/// whether trials are spread over the rayon pool.
pub fn resolve_execution_strategy(requested: ExecutionStrategy) -> ExecutionStrategy {
    match requested {
        ExecutionStrategy::Auto => {
            if rayon::current_num_threads() > 1 {
                ExecutionStrategy::Parallel
            } else {
                ExecutionStrategy::Sequential
            }
        }
        other => other,
    }
}

/// Runtime settings read from the environment (and `.env`, if present).
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub data_url: String,
    pub data_file: Option<std::path::PathBuf>,
    pub num_port: usize,
    pub rf_rate: f64,
    pub seed: u64,
    pub threads: Option<usize>,
    pub execution: ExecutionStrategy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_url: DEFAULT_DATA_URL.to_string(),
            data_file: None,
            num_port: DEFAULT_NUM_PORT,
            rf_rate: DEFAULT_RF_RATE,
            seed: DEFAULT_SEED,
            threads: None,
            execution: ExecutionStrategy::Auto,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup so tests need not touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            data_url: get("PORTFOLIO_DATA_URL").unwrap_or(defaults.data_url),
            data_file: get("PORTFOLIO_DATA_FILE").map(std::path::PathBuf::from),
            num_port: parse_or("PORTFOLIO_NUM_PORT", get("PORTFOLIO_NUM_PORT"), defaults.num_port),
            rf_rate: parse_or("PORTFOLIO_RF_RATE", get("PORTFOLIO_RF_RATE"), defaults.rf_rate),
            seed: parse_or("PORTFOLIO_SEED", get("PORTFOLIO_SEED"), defaults.seed),
            threads: get("PORTFOLIO_THREADS").and_then(|v| match v.parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    warn!("Ignoring PORTFOLIO_THREADS={} ; expected a positive integer", v);
                    None
                }
            }),
            execution: parse_or("PORTFOLIO_EXECUTION", get("PORTFOLIO_EXECUTION"), defaults.execution),
        }
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(v) => match v.parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("Unparsable {}={} ; using default", key, v);
                default
            }
        },
        None => default,
    }
}
