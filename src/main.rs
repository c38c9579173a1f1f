use clap::Parser;
use portfolio_mc::config::{self, AppConfig, ExecutionStrategy, DEFAULT_WEBUI_PORT, TRADING_DAYS_PER_YEAR};
use portfolio_mc::data::PriceSource;
use portfolio_mc::simulation::SimulationParams;
use portfolio_mc::{portfolio, webui};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Monte Carlo portfolio optimization: maximum risk-adjusted return and minimum risk portfolios",
    after_help = "EXAMPLES:
    # Optimize the default dataset with 5000 random portfolios
    cargo run --release

    # Local CSV (first column = date, remaining columns = asset prices)
    cargo run --release -- --csv prices.csv --num-port 20000 --rf-rate 0.02

    # Synthetic data, JSON output
    cargo run --release -- --mock 5 --json

    # Launch the JSON API
    cargo run --release -- --webui --webui-port 8080"
)]
struct Args {
    /// Load prices from a local CSV file
    #[arg(long, conflicts_with_all = ["url", "mock"])]
    csv: Option<PathBuf>,

    /// Load prices from a CSV URL (cached for 24h under .cache/)
    #[arg(long, conflicts_with = "mock")]
    url: Option<String>,

    /// Use synthetic prices for this many assets
    #[arg(long)]
    mock: Option<usize>,

    /// Number of trading days of synthetic history (with --mock)
    #[arg(long, default_value_t = 500)]
    mock_days: usize,

    /// Number of random portfolios to simulate (1000-20000)
    #[arg(long)]
    num_port: Option<usize>,

    /// Annual risk-free rate used in the risk-adjusted score
    #[arg(long, allow_negative_numbers = true)]
    rf_rate: Option<f64>,

    /// Seed for reproducible portfolio draws
    #[arg(long)]
    seed: Option<u64>,

    /// Trading periods per year used for annualization
    #[arg(long, default_value_t = TRADING_DAYS_PER_YEAR)]
    periods_per_year: u32,

    /// Trial execution strategy (auto|sequential|parallel)
    #[arg(long)]
    execution: Option<ExecutionStrategy>,

    /// Worker threads for parallel execution (default: all logical cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Print the full report as JSON instead of the table
    #[arg(long)]
    json: bool,

    /// Launch in WebUI mode
    #[arg(long)]
    webui: bool,

    /// WebUI server port
    #[arg(long, default_value_t = DEFAULT_WEBUI_PORT)]
    webui_port: u16,
}

fn resolve_source(args: &Args, cfg: &AppConfig) -> PriceSource {
    if let Some(path) = &args.csv {
        PriceSource::File(path.clone())
    } else if let Some(url) = &args.url {
        PriceSource::Url(url.clone())
    } else if let Some(assets) = args.mock {
        PriceSource::Mock {
            assets,
            days: args.mock_days,
            seed: args.seed.unwrap_or(cfg.seed),
        }
    } else if let Some(path) = &cfg.data_file {
        PriceSource::File(path.clone())
    } else {
        PriceSource::Url(cfg.data_url.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("portfolio_mc=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .init();

    let args = Args::parse();
    let cfg = AppConfig::from_env();
    config::init_cpu_parallelism(args.threads.or(cfg.threads));

    let params = SimulationParams {
        trial_count: args.num_port.unwrap_or(cfg.num_port),
        risk_free_rate: args.rf_rate.unwrap_or(cfg.rf_rate),
        seed: args.seed.unwrap_or(cfg.seed),
        periods_per_year: args.periods_per_year,
        execution: args.execution.unwrap_or(cfg.execution),
    };
    let source = resolve_source(&args, &cfg);

    if args.webui {
        match webui::run_webui_server(args.webui_port, source, params).await {
            Ok(_) => info!("WebUI exited."),
            Err(e) => error!("WebUI failed: {}", e),
        }
        return Ok(());
    }

    match portfolio::run_portfolio_optimization(&source, params).await {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                portfolio::print_report(&report);
            }
            info!("Portfolio optimization completed.");
        }
        Err(e) => {
            error!("Portfolio optimization failed: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
