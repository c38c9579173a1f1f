use crate::config::CACHE_MAX_AGE_SECS;
use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Historical prices: one row per time index, one column per asset.
///
/// Values are not checked for positivity or time order here; the estimator sorts
/// rows by time index and drops any return touching a zero or negative price.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceMatrix {
    dates: Vec<String>,
    assets: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl PriceMatrix {
    pub fn new(dates: Vec<String>, assets: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if dates.len() != rows.len() {
            return Err(anyhow::anyhow!(
                "price matrix has {} time indices but {} rows",
                dates.len(),
                rows.len()
            ));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != assets.len()) {
            return Err(anyhow::anyhow!(
                "row {} ({}) has {} prices, expected {}",
                i,
                dates[i],
                row.len(),
                assets.len()
            ));
        }
        let mut seen = HashSet::new();
        for asset in &assets {
            if asset.trim().is_empty() {
                return Err(anyhow::anyhow!("asset identifiers cannot be empty"));
            }
            if !seen.insert(asset.as_str()) {
                return Err(anyhow::anyhow!("duplicate asset column '{}'", asset));
            }
        }

        Ok(Self { dates, assets, rows })
    }

    pub fn dates(&self) -> &[String] {
        &self.dates
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_assets(&self) -> usize {
        self.assets.len()
    }

    /// Returns true when rows are already in ascending time order.
    pub fn is_chronological(&self) -> bool {
        let keys = self.sort_keys();
        match keys {
            Some(parsed) => parsed.windows(2).all(|w| w[0] <= w[1]),
            None => self.dates.windows(2).all(|w| w[0] <= w[1]),
        }
    }

    /// Stable ascending sort by time index. Falls back to lexical order when any
    /// index fails to parse as a date.
    pub fn sort_chronologically(&mut self) {
        if self.is_chronological() {
            return;
        }

        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        match self.sort_keys() {
            Some(parsed) => order.sort_by_key(|&i| parsed[i]),
            None => {
                warn!("Time index is not parseable as dates; sorting rows lexically");
                order.sort_by(|&a, &b| self.dates[a].cmp(&self.dates[b]));
            }
        }

        self.dates = order.iter().map(|&i| self.dates[i].clone()).collect();
        self.rows = order.iter().map(|&i| self.rows[i].clone()).collect();
    }

    fn sort_keys(&self) -> Option<Vec<NaiveDateTime>> {
        self.dates.iter().map(|d| parse_time_index(d)).collect()
    }

    /// Parses a CSV whose first column is the time index and whose remaining
    /// columns are asset prices. Rows with a missing value are dropped.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| anyhow::anyhow!("failed to read CSV headers: {}", e))?
            .clone();
        if headers.is_empty() {
            return Err(anyhow::anyhow!("CSV has no header row"));
        }
        let assets: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

        let mut dates = Vec::new();
        let mut rows = Vec::new();
        let mut dropped = 0usize;

        for (i, record) in reader.records().enumerate() {
            let line = i + 2;
            let record = record.map_err(|e| anyhow::anyhow!("failed to read CSV line {}: {}", line, e))?;

            let index = record.get(0).unwrap_or_default();
            if is_missing(index) {
                dropped += 1;
                continue;
            }

            let mut row = Vec::with_capacity(assets.len());
            let mut complete = true;
            for (j, asset) in assets.iter().enumerate() {
                let raw = record.get(j + 1).unwrap_or_default();
                if is_missing(raw) {
                    complete = false;
                    break;
                }
                let price = raw.parse::<f64>().map_err(|e| {
                    anyhow::anyhow!("line {}, column '{}': cannot parse '{}' as a price: {}", line, asset, raw, e)
                })?;
                if !price.is_finite() {
                    complete = false;
                    break;
                }
                row.push(price);
            }

            if complete {
                dates.push(index.to_string());
                rows.push(row);
            } else {
                dropped += 1;
            }
        }

        if dropped > 0 {
            info!("Dropped {} rows with missing values", dropped);
        }

        Self::new(dates, assets, rows)
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| anyhow::anyhow!("failed to open {}: {}", path.display(), e))?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }

    /// Generates correlated-free geometric random walks for demos and tests.
    pub fn new_mock(num_assets: usize, days: usize, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let start = NaiveDate::from_ymd_opt(2020, 1, 1)
            .ok_or_else(|| anyhow::anyhow!("invalid mock start date"))?;

        let assets: Vec<String> = (0..num_assets).map(|i| format!("ASSET{}", i + 1)).collect();
        let shocks = (0..num_assets)
            .map(|i| {
                let drift = 0.0002 * (i as f64 + 1.0);
                let vol = 0.01 + 0.005 * i as f64;
                Normal::new(drift, vol).map_err(|e| anyhow::anyhow!("invalid mock distribution: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut current = vec![100.0; num_assets];
        let mut dates = Vec::with_capacity(days);
        let mut rows = Vec::with_capacity(days);
        for day in 0..days {
            dates.push((start + Duration::days(day as i64)).format("%Y-%m-%d").to_string());
            rows.push(current.clone());
            for (price, shock) in current.iter_mut().zip(shocks.iter()) {
                *price *= shock.sample(&mut rng).exp();
            }
        }

        Self::new(dates, assets, rows)
    }
}

fn is_missing(raw: &str) -> bool {
    let v = raw.trim();
    v.is_empty() || v.eq_ignore_ascii_case("nan") || v.eq_ignore_ascii_case("na") || v.eq_ignore_ascii_case("null")
}

fn parse_time_index(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc())
}

/// Where a request's prices come from.
#[derive(Clone, Debug, PartialEq)]
pub enum PriceSource {
    File(PathBuf),
    Url(String),
    Mock { assets: usize, days: usize, seed: u64 },
}

impl std::fmt::Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Url(url) => write!(f, "url {}", url),
            Self::Mock { assets, days, seed } => write!(f, "mock ({} assets, {} days, seed {})", assets, days, seed),
        }
    }
}

/// Loads and chronologically orders prices from the given source.
pub async fn load_prices(source: &PriceSource) -> Result<PriceMatrix> {
    let mut prices = match source {
        PriceSource::File(path) => PriceMatrix::from_csv_path(path)?,
        PriceSource::Url(url) => {
            let body = fetch_csv_with_cache(url, Path::new(".cache")).await?;
            PriceMatrix::from_csv_reader(body.as_bytes())?
        }
        PriceSource::Mock { assets, days, seed } => PriceMatrix::new_mock(*assets, *days, *seed)?,
    };
    prices.sort_chronologically();
    info!(
        "Loaded {} rows x {} assets from {}",
        prices.num_rows(),
        prices.num_assets(),
        source
    );
    Ok(prices)
}

fn cache_file_name(url: &str) -> String {
    let sanitized: String = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    if sanitized.ends_with(".csv") {
        sanitized
    } else {
        format!("{}.csv", sanitized)
    }
}

async fn fetch_csv_with_cache(url: &str, cache_dir: &Path) -> Result<String> {
    if !cache_dir.exists() {
        std::fs::create_dir_all(cache_dir)?;
    }
    let cache_file = cache_dir.join(cache_file_name(url));

    if cache_file.exists() {
        let modified = std::fs::metadata(&cache_file)?.modified()?;
        let age = std::time::SystemTime::now().duration_since(modified)?;
        if age.as_secs() < CACHE_MAX_AGE_SECS {
            info!("Loading {} from cache...", url);
            return Ok(std::fs::read_to_string(&cache_file)?);
        }
        info!("Cache expired for {}, fetching...", url);
    } else {
        info!("Cache miss for {}, fetching...", url);
    }

    let body = fetch_from_url(url).await?;
    if let Err(e) = std::fs::write(&cache_file, &body) {
        warn!("Failed to write cache file {}: {}", cache_file.display(), e);
    }
    Ok(body)
}

async fn fetch_from_url(url: &str) -> Result<String> {
    let client = reqwest::Client::new();
    let max_attempts = 3;
    let mut attempts = 0;

    loop {
        attempts += 1;
        let result = match client.get(url).header("User-Agent", "Mozilla/5.0").send().await {
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => resp.text().await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(body) => return Ok(body),
            Err(e) => {
                if attempts >= max_attempts {
                    return Err(anyhow::anyhow!("failed to fetch {} after {} attempts: {}", url, attempts, e));
                }
                warn!("Failed to fetch {} (attempt {}/{}): {}", url, attempts, max_attempts, e);
            }
        }

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "Date,AAPL,MSFT,GOOG
2021-01-03,134,223,1740
2021-01-01,130,220,1725
2021-01-02,132,,1730
2021-01-04,135,NaN,1745
2021-01-05,136,225,1750
";

    #[test]
    fn test_csv_drops_rows_with_missing_values() {
        let prices = PriceMatrix::from_csv_reader(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(prices.assets(), &["AAPL", "MSFT", "GOOG"]);
        assert_eq!(prices.num_rows(), 3);
        assert_eq!(prices.dates(), &["2021-01-03", "2021-01-01", "2021-01-05"]);
        assert_eq!(prices.rows()[1], vec![130.0, 220.0, 1725.0]);
    }

    #[test]
    fn test_sort_chronologically() {
        let mut prices = PriceMatrix::from_csv_reader(SAMPLE_CSV.as_bytes()).unwrap();
        assert!(!prices.is_chronological());
        prices.sort_chronologically();
        assert!(prices.is_chronological());
        assert_eq!(prices.dates(), &["2021-01-01", "2021-01-03", "2021-01-05"]);
        assert_eq!(prices.rows()[0][0], 130.0);
        assert_eq!(prices.rows()[2][2], 1750.0);
    }

    #[test]
    fn test_sort_falls_back_to_lexical_order() {
        let mut prices = PriceMatrix::new(
            vec!["c".into(), "a".into(), "b".into()],
            vec!["X".into()],
            vec![vec![3.0], vec![1.0], vec![2.0]],
        )
        .unwrap();
        prices.sort_chronologically();
        assert_eq!(prices.rows(), &[vec![1.0], vec![2.0], vec![3.0]]);
    }

    #[test]
    fn test_csv_rejects_garbage_prices() {
        let csv = "Date,A\n2021-01-01,abc\n";
        let err = PriceMatrix::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("column 'A'"));
    }

    #[test]
    fn test_new_rejects_bad_shapes() {
        assert!(PriceMatrix::new(vec!["d".into()], vec!["A".into(), "B".into()], vec![vec![1.0]]).is_err());
        assert!(PriceMatrix::new(vec![], vec!["A".into(), "A".into()], vec![]).is_err());
        assert!(PriceMatrix::new(vec!["d".into()], vec!["A".into()], vec![]).is_err());
    }

    #[test]
    fn test_mock_is_deterministic_and_positive() {
        let a = PriceMatrix::new_mock(4, 120, 7).unwrap();
        let b = PriceMatrix::new_mock(4, 120, 7).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.num_assets(), 4);
        assert_eq!(a.num_rows(), 120);
        assert!(a.is_chronological());
        assert!(a.rows().iter().flatten().all(|&p| p > 0.0));
    }

    #[test]
    fn test_cache_file_name_is_filesystem_safe() {
        let name = cache_file_name("https://raw.githubusercontent.com/gahoccode/Datasets/main/myport2.csv");
        assert_eq!(name, "raw.githubusercontent.com_gahoccode_Datasets_main_myport2.csv");
        assert!(cache_file_name("http://host/q?x=1").ends_with(".csv"));
    }

    #[tokio::test]
    async fn test_load_prices_from_file_sorts_rows() {
        let path = std::env::temp_dir().join(format!("portfolio_mc_load_{}.csv", std::process::id()));
        std::fs::write(&path, SAMPLE_CSV).unwrap();

        let prices = load_prices(&PriceSource::File(path.clone())).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert!(prices.is_chronological());
        assert_eq!(prices.num_rows(), 3);
    }
}
