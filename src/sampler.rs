use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

/// Draws `num_assets` uniform variates in [0, 1) and normalizes them onto the simplex.
///
/// If every draw is exactly zero the equal-weight vector is returned instead.
pub fn sample_weights<R: Rng + ?Sized>(num_assets: usize, rng: &mut R) -> Vec<f64> {
    let raw: Vec<f64> = (0..num_assets).map(|_| rng.r#gen::<f64>()).collect();
    let sum: f64 = raw.iter().sum();
    if sum <= 0.0 {
        warn!("All {} uniform draws were zero; falling back to equal weights", num_assets);
        return vec![1.0 / num_assets as f64; num_assets];
    }
    raw.iter().map(|v| v / sum).collect()
}

/// SplitMix64 finalizer over the global seed and trial index.
pub fn trial_seed(seed: u64, trial: usize) -> u64 {
    let mut z = seed ^ (trial as u64).wrapping_mul(0x9e3779b97f4a7c15);
    z = z.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

pub fn trial_rng(seed: u64, trial: usize) -> StdRng {
    StdRng::seed_from_u64(trial_seed(seed, trial))
}

/// Produces the weight vector for any trial index on demand.
///
/// Each trial owns a private generator derived from `(seed, trial)`, so the
/// sequence of weights does not depend on the order or thread in which
/// trials are evaluated.
#[derive(Clone, Copy, Debug)]
pub struct PortfolioSampler {
    seed: u64,
    num_assets: usize,
}

impl PortfolioSampler {
    pub fn new(seed: u64, num_assets: usize) -> Self {
        Self { seed, num_assets }
    }

    pub fn num_assets(&self) -> usize {
        self.num_assets
    }

    pub fn sample(&self, trial: usize) -> Vec<f64> {
        let mut rng = trial_rng(self.seed, trial);
        sample_weights(self.num_assets, &mut rng)
    }
}
