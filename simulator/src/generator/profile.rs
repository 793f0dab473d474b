use anyhow::ensure;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the synthetic DOA source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    pub min_deg: f64,
    pub max_deg: f64,
    pub interval_ms: u64,
    pub decimals: u32,
    /// Fixed seed for repeatable runs; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            min_deg: 0.0,
            max_deg: 360.0,
            interval_ms: 100,
            decimals: 2,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.min_deg.is_finite() && self.max_deg.is_finite() && self.min_deg < self.max_deg,
            "generator range [{}, {}) is empty or not finite",
            self.min_deg,
            self.max_deg
        );
        ensure!(self.interval_ms > 0, "generator interval_ms must be positive");
        ensure!(self.decimals <= 6, "generator decimals must be at most 6");
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Uniform random bearings, rounded to the configured precision.
pub struct DoaGenerator {
    rng: StdRng,
    config: GeneratorConfig,
}

impl DoaGenerator {
    pub fn new(config: GeneratorConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { rng, config })
    }

    pub fn next_angle(&mut self) -> f64 {
        let raw = self.rng.gen_range(self.config.min_deg..self.config.max_deg);
        let scale = 10f64.powi(self.config.decimals as i32);
        (raw * scale).round() / scale
    }
}

impl Iterator for DoaGenerator {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        Some(self.next_angle())
    }
}
