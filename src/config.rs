use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::InvalidRequestError;

/// Search budget and genetic operator settings for one packing run.
///
/// Every field has a default, so a request may carry any subset of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackingConfig {
    pub population_size: usize,
    pub max_generations: usize,
    /// Wall-clock budget, checked once per generation.
    pub time_limit_ms: u64,
    /// Generations without improvement before the search gives up.
    pub stagnation_limit: usize,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub tournament_size: usize,
    pub elite_count: usize,
    /// Minimum gap between pieces, in fabric units.
    pub spacing: f64,
    /// Fixed seed for reproducible runs; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_generations: 70,
            time_limit_ms: 30_000,
            stagnation_limit: 20,
            mutation_rate: 0.1,
            crossover_rate: 0.9,
            tournament_size: 3,
            elite_count: 1,
            spacing: 0.0,
            seed: None,
        }
    }
}

impl PackingConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }

    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    pub fn with_max_generations(mut self, generations: usize) -> Self {
        self.max_generations = generations;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_stagnation_limit(mut self, generations: usize) -> Self {
        self.stagnation_limit = generations;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate;
        self
    }

    pub fn with_tournament_size(mut self, size: usize) -> Self {
        self.tournament_size = size;
        self
    }

    pub fn with_elite_count(mut self, count: usize) -> Self {
        self.elite_count = count;
        self
    }

    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), InvalidRequestError> {
        let invalid = |msg: String| Err(InvalidRequestError::InvalidConfig(msg));
        let is_rate = |r: f64| (0.0..=1.0).contains(&r);

        if self.population_size < 2 {
            return invalid(format!(
                "population_size must be at least 2, got {}",
                self.population_size
            ));
        }
        if !is_rate(self.mutation_rate) {
            return invalid(format!("mutation_rate must be in [0, 1], got {}", self.mutation_rate));
        }
        if !is_rate(self.crossover_rate) {
            return invalid(format!(
                "crossover_rate must be in [0, 1], got {}",
                self.crossover_rate
            ));
        }
        if self.tournament_size == 0 {
            return invalid("tournament_size must be at least 1".to_string());
        }
        if self.elite_count >= self.population_size {
            return invalid(format!(
                "elite_count {} must be smaller than population_size {}",
                self.elite_count, self.population_size
            ));
        }
        if !(self.spacing.is_finite() && self.spacing >= 0.0) {
            return invalid(format!("spacing must be finite and non-negative, got {}", self.spacing));
        }
        Ok(())
    }
}
