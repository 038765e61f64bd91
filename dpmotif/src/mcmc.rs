use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::partition::Partition;
use crate::models::component::ComponentModel;
use crate::models::prior::ProcessPrior;
use crate::utils::assert_finite;

pub mod hybrid;
pub mod pmcmc;
pub mod weights;

pub use hybrid::HybridSampler;
pub use pmcmc::PopulationMcmc;
pub use weights::{CandidateWeights, MixtureEngine};

/// Sampler configuration.
///
/// `lambda` is the prior probability that a position starts a foreground
/// site; the background carries the remaining `1 - lambda` mass per
/// position. `block_period` is the number of iterations between block
/// sweeps, zero disables them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DpmOptions {
    pub lambda: f64,
    pub initial_temperature: f64,
    pub optimize: bool,
    pub block_period: usize,
}

impl Default for DpmOptions {
    fn default() -> Self {
        Self {
            lambda: 0.01,
            initial_temperature: 1.0,
            optimize: false,
            block_period: 1,
        }
    }
}

impl DpmOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        if !(self.lambda > 0.0 && self.lambda < 1.0) {
            return Err(OptionsError::InvalidLambda(self.lambda));
        }
        if !(self.initial_temperature >= 1.0) {
            return Err(OptionsError::InvalidTemperature(self.initial_temperature));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum OptionsError {
    #[error("mixture weight lambda must lie strictly between 0 and 1, got {0}")]
    InvalidLambda(f64),
    #[error("initial temperature must be at least 1, got {0}")]
    InvalidTemperature(f64),
    #[error("temperature ladder must start at 1, stay at or above 1, and match the population size")]
    InvalidTemperatureLadder,
}

/// Burn-in temperature schedule: starts at `t0` and declines geometrically
/// to one over `burnin` iterations; one afterwards.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn annealing_temperature(iteration: usize, burnin: usize, t0: f64) -> f64 {
    if burnin == 0 || iteration >= burnin {
        1.0
    } else {
        t0 * (1.0 / t0).powf(iteration as f64 / burnin as f64)
    }
}

/// Per-sweep traces of one chain.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SamplingHistory {
    /// Fraction of positions that changed cluster per sweep.
    pub switches: Vec<f64>,
    pub likelihood: Vec<f64>,
    pub posterior: Vec<f64>,
    pub components: Vec<usize>,
    pub temperature: Vec<f64>,
}

/// Log posterior of a partition, up to a model-independent constant.
///
/// # Panics
/// Panics if the result is not finite.
pub fn log_posterior<M, P>(partition: &Partition<M>, prior: &P) -> f64
where
    M: ComponentModel,
    P: ProcessPrior,
{
    let sizes = partition.foreground_sizes();
    assert_finite(
        partition.likelihood() + prior.joint(&partition.occupancy(), &sizes),
        "posterior",
    )
}
