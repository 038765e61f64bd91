use std::sync::mpsc::Sender;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use tracing::debug;

use crate::command::{command_channel, Command};
use crate::data::partition::Partition;
use crate::mcmc::hybrid::HybridSampler;
use crate::mcmc::{DpmOptions, OptionsError, SamplingHistory};
use crate::models::component::ComponentModel;
use crate::models::prior::ProcessPrior;

/// Log Metropolis acceptance for exchanging the complete states of two
/// chains at temperatures `ti` and `tj` with log posteriors `pi` and `pj`.
fn exchange_log_acceptance(ti: f64, tj: f64, pi: f64, pj: f64) -> f64 {
    (1.0 / ti - 1.0 / tj) * (pj - pi)
}

/// A population of independent chains, one worker thread per chain during a
/// sweep, with optional replica exchange over a temperature ladder.
///
/// Chains share no mutable state; each owns its partition, RNG, and command
/// queue, and all push results onto one shared output queue. Exchanges swap
/// complete partition states between two randomly chosen chains, never
/// partial state, and only between sweeps.
pub struct PopulationMcmc<M: ComponentModel, P: ProcessPrior> {
    chains: Vec<HybridSampler<M, P>>,
    rng: Xoshiro256Plus,
    tempered: bool,
    exchanges_attempted: usize,
    exchanges_accepted: usize,
}

impl<M, P> PopulationMcmc<M, P>
where
    M: ComponentModel + Send,
    P: ProcessPrior + Send,
{
    /// Build `size` chains. `chain(i)` supplies each chain's partition and
    /// prior; the command sender for every chain is returned alongside.
    ///
    /// A temperature ladder, if given, must match the population size, start
    /// at one, and stay at or above one.
    ///
    /// # Panics
    /// Panics if `size` is zero.
    pub fn new<F>(
        size: usize,
        options: &DpmOptions,
        seed: u64,
        temperatures: Option<Vec<f64>>,
        output: Sender<String>,
        mut chain: F,
    ) -> Result<(Self, Vec<Sender<Command<M, P>>>), OptionsError>
    where
        F: FnMut(usize) -> (Partition<M>, P),
    {
        assert!(size >= 1, "population must contain at least one chain");

        let ladder = match temperatures {
            Some(ladder) => {
                if ladder.len() != size
                    || ladder.first() != Some(&1.0)
                    || ladder.iter().any(|&t| t < 1.0)
                {
                    return Err(OptionsError::InvalidTemperatureLadder);
                }
                ladder
            }
            None => vec![1.0; size],
        };
        let tempered = ladder.iter().any(|&t| t > 1.0);

        let mut chains = Vec::with_capacity(size);
        let mut senders = Vec::with_capacity(size);
        for (i, temperature) in ladder.into_iter().enumerate() {
            let (sender, receiver) = command_channel();
            let (partition, prior) = chain(i);
            let mut sampler = HybridSampler::new(
                format!("sampler {}", i + 1),
                partition,
                prior,
                options,
                seed.wrapping_add(i as u64),
                receiver,
                output.clone(),
            )?;
            sampler.set_base_temperature(temperature);
            chains.push(sampler);
            senders.push(sender);
        }

        Ok((
            Self {
                chains,
                rng: Xoshiro256Plus::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15),
                tempered,
                exchanges_attempted: 0,
                exchanges_accepted: 0,
            },
            senders,
        ))
    }

    /// Run every chain for `burnin` annealed plus `n` sampling iterations.
    /// Chains sweep concurrently; a replica exchange is attempted after each
    /// iteration when a non-trivial temperature ladder is configured.
    pub fn sample(&mut self, n: usize, burnin: usize) {
        for iteration in 0..n + burnin {
            std::thread::scope(|scope| {
                for chain in &mut self.chains {
                    scope.spawn(move || chain.sweep(iteration, burnin));
                }
            });
            if self.tempered && self.chains.len() > 1 {
                self.exchange();
            }
        }
    }

    /// Attempt one exchange between two random distinct chains.
    fn exchange(&mut self) {
        self.exchanges_attempted += 1;

        let size = self.chains.len();
        let first = self.rng.random_range(0..size);
        let second = {
            let other = self.rng.random_range(0..size - 1);
            if other >= first {
                other + 1
            } else {
                other
            }
        };
        let (i, j) = (first.min(second), first.max(second));

        let ti = self.chains[i].base_temperature();
        let tj = self.chains[j].base_temperature();
        let pi = self.chains[i].posterior();
        let pj = self.chains[j].posterior();

        let log_rho = exchange_log_acceptance(ti, tj, pi, pj);
        if self.rng.random::<f64>() < log_rho.exp() {
            let (head, tail) = self.chains.split_at_mut(j);
            std::mem::swap(head[i].partition_mut(), tail[0].partition_mut());
            self.exchanges_accepted += 1;
            debug!(i, j, "replica exchange accepted");
        }
    }

    #[must_use]
    pub fn chains(&self) -> &[HybridSampler<M, P>] {
        &self.chains
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.chains.len()
    }

    /// Per-chain sweep traces.
    #[must_use]
    pub fn history(&self) -> Vec<&SamplingHistory> {
        self.chains.iter().map(HybridSampler::history).collect()
    }

    /// Site probabilities averaged over the population.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn site_probabilities(&self) -> Vec<Vec<f64>> {
        let size = self.chains.len() as f64;
        let mut averaged: Vec<Vec<f64>> = self.chains[0]
            .site_probabilities()
            .iter()
            .map(|row| vec![0.0; row.len()])
            .collect();

        for chain in &self.chains {
            for (sum_row, row) in averaged.iter_mut().zip(chain.site_probabilities()) {
                for (sum, value) in sum_row.iter_mut().zip(row) {
                    *sum += value / size;
                }
            }
        }

        averaged
    }

    /// Fraction of attempted exchanges that were accepted.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn exchange_rate(&self) -> f64 {
        if self.exchanges_attempted == 0 {
            0.0
        } else {
            self.exchanges_accepted as f64 / self.exchanges_attempted as f64
        }
    }
}
