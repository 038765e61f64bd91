use std::sync::mpsc::{Receiver, Sender};

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::data::partition::Partition;
use crate::data::range::{Range, RangeSet};
use crate::mcmc::weights::MixtureEngine;
use crate::mcmc::{annealing_temperature, log_posterior, DpmOptions, OptionsError, SamplingHistory};
use crate::models::component::ComponentModel;
use crate::models::prior::ProcessPrior;
use crate::utils::{assert_finite, NoPrettyPrint};

/// The hybrid sampler: single-site Gibbs sweeps, cluster-level
/// Metropolis-Hastings shift moves, and block moves that reassign a whole
/// cluster at once, followed by a command drain after every iteration.
///
/// One sampler owns one partition and one RNG; population runs hold several
/// independent samplers. Commands arrive over a channel and are executed
/// only at sweep boundaries, their results go to the output channel in
/// order.
pub struct HybridSampler<M: ComponentModel, P: ProcessPrior> {
    name: String,
    partition: Partition<M>,
    prior: P,
    engine: MixtureEngine,
    optimize: bool,
    block_period: usize,
    initial_temperature: f64,
    base_temperature: f64,
    temperature: f64,
    n_positions: usize,
    rng: Xoshiro256Plus,
    history: SamplingHistory,
    site_probabilities: Vec<Vec<f64>>,
    recorded_steps: usize,
    commands: Receiver<Command<M, P>>,
    output: Sender<String>,
}

impl<M, P> std::fmt::Debug for HybridSampler<M, P>
where
    M: ComponentModel,
    P: ProcessPrior,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSampler")
            .field("name", &self.name)
            .field("components", &self.partition.n_used())
            .field("foreground_sites", &self.partition.foreground_sites())
            .field("temperature", &self.temperature)
            .field("optimize", &self.optimize)
            .field("posterior", &NoPrettyPrint(&self.history.posterior))
            .finish_non_exhaustive()
    }
}

impl<M: ComponentModel, P: ProcessPrior> HybridSampler<M, P> {
    pub fn new(
        name: impl Into<String>,
        partition: Partition<M>,
        prior: P,
        options: &DpmOptions,
        seed: u64,
        commands: Receiver<Command<M, P>>,
        output: Sender<String>,
    ) -> Result<Self, OptionsError> {
        let engine = MixtureEngine::new(options)?;
        let site_probabilities = partition
            .assignments()
            .iter()
            .map(|row| vec![0.0; row.len()])
            .collect();
        let n_positions = partition.positions().len();

        let mut sampler = Self {
            name: name.into(),
            partition,
            prior,
            engine,
            optimize: options.optimize,
            block_period: options.block_period,
            initial_temperature: options.initial_temperature,
            base_temperature: 1.0,
            temperature: 1.0,
            n_positions,
            rng: Xoshiro256Plus::seed_from_u64(seed),
            history: SamplingHistory::default(),
            site_probabilities,
            recorded_steps: 0,
            commands,
            output,
        };
        sampler.record_history(0.0);
        Ok(sampler)
    }

    // reporting surface
    ////////////////////////////////////////////////////////////////////////

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn partition(&self) -> &Partition<M> {
        &self.partition
    }

    pub(crate) fn partition_mut(&mut self) -> &mut Partition<M> {
        &mut self.partition
    }

    /// Number of mixture components (used clusters).
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.partition.n_used()
    }

    #[must_use]
    pub const fn history(&self) -> &SamplingHistory {
        &self.history
    }

    /// Running per-position probability of foreground membership, averaged
    /// over post-burn-in sweeps.
    #[must_use]
    pub fn site_probabilities(&self) -> &[Vec<f64>] {
        &self.site_probabilities
    }

    #[must_use]
    pub const fn temperature(&self) -> f64 {
        self.temperature
    }

    #[must_use]
    pub const fn base_temperature(&self) -> f64 {
        self.base_temperature
    }

    pub(crate) fn set_base_temperature(&mut self, temperature: f64) {
        self.base_temperature = temperature;
        self.temperature = temperature;
    }

    /// Log posterior of the current partition.
    #[must_use]
    pub fn posterior(&self) -> f64 {
        log_posterior(&self.partition, &self.prior)
    }

    pub fn set_optimize(&mut self, optimize: bool) {
        self.optimize = optimize;
    }

    pub fn set_block_period(&mut self, period: usize) {
        self.block_period = period;
    }

    // sweeps
    ////////////////////////////////////////////////////////////////////////

    /// Resample every position once, in freshly shuffled order. Returns the
    /// number of positions that changed cluster.
    fn gibbs_sweep(&mut self) -> usize {
        let mut positions = self.partition.positions();
        positions.shuffle(&mut self.rng);

        let width = self.partition.site_width();
        let mut switched = 0;

        for (sequence, position) in positions {
            if !self.partition.valid_for_sampling(sequence, position) {
                continue;
            }

            let old = self.partition.release_site(sequence, position);
            let range = Range::new(sequence, position, width);
            let weights =
                self.engine
                    .weights(&mut self.partition, &self.prior, &RangeSet::singleton(range));
            let tag = if self.optimize {
                weights.argmax()
            } else {
                weights.draw(&mut self.rng)
            };
            self.partition.assign_with_split(&range, tag);

            if tag != old {
                switched += 1;
            }
        }

        switched
    }

    /// Propose one shift move per foreground cluster; accept by the
    /// tempered Metropolis rule. Returns the number of accepted moves.
    fn metropolis_sweep(&mut self) -> usize {
        let mut accepted = 0;

        for tag in self.partition.foreground_tags() {
            if self.partition.cluster(tag).size() <= 1 {
                continue;
            }

            let reference = self.posterior();
            let mut proposed = self.partition.clone();
            let right: bool = self.rng.random();
            let moved = if right {
                proposed.shift_right(tag)
            } else {
                proposed.shift_left(tag)
            };
            if !moved {
                continue;
            }

            let candidate = log_posterior(&proposed, &self.prior);
            let accept = if self.optimize {
                candidate > reference
            } else {
                let rho = assert_finite((candidate - reference) / self.temperature, "posterior difference");
                self.rng.random::<f64>() < rho.exp()
            };

            if accept {
                self.partition = proposed;
                accepted += 1;
                debug!(
                    name = %self.name,
                    cluster = tag,
                    direction = if right { "right" } else { "left" },
                    "metropolis move accepted"
                );
            }
        }

        accepted
    }

    /// Reassign every foreground cluster as one block: release all members,
    /// compute a single joint distribution, and move the whole set to the
    /// drawn destination. This merges clusters or dissolves one into the
    /// background in a single move.
    fn block_sweep(&mut self) {
        for tag in self.partition.foreground_tags() {
            if self.partition.cluster(tag).is_empty() {
                continue;
            }

            let set = self.partition.cluster(tag).range_set();
            for range in set.iter() {
                self.partition.release(range);
            }

            let weights = self.engine.weights(&mut self.partition, &self.prior, &set);
            let destination = if self.optimize {
                weights.argmax()
            } else {
                weights.draw(&mut self.rng)
            };

            for range in set.iter() {
                self.partition.assign_with_split(range, destination);
            }
        }
    }

    /// Execute every pending command against the current state, in order,
    /// exactly once.
    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            let result = command(self);
            if self.output.send(result).is_err() {
                warn!(name = %self.name, "output queue closed, dropping command result");
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn update_site_probabilities(&mut self) {
        let steps = self.recorded_steps as f64;
        let bg = self.partition.bg_cluster_tag();
        let partition = &self.partition;

        for (row, assignments) in self
            .site_probabilities
            .iter_mut()
            .zip(partition.assignments())
        {
            for (value, assignment) in row.iter_mut().zip(assignments) {
                let foreground = assignment.is_some_and(|tag| tag != bg);
                *value = if foreground {
                    steps.mul_add(*value, 1.0)
                } else {
                    steps * *value
                } / (steps + 1.0);
            }
        }
        self.recorded_steps += 1;
    }

    fn record_history(&mut self, switched: f64) {
        self.history.switches.push(switched);
        self.history.likelihood.push(self.partition.likelihood());
        self.history.posterior.push(self.posterior());
        self.history.components.push(self.partition.n_used());
        self.history.temperature.push(self.temperature);
    }

    /// One full iteration of the state machine: Gibbs, Metropolis, block
    /// (every `block_period` iterations), history update, command drain.
    #[allow(clippy::cast_precision_loss)]
    pub fn sweep(&mut self, iteration: usize, burnin: usize) {
        self.temperature = self.base_temperature
            * annealing_temperature(iteration, burnin, self.initial_temperature);

        let switched = self.gibbs_sweep();
        self.metropolis_sweep();
        if self.block_period > 0 && (iteration + 1) % self.block_period == 0 {
            self.block_sweep();
        }

        self.record_history(switched as f64 / self.n_positions as f64);
        if iteration >= burnin {
            self.update_site_probabilities();
        }
        self.drain_commands();
    }

    /// Run `burnin` annealed iterations followed by `n` sampling iterations.
    pub fn sample(&mut self, n: usize, burnin: usize) {
        for iteration in 0..n + burnin {
            info!(
                name = %self.name,
                iteration = iteration + 1,
                components = self.partition.n_used(),
                phase = if iteration < burnin { "burn in" } else { "sampling" },
                "sweep"
            );
            self.sweep(iteration, burnin);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;
    use std::sync::Arc;

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::HybridSampler;
    use crate::command::{command_channel, output_channel};
    use crate::data::partition::Partition;
    use crate::data::range::Range;
    use crate::data::sequences::SequenceData;
    use crate::mcmc::DpmOptions;
    use crate::models::multinomial::Multinomial;
    use crate::models::prior::PitmanYor;

    const MOTIF: [u8; 4] = [0, 1, 2, 3];
    const MOTIF_START: usize = 3;
    const SEQ_LEN: usize = 10;
    const N_SEQ: usize = 6;

    /// Sequences of random noise with the motif planted at a fixed offset.
    fn motif_data(seed: u64) -> Arc<SequenceData> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let sequences = (0..N_SEQ)
            .map(|_| {
                let mut sequence: Vec<u8> =
                    (0..SEQ_LEN).map(|_| rng.random_range(0..4)).collect();
                sequence[MOTIF_START..MOTIF_START + MOTIF.len()].copy_from_slice(&MOTIF);
                sequence
            })
            .collect();
        Arc::new(SequenceData::new(sequences, 4))
    }

    fn motif_partition(data: &Arc<SequenceData>) -> Partition<Multinomial> {
        let mut partition = Partition::new(
            &data.sizes(),
            MOTIF.len(),
            Multinomial::background(vec![1.0; 4], Arc::clone(data)),
        );
        partition.add_baseline(1.0, MOTIF.len(), Multinomial::uniform(4, 1.0, Arc::clone(data)));
        partition
    }

    fn sampler(
        data: &Arc<SequenceData>,
        options: &DpmOptions,
        seed: u64,
    ) -> HybridSampler<Multinomial, PitmanYor> {
        let (_tx, rx) = command_channel();
        let (out_tx, _out_rx) = output_channel();
        HybridSampler::new(
            "test sampler",
            motif_partition(data),
            PitmanYor::new(1.0, 0.0),
            options,
            seed,
            rx,
            out_tx,
        )
        .expect("options are valid")
    }

    #[test]
    fn fixed_seed_reproduces_the_chain() {
        let data = motif_data(0x1234);
        let options = DpmOptions {
            lambda: 0.2,
            ..DpmOptions::default()
        };

        let mut first = sampler(&data, &options, 7);
        let mut second = sampler(&data, &options, 7);

        first.sample(5, 2);
        second.sample(5, 2);

        assert_eq!(first.history(), second.history());
        assert_eq!(
            first.partition().assignments(),
            second.partition().assignments()
        );
        first.partition().check_invariants();
    }

    #[test]
    fn optimize_mode_keeps_a_converged_motif_cluster() {
        let data = motif_data(0x9e37);
        let options = DpmOptions {
            lambda: 0.2,
            optimize: true,
            ..DpmOptions::default()
        };
        let mut sampler = sampler(&data, &options, 11);

        // attach the planted motif of every sequence to one cluster
        let tag = sampler.partition_mut().next_free_cluster(0);
        for sequence in 0..N_SEQ {
            let site = Range::new(sequence, MOTIF_START, MOTIF.len());
            sampler.partition_mut().release(&site);
            sampler.partition_mut().assign(&site, tag);
        }
        sampler.partition().check_invariants();

        let reference = sampler.posterior();
        sampler.sample(3, 0);

        // the converged state is a fixed point of greedy sweeps
        assert!(sampler.posterior() >= reference);
        assert_eq!(sampler.cluster_count(), 2);
        let cluster = sampler.partition().cluster(tag);
        assert_eq!(cluster.size(), N_SEQ);
        for member in cluster.members() {
            assert_eq!(member.position, MOTIF_START);
        }
        assert::close(
            *sampler.history().switches.last().expect("history entry"),
            0.0,
            1e-12,
        );

        // post burn-in estimates see the motif window with certainty
        for sequence in 0..N_SEQ {
            for position in 0..SEQ_LEN {
                let inside =
                    (MOTIF_START..MOTIF_START + MOTIF.len()).contains(&position);
                let p = sampler.site_probabilities()[sequence][position];
                assert::close(p, if inside { 1.0 } else { 0.0 }, 1e-12);
            }
        }
    }

    #[test]
    fn block_moves_conserve_the_background() {
        let data = motif_data(0x5bd1);
        // a vanishing foreground weight forces every block move into the
        // background
        let options = DpmOptions {
            lambda: 1e-12,
            optimize: true,
            block_period: 1,
            ..DpmOptions::default()
        };
        let mut sampler = sampler(&data, &options, 3);

        let first = sampler.partition_mut().next_free_cluster(0);
        for sequence in 0..3 {
            let site = Range::new(sequence, MOTIF_START, MOTIF.len());
            sampler.partition_mut().release(&site);
            sampler.partition_mut().assign(&site, first);
        }
        let second = sampler.partition_mut().next_free_cluster(0);
        for sequence in 3..N_SEQ {
            let site = Range::new(sequence, MOTIF_START, MOTIF.len());
            sampler.partition_mut().release(&site);
            sampler.partition_mut().assign(&site, second);
        }
        assert_eq!(sampler.cluster_count(), 3);

        sampler.block_sweep();

        let partition = sampler.partition();
        assert_eq!(partition.used(), &[partition.bg_cluster_tag()]);
        assert_eq!(partition.foreground_sites(), 0);
        partition.check_invariants();
    }

    #[test]
    fn history_tracks_every_sweep() {
        let data = motif_data(0xda39);
        let options = DpmOptions {
            lambda: 0.1,
            initial_temperature: 8.0,
            ..DpmOptions::default()
        };
        let mut sampler = sampler(&data, &options, 23);

        sampler.sample(4, 3);

        let history = sampler.history();
        // one seed entry plus one per iteration
        assert_eq!(history.switches.len(), 8);
        assert_eq!(history.likelihood.len(), 8);
        assert_eq!(history.posterior.len(), 8);
        assert_eq!(history.components.len(), 8);
        assert_eq!(history.temperature.len(), 8);

        assert!(history.switches.iter().all(|&s| (0.0..=1.0).contains(&s)));
        // burn-in is annealed, the sampling phase runs cold
        assert::close(history.temperature[1], 8.0, 1e-12);
        assert!(history.temperature[2] < 8.0);
        assert::close(*history.temperature.last().expect("entry"), 1.0, 1e-12);

        sampler.partition().check_invariants();
    }

    #[test]
    fn sampling_finds_a_planted_motif() {
        let data = motif_data(0x1234);
        let options = DpmOptions {
            lambda: 0.3,
            ..DpmOptions::default()
        };
        let mut sampler = sampler(&data, &options, 42);

        sampler.sample(200, 20);
        sampler.partition().check_invariants();

        let probabilities = sampler.site_probabilities();
        let mut motif_mass = 0.0;
        let mut motif_count = 0u32;
        let mut noise_mass = 0.0;
        let mut noise_count = 0u32;
        for sequence in 0..N_SEQ {
            for position in 0..SEQ_LEN {
                let inside =
                    (MOTIF_START..MOTIF_START + MOTIF.len()).contains(&position);
                if inside {
                    motif_mass += probabilities[sequence][position];
                    motif_count += 1;
                } else {
                    noise_mass += probabilities[sequence][position];
                    noise_count += 1;
                }
            }
        }

        let motif_mean = motif_mass / f64::from(motif_count);
        let noise_mean = noise_mass / f64::from(noise_count);
        assert!(
            motif_mean > noise_mean,
            "planted motif not enriched: {motif_mean} <= {noise_mean}"
        );
    }

    #[test]
    fn commands_drain_in_order_at_sweep_boundaries() {
        let data = motif_data(0xfeed);
        let options = DpmOptions {
            lambda: 0.1,
            ..DpmOptions::default()
        };

        let (cmd_tx, cmd_rx) = command_channel();
        let (out_tx, out_rx) = channel();
        let mut sampler = HybridSampler::new(
            "command test",
            motif_partition(&data),
            PitmanYor::new(1.0, 0.0),
            &options,
            1,
            cmd_rx,
            out_tx,
        )
        .expect("options are valid");

        cmd_tx
            .send(Box::new(|_sampler: &mut HybridSampler<_, _>| "first".to_string()))
            .expect("queue is open");
        cmd_tx
            .send(Box::new(|sampler: &mut HybridSampler<_, _>| {
                format!("components: {}", sampler.cluster_count())
            }))
            .expect("queue is open");

        // nothing is executed before the sweep boundary
        assert!(out_rx.try_recv().is_err());

        sampler.sweep(0, 0);

        assert_eq!(out_rx.recv().expect("result"), "first");
        assert!(out_rx
            .recv()
            .expect("result")
            .starts_with("components: "));
        assert!(out_rx.try_recv().is_err());
    }
}
