//! A Dirichlet process mixture sampler for discovering short recurring motifs
//! embedded in a background of unrelated sequence.
//!
//! Sequence positions are partitioned between a single background cluster and
//! an unbounded number of foreground (motif) clusters, each carrying its own
//! component model. Inference runs a hybrid scheme: single-site Gibbs sweeps,
//! cluster-level Metropolis-Hastings shift moves, and block moves that
//! reassign a whole cluster at once, with an optional simulated-annealing
//! burn-in. Several independent chains can be run as a population with
//! replica exchange.

pub mod command;
pub mod data;
pub mod mcmc;
pub mod models;

mod utils;
