use std::sync::mpsc::{channel, Receiver, Sender};

use itertools::Itertools;

use crate::data::partition::ClusterTag;
use crate::mcmc::hybrid::HybridSampler;
use crate::models::component::ComponentModel;
use crate::models::prior::ProcessPrior;

/// An opaque control command executed against a sampler at a sweep
/// boundary. Commands run exactly once, in arrival order; each result
/// string is pushed onto the output queue in the same order.
pub type Command<M, P> = Box<dyn FnOnce(&mut HybridSampler<M, P>) -> String + Send>;

/// A fresh command queue for one chain.
#[must_use]
pub fn command_channel<M: ComponentModel, P: ProcessPrior>(
) -> (Sender<Command<M, P>>, Receiver<Command<M, P>>) {
    channel()
}

/// A fresh output queue; the sender side may be shared by several chains.
#[must_use]
pub fn output_channel() -> (Sender<String>, Receiver<String>) {
    channel()
}

/// Report the number of used clusters and foreground sites.
#[must_use]
pub fn cluster_counts<M: ComponentModel, P: ProcessPrior>() -> Command<M, P> {
    Box::new(|sampler| {
        let partition = sampler.partition();
        format!(
            "clusters: {} used, {} foreground sites",
            partition.n_used(),
            partition.foreground_sites()
        )
    })
}

/// List the member ranges of one cluster.
#[must_use]
pub fn cluster_members<M: ComponentModel, P: ProcessPrior>(tag: ClusterTag) -> Command<M, P> {
    Box::new(move |sampler| {
        let partition = sampler.partition();
        if partition.is_background(tag) {
            return format!("cluster {tag}: background, {} observations", partition.cluster(tag).size());
        }
        let members = partition
            .cluster(tag)
            .members()
            .iter()
            .map(|r| format!("({}, {})", r.sequence, r.position))
            .format(" ");
        format!("cluster {tag}: {members}")
    })
}

/// Report the current log likelihood.
#[must_use]
pub fn likelihood<M: ComponentModel, P: ProcessPrior>() -> Command<M, P> {
    Box::new(|sampler| format!("likelihood: {:.6}", sampler.partition().likelihood()))
}

/// Report the current log posterior.
#[must_use]
pub fn posterior<M: ComponentModel, P: ProcessPrior>() -> Command<M, P> {
    Box::new(|sampler| format!("posterior: {:.6}", sampler.posterior()))
}

/// Live parameter edit: switch greedy (arg-max) sampling on or off.
#[must_use]
pub fn set_optimize<M: ComponentModel, P: ProcessPrior>(optimize: bool) -> Command<M, P> {
    Box::new(move |sampler| {
        sampler.set_optimize(optimize);
        format!("optimize: {optimize}")
    })
}
