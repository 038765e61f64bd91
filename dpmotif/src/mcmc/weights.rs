use rand::Rng;
use rv::misc::{ln_pflip, LogSumExp};

use crate::data::partition::{ClusterTag, OccupancyStats, Partition};
use crate::data::range::RangeSet;
use crate::mcmc::{DpmOptions, OptionsError};
use crate::models::component::ComponentModel;
use crate::models::prior::ProcessPrior;
use crate::utils::assert_finite;

/// The categorical distribution over candidate target clusters, in log
/// space. Candidates are enumerated in a fixed order: used clusters first
/// (background leading), then one fresh cluster per baseline template, so a
/// fixed seed reproduces the same draws.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateWeights {
    pub tags: Vec<ClusterTag>,
    pub log_weights: Vec<f64>,
}

impl CandidateWeights {
    /// Log normalizer over all candidates.
    #[must_use]
    pub fn log_norm(&self) -> f64 {
        self.log_weights.iter().copied().logsumexp()
    }

    /// The normalized categorical distribution.
    #[must_use]
    pub fn normalized(&self) -> Vec<f64> {
        let norm = self.log_norm();
        self.log_weights.iter().map(|w| (w - norm).exp()).collect()
    }

    /// Draw a candidate proportionally to its weight.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> ClusterTag {
        self.tags[ln_pflip(&self.log_weights, false, rng)]
    }

    /// The candidate with the largest weight.
    ///
    /// # Panics
    /// Panics if any weight is NaN.
    #[must_use]
    pub fn argmax(&self) -> ClusterTag {
        let (index, _) = self
            .log_weights
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).expect("mixture weights must be comparable"))
            .expect("candidate list must not be empty");
        self.tags[index]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Computes the mixture distribution over {existing clusters, one new
/// cluster per baseline} for a candidate range set.
///
/// The background carries `1 - lambda` mass per covered position and no
/// process-prior term; foreground candidates carry `lambda` per site, the
/// baseline weight, the process prior, and the component-model predictive.
/// A foreground candidate narrower than the scored ranges absorbs a
/// matched-length prefix while the remainder is scored by the background
/// rule; candidates wider than the ranges are skipped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MixtureEngine {
    lambda: f64,
    log_lambda: f64,
    log_lambda_inv: f64,
}

impl MixtureEngine {
    pub fn new(options: &DpmOptions) -> Result<Self, OptionsError> {
        options.validate()?;
        Ok(Self {
            lambda: options.lambda,
            log_lambda: options.lambda.ln(),
            log_lambda_inv: (1.0 - options.lambda).ln(),
        })
    }

    #[must_use]
    pub const fn lambda(&self) -> f64 {
        self.lambda
    }

    /// The weight distribution for attaching `set` (currently unassigned) to
    /// each candidate cluster. Materializes one free cluster per eligible
    /// baseline; unchosen slots simply stay on the free list.
    ///
    /// # Panics
    /// Panics on an empty set or any non-finite weight.
    pub fn weights<M, P>(
        &self,
        partition: &mut Partition<M>,
        prior: &P,
        set: &RangeSet,
    ) -> CandidateWeights
    where
        M: ComponentModel,
        P: ProcessPrior,
    {
        assert!(!set.is_empty(), "mixture weights over an empty range set");

        let stats = partition.occupancy();
        let mut tags = Vec::with_capacity(partition.n_used() + partition.n_baselines());
        let mut log_weights = Vec::with_capacity(tags.capacity());

        for tag in partition.used().to_vec() {
            let weight = if partition.is_background(tag) {
                self.background_weight(partition, set)
            } else {
                let width = partition
                    .cluster(tag)
                    .width()
                    .expect("foreground cluster without width");
                if width > set.length() {
                    continue;
                }
                self.foreground_weight(partition, prior, &stats, tag, set)
            };
            tags.push(tag);
            log_weights.push(assert_finite(weight, "mixture weight"));
        }

        for baseline in 0..partition.n_baselines() {
            if partition.baseline_width(baseline) > set.length() {
                continue;
            }
            let tag = partition.next_free_cluster(baseline);
            let weight = self.foreground_weight(partition, prior, &stats, tag, set);
            tags.push(tag);
            log_weights.push(assert_finite(weight, "mixture weight"));
        }

        assert!(
            !tags.is_empty(),
            "no candidate clusters; the background must always be present"
        );

        CandidateWeights { tags, log_weights }
    }

    #[allow(clippy::cast_precision_loss)]
    fn background_weight<M: ComponentModel>(
        &self,
        partition: &Partition<M>,
        set: &RangeSet,
    ) -> f64 {
        // background observations are strand-less; score the forward reading
        let forward = RangeSet::from_ranges(set.iter().map(|r| r.forward()));
        let model = partition.cluster(partition.bg_cluster_tag()).model();
        set.total_len() as f64 * self.log_lambda_inv + model.log_predictive(&forward)
    }

    #[allow(clippy::cast_precision_loss)]
    fn foreground_weight<M, P>(
        &self,
        partition: &Partition<M>,
        prior: &P,
        stats: &OccupancyStats,
        tag: ClusterTag,
        set: &RangeSet,
    ) -> f64
    where
        M: ComponentModel,
        P: ProcessPrior,
    {
        let cluster = partition.cluster(tag);
        let width = cluster.width().expect("foreground cluster without width");
        let baseline = cluster
            .baseline()
            .expect("foreground cluster without baseline");

        let (heads, rest) = set.split_at(width);
        let mut weight = set.len() as f64 * self.log_lambda
            + partition.baseline_log_weight(baseline)
            + prior.log_predictive(cluster.size(), stats, set.len())
            + cluster.model().log_predictive(&heads);
        if let Some(rest) = rest {
            weight += self.background_weight(partition, &rest);
        }
        weight
    }
}
