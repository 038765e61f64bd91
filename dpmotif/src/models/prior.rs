use special::Gamma as _;

use crate::data::partition::OccupancyStats;

/// The process prior supplying the weight for joining or opening a
/// foreground cluster.
///
/// Priors see only occupancy counts, never partition internals. The
/// `multiplicity` argument generalizes the single-site predictive to block
/// moves: the returned value is the log probability of adding `multiplicity`
/// members to the cluster one after another.
pub trait ProcessPrior {
    /// Log predictive probability of adding `multiplicity` members to a
    /// cluster of the given size (zero for a new cluster).
    fn log_predictive(
        &self,
        cluster_size: usize,
        stats: &OccupancyStats,
        multiplicity: usize,
    ) -> f64;

    /// Log density of the full foreground partition under the prior, up to a
    /// model-independent constant.
    fn joint(&self, stats: &OccupancyStats, cluster_sizes: &[usize]) -> f64;
}

/// One predictive step shared by every prior below.
#[allow(clippy::cast_precision_loss)]
fn sequential<F>(cluster_size: usize, stats: &OccupancyStats, multiplicity: usize, step: F) -> f64
where
    F: Fn(f64, f64, f64) -> f64,
{
    let mut size = cluster_size as f64;
    let mut k = stats.foreground_clusters as f64;
    let mut n = stats.foreground_sites as f64;
    let mut total = 0.0;

    for _ in 0..multiplicity {
        total += step(size, k, n);
        if size == 0.0 {
            k += 1.0;
        }
        size += 1.0;
        n += 1.0;
    }

    total
}

/// Pitman-Yor process prior with concentration `alpha` and discount `d`:
/// an empty cluster weighs `(alpha + d K) / (N + alpha)`, an occupied one
/// `(|c| - d) / (N + alpha)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PitmanYor {
    pub alpha: f64,
    pub discount: f64,
}

impl PitmanYor {
    /// # Panics
    /// Panics unless `alpha > 0` and `0 <= discount < 1`.
    #[must_use]
    pub fn new(alpha: f64, discount: f64) -> Self {
        assert!(alpha > 0.0, "concentration must be positive");
        assert!(
            (0.0..1.0).contains(&discount),
            "discount must lie in [0, 1)"
        );
        Self { alpha, discount }
    }
}

impl ProcessPrior for PitmanYor {
    fn log_predictive(
        &self,
        cluster_size: usize,
        stats: &OccupancyStats,
        multiplicity: usize,
    ) -> f64 {
        let (alpha, discount) = (self.alpha, self.discount);
        sequential(cluster_size, stats, multiplicity, |size, k, n| {
            if size == 0.0 {
                discount.mul_add(k, alpha).ln() - (n + alpha).ln()
            } else {
                (size - discount).ln() - (n + alpha).ln()
            }
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn joint(&self, stats: &OccupancyStats, cluster_sizes: &[usize]) -> f64 {
        let n = stats.foreground_sites as f64;
        let base = self.alpha.ln_gamma().0 - (n + self.alpha).ln_gamma().0;
        cluster_sizes
            .iter()
            .map(|&size| (size as f64).ln_gamma().0)
            .sum::<f64>()
            + base
    }
}

/// A uniform process: every occupied cluster weighs the same, a new one
/// `alpha` times as much.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformPrior {
    pub alpha: f64,
}

impl UniformPrior {
    /// # Panics
    /// Panics unless `alpha > 0`.
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        assert!(alpha > 0.0, "concentration must be positive");
        Self { alpha }
    }
}

impl ProcessPrior for UniformPrior {
    fn log_predictive(
        &self,
        cluster_size: usize,
        stats: &OccupancyStats,
        multiplicity: usize,
    ) -> f64 {
        let alpha = self.alpha;
        sequential(cluster_size, stats, multiplicity, |size, k, _n| {
            if size == 0.0 {
                alpha.ln() - (alpha + k).ln()
            } else {
                -(alpha + k).ln()
            }
        })
    }

    fn joint(&self, _stats: &OccupancyStats, _cluster_sizes: &[usize]) -> f64 {
        0.0
    }
}

/// Poppe's predictive rule: weights depend on the current number of clusters
/// and sites but carry no free parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoppePrior;

impl ProcessPrior for PoppePrior {
    fn log_predictive(
        &self,
        cluster_size: usize,
        stats: &OccupancyStats,
        multiplicity: usize,
    ) -> f64 {
        sequential(cluster_size, stats, multiplicity, |size, k, n| {
            if size == 0.0 {
                if k == 0.0 {
                    0.0
                } else if k == 1.0 {
                    -(n + 1.0).ln()
                } else {
                    (k * (k - 1.0) / (n * (n + 1.0))).ln()
                }
            } else if k == 1.0 {
                (n / (n + 1.0)).ln()
            } else {
                ((size + 1.0) / (n + 1.0) * (n - k + 1.0) / n).ln()
            }
        })
    }

    fn joint(&self, _stats: &OccupancyStats, _cluster_sizes: &[usize]) -> f64 {
        0.0
    }
}
