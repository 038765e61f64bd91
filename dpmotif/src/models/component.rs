use crate::data::range::{Range, RangeSet};

/// The statistical model attached to a single cluster.
///
/// A model owns whatever sufficient statistics it needs; the partition feeds
/// it observations through `add`/`remove` and scores candidate assignments
/// through `log_predictive`. `add` and `remove` return the number of
/// observation units the range contributes to the cluster size (one per site
/// for a motif model, one per position for a background model); `count`
/// reports the same number without mutating.
///
/// `log_predictive` may be arbitrarily expensive; callers score each
/// candidate at most once per decision.
pub trait ComponentModel: Clone {
    /// Observe a range. Returns the number of observation units added.
    fn add(&mut self, range: &Range) -> usize;

    /// Forget a range. Returns the number of observation units removed.
    fn remove(&mut self, range: &Range) -> usize;

    /// The number of observation units `range` contributes.
    fn count(&self, range: &Range) -> usize;

    /// Joint posterior predictive probability of a set of ranges, in log
    /// space, given the currently observed data.
    fn log_predictive(&self, set: &RangeSet) -> f64;

    /// Posterior predictive probability of a set of ranges.
    fn predictive(&self, set: &RangeSet) -> f64 {
        self.log_predictive(set).exp()
    }

    /// Log marginal likelihood of everything the model has observed.
    fn log_likelihood(&self) -> f64;
}
