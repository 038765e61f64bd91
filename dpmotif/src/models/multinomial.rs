use std::sync::Arc;

use special::Gamma as _;

use crate::data::range::{Range, RangeSet};
use crate::data::sequences::SequenceData;
use crate::models::component::ComponentModel;

/// Product-Dirichlet multinomial over sequence codes.
///
/// A foreground instance has one pseudocount column per motif position and
/// only accepts ranges of exactly that width. A background instance has a
/// single column shared by every position and accepts ranges of any length.
#[derive(Clone, Debug)]
pub struct Multinomial {
    alpha: Vec<Vec<f64>>,
    alpha_sums: Vec<f64>,
    counts: Vec<Vec<f64>>,
    width: usize,
    data: Arc<SequenceData>,
}

impl Multinomial {
    /// # Panics
    /// Panics if `alpha` is empty, a column size does not match the alphabet,
    /// or any pseudocount is not positive.
    #[must_use]
    pub fn new(alpha: Vec<Vec<f64>>, data: Arc<SequenceData>) -> Self {
        assert!(!alpha.is_empty(), "pseudocount matrix must not be empty");
        for column in &alpha {
            assert_eq!(
                column.len(),
                data.alphabet(),
                "pseudocount column size must match the alphabet"
            );
            assert!(
                column.iter().all(|&a| a > 0.0),
                "pseudocounts must be positive"
            );
        }

        let alpha_sums = alpha.iter().map(|c| c.iter().sum()).collect();
        let counts = alpha.iter().map(|c| vec![0.0; c.len()]).collect();
        let width = alpha.len();

        Self {
            alpha,
            alpha_sums,
            counts,
            width,
            data,
        }
    }

    /// A position-independent background model with a single pseudocount
    /// column.
    #[must_use]
    pub fn background(alpha: Vec<f64>, data: Arc<SequenceData>) -> Self {
        Self::new(vec![alpha], data)
    }

    /// A foreground model of the given width with a symmetric pseudocount.
    #[must_use]
    pub fn uniform(width: usize, pseudocount: f64, data: Arc<SequenceData>) -> Self {
        let alphabet = data.alphabet();
        Self::new(vec![vec![pseudocount; alphabet]; width], data)
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Column a position within a range maps to.
    const fn column(&self, i: usize) -> usize {
        if self.width == 1 {
            0
        } else {
            i
        }
    }

    fn check_width(&self, range: &Range) {
        if self.width > 1 {
            assert_eq!(
                range.length, self.width,
                "range length must match the model width {}",
                self.width
            );
        }
    }

    fn ln_beta(column: &[f64]) -> f64 {
        let sum: f64 = column.iter().sum();
        column.iter().map(|&a| a.ln_gamma().0).sum::<f64>() - sum.ln_gamma().0
    }
}

impl ComponentModel for Multinomial {
    fn add(&mut self, range: &Range) -> usize {
        self.check_width(range);
        for (i, code) in self.data.codes(range).enumerate() {
            let column = self.column(i);
            self.counts[column][code] += 1.0;
        }
        self.count(range)
    }

    fn remove(&mut self, range: &Range) -> usize {
        self.check_width(range);
        for (i, code) in self.data.codes(range).enumerate() {
            let column = self.column(i);
            let count = &mut self.counts[column][code];
            assert!(
                *count >= 1.0,
                "removing an unobserved code {code} at column {i}"
            );
            *count -= 1.0;
        }
        self.count(range)
    }

    fn count(&self, range: &Range) -> usize {
        if self.width == 1 {
            range.length
        } else {
            1
        }
    }

    fn log_predictive(&self, set: &RangeSet) -> f64 {
        let mut counts = self.counts.clone();
        let mut count_sums: Vec<f64> = counts.iter().map(|c| c.iter().sum()).collect();

        let mut total = 0.0;
        for range in set.iter() {
            self.check_width(range);
            for (i, code) in self.data.codes(range).enumerate() {
                let column = self.column(i);
                let p = (counts[column][code] + self.alpha[column][code])
                    / (count_sums[column] + self.alpha_sums[column]);
                total += p.ln();
                counts[column][code] += 1.0;
                count_sums[column] += 1.0;
            }
        }
        total
    }

    fn log_likelihood(&self) -> f64 {
        self.alpha
            .iter()
            .zip(&self.counts)
            .map(|(alpha, counts)| {
                let posterior: Vec<f64> =
                    alpha.iter().zip(counts).map(|(a, c)| a + c).collect();
                Self::ln_beta(&posterior) - Self::ln_beta(alpha)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rv::misc::LogSumExp;

    use super::Multinomial;
    use crate::data::range::{Range, RangeSet};
    use crate::data::sequences::SequenceData;
    use crate::models::component::ComponentModel;

    fn toy_data() -> Arc<SequenceData> {
        Arc::new(SequenceData::new(
            vec![vec![0, 1, 2, 3, 0, 1, 2, 3], vec![0, 0, 1, 1, 2, 2, 3, 3]],
            4,
        ))
    }

    #[test]
    fn predictive_normalizes_over_the_alphabet() {
        let data = Arc::new(SequenceData::new(vec![vec![0, 1, 2, 3]], 4));
        let mut model = Multinomial::background(vec![0.5, 1.0, 1.5, 2.0], Arc::clone(&data));
        model.add(&Range::new(0, 0, 3));

        // a single unit range takes each code with total probability one
        let total = (0..4)
            .map(|p| model.log_predictive(&RangeSet::singleton(Range::new(0, p, 1))))
            .logsumexp();
        assert::close(total, 0.0, 1e-9);
    }

    #[test]
    fn add_remove_restores_the_counts() {
        let data = toy_data();
        let mut model = Multinomial::uniform(4, 1.0, Arc::clone(&data));
        let before = model.log_likelihood();

        let range = Range::new(0, 2, 4);
        assert_eq!(model.add(&range), 1);
        assert!((model.log_likelihood() - before).abs() > 1e-12);
        assert_eq!(model.remove(&range), 1);
        assert::close(model.log_likelihood(), before, 1e-12);
    }

    #[test]
    fn background_counts_every_position() {
        let data = toy_data();
        let mut model = Multinomial::background(vec![1.0; 4], Arc::clone(&data));
        assert_eq!(model.add(&Range::new(1, 0, 8)), 8);
        assert_eq!(model.count(&Range::new(1, 0, 8)), 8);
    }

    #[test]
    fn joint_predictive_is_sequential() {
        let data = toy_data();
        let mut model = Multinomial::uniform(4, 1.0, Arc::clone(&data));

        let first = Range::new(0, 0, 4);
        let second = Range::new(0, 4, 4);
        let set = RangeSet::from_ranges([first, second]);

        let joint = model.log_predictive(&set);

        let one = model.log_predictive(&RangeSet::singleton(first));
        model.add(&first);
        let two = model.log_predictive(&RangeSet::singleton(second));
        model.remove(&first);

        assert::close(joint, one + two, 1e-12);
    }

    #[test]
    #[should_panic(expected = "match the model width")]
    fn foreground_rejects_mismatched_width() {
        let data = toy_data();
        let model = Multinomial::uniform(4, 1.0, data);
        model.log_predictive(&RangeSet::singleton(Range::new(0, 0, 3)));
    }

    #[test]
    fn likelihood_prefers_matching_observations() {
        let data = Arc::new(SequenceData::new(
            vec![vec![0, 1, 2, 3], vec![0, 1, 2, 3], vec![3, 2, 1, 0]],
            4,
        ));

        let mut consistent = Multinomial::uniform(4, 1.0, Arc::clone(&data));
        consistent.add(&Range::new(0, 0, 4));
        consistent.add(&Range::new(1, 0, 4));

        let mut inconsistent = Multinomial::uniform(4, 1.0, Arc::clone(&data));
        inconsistent.add(&Range::new(0, 0, 4));
        inconsistent.add(&Range::new(2, 0, 4));

        assert!(consistent.log_likelihood() > inconsistent.log_likelihood());
    }
}
