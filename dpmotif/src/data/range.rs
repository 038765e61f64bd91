use serde::{Deserialize, Serialize};

/// A contiguous span of observations within one sequence.
///
/// `reverse` marks a reverse-strand reading of the same positions; it does
/// not change which positions the range covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Range {
    pub sequence: usize,
    pub position: usize,
    pub length: usize,
    pub reverse: bool,
}

impl Range {
    #[must_use]
    pub const fn new(sequence: usize, position: usize, length: usize) -> Self {
        Self {
            sequence,
            position,
            length,
            reverse: false,
        }
    }

    #[must_use]
    pub const fn reversed(sequence: usize, position: usize, length: usize) -> Self {
        Self {
            sequence,
            position,
            length,
            reverse: true,
        }
    }

    /// First position after the range.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.position + self.length
    }

    /// The forward-strand reading of the same positions.
    #[must_use]
    pub const fn forward(&self) -> Self {
        Self::new(self.sequence, self.position, self.length)
    }

    /// Split into a prefix of `width` positions and the remainder.
    ///
    /// # Panics
    /// Panics if `width` is zero or exceeds the range length.
    #[must_use]
    pub fn split_at(&self, width: usize) -> (Self, Option<Self>) {
        assert!(
            width > 0 && width <= self.length,
            "cannot split a range of length {} at width {width}",
            self.length
        );

        let head = Self {
            length: width,
            ..*self
        };

        if width == self.length {
            (head, None)
        } else {
            let rest = Self {
                position: self.position + width,
                length: self.length - width,
                ..*self
            };
            (head, Some(rest))
        }
    }
}

/// An ordered collection of ranges of equal length, used for block moves
/// across the members of a cluster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RangeSet {
    ranges: Vec<Range>,
    length: usize,
}

impl RangeSet {
    #[must_use]
    pub fn singleton(range: Range) -> Self {
        Self {
            ranges: vec![range],
            length: range.length,
        }
    }

    /// Collect ranges into a set.
    ///
    /// # Panics
    /// Panics if the iterator is empty or the ranges have unequal lengths.
    pub fn from_ranges<I: IntoIterator<Item = Range>>(ranges: I) -> Self {
        let mut iter = ranges.into_iter();
        let first = iter
            .next()
            .expect("a range set must contain at least one range");
        let mut set = Self::singleton(first);
        for range in iter {
            set.push(range);
        }
        set
    }

    /// # Panics
    /// Panics if `range` does not match the set's member length.
    pub fn push(&mut self, range: Range) {
        assert_eq!(
            range.length, self.length,
            "range of length {} pushed into a set of length {}",
            range.length, self.length
        );
        self.ranges.push(range);
    }

    /// The common length of every member range.
    #[must_use]
    pub const fn length(&self) -> usize {
        self.length
    }

    /// Number of member ranges.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Total number of positions covered by all members.
    #[must_use]
    pub const fn total_len(&self) -> usize {
        self.ranges.len() * self.length
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Range> {
        self.ranges.iter()
    }

    /// Split every member at `width` into a matched-length prefix set and a
    /// remainder set. The remainder is `None` when `width` equals the member
    /// length.
    #[must_use]
    pub fn split_at(&self, width: usize) -> (Self, Option<Self>) {
        let mut heads = Vec::with_capacity(self.ranges.len());
        let mut rests = Vec::with_capacity(self.ranges.len());

        for range in &self.ranges {
            let (head, rest) = range.split_at(width);
            heads.push(head);
            if let Some(rest) = rest {
                rests.push(rest);
            }
        }

        let heads = Self {
            ranges: heads,
            length: width,
        };
        let rests = (!rests.is_empty()).then(|| Self {
            ranges: rests,
            length: self.length - width,
        });

        (heads, rests)
    }
}

impl From<Range> for RangeSet {
    fn from(range: Range) -> Self {
        Self::singleton(range)
    }
}
