use crate::data::range::Range;

/// Coded observation sequences shared by every component model of a run.
///
/// Sequences are ragged; each observation is a small integer code below the
/// alphabet size. For a four-letter alphabet, reverse-strand ranges read
/// positions back to front and complement the code (`3 - code`); for other
/// alphabets the codes are only read in reverse order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceData {
    sequences: Vec<Vec<u8>>,
    alphabet: usize,
}

impl SequenceData {
    /// # Panics
    /// Panics if any code is outside the alphabet.
    #[must_use]
    pub fn new(sequences: Vec<Vec<u8>>, alphabet: usize) -> Self {
        assert!(alphabet > 0, "alphabet must not be empty");
        for (i, sequence) in sequences.iter().enumerate() {
            for &code in sequence {
                assert!(
                    (code as usize) < alphabet,
                    "code {code} in sequence {i} exceeds alphabet size {alphabet}"
                );
            }
        }
        Self {
            sequences,
            alphabet,
        }
    }

    #[must_use]
    pub const fn alphabet(&self) -> usize {
        self.alphabet
    }

    /// Number of sequences.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.sequences.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Length of sequence `sequence`.
    #[must_use]
    pub fn size(&self, sequence: usize) -> usize {
        self.sequences[sequence].len()
    }

    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        self.sequences.iter().map(Vec::len).collect()
    }

    /// Total number of positions over all sequences.
    #[must_use]
    pub fn total(&self) -> usize {
        self.sequences.iter().map(Vec::len).sum()
    }

    /// Codes covered by `range`, in reading order.
    ///
    /// # Panics
    /// Panics if the range reaches past the end of its sequence.
    pub fn codes(&self, range: &Range) -> impl Iterator<Item = usize> + '_ {
        let sequence = &self.sequences[range.sequence];
        assert!(
            range.end() <= sequence.len(),
            "range {range:?} reaches past the end of its sequence"
        );

        let (start, length, reverse) = (range.position, range.length, range.reverse);
        let alphabet = self.alphabet;

        (0..length).map(move |i| {
            let index = if reverse { start + length - 1 - i } else { start + i };
            let code = sequence[index] as usize;
            if reverse && alphabet == 4 {
                3 - code
            } else {
                code
            }
        })
    }
}
