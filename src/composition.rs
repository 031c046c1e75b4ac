//! Base composition of a sequence range
//!
//! Hard-masked positions are never counted: their packed codes are placeholders.

/// Occurrences of each base over the non-masked positions of a range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseCounts {
    pub a: u64,
    pub c: u64,
    pub g: u64,
    pub t: u64,
}
impl BaseCounts {
    /// Builds counts from a tally indexed by 2-bit code (`T`, `C`, `A`, `G`)
    #[must_use]
    pub fn from_codes(codes: [u64; 4]) -> Self {
        Self {
            t: codes[0],
            c: codes[1],
            a: codes[2],
            g: codes[3],
        }
    }

    /// Number of positions counted
    #[must_use]
    pub fn total(&self) -> u64 {
        self.a + self.c + self.g + self.t
    }

    /// Count of a single base (case-insensitive); `None` for anything but `ACGT`
    #[must_use]
    pub fn get(&self, base: u8) -> Option<u64> {
        match base.to_ascii_uppercase() {
            b'A' => Some(self.a),
            b'C' => Some(self.c),
            b'G' => Some(self.g),
            b'T' => Some(self.t),
            _ => None,
        }
    }

    /// Fraction of counted positions that are `G` or `C` (0 when nothing was counted)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn gc_content(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => (self.g + self.c) as f64 / total as f64,
        }
    }

    /// Counts divided by the number of counted positions
    ///
    /// All frequencies are zero when nothing was counted.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn frequencies(&self) -> BaseFrequencies {
        let total = self.total();
        if total == 0 {
            return BaseFrequencies::default();
        }
        let total = total as f64;
        BaseFrequencies {
            a: self.a as f64 / total,
            c: self.c as f64 / total,
            g: self.g as f64 / total,
            t: self.t as f64 / total,
        }
    }

    /// `(base, count)` pairs in `A`, `C`, `G`, `T` order
    pub fn iter(&self) -> impl Iterator<Item = (char, u64)> {
        [('A', self.a), ('C', self.c), ('G', self.g), ('T', self.t)].into_iter()
    }
}

/// Relative frequency of each base over the non-masked positions of a range
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BaseFrequencies {
    pub a: f64,
    pub c: f64,
    pub g: f64,
    pub t: f64,
}
impl BaseFrequencies {
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.a + self.c + self.g + self.t
    }

    /// `(base, frequency)` pairs in `A`, `C`, `G`, `T` order
    pub fn iter(&self) -> impl Iterator<Item = (char, f64)> {
        [('A', self.a), ('C', self.c), ('G', self.g), ('T', self.t)].into_iter()
    }
}

/// Result of a composition query: raw counts or normalized frequencies
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Composition {
    Counts(BaseCounts),
    Frequencies(BaseFrequencies),
}
impl Composition {
    #[must_use]
    pub fn new(counts: BaseCounts, normalize: bool) -> Self {
        if normalize {
            Self::Frequencies(counts.frequencies())
        } else {
            Self::Counts(counts)
        }
    }

    #[must_use]
    pub fn as_counts(&self) -> Option<&BaseCounts> {
        match self {
            Self::Counts(counts) => Some(counts),
            Self::Frequencies(_) => None,
        }
    }

    #[must_use]
    pub fn as_frequencies(&self) -> Option<&BaseFrequencies> {
        match self {
            Self::Counts(_) => None,
            Self::Frequencies(freqs) => Some(freqs),
        }
    }
}
