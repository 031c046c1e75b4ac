use std::{fmt, ops::Range};

use log::debug;

use crate::error::{RecordError, Result};

/// The two kinds of masked blocks stored per sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskKind {
    /// Unknown bases, decoded as `N`
    Hard,
    /// Low-confidence or repetitive bases (lower case in the source assembly)
    Soft,
}
impl MaskKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hard => "hard-masked",
            Self::Soft => "soft-masked",
        }
    }
}
impl fmt::Display for MaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sorted, disjoint half-open intervals of one sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskBlocks {
    blocks: Vec<Range<u32>>,
}
impl MaskBlocks {
    /// Builds the block list from the on-disk start and size tables
    ///
    /// Zero-length blocks carry no positions and are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if a block ends past `dna_size` (or overflows), or if blocks are
    /// not sorted ascending and disjoint.
    pub fn from_tables(kind: MaskKind, starts: &[u32], sizes: &[u32], dna_size: u32) -> Result<Self> {
        let mut blocks: Vec<Range<u32>> = Vec::with_capacity(starts.len());
        for (i, (&start, &size)) in starts.iter().zip(sizes).enumerate() {
            if size == 0 {
                debug!("Skipping empty {kind} block at {start}");
                continue;
            }
            let end = start
                .checked_add(size)
                .filter(|&end| end <= dna_size)
                .ok_or(RecordError::BlockOutOfBounds {
                    kind: kind.as_str(),
                    start,
                    size,
                    dna_size,
                })?;
            if blocks.last().is_some_and(|prev| start < prev.end) {
                return Err(RecordError::UnsortedBlocks(kind.as_str(), i).into());
            }
            blocks.push(start..end);
        }
        Ok(Self { blocks })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All stored blocks in ascending order
    #[must_use]
    pub fn as_slice(&self) -> &[Range<u32>] {
        &self.blocks
    }

    /// Number of positions covered by all blocks
    #[must_use]
    pub fn total_len(&self) -> u64 {
        self.blocks.iter().map(|b| u64::from(b.end - b.start)).sum()
    }

    /// Blocks overlapping `range`, clipped to its boundaries, in ascending order
    pub fn overlapping(&self, range: Range<u32>) -> impl Iterator<Item = Range<u32>> + '_ {
        let Range { start, end } = range;
        let first = self.blocks.partition_point(|b| b.end <= start);
        self.blocks[first..]
            .iter()
            .take_while(move |b| b.start < end)
            .map(move |b| b.start.max(start)..b.end.min(end))
            .filter(|b| b.start < b.end)
    }

    /// The clipped blocks overlapping `range`; empty when nothing overlaps
    #[must_use]
    pub fn query(&self, range: Range<u32>) -> Vec<Range<u32>> {
        self.overlapping(range).collect()
    }

    /// Positions of `range` covered by no block, as ascending intervals
    #[must_use]
    pub fn gaps(&self, range: Range<u32>) -> Vec<Range<u32>> {
        let mut gaps = Vec::new();
        let mut pos = range.start;
        for block in self.overlapping(range.clone()) {
            if block.start > pos {
                gaps.push(pos..block.start);
            }
            pos = block.end;
        }
        if pos < range.end {
            gaps.push(pos..range.end);
        }
        gaps
    }

    /// Number of positions of `range` covered by a block
    #[must_use]
    pub fn covered_len(&self, range: Range<u32>) -> u64 {
        self.overlapping(range)
            .map(|b| u64::from(b.end - b.start))
            .sum()
    }

    /// Returns true if `pos` falls inside a block
    #[must_use]
    pub fn contains(&self, pos: u32) -> bool {
        self.overlapping(pos..pos.saturating_add(1)).next().is_some()
    }
}
