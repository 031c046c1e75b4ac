//! Per-sequence records
//!
//! Each sequence record lives at the offset named by the index and is laid out as:
//!
//! | Size (bytes)          | Name             | Description                              |
//! | --------------------- | ---------------- | ---------------------------------------- |
//! | 4                     | dna_size         | Number of bases                          |
//! | 4                     | n_block_count    | Number of hard-masked blocks             |
//! | 4 * n_block_count     | n_block_starts   | Block starts                             |
//! | 4 * n_block_count     | n_block_sizes    | Block sizes                              |
//! | 4                     | mask_block_count | Number of soft-masked blocks             |
//! | 4 * mask_block_count  | mask_block_starts| Block starts                             |
//! | 4 * mask_block_count  | mask_block_sizes | Block sizes                              |
//! | 4                     | reserved         | Always zero                              |
//! | ceil(dna_size / 4)    | packed_dna       | 2 bits per base, 4 bases per byte        |

mod blocks;

pub use blocks::{MaskBlocks, MaskKind};

use log::debug;

use crate::{
    decode::BASES_PER_BYTE,
    error::{RecordError, Result},
    source::{ByteReader, ByteSource},
};

/// Decoded description of one sequence record
///
/// Created lazily the first time a sequence is queried and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    /// Number of bases in the sequence
    dna_size: u32,

    /// Hard-masked (`N`) blocks
    hard: MaskBlocks,

    /// Soft-masked blocks (only when the session tracks soft masking)
    soft: Option<MaskBlocks>,

    /// Absolute offset of the first packed byte
    payload_offset: u64,
}
impl SequenceRecord {
    /// Decodes the record starting at `offset`
    ///
    /// The soft-mask table is always present on disk; it is parsed only when
    /// `track_soft_mask` is set and otherwise stepped over.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The record is truncated
    /// * A block table is inconsistent with `dna_size`
    /// * The packed bases extend past the end of the source
    pub fn from_reader<S: ByteSource>(
        reader: &ByteReader<S>,
        name: &str,
        offset: u64,
        track_soft_mask: bool,
    ) -> Result<Self> {
        let mut pos = offset;
        let dna_size = reader.read_u32(pos)?;
        pos += 4;

        let hard = Self::read_blocks(reader, &mut pos, MaskKind::Hard, dna_size)?;

        let soft = if track_soft_mask {
            Some(Self::read_blocks(reader, &mut pos, MaskKind::Soft, dna_size)?)
        } else {
            let mask_block_count = reader.read_u32(pos)?;
            pos += 4 + 8 * u64::from(mask_block_count);
            None
        };

        // reserved
        reader.read_u32(pos)?;
        pos += 4;

        let needed = u64::from(dna_size).div_ceil(BASES_PER_BYTE);
        if pos + needed > reader.len() {
            return Err(RecordError::TruncatedPayload {
                name: name.to_string(),
                offset: pos,
                needed,
                file_size: reader.len(),
            }
            .into());
        }

        debug!(
            "Loaded record {name}: {dna_size} bp, {} hard-masked blocks, payload at {pos}",
            hard.len()
        );
        Ok(Self {
            dna_size,
            hard,
            soft,
            payload_offset: pos,
        })
    }

    /// Reads a block count followed by its start and size tables, advancing `pos`
    fn read_blocks<S: ByteSource>(
        reader: &ByteReader<S>,
        pos: &mut u64,
        kind: MaskKind,
        dna_size: u32,
    ) -> Result<MaskBlocks> {
        let count = reader.read_u32(*pos)? as usize;
        *pos += 4;
        let starts = reader.read_u32_array(*pos, count)?;
        *pos += 4 * count as u64;
        let sizes = reader.read_u32_array(*pos, count)?;
        *pos += 4 * count as u64;
        MaskBlocks::from_tables(kind, &starts, &sizes, dna_size)
    }

    /// Number of bases in the sequence
    #[must_use]
    pub fn len(&self) -> u32 {
        self.dna_size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dna_size == 0
    }

    #[must_use]
    pub fn hard_blocks(&self) -> &MaskBlocks {
        &self.hard
    }

    /// Soft-masked blocks, if the session tracks them
    #[must_use]
    pub fn soft_blocks(&self) -> Option<&MaskBlocks> {
        self.soft.as_ref()
    }

    /// Blocks of the requested kind, if available
    #[must_use]
    pub fn blocks(&self, kind: MaskKind) -> Option<&MaskBlocks> {
        match kind {
            MaskKind::Hard => Some(&self.hard),
            MaskKind::Soft => self.soft.as_ref(),
        }
    }

    /// Absolute offset of the first packed byte
    #[must_use]
    pub fn payload_offset(&self) -> u64 {
        self.payload_offset
    }
}
