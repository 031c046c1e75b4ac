//! Sequence name index
//!
//! The index directly follows the header and holds one entry per sequence:
//!
//! | Size (bytes) | Name        | Description                          |
//! | ------------ | ----------- | ------------------------------------ |
//! | 1            | name_size   | Length of the name in bytes          |
//! | name_size    | name        | Sequence name (not null terminated)  |
//! | 4            | offset      | Absolute offset of the sequence record |

use std::collections::HashMap;

use crate::{
    error::{IndexError, Result},
    header::{TwoBitHeader, SIZE_HEADER},
    source::{ByteReader, ByteSource},
};

/// Smallest possible index entry: an empty name and its offset
const MIN_ENTRY_SIZE: u64 = 5;

/// Mapping from sequence name to the offset of its record, in file order
#[derive(Debug, Clone, Default)]
pub struct SequenceIndex {
    names: Vec<String>,
    offsets: Vec<u64>,
    lookup: HashMap<String, usize>,
}
impl SequenceIndex {
    /// Reads `header.sequence_count` entries starting right after the header
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The index is truncated
    /// * A name is not valid UTF-8 or appears twice
    /// * A record offset lies outside of the file
    pub fn from_reader<S: ByteSource>(reader: &ByteReader<S>, header: &TwoBitHeader) -> Result<Self> {
        let file_size = reader.len();
        let count = header.sequence_count as usize;

        // a corrupt count must not reserve more entries than the file could hold
        let max_entries = file_size.saturating_sub(SIZE_HEADER as u64) / MIN_ENTRY_SIZE;
        let capacity = count.min(max_entries as usize);
        let mut index = Self {
            names: Vec::with_capacity(capacity),
            offsets: Vec::with_capacity(capacity),
            lookup: HashMap::with_capacity(capacity),
        };

        let mut pos = SIZE_HEADER as u64;
        for entry in 0..count {
            let name_size = reader.read_u8(pos)?;
            let raw_name = reader.read_bytes(pos + 1, name_size as usize)?;
            let name = String::from_utf8(raw_name).map_err(|_| IndexError::InvalidName(entry))?;
            pos += 1 + u64::from(name_size);

            let offset = u64::from(reader.read_u32(pos)?);
            pos += 4;
            if offset >= file_size {
                return Err(IndexError::OffsetOutOfBounds {
                    name,
                    offset,
                    file_size,
                }
                .into());
            }
            index.push(name, offset)?;
        }
        Ok(index)
    }

    fn push(&mut self, name: String, offset: u64) -> Result<()> {
        if self.lookup.contains_key(&name) {
            return Err(IndexError::DuplicateName(name).into());
        }
        self.lookup.insert(name.clone(), self.names.len());
        self.names.push(name);
        self.offsets.push(offset);
        Ok(())
    }

    /// Number of sequences
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of `name` in the index
    #[must_use]
    pub fn get(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    /// Name of the sequence at position `id`
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range
    #[must_use]
    pub fn name(&self, id: usize) -> &str {
        &self.names[id]
    }

    /// Record offset of the sequence at position `id`
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range
    #[must_use]
    pub fn offset(&self, id: usize) -> u64 {
        self.offsets[id]
    }

    /// Sequence names in file order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::{
        error::Error,
        fixtures::{FixtureBuilder, FOO_CHR1, FOO_CHR2},
        source::Endianness,
    };
    use anyhow::Result;

    fn load(bytes: Vec<u8>) -> crate::Result<SequenceIndex> {
        let header = TwoBitHeader::from_source(&bytes)?;
        let reader = ByteReader::new(bytes, header.endianness);
        SequenceIndex::from_reader(&reader, &header)
    }

    #[test]
    fn test_index_order_and_offsets() -> Result<()> {
        for endian in [Endianness::Little, Endianness::Big] {
            let bytes = FixtureBuilder::new(endian)
                .sequence("chr1", FOO_CHR1)
                .sequence("chr2", FOO_CHR2)
                .build();
            let index = load(bytes)?;
            assert_eq!(index.len(), 2);
            assert_eq!(index.names().collect::<Vec<_>>(), vec!["chr1", "chr2"]);
            assert_eq!(index.get("chr2"), Some(1));
            assert_eq!(index.get("chr3"), None);
            // header (16) + two entries of 1 + 4 + 4 bytes
            assert_eq!(index.offset(0), 34);
            assert_eq!(index.offset(1), 34 + 78);
        }
        Ok(())
    }

    #[test]
    fn test_duplicate_names() {
        let bytes = FixtureBuilder::new(Endianness::Little)
            .sequence("chr1", b"ACGT")
            .sequence("chr1", b"TTTT")
            .build();
        assert!(matches!(
            load(bytes),
            Err(Error::IndexError(IndexError::DuplicateName(name))) if name == "chr1"
        ));
    }

    #[test]
    fn test_offset_out_of_bounds() {
        let mut bytes = FixtureBuilder::new(Endianness::Little)
            .sequence("chr1", b"ACGT")
            .build();
        // rewrite the record offset of the only entry (after 16 + 1 + 4 bytes)
        bytes[21..25].copy_from_slice(&10_000u32.to_le_bytes());
        assert!(matches!(
            load(bytes),
            Err(Error::IndexError(IndexError::OffsetOutOfBounds { offset: 10_000, .. }))
        ));
    }

    #[test]
    fn test_truncated_index() {
        let mut bytes = FixtureBuilder::new(Endianness::Big)
            .sequence("chr1", b"ACGT")
            .build();
        bytes.truncate(20);
        assert!(matches!(load(bytes), Err(Error::IoError(_))));
    }

    #[test]
    fn test_corrupt_count_does_not_overallocate() {
        let mut bytes = FixtureBuilder::new(Endianness::Little)
            .sequence("chr1", b"ACGT")
            .build();
        bytes[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(load(bytes).is_err());
    }
}
