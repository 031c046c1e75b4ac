//! Header module for the seq2bit library
//!
//! A 2bit file starts with a fixed 16-byte header: a signature that also encodes the
//! byte order of every later multi-byte field, the format version, the number of
//! sequences, and a reserved field.

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    error::{HeaderError, Result},
    source::{ByteSource, Endianness},
};

/// 2bit signature as read from a file written in the reader's byte order
///
/// A little-endian file stores it as `43 27 41 1A`, a big-endian file as `1A 41 27 43`.
#[allow(clippy::unreadable_literal)]
pub const MAGIC: u32 = 0x1A412743;

/// The only defined version of the 2bit format
pub const VERSION: u32 = 0;

/// Size of the header in bytes
pub const SIZE_HEADER: usize = 16;

/// Header structure for 2bit files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoBitHeader {
    /// Byte order detected from the signature
    pub endianness: Endianness,

    /// Version of the file format (always [`VERSION`])
    ///
    /// 4 bytes
    pub version: u32,

    /// Number of sequences in the index
    ///
    /// 4 bytes
    pub sequence_count: u32,

    /// Reserved field (always zero)
    ///
    /// 4 bytes
    pub reserved: u32,
}
impl TwoBitHeader {
    /// Detects the byte order of a file from its 4-byte signature
    pub fn detect_endianness(signature: &[u8; 4]) -> Result<Endianness> {
        let raw = LittleEndian::read_u32(signature);
        if raw == MAGIC {
            Ok(Endianness::Little)
        } else if raw == MAGIC.swap_bytes() {
            Ok(Endianness::Big)
        } else {
            Err(HeaderError::InvalidMagicNumber(raw).into())
        }
    }

    /// Parses a header from a fixed-size byte array
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The signature is not the 2bit magic number in either byte order
    /// * The version is not [`VERSION`]
    /// * The reserved field is not zero
    pub fn from_bytes(buffer: &[u8; SIZE_HEADER]) -> Result<Self> {
        let mut signature = [0u8; 4];
        signature.copy_from_slice(&buffer[0..4]);
        let endianness = Self::detect_endianness(&signature)?;

        let version = endianness.read_u32(&buffer[4..8]);
        if version != VERSION {
            return Err(HeaderError::UnsupportedVersion(version).into());
        }
        let sequence_count = endianness.read_u32(&buffer[8..12]);
        let reserved = endianness.read_u32(&buffer[12..16]);
        if reserved != 0 {
            return Err(HeaderError::InvalidReservedField(reserved).into());
        }
        Ok(Self {
            endianness,
            version,
            sequence_count,
            reserved,
        })
    }

    /// Reads the header from the start of a byte source
    ///
    /// Sources shorter than [`SIZE_HEADER`] are rejected as a corrupt header
    /// rather than as a short read.
    pub fn from_source<S: ByteSource + ?Sized>(source: &S) -> Result<Self> {
        if source.len() < SIZE_HEADER as u64 {
            return Err(HeaderError::InvalidSize(source.len(), SIZE_HEADER).into());
        }
        let mut buffer = [0u8; SIZE_HEADER];
        source.read_exact_at(0, &mut buffer)?;
        Self::from_bytes(&buffer)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::{error::Error, HeaderError};
    use anyhow::Result;

    fn raw_header(signature: [u8; 4], rest: [u32; 3], big: bool) -> [u8; SIZE_HEADER] {
        let mut buffer = [0u8; SIZE_HEADER];
        buffer[0..4].copy_from_slice(&signature);
        for (i, value) in rest.iter().enumerate() {
            let bytes = if big {
                value.to_be_bytes()
            } else {
                value.to_le_bytes()
            };
            buffer[4 + 4 * i..8 + 4 * i].copy_from_slice(&bytes);
        }
        buffer
    }

    #[test]
    fn test_little_endian_header() -> Result<()> {
        let buffer = raw_header([0x43, 0x27, 0x41, 0x1A], [0, 3, 0], false);
        let header = TwoBitHeader::from_bytes(&buffer)?;
        assert_eq!(header.endianness, Endianness::Little);
        assert_eq!(header.sequence_count, 3);
        Ok(())
    }

    #[test]
    fn test_big_endian_header() -> Result<()> {
        let buffer = raw_header([0x1A, 0x41, 0x27, 0x43], [0, 258, 0], true);
        let header = TwoBitHeader::from_bytes(&buffer)?;
        assert_eq!(header.endianness, Endianness::Big);
        assert_eq!(header.sequence_count, 258);
        Ok(())
    }

    #[test]
    fn test_zero_sequences_accepted() -> Result<()> {
        let buffer = raw_header([0x43, 0x27, 0x41, 0x1A], [0, 0, 0], false);
        assert_eq!(TwoBitHeader::from_bytes(&buffer)?.sequence_count, 0);
        Ok(())
    }

    #[test]
    fn test_invalid_headers() {
        let buffer = raw_header(*b"BSEQ", [0, 1, 0], false);
        assert!(matches!(
            TwoBitHeader::from_bytes(&buffer),
            Err(Error::HeaderError(HeaderError::InvalidMagicNumber(_)))
        ));

        let buffer = raw_header([0x43, 0x27, 0x41, 0x1A], [1, 1, 0], false);
        assert!(matches!(
            TwoBitHeader::from_bytes(&buffer),
            Err(Error::HeaderError(HeaderError::UnsupportedVersion(1)))
        ));

        let buffer = raw_header([0x1A, 0x41, 0x27, 0x43], [0, 1, 5], true);
        assert!(matches!(
            TwoBitHeader::from_bytes(&buffer),
            Err(Error::HeaderError(HeaderError::InvalidReservedField(5)))
        ));

        let short = vec![0x43u8, 0x27, 0x41, 0x1A, 0, 0];
        assert!(matches!(
            TwoBitHeader::from_source(&short),
            Err(Error::HeaderError(HeaderError::InvalidSize(6, SIZE_HEADER)))
        ));
    }
}
