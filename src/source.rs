//! Byte-level access to 2bit data
//!
//! All reads are positional: every call names an absolute offset, so there is no
//! shared cursor and reads from different queries can be freely interleaved.
//!
//! A [`ByteSource`] provides raw bytes (a memory-mapped file or an in-memory buffer),
//! and a [`ByteReader`] layers the file's byte order on top of it.

use std::io;

use auto_impl::auto_impl;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use memmap2::Mmap;

use crate::error::Result;

/// A random-access source of bytes
///
/// Implemented for memory maps, byte vectors and byte slices, and (through
/// `auto_impl`) for references, boxes and `Arc`s of any source.
#[auto_impl(&, Box, Arc)]
pub trait ByteSource {
    /// Total number of bytes available
    fn len(&self) -> u64;

    /// Returns true if the source holds no bytes
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fills `buf` with the bytes starting at `offset`
    ///
    /// Fails with [`io::ErrorKind::UnexpectedEof`] if the source ends before `buf` is full.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

fn short_read(offset: u64, wanted: usize, available: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("cannot read {wanted} bytes at offset {offset} from a source of {available} bytes"),
    )
}

impl ByteSource for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let available = <[u8]>::len(self) as u64;
        let span = usize::try_from(offset)
            .ok()
            .and_then(|start| start.checked_add(buf.len()).map(|end| start..end))
            .filter(|span| span.end <= <[u8]>::len(self));
        match span {
            Some(span) => {
                buf.copy_from_slice(&self[span]);
                Ok(())
            }
            None => Err(short_read(offset, buf.len(), available)),
        }
    }
}

impl ByteSource for Vec<u8> {
    fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.as_slice().read_exact_at(offset, buf)
    }
}

impl ByteSource for Mmap {
    fn len(&self) -> u64 {
        self[..].len() as u64
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self[..].read_exact_at(offset, buf)
    }
}

/// Byte order of the multi-byte fields of a 2bit file
///
/// Determined once from the file signature and fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Big,
    Little,
}
impl Endianness {
    #[must_use]
    pub fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            Self::Big => BigEndian::read_u16(buf),
            Self::Little => LittleEndian::read_u16(buf),
        }
    }

    #[must_use]
    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            Self::Big => BigEndian::read_u32(buf),
            Self::Little => LittleEndian::read_u32(buf),
        }
    }

    /// Decodes `dst.len()` consecutive u32 values from `src`
    ///
    /// # Panics
    ///
    /// Panics if `src.len() != 4 * dst.len()`
    pub fn read_u32_into(self, src: &[u8], dst: &mut [u32]) {
        match self {
            Self::Big => BigEndian::read_u32_into(src, dst),
            Self::Little => LittleEndian::read_u32_into(src, dst),
        }
    }
}

/// Endianness-aware positional reader over a [`ByteSource`]
#[derive(Debug, Clone)]
pub struct ByteReader<S> {
    source: S,
    endian: Endianness,
}
impl<S: ByteSource> ByteReader<S> {
    pub fn new(source: S, endian: Endianness) -> Self {
        Self { source, endian }
    }

    /// Total number of bytes in the underlying source
    pub fn len(&self) -> u64 {
        self.source.len()
    }

    /// Verifies that `len` bytes can be read at `offset` without touching the source
    fn check_span(&self, offset: u64, len: usize) -> Result<()> {
        let available = self.source.len();
        match offset.checked_add(len as u64) {
            Some(end) if end <= available => Ok(()),
            _ => Err(short_read(offset, len, available).into()),
        }
    }

    /// Fills `buf` with the bytes starting at `offset`
    pub fn read_into(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.source.read_exact_at(offset, buf)?;
        Ok(())
    }

    /// Reads `len` bytes starting at `offset`
    ///
    /// The span is validated against the source length before any allocation,
    /// so corrupt lengths fail fast instead of reserving huge buffers.
    pub fn read_bytes(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.check_span(offset, len)?;
        let mut buf = vec![0; len];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&self, offset: u64) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_into(offset, &mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u16(&self, offset: u64) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_into(offset, &mut buf)?;
        Ok(self.endian.read_u16(&buf))
    }

    pub fn read_u32(&self, offset: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_into(offset, &mut buf)?;
        Ok(self.endian.read_u32(&buf))
    }

    /// Reads `count` consecutive u32 values starting at `offset`
    pub fn read_u32_array(&self, offset: u64, count: usize) -> Result<Vec<u32>> {
        let n_bytes = count.checked_mul(4).ok_or_else(|| {
            short_read(offset, usize::MAX, self.source.len())
        })?;
        let bytes = self.read_bytes(offset, n_bytes)?;
        let mut values = vec![0u32; count];
        self.endian.read_u32_into(&bytes, &mut values);
        Ok(values)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::Error;
    use anyhow::Result;
    use std::sync::Arc;

    #[test]
    fn test_slice_reads() -> Result<()> {
        let data: &[u8] = &[1, 2, 3, 4, 5];
        let mut buf = [0u8; 3];
        data.read_exact_at(2, &mut buf)?;
        assert_eq!(buf, [3, 4, 5]);
        assert!(data.read_exact_at(3, &mut buf).is_err());
        assert!(data.read_exact_at(u64::MAX, &mut buf).is_err());
        assert_eq!(ByteSource::len(data), 5);
        Ok(())
    }

    #[test]
    fn test_endianness() -> Result<()> {
        let data = vec![0x12, 0x34, 0x56, 0x78];

        let big = ByteReader::new(data.clone(), Endianness::Big);
        assert_eq!(big.read_u32(0)?, 0x1234_5678);
        assert_eq!(big.read_u16(2)?, 0x5678);

        let little = ByteReader::new(data, Endianness::Little);
        assert_eq!(little.read_u32(0)?, 0x7856_3412);
        assert_eq!(little.read_u16(0)?, 0x3412);
        assert_eq!(little.read_u8(3)?, 0x78);
        Ok(())
    }

    #[test]
    fn test_u32_array() -> Result<()> {
        let data = vec![0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 1, 0];
        let reader = ByteReader::new(Arc::new(data), Endianness::Big);
        assert_eq!(reader.read_u32_array(0, 3)?, vec![1, 2, 256]);
        assert_eq!(reader.read_u32_array(4, 0)?, Vec::<u32>::new());
        Ok(())
    }

    #[test]
    fn test_short_read_is_io_error() {
        let reader = ByteReader::new(vec![0u8; 8], Endianness::Little);
        match reader.read_u32_array(4, 2) {
            Err(Error::IoError(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected an I/O error, got {other:?}"),
        }
        // an absurd count must not allocate before failing
        assert!(reader.read_u32_array(0, usize::MAX / 2).is_err());
        assert!(reader.read_bytes(u64::MAX - 1, 4).is_err());
    }
}
