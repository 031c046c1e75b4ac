//! 2-bit unpacking over byte spans
//!
//! Bases are packed four per byte, first base in the two most significant bits, with
//! the codes `00 = T`, `01 = C`, `10 = A`, `11 = G`.
//!
//! These functions take a slice of packed bytes plus the number of leading bases to skip
//! in its first byte, so a decoded range never depends on how the caller split it.

use std::ops::Range;

/// Bases for the 2-bit codes 0..=3
pub const BASES: [u8; 4] = *b"TCAG";

/// Number of bases stored in one packed byte
pub const BASES_PER_BYTE: u64 = 4;

const fn build_lookup() -> [[u8; 4]; 256] {
    let mut table = [[0u8; 4]; 256];
    let mut byte = 0;
    while byte < 256 {
        let mut i = 0;
        while i < 4 {
            table[byte][i] = BASES[(byte >> (6 - 2 * i)) & 3];
            i += 1;
        }
        byte += 1;
    }
    table
}

/// The four decoded bases of every possible byte
static LOOKUP: [[u8; 4]; 256] = build_lookup();

/// The 2-bit code of the `pos`-th base (0..4) of a packed byte
#[inline]
#[must_use]
pub fn code_at(byte: u8, pos: usize) -> u8 {
    (byte >> (6 - 2 * pos)) & 3
}

/// The span of packed bytes covering the bases `range`, relative to the payload start
///
/// Returns an empty span for an empty range.
#[must_use]
pub fn packed_span(range: &Range<u32>) -> Range<u64> {
    if range.start >= range.end {
        let first = u64::from(range.start) / BASES_PER_BYTE;
        return first..first;
    }
    let first = u64::from(range.start) / BASES_PER_BYTE;
    let last = u64::from(range.end - 1) / BASES_PER_BYTE;
    first..last + 1
}

/// Appends `n` decoded bases to `out`, starting `skip` bases into the first packed byte
///
/// `packed` must hold at least `skip + n` bases.
pub fn unpack_into(packed: &[u8], skip: usize, n: usize, out: &mut Vec<u8>) {
    debug_assert!(skip < 4);
    debug_assert!(packed.len() * 4 >= skip + n);
    out.reserve(n);

    let mut remaining = n;
    let mut bytes = packed.iter();
    if skip > 0 && remaining > 0 {
        if let Some(&byte) = bytes.next() {
            let take = (4 - skip).min(remaining);
            out.extend_from_slice(&LOOKUP[byte as usize][skip..skip + take]);
            remaining -= take;
        }
    }
    for &byte in bytes {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(4);
        out.extend_from_slice(&LOOKUP[byte as usize][..take]);
        remaining -= take;
    }
}

/// Adds the codes of `n` bases, starting `skip` bases into `packed`, to `counts`
///
/// `counts` is indexed by 2-bit code. Unlike [`unpack_into`], `skip` may exceed a byte.
pub fn count_codes(packed: &[u8], skip: usize, n: usize, counts: &mut [u64; 4]) {
    debug_assert!(packed.len() * 4 >= skip + n);
    for pos in skip..skip + n {
        let code = code_at(packed[pos / 4], pos % 4);
        counts[code as usize] += 1;
    }
}
