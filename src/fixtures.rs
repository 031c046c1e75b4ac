//! In-memory 2bit images for tests
//!
//! Hard-masked blocks are derived from runs of `N`/`n`, soft-masked blocks from runs of
//! lower-case letters, unless a sequence supplies its block tables explicitly.

use std::io::Write;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

use crate::{header::MAGIC, source::Endianness};

/// `chr1` of the reference fixture: 150 bp, hard-masked `[0, 50)` and `[100, 150)`,
/// soft-masked `[62, 70)`
pub const FOO_CHR1: &[u8] = concat!(
    "NNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNN",
    "ACGTACGTACGTagctagctGATCGATCGTAGCTAGCTAGCTAGCTGATC",
    "NNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNN",
)
.as_bytes();

/// `chr2` of the reference fixture: 100 bp, hard-masked `[50, 100)`
pub const FOO_CHR2: &[u8] = concat!(
    "ACGTACGTACTTTGGGAACCGATCGATCGATCGATCGATCGATCGATCGA",
    "NNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNN",
)
.as_bytes();

/// The two-sequence reference fixture (161 bytes, little-endian)
pub fn foo_2bit() -> Vec<u8> {
    FixtureBuilder::new(Endianness::Little)
        .sequence("chr1", FOO_CHR1)
        .sequence("chr2", FOO_CHR2)
        .build()
}

/// `(start, size)` pairs as stored on disk
type BlockTable = Vec<(u32, u32)>;

struct FixtureSequence {
    name: String,
    bases: Vec<u8>,
    hard: BlockTable,
    soft: BlockTable,
}

pub struct FixtureBuilder {
    endian: Endianness,
    masked_code: u8,
    sequences: Vec<FixtureSequence>,
}
impl FixtureBuilder {
    pub fn new(endian: Endianness) -> Self {
        Self {
            endian,
            masked_code: 0,
            sequences: Vec::new(),
        }
    }

    /// Sets the 2-bit code packed for hard-masked positions (default `0`, i.e. `T`)
    pub fn masked_code(mut self, code: u8) -> Self {
        self.masked_code = code & 3;
        self
    }

    pub fn sequence(self, name: &str, bases: &[u8]) -> Self {
        let hard = runs(bases, |b| b.eq_ignore_ascii_case(&b'N'));
        let soft = runs(bases, |b| b.is_ascii_lowercase());
        self.sequence_with_blocks(name, bases, hard, soft)
    }

    /// Adds a sequence with verbatim block tables, valid or not
    pub fn sequence_with_blocks(
        mut self,
        name: &str,
        bases: &[u8],
        hard: BlockTable,
        soft: BlockTable,
    ) -> Self {
        self.sequences.push(FixtureSequence {
            name: name.to_string(),
            bases: bases.to_vec(),
            hard,
            soft,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        match self.endian {
            Endianness::Little => self.encode::<LittleEndian>(),
            Endianness::Big => self.encode::<BigEndian>(),
        }
    }

    fn encode<B: byteorder::ByteOrder>(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<B>(MAGIC).unwrap();
        out.write_u32::<B>(0).unwrap();
        out.write_u32::<B>(self.sequences.len() as u32).unwrap();
        out.write_u32::<B>(0).unwrap();

        let index_size: usize = self.sequences.iter().map(|s| 5 + s.name.len()).sum();
        let mut offset = out.len() + index_size;
        let mut records = Vec::new();
        for seq in &self.sequences {
            out.write_u8(seq.name.len() as u8).unwrap();
            out.write_all(seq.name.as_bytes()).unwrap();
            out.write_u32::<B>(offset as u32).unwrap();

            let record = self.encode_record::<B>(seq);
            offset += record.len();
            records.push(record);
        }
        for record in records {
            out.extend_from_slice(&record);
        }
        out
    }

    fn encode_record<B: byteorder::ByteOrder>(&self, seq: &FixtureSequence) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<B>(seq.bases.len() as u32).unwrap();
        for table in [&seq.hard, &seq.soft] {
            out.write_u32::<B>(table.len() as u32).unwrap();
            for (start, _) in table {
                out.write_u32::<B>(*start).unwrap();
            }
            for (_, size) in table {
                out.write_u32::<B>(*size).unwrap();
            }
        }
        out.write_u32::<B>(0).unwrap();

        for chunk in seq.bases.chunks(4) {
            let mut byte = 0u8;
            for (i, base) in chunk.iter().enumerate() {
                let code = match base.to_ascii_uppercase() {
                    b'T' => 0,
                    b'C' => 1,
                    b'A' => 2,
                    b'G' => 3,
                    _ => self.masked_code,
                };
                byte |= code << (6 - 2 * i);
            }
            out.push(byte);
        }
        out
    }
}

/// Maximal runs of positions matching `pred` as `(start, size)` pairs
fn runs(bases: &[u8], pred: impl Fn(&u8) -> bool) -> BlockTable {
    let mut table = Vec::new();
    let mut start = None;
    for (i, base) in bases.iter().enumerate() {
        match (pred(base), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                table.push((s as u32, (i - s) as u32));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        table.push((s as u32, (bases.len() - s) as u32));
    }
    table
}
