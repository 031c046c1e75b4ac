//! # seq2bit
//!
//! Random-access reader for `.2bit` genome files.
//!
//! A 2bit file stores many named DNA sequences packed four bases per byte, together with
//! the hard-masked (`N`) and soft-masked blocks of each sequence. Files are memory-mapped
//! and only the bytes touched by a query are decoded.
//!
//! ```rust,no_run
//! use seq2bit::TwoBitFile;
//!
//! let file = TwoBitFile::open("hg38.2bit", false)?;
//! for (name, size) in file.chrom_sizes()? {
//!     println!("{name}\t{size}");
//! }
//! let counts = file.base_counts("chr1", 1_000_000..2_000_000)?;
//! println!("GC: {:.3}", counts.gc_content());
//! # Ok::<(), seq2bit::Error>(())
//! ```

mod composition;
mod decode;
mod error;
mod header;
mod index;
mod parallel;
mod reader;
mod record;
mod source;

#[cfg(test)]
mod fixtures;

pub use composition::{BaseCounts, BaseFrequencies, Composition};
pub use error::{
    Error, HeaderError, IndexError, ProcessError, QueryError, RecordError, Result, StateError,
};
pub use header::TwoBitHeader;
pub use parallel::{ParallelProcessor, ParallelReader};
pub use reader::{FileInfo, RefSequence, TwoBitFile, TwoBitFileBuilder};
pub use record::{MaskBlocks, MaskKind, SequenceRecord};
pub use source::{ByteSource, Endianness};
