/// Custom Result type for 2bit operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the seq2bit library, encompassing all possible error cases
/// that can occur while opening and querying a 2bit file.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to the fixed file header
    HeaderError(#[from] HeaderError),
    /// Errors related to the sequence name index
    IndexError(#[from] IndexError),
    /// Errors found while decoding a per-sequence record
    RecordError(#[from] RecordError),
    /// Errors caused by the arguments of a query
    QueryError(#[from] QueryError),
    /// Errors caused by using a session outside of its open lifetime
    StateError(#[from] StateError),
    /// Errors raised while processing sequences in parallel
    ProcessError(#[from] ProcessError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// Generic errors raised by user-provided processors
    AnyhowError(#[from] anyhow::Error),
}
impl Error {
    /// Returns true if the error describes a malformed file (header, index, or record)
    ///
    /// Format errors are not recoverable: the file cannot be read as 2bit.
    #[must_use]
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Self::HeaderError(_) | Self::IndexError(_) | Self::RecordError(_)
        )
    }

    /// Returns true if the error was raised because a sequence name is unknown
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::QueryError(
                QueryError::SequenceNotFound(_) | QueryError::SequenceIdOutOfRange(..)
            )
        )
    }
}

/// Errors specific to processing and validating the 2bit file header
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The signature matches neither byte order of the 2bit magic number
    ///
    /// # Arguments
    /// * `u32` - The signature that was found (read little-endian)
    #[error("not a 2bit file: invalid signature {0:#010x}")]
    InvalidMagicNumber(u32),

    /// The format version in the header is not supported
    ///
    /// # Arguments
    /// * `u32` - The unsupported version number that was found
    #[error("unsupported version: {0} (only version 0 is defined)")]
    UnsupportedVersion(u32),

    /// The reserved header field is not zero
    ///
    /// # Arguments
    /// * `u32` - The reserved value that was found
    #[error("corrupt header: reserved field is {0}, expected 0")]
    InvalidReservedField(u32),

    /// The data source is too small to hold a header
    ///
    /// # Arguments
    /// * First `u64` - The actual number of bytes available
    /// * Second `usize` - The size of a header
    #[error("corrupt header: source holds {0} bytes, a header needs {1}")]
    InvalidSize(u64, usize),
}

/// Errors found while reading the sequence name index
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// Two index entries share the same name
    #[error("duplicate sequence name: {0}")]
    DuplicateName(String),

    /// A sequence name is not valid UTF-8
    ///
    /// # Arguments
    /// * `usize` - The position of the entry in the index
    #[error("sequence name of index entry {0} is not valid UTF-8")]
    InvalidName(usize),

    /// An index entry points outside of the file
    #[error("record offset {offset} of sequence {name} lies outside of the file ({file_size} bytes)")]
    OffsetOutOfBounds {
        name: String,
        offset: u64,
        file_size: u64,
    },
}

/// Errors found while decoding a sequence record
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    /// A mask block extends past the end of the sequence
    #[error("{kind} block [{start}, {start}+{size}) extends past the sequence length {dna_size}")]
    BlockOutOfBounds {
        kind: &'static str,
        start: u32,
        size: u32,
        dna_size: u32,
    },

    /// Mask blocks are not sorted ascending or overlap each other
    ///
    /// # Arguments
    /// * `&'static str` - The kind of block table
    /// * `usize` - The position of the offending block
    #[error("{0} blocks are unsorted or overlapping at block {1}")]
    UnsortedBlocks(&'static str, usize),

    /// The packed bases of a sequence run past the end of the file
    #[error("packed bases of sequence {name} need {needed} bytes from offset {offset}, file holds {file_size}")]
    TruncatedPayload {
        name: String,
        offset: u64,
        needed: u64,
        file_size: u64,
    },
}

/// Errors caused by the arguments of a query
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    /// The requested sequence is not present in the file
    #[error("sequence not found: {0}")]
    SequenceNotFound(String),

    /// The requested sequence id is past the end of the index
    ///
    /// # Arguments
    /// * `usize` - The requested id
    /// * `usize` - The number of sequences
    #[error("sequence id {0} is out of range for a file with {1} sequences")]
    SequenceIdOutOfRange(usize, usize),

    /// The requested range is not within `[0, length]` or is reversed
    #[error("invalid range [{start}, {end}) for sequence of length {length}")]
    InvalidRange { start: u64, end: u64, length: u32 },

    /// Soft-masked blocks were requested but the session does not track them
    #[error("soft-masked blocks are not tracked; open the file with soft-mask tracking enabled")]
    SoftMaskNotTracked,
}

/// Errors caused by the session lifecycle
#[derive(thiserror::Error, Debug)]
pub enum StateError {
    /// The session has been closed
    #[error("operation on a closed 2bit file")]
    Closed,
}

/// Errors raised while processing sequences in parallel
#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    /// A worker thread panicked before finishing its share of sequences
    ///
    /// # Arguments
    /// * `usize` - The id of the worker thread
    #[error("worker thread {0} panicked")]
    WorkerPanicked(usize),
}
