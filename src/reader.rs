//! 2bit file sessions
//!
//! A [`TwoBitFile`] owns its byte source, the parsed header and the sequence index.
//! Sequence records are decoded lazily on first use and cached in write-once cells,
//! so every query takes `&self` and a session can be shared across threads.

use std::{
    fs::File,
    io,
    ops::{Bound, Range, RangeBounds},
    path::Path,
    sync::OnceLock,
};

use log::debug;
use memmap2::Mmap;

use crate::{
    composition::{BaseCounts, Composition},
    decode,
    error::{QueryError, Result, StateError},
    header::TwoBitHeader,
    index::SequenceIndex,
    record::{MaskBlocks, MaskKind, SequenceRecord},
    source::{ByteReader, ByteSource},
};

/// Open-time configuration of a [`TwoBitFile`]
///
/// # Examples
///
/// ```rust,no_run
/// use seq2bit::TwoBitFileBuilder;
///
/// let file = TwoBitFileBuilder::new()
///     .track_soft_mask(true)
///     .open("hg38.2bit")
///     .unwrap();
/// let blocks = file.soft_masked_blocks("chr1", ..).unwrap();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TwoBitFileBuilder {
    track_soft_mask: bool,
    lowercase_soft_masked: bool,
}
impl TwoBitFileBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and keep the soft-masked block tables
    #[must_use]
    pub fn track_soft_mask(mut self, track_soft_mask: bool) -> Self {
        self.track_soft_mask = track_soft_mask;
        self
    }

    /// Render soft-masked bases in lower case (implies soft-mask tracking)
    #[must_use]
    pub fn lowercase_soft_masked(mut self, lowercase_soft_masked: bool) -> Self {
        self.lowercase_soft_masked = lowercase_soft_masked;
        self
    }

    /// Memory-maps the file at `path` and opens it
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<TwoBitFile<Mmap>> {
        let path = path.as_ref();
        let file = File::open(path)?;

        // Verify it's a regular file before attempting to map
        if !file.metadata()?.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            )
            .into());
        }

        // Safety: the file is open read-only and is not modified while mapped
        let mmap = unsafe { Mmap::map(&file)? };
        #[cfg(unix)]
        if !mmap.is_empty() {
            mmap.advise(memmap2::Advice::Random)?;
        }

        debug!("Mapped {} ({} bytes)", path.display(), mmap.len());
        self.open_source(mmap)
    }

    /// Opens a 2bit image held by any [`ByteSource`]
    pub fn open_source<S: ByteSource>(self, source: S) -> Result<TwoBitFile<S>> {
        let header = TwoBitHeader::from_source(&source)?;
        let reader = ByteReader::new(source, header.endianness);
        let index = SequenceIndex::from_reader(&reader, &header)?;
        let records = (0..index.len()).map(|_| OnceLock::new()).collect();
        if index.is_empty() {
            debug!("2bit file holds no sequences");
        }

        debug!(
            "Opened 2bit file: {} sequences, {:?} endian, soft-mask tracking {}",
            index.len(),
            header.endianness,
            self.tracks_soft_mask()
        );
        Ok(TwoBitFile {
            state: Some(OpenState {
                reader,
                header,
                index,
                records,
            }),
            config: self,
        })
    }

    fn tracks_soft_mask(self) -> bool {
        self.track_soft_mask || self.lowercase_soft_masked
    }
}

/// Summary statistics of a whole file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    /// Size of the file in bytes
    pub file_size: u64,
    /// Number of sequences
    pub sequence_count: u32,
    /// Sum of all sequence lengths
    pub total_sequence_length: u64,
    /// Number of hard-masked positions over all sequences
    pub total_hard_masked_length: u64,
    /// Number of soft-masked positions, if soft masking is tracked
    pub total_soft_masked_length: Option<u64>,
}

struct OpenState<S> {
    reader: ByteReader<S>,
    header: TwoBitHeader,
    index: SequenceIndex,
    records: Vec<OnceLock<SequenceRecord>>,
}

/// A 2bit file session
///
/// Open until [`close`](TwoBitFile::close) is called; every query on a closed session
/// fails with [`StateError::Closed`].
pub struct TwoBitFile<S = Mmap> {
    state: Option<OpenState<S>>,
    config: TwoBitFileBuilder,
}

impl TwoBitFile<Mmap> {
    /// Opens the file at `path`, optionally tracking soft-masked blocks
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use seq2bit::TwoBitFile;
    ///
    /// let file = TwoBitFile::open("hg38.2bit", false).unwrap();
    /// let seq = file.sequence("chr1", 10_000..10_100).unwrap();
    /// assert_eq!(seq.len(), 100);
    /// ```
    pub fn open<P: AsRef<Path>>(path: P, track_soft_mask: bool) -> Result<Self> {
        TwoBitFileBuilder::new()
            .track_soft_mask(track_soft_mask)
            .open(path)
    }

    #[must_use]
    pub fn builder() -> TwoBitFileBuilder {
        TwoBitFileBuilder::new()
    }
}

impl<S: ByteSource> TwoBitFile<S> {
    /// Opens a 2bit image held by any [`ByteSource`], optionally tracking soft-masked blocks
    pub fn from_source(source: S, track_soft_mask: bool) -> Result<Self> {
        TwoBitFileBuilder::new()
            .track_soft_mask(track_soft_mask)
            .open_source(source)
    }

    /// Releases the byte source and all cached records
    ///
    /// Closing an already closed session has no effect.
    pub fn close(&mut self) {
        if let Some(state) = self.state.take() {
            debug!("Closing 2bit file ({} bytes)", state.reader.len());
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Whether soft-masked blocks are parsed and kept
    #[must_use]
    pub fn tracks_soft_mask(&self) -> bool {
        self.config.tracks_soft_mask()
    }

    fn state(&self) -> Result<&OpenState<S>> {
        self.state.as_ref().ok_or_else(|| StateError::Closed.into())
    }

    pub fn header(&self) -> Result<TwoBitHeader> {
        Ok(self.state()?.header)
    }

    pub fn num_sequences(&self) -> Result<usize> {
        Ok(self.state()?.index.len())
    }

    /// Sequence names in file order
    pub fn sequence_names(&self) -> Result<Vec<&str>> {
        Ok(self.state()?.index.names().collect())
    }

    fn sequence_id(&self, name: &str) -> Result<usize> {
        self.state()?
            .index
            .get(name)
            .ok_or_else(|| QueryError::SequenceNotFound(name.to_string()).into())
    }

    /// The cached record of the sequence at position `id`, decoding it on first use
    pub(crate) fn record_by_id(&self, id: usize) -> Result<&SequenceRecord> {
        let state = self.state()?;
        let cell = &state.records[id];
        if let Some(record) = cell.get() {
            return Ok(record);
        }
        let record = SequenceRecord::from_reader(
            &state.reader,
            state.index.name(id),
            state.index.offset(id),
            self.tracks_soft_mask(),
        )?;
        Ok(cell.get_or_init(|| record))
    }

    /// The decoded record of sequence `name`
    pub fn record(&self, name: &str) -> Result<&SequenceRecord> {
        self.record_by_id(self.sequence_id(name)?)
    }

    /// The sequence at position `id` of the index
    pub fn get(&self, id: usize) -> Result<RefSequence<'_, S>> {
        let state = self.state()?;
        if id >= state.index.len() {
            return Err(QueryError::SequenceIdOutOfRange(id, state.index.len()).into());
        }
        Ok(RefSequence {
            id,
            name: state.index.name(id),
            record: self.record_by_id(id)?,
            file: self,
        })
    }

    /// `(name, length)` of every sequence in file order
    pub fn chrom_sizes(&self) -> Result<Vec<(&str, u32)>> {
        let state = self.state()?;
        (0..state.index.len())
            .map(|id| Ok((state.index.name(id), self.record_by_id(id)?.len())))
            .collect()
    }

    /// Length of sequence `name`, or `None` if the file has no such sequence
    pub fn chrom_size(&self, name: &str) -> Result<Option<u32>> {
        match self.state()?.index.get(name) {
            Some(id) => Ok(Some(self.record_by_id(id)?.len())),
            None => Ok(None),
        }
    }

    /// File-wide totals; decodes the record of every sequence
    pub fn info(&self) -> Result<FileInfo> {
        let state = self.state()?;
        let mut info = FileInfo {
            file_size: state.reader.len(),
            sequence_count: state.header.sequence_count,
            total_sequence_length: 0,
            total_hard_masked_length: 0,
            total_soft_masked_length: self.tracks_soft_mask().then_some(0),
        };
        for id in 0..state.index.len() {
            let record = self.record_by_id(id)?;
            info.total_sequence_length += u64::from(record.len());
            info.total_hard_masked_length += record.hard_blocks().total_len();
            if let (Some(total), Some(soft)) =
                (info.total_soft_masked_length.as_mut(), record.soft_blocks())
            {
                *total += soft.total_len();
            }
        }
        Ok(info)
    }

    /// Bases of `name` over `range`, with hard-masked positions as `N`
    ///
    /// Bases are upper case unless the session renders soft-masked bases in lower case.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use seq2bit::TwoBitFile;
    /// let file = TwoBitFile::open("hg38.2bit", false).unwrap();
    /// let whole = file.sequence("chrM", ..).unwrap();
    /// let head = file.sequence("chrM", ..10).unwrap();
    /// assert!(whole.starts_with(&head));
    /// ```
    pub fn sequence<R: RangeBounds<u32>>(&self, name: &str, range: R) -> Result<String> {
        let mut buf = Vec::new();
        self.decode_into(name, range, &mut buf)?;
        Ok(buf.into_iter().map(char::from).collect())
    }

    /// Appends the bases of `name` over `range` to `buf`
    pub fn decode_into<R: RangeBounds<u32>>(
        &self,
        name: &str,
        range: R,
        buf: &mut Vec<u8>,
    ) -> Result<()> {
        let record = self.record(name)?;
        let range = resolve_range(&range, record.len())?;
        self.decode_record(record, range, buf)
    }

    pub(crate) fn decode_record(
        &self,
        record: &SequenceRecord,
        range: Range<u32>,
        buf: &mut Vec<u8>,
    ) -> Result<()> {
        if range.is_empty() {
            return Ok(());
        }
        let state = self.state()?;
        let span = decode::packed_span(&range);
        let packed = state.reader.read_bytes(
            record.payload_offset() + span.start,
            (span.end - span.start) as usize,
        )?;

        let base = buf.len();
        decode::unpack_into(
            &packed,
            (range.start % 4) as usize,
            (range.end - range.start) as usize,
            buf,
        );
        let decoded = &mut buf[base..];

        if self.config.lowercase_soft_masked {
            if let Some(soft) = record.soft_blocks() {
                for block in soft.overlapping(range.clone()) {
                    let local = relative(&block, range.start);
                    decoded[local].make_ascii_lowercase();
                }
            }
        }
        for block in record.hard_blocks().overlapping(range.clone()) {
            decoded[relative(&block, range.start)].fill(b'N');
        }
        Ok(())
    }

    /// Per-base counts of `name` over `range`, excluding hard-masked positions
    pub fn base_counts<R: RangeBounds<u32>>(&self, name: &str, range: R) -> Result<BaseCounts> {
        let record = self.record(name)?;
        let range = resolve_range(&range, record.len())?;
        self.count_record(record, range)
    }

    /// Base composition of `name` over `range`
    ///
    /// With `normalize`, counts are divided by the number of non-masked positions.
    pub fn bases<R: RangeBounds<u32>>(
        &self,
        name: &str,
        range: R,
        normalize: bool,
    ) -> Result<Composition> {
        let counts = self.base_counts(name, range)?;
        Ok(Composition::new(counts, normalize))
    }

    pub(crate) fn count_record(
        &self,
        record: &SequenceRecord,
        range: Range<u32>,
    ) -> Result<BaseCounts> {
        let mut codes = [0u64; 4];
        let gaps = record.hard_blocks().gaps(range.clone());
        if gaps.is_empty() {
            return Ok(BaseCounts::default());
        }

        let state = self.state()?;
        let span = decode::packed_span(&range);
        let packed = state.reader.read_bytes(
            record.payload_offset() + span.start,
            (span.end - span.start) as usize,
        )?;
        // position of range.start within the packed span
        let lead = (range.start % 4) as usize;
        for gap in gaps {
            let skip = lead + (gap.start - range.start) as usize;
            decode::count_codes(&packed, skip, (gap.end - gap.start) as usize, &mut codes);
        }
        Ok(BaseCounts::from_codes(codes))
    }

    /// Masked blocks of one kind overlapping `range`, clipped to it
    pub fn masked_blocks<R: RangeBounds<u32>>(
        &self,
        name: &str,
        kind: MaskKind,
        range: R,
    ) -> Result<Vec<Range<u32>>> {
        let record = self.record(name)?;
        let range = resolve_range(&range, record.len())?;
        let blocks: &MaskBlocks = record
            .blocks(kind)
            .ok_or(QueryError::SoftMaskNotTracked)?;
        Ok(blocks.query(range))
    }

    /// Hard-masked (`N`) blocks of `name` overlapping `range`, clipped to it
    pub fn hard_masked_blocks<R: RangeBounds<u32>>(
        &self,
        name: &str,
        range: R,
    ) -> Result<Vec<Range<u32>>> {
        self.masked_blocks(name, MaskKind::Hard, range)
    }

    /// Soft-masked blocks of `name` overlapping `range`, clipped to it
    ///
    /// Fails with [`QueryError::SoftMaskNotTracked`] unless the session tracks soft masking.
    pub fn soft_masked_blocks<R: RangeBounds<u32>>(
        &self,
        name: &str,
        range: R,
    ) -> Result<Vec<Range<u32>>> {
        if !self.tracks_soft_mask() {
            self.state()?;
            return Err(QueryError::SoftMaskNotTracked.into());
        }
        self.masked_blocks(name, MaskKind::Soft, range)
    }
}

/// A borrowed view of one sequence of an open [`TwoBitFile`]
pub struct RefSequence<'a, S: ByteSource = Mmap> {
    id: usize,
    name: &'a str,
    record: &'a SequenceRecord,
    file: &'a TwoBitFile<S>,
}
impl<S: ByteSource> RefSequence<'_, S> {
    /// Position of the sequence in the index
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    #[must_use]
    pub fn len(&self) -> u32 {
        self.record.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    #[must_use]
    pub fn record(&self) -> &SequenceRecord {
        self.record
    }

    /// Appends the bases over `range` to `buf`
    pub fn decode<R: RangeBounds<u32>>(&self, range: R, buf: &mut Vec<u8>) -> Result<()> {
        let range = resolve_range(&range, self.len())?;
        self.file.decode_record(self.record, range, buf)
    }

    /// The bases over `range` as a string
    pub fn sequence<R: RangeBounds<u32>>(&self, range: R) -> Result<String> {
        let mut buf = Vec::new();
        self.decode(range, &mut buf)?;
        Ok(buf.into_iter().map(char::from).collect())
    }

    /// Per-base counts over `range`, excluding hard-masked positions
    pub fn base_counts<R: RangeBounds<u32>>(&self, range: R) -> Result<BaseCounts> {
        let range = resolve_range(&range, self.len())?;
        self.file.count_record(self.record, range)
    }

    #[must_use]
    pub fn hard_blocks(&self) -> &MaskBlocks {
        self.record.hard_blocks()
    }

    /// Soft-masked blocks, if the session tracks them
    #[must_use]
    pub fn soft_blocks(&self) -> Option<&MaskBlocks> {
        self.record.soft_blocks()
    }
}

/// Converts caller bounds into a half-open range within `[0, length]`
fn resolve_range<R: RangeBounds<u32>>(range: &R, length: u32) -> Result<Range<u32>> {
    let start = match range.start_bound() {
        Bound::Included(&s) => u64::from(s),
        Bound::Excluded(&s) => u64::from(s) + 1,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => u64::from(e) + 1,
        Bound::Excluded(&e) => u64::from(e),
        Bound::Unbounded => u64::from(length),
    };
    if start > end || end > u64::from(length) {
        return Err(QueryError::InvalidRange { start, end, length }.into());
    }
    Ok(start as u32..end as u32)
}

/// `block` shifted to indices of a buffer decoded from `origin`
fn relative(block: &Range<u32>, origin: u32) -> Range<usize> {
    (block.start - origin) as usize..(block.end - origin) as usize
}
