use std::{
    io::{stdout, BufWriter, Write},
    ops::Bound,
    path::PathBuf,
    sync::Arc,
    time::Instant,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use seq2bit::{
    BaseCounts, ByteSource, Composition, MaskKind, ParallelProcessor, ParallelReader,
    RefSequence, TwoBitFile,
};

#[derive(Parser)]
#[clap(version, about = "Query sequences of a 2bit genome file")]
struct Cli {
    /// Input 2bit file [path]
    #[clap(required = true)]
    path: PathBuf,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print file-wide totals
    Info,
    /// Print the name and length of every sequence
    Chroms,
    /// Print the bases of a sequence range
    Seq {
        name: String,
        #[clap(flatten)]
        range: RangeArgs,
        /// Print soft-masked bases in lower case [flag]
        #[clap(long)]
        lowercase: bool,
    },
    /// Print the base composition of a sequence range
    Bases {
        name: String,
        #[clap(flatten)]
        range: RangeArgs,
        /// Print raw counts instead of frequencies [flag]
        #[clap(long)]
        counts: bool,
    },
    /// Print the masked blocks of a sequence range as BED intervals
    Masked {
        name: String,
        #[clap(flatten)]
        range: RangeArgs,
        /// Report soft-masked instead of hard-masked blocks [flag]
        #[clap(long)]
        soft: bool,
    },
    /// Print the GC content of every sequence
    Gc {
        /// Number of threads (0 uses all cores) [integer]
        #[clap(short = 't', long, default_value_t = 0)]
        threads: usize,
    },
}

#[derive(clap::Args)]
struct RangeArgs {
    /// 0-based start of the range (default: sequence start) [integer]
    #[clap(short = 's', long)]
    start: Option<u32>,
    /// 0-based exclusive end of the range (default: sequence end) [integer]
    #[clap(short = 'e', long)]
    end: Option<u32>,
}
impl RangeArgs {
    fn bounds(&self) -> (Bound<u32>, Bound<u32>) {
        (
            self.start.map_or(Bound::Unbounded, Bound::Included),
            self.end.map_or(Bound::Unbounded, Bound::Excluded),
        )
    }
}

/// Collects the base counts of every sequence, one batch per thread
#[derive(Clone, Default)]
struct GcCollector {
    local: Vec<(usize, String, u32, BaseCounts)>,
    global: Arc<Mutex<Vec<(usize, String, u32, BaseCounts)>>>,
}
impl ParallelProcessor for GcCollector {
    fn process_sequence<S: ByteSource>(
        &mut self,
        sequence: RefSequence<'_, S>,
    ) -> seq2bit::Result<()> {
        let counts = sequence.base_counts(..)?;
        self.local.push((
            sequence.id(),
            sequence.name().to_string(),
            sequence.len(),
            counts,
        ));
        Ok(())
    }

    fn on_batch_complete(&mut self) -> seq2bit::Result<()> {
        self.global.lock().append(&mut self.local);
        Ok(())
    }
}

fn write_info(file: &TwoBitFile) -> Result<()> {
    let info = file.info()?;
    let mut out = BufWriter::new(stdout().lock());
    writeln!(out, "file_size\t{}", info.file_size)?;
    writeln!(out, "sequences\t{}", info.sequence_count)?;
    writeln!(out, "total_length\t{}", info.total_sequence_length)?;
    writeln!(out, "hard_masked\t{}", info.total_hard_masked_length)?;
    if let Some(soft) = info.total_soft_masked_length {
        writeln!(out, "soft_masked\t{soft}")?;
    }
    out.flush()?;
    Ok(())
}

fn write_chroms(file: &TwoBitFile) -> Result<()> {
    let mut out = BufWriter::new(stdout().lock());
    let mut buffer = itoa::Buffer::new();
    for (name, size) in file.chrom_sizes()? {
        out.write_all(name.as_bytes())?;
        out.write_all(b"\t")?;
        out.write_all(buffer.format(size).as_bytes())?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

fn write_sequence(file: &TwoBitFile, name: &str, range: &RangeArgs) -> Result<()> {
    let mut seq = Vec::new();
    file.decode_into(name, range.bounds(), &mut seq)?;

    let mut out = BufWriter::new(stdout().lock());
    writeln!(out, ">{name}")?;
    for line in seq.chunks(60) {
        out.write_all(line)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

fn write_bases(file: &TwoBitFile, name: &str, range: &RangeArgs, counts: bool) -> Result<()> {
    let mut out = BufWriter::new(stdout().lock());
    match file.bases(name, range.bounds(), !counts)? {
        Composition::Counts(counts) => {
            for (base, count) in counts.iter() {
                writeln!(out, "{base}\t{count}")?;
            }
        }
        Composition::Frequencies(freqs) => {
            for (base, freq) in freqs.iter() {
                writeln!(out, "{base}\t{freq:.6}")?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn write_masked(file: &TwoBitFile, name: &str, range: &RangeArgs, kind: MaskKind) -> Result<()> {
    let blocks = file.masked_blocks(name, kind, range.bounds())?;

    let mut out = BufWriter::new(stdout().lock());
    let mut buffer = itoa::Buffer::new();
    for block in &blocks {
        out.write_all(name.as_bytes())?;
        out.write_all(b"\t")?;
        out.write_all(buffer.format(block.start).as_bytes())?;
        out.write_all(b"\t")?;
        out.write_all(buffer.format(block.end).as_bytes())?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    eprintln!("{} {kind} blocks", blocks.len());
    Ok(())
}

fn write_gc(file: TwoBitFile, threads: usize) -> Result<()> {
    let start = Instant::now();
    let collector = GcCollector::default();
    file.process_parallel(collector.clone(), threads)?;

    let mut results = std::mem::take(&mut *collector.global.lock());
    results.sort_unstable_by_key(|(id, ..)| *id);

    let mut out = BufWriter::new(stdout().lock());
    for (_, name, len, counts) in &results {
        writeln!(out, "{name}\t{len}\t{:.6}", counts.gc_content())?;
    }
    out.flush()?;
    eprintln!(
        "Processed {} sequences in {:?}",
        results.len(),
        start.elapsed()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let track_soft_mask = matches!(
        cli.command,
        Command::Info | Command::Masked { soft: true, .. }
    );
    let lowercase = matches!(cli.command, Command::Seq { lowercase: true, .. });
    let file = TwoBitFile::builder()
        .track_soft_mask(track_soft_mask)
        .lowercase_soft_masked(lowercase)
        .open(&cli.path)?;

    match &cli.command {
        Command::Info => write_info(&file),
        Command::Chroms => write_chroms(&file),
        Command::Seq { name, range, .. } => write_sequence(&file, name, range),
        Command::Bases {
            name,
            range,
            counts,
        } => write_bases(&file, name, range, *counts),
        Command::Masked { name, range, soft } => {
            let kind = if *soft { MaskKind::Soft } else { MaskKind::Hard };
            write_masked(&file, name, range, kind)
        }
        Command::Gc { threads } => write_gc(file, *threads),
    }
}
