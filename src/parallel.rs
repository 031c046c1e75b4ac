//! Parallel processing of the sequences of a 2bit file
//!
//! The sequences of a file are split into contiguous shares, one per worker thread.
//! Every worker owns a clone of the processor and sees its share as [`RefSequence`]s.

use std::{ops::Range, sync::Arc};

use log::debug;

use crate::{
    error::{ProcessError, Result},
    reader::{RefSequence, TwoBitFile},
    source::ByteSource,
};

/// Trait for 2bit readers that can process sequences in parallel
///
/// This is implemented by the **reader** not by the **processor**.
/// For the **processor**, see the [`ParallelProcessor`] trait.
pub trait ParallelReader {
    fn process_parallel<P: ParallelProcessor + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()>;
}

/// Trait for types that can process sequences in parallel.
///
/// This is implemented by the **processor** not by the **reader**.
/// For the **reader**, see the [`ParallelReader`] trait.
pub trait ParallelProcessor: Send + Clone {
    /// Process a single sequence
    fn process_sequence<S: ByteSource>(&mut self, sequence: RefSequence<'_, S>) -> Result<()>;

    /// Called when a thread finishes processing its share of sequences
    /// Default implementation does nothing
    fn on_batch_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set the thread ID for this processor
    ///
    /// Each thread should call this method with its own unique ID.
    fn set_tid(&mut self, _tid: usize) {
        // Default implementation does nothing
    }

    /// Get the thread ID for this processor
    fn get_tid(&self) -> Option<usize> {
        None
    }
}

impl<S: ByteSource + Send + Sync + 'static> TwoBitFile<S> {
    /// Process the sequences with ids in `range` in parallel
    ///
    /// An empty or out-of-bounds range processes nothing.
    ///
    /// # Arguments
    ///
    /// * `processor` - The processor cloned into every worker
    /// * `num_threads` - The number of threads to spawn (0 uses all cores)
    /// * `range` - The range of sequence ids to process
    pub fn process_parallel_range<P: ParallelProcessor + 'static>(
        self,
        processor: P,
        num_threads: usize,
        range: Range<usize>,
    ) -> Result<()> {
        // Calculate the number of threads to use
        let num_threads = if num_threads == 0 {
            num_cpus::get()
        } else {
            num_threads.min(num_cpus::get())
        };

        let num_sequences = self.num_sequences()?;
        if range.start >= range.end || range.end > num_sequences {
            return Ok(());
        }
        let per_thread = (range.end - range.start).div_ceil(num_threads);
        debug!(
            "Processing {} sequences on {num_threads} threads",
            range.end - range.start
        );

        let file = Arc::new(self);
        let mut handles = Vec::with_capacity(num_threads);
        for tid in 0..num_threads {
            let mut processor = processor.clone();
            let file = file.clone();
            processor.set_tid(tid);

            let handle = std::thread::spawn(move || -> Result<()> {
                let start = range.start + tid * per_thread;
                let end = (start + per_thread).min(range.end);
                if start >= end {
                    return Ok(());
                }
                for id in start..end {
                    processor.process_sequence(file.get(id)?)?;
                }
                processor.on_batch_complete()
            });
            handles.push(handle);
        }

        for (tid, handle) in handles.into_iter().enumerate() {
            handle
                .join()
                .map_err(|_| ProcessError::WorkerPanicked(tid))??;
        }
        Ok(())
    }
}

impl<S: ByteSource + Send + Sync + 'static> ParallelReader for TwoBitFile<S> {
    fn process_parallel<P: ParallelProcessor + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()> {
        let num_sequences = self.num_sequences()?;
        self.process_parallel_range(processor, num_threads, 0..num_sequences)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::{
        composition::BaseCounts,
        error::{Error, StateError},
        fixtures::{foo_2bit, FixtureBuilder},
        source::Endianness,
    };
    use anyhow::Result;
    use parking_lot::Mutex;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    #[derive(Clone, Default)]
    struct Collector {
        tid: Option<usize>,
        local: Vec<(usize, String, BaseCounts)>,
        shared: Arc<Mutex<Vec<(usize, String, BaseCounts)>>>,
        batches: Arc<Mutex<usize>>,
    }
    impl ParallelProcessor for Collector {
        fn process_sequence<S: ByteSource>(
            &mut self,
            sequence: RefSequence<'_, S>,
        ) -> crate::Result<()> {
            let counts = sequence.base_counts(..)?;
            self.local
                .push((sequence.id(), sequence.name().to_string(), counts));
            Ok(())
        }

        fn on_batch_complete(&mut self) -> crate::Result<()> {
            self.shared.lock().extend(self.local.drain(..));
            *self.batches.lock() += 1;
            Ok(())
        }

        fn set_tid(&mut self, tid: usize) {
            self.tid = Some(tid);
        }

        fn get_tid(&self) -> Option<usize> {
            self.tid
        }
    }

    #[test]
    fn test_process_every_sequence_once() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut builder = FixtureBuilder::new(Endianness::Little);
        for i in 0..37 {
            let len = rng.random_range(0..300);
            let bases: Vec<u8> = (0..len).map(|_| b"ACGTNacgt"[rng.random_range(0..9)]).collect();
            builder = builder.sequence(&format!("seq{i}"), &bases);
        }
        let bytes = builder.build();

        let expected: Vec<_> = {
            let file = TwoBitFile::from_source(bytes.clone(), false)?;
            (0..37)
                .map(|id| {
                    let seq = file.get(id)?;
                    Ok((id, seq.name().to_string(), seq.base_counts(..)?))
                })
                .collect::<crate::Result<_>>()?
        };

        for num_threads in [1, 3, 0] {
            let collector = Collector::default();
            let file = TwoBitFile::from_source(bytes.clone(), false)?;
            file.process_parallel(collector.clone(), num_threads)?;

            let mut seen = collector.shared.lock().clone();
            seen.sort_by_key(|(id, ..)| *id);
            assert_eq!(seen, expected);
            assert!(*collector.batches.lock() >= 1);
        }
        Ok(())
    }

    #[test]
    fn test_process_range() -> Result<()> {
        let collector = Collector::default();
        let file = TwoBitFile::from_source(foo_2bit(), false)?;
        file.process_parallel_range(collector.clone(), 2, 1..2)?;
        let seen = collector.shared.lock().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, "chr2");

        let collector = Collector::default();
        let file = TwoBitFile::from_source(foo_2bit(), false)?;
        file.process_parallel_range(collector.clone(), 2, 1..5)?;
        assert!(collector.shared.lock().is_empty());
        Ok(())
    }

    #[test]
    fn test_closed_file_is_rejected() -> Result<()> {
        let mut file = TwoBitFile::from_source(foo_2bit(), false)?;
        file.close();
        assert!(matches!(
            file.process_parallel(Collector::default(), 2),
            Err(Error::StateError(StateError::Closed))
        ));
        Ok(())
    }

    #[derive(Clone)]
    struct Panicker;
    impl ParallelProcessor for Panicker {
        fn process_sequence<S: ByteSource>(&mut self, _: RefSequence<'_, S>) -> crate::Result<()> {
            panic!("boom");
        }
    }

    #[test]
    fn test_worker_panic_is_reported() -> Result<()> {
        let file = TwoBitFile::from_source(foo_2bit(), false)?;
        assert!(matches!(
            file.process_parallel(Panicker, 1),
            Err(Error::ProcessError(ProcessError::WorkerPanicked(0)))
        ));
        Ok(())
    }
}
