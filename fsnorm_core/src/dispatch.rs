//! Bounded-parallelism, order-preserving execution of the per-entry pipeline.

use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::error;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::error::ResampleError;
use crate::manifest::ManifestEntry;
use crate::pipeline::ResampleOutcome;

/// Runs a per-entry function over a catalog on a fixed-size worker pool.
///
/// Results land in a buffer with one slot per entry, filled by whichever
/// worker handles that position, so `result[i]` always belongs to
/// `catalog[i]` no matter in which order the work finishes.
#[derive(Clone, Copy, Debug)]
pub struct Dispatcher {
    workers: NonZeroUsize,
    batch_size: NonZeroUsize,
}

impl Dispatcher {
    pub fn new(workers: NonZeroUsize, batch_size: NonZeroUsize) -> Self {
        Self {
            workers,
            batch_size,
        }
    }

    /// Apply `per_item` to every entry and return the outcomes in catalog order.
    pub fn run<F>(
        &self,
        catalog: &[ManifestEntry],
        per_item: F,
    ) -> Result<Vec<ResampleOutcome>, ResampleError>
    where
        F: Fn(&ManifestEntry, usize) -> ResampleOutcome + Sync,
    {
        self.run_with_progress(catalog, per_item, |_| {})
    }

    /// Like [`Dispatcher::run`], calling `progress` with the number of
    /// finished entries each time one completes.
    ///
    /// A panic inside `per_item` only affects its own entry, which is
    /// reported as [`ResampleOutcome::Failed`].
    pub fn run_with_progress<F, P>(
        &self,
        catalog: &[ManifestEntry],
        per_item: F,
        progress: P,
    ) -> Result<Vec<ResampleOutcome>, ResampleError>
    where
        F: Fn(&ManifestEntry, usize) -> ResampleOutcome + Sync,
        P: Fn(usize) + Sync,
    {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers.get())
            .thread_name(|index| format!("fsnorm-worker-{index}"))
            .build()?;

        let batch_size = self.batch_size.get();
        let completed = AtomicUsize::new(0);
        let mut slots: Vec<Option<ResampleOutcome>> = Vec::with_capacity(catalog.len());
        slots.resize_with(catalog.len(), || None);

        pool.install(|| {
            slots
                .par_chunks_mut(batch_size)
                .enumerate()
                .for_each(|(batch, batch_slots)| {
                    let first = batch * batch_size;
                    for (offset, slot) in batch_slots.iter_mut().enumerate() {
                        let index = first + offset;
                        let entry = &catalog[index];
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                            per_item(entry, index)
                        }))
                        .unwrap_or_else(|_| {
                            error!("worker panicked while processing '{}'", entry.id);
                            ResampleOutcome::Failed(entry.id.clone())
                        });
                        *slot = Some(outcome);
                        progress(completed.fetch_add(1, Ordering::Relaxed) + 1);
                    }
                });
        });

        Ok(slots
            .into_iter()
            .zip(catalog)
            .map(|(slot, entry)| slot.unwrap_or_else(|| ResampleOutcome::Failed(entry.id.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn nz(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    fn catalog(len: usize) -> Vec<ManifestEntry> {
        (0..len)
            .map(|i| ManifestEntry::new(format!("utt{i}"), Vec::new(), format!("/in/{i}.wav")))
            .collect()
    }

    fn echo(entry: &ManifestEntry, index: usize) -> ResampleOutcome {
        ResampleOutcome::PassThrough {
            path: entry.path.clone(),
            sample_rate: index as u32,
        }
    }

    #[test]
    fn results_follow_catalog_order_despite_completion_order() {
        let entries = catalog(40);
        let finished = Mutex::new(Vec::new());

        let outcomes = Dispatcher::new(nz(4), nz(3))
            .run(&entries, |entry, index| {
                // Later entries finish first.
                thread::sleep(Duration::from_millis((40 - index as u64) / 4));
                finished.lock().unwrap().push(index);
                echo(entry, index)
            })
            .unwrap();

        assert_eq!(outcomes.len(), entries.len());
        for (index, outcome) in outcomes.iter().enumerate() {
            assert_eq!(
                outcome,
                &ResampleOutcome::PassThrough {
                    path: PathBuf::from(format!("/in/{index}.wav")),
                    sample_rate: index as u32,
                }
            );
        }
        assert_eq!(finished.into_inner().unwrap().len(), 40);
    }

    #[test]
    fn panicking_item_fails_alone() {
        let entries = catalog(5);

        let outcomes = Dispatcher::new(nz(2), nz(1))
            .run(&entries, |entry, index| {
                if index == 2 {
                    panic!("decoder blew up");
                }
                echo(entry, index)
            })
            .unwrap();

        assert_eq!(outcomes[2], ResampleOutcome::Failed("utt2".to_owned()));
        assert_eq!(outcomes.iter().filter(|o| o.is_failed()).count(), 1);
    }

    #[test]
    fn progress_counts_every_entry() {
        let entries = catalog(17);
        let highest = AtomicUsize::new(0);
        let calls = AtomicUsize::new(0);

        Dispatcher::new(nz(3), nz(5))
            .run_with_progress(&entries, echo, |done| {
                calls.fetch_add(1, Ordering::Relaxed);
                highest.fetch_max(done, Ordering::Relaxed);
            })
            .unwrap();

        assert_eq!(calls.into_inner(), 17);
        assert_eq!(highest.into_inner(), 17);
    }

    #[test]
    fn empty_catalog_yields_no_outcomes() {
        let outcomes = Dispatcher::new(nz(2), nz(4)).run(&[], echo).unwrap();
        assert!(outcomes.is_empty());
    }
}
