//! The work done for a single manifest entry.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::audio;
use crate::error::ResampleError;
use crate::idempotency::already_done;
use crate::manifest::ManifestEntry;
use crate::resample::{Resample, ResamplePlan};
use crate::shard::ShardLayout;

/// How a single catalog entry was resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResampleOutcome {
    /// The source already has the target rate and is referenced in place.
    PassThrough { path: PathBuf, sample_rate: u32 },
    /// A new artifact was written at `path`.
    Resampled { path: PathBuf, sample_rate: u32 },
    /// An artifact from a previous run was found at `path`.
    AlreadyDone { path: PathBuf, sample_rate: u32 },
    /// The entry could not be processed and is left out of the output manifest.
    Failed(String),
}

impl ResampleOutcome {
    /// Path and rate to record in the output manifest, or `None` for failures.
    pub fn resolved(&self) -> Option<(&Path, u32)> {
        match self {
            Self::PassThrough { path, sample_rate }
            | Self::Resampled { path, sample_rate }
            | Self::AlreadyDone { path, sample_rate } => Some((path.as_path(), *sample_rate)),
            Self::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Per-entry pipeline: shard assignment, idempotency check, then resampling.
pub struct ItemPipeline<'a, R: ?Sized> {
    layout: ShardLayout,
    output_dir: &'a Path,
    target_rate: u32,
    resampler: &'a R,
}

impl<'a, R: Resample + ?Sized> ItemPipeline<'a, R> {
    pub fn new(
        layout: ShardLayout,
        output_dir: &'a Path,
        target_rate: u32,
        resampler: &'a R,
    ) -> Self {
        Self {
            layout,
            output_dir,
            target_rate,
            resampler,
        }
    }

    /// Resolve `entry`, found at position `index` of the catalog.
    ///
    /// Never fails: per-entry errors are logged and reported as
    /// [`ResampleOutcome::Failed`].
    pub fn process(&self, entry: &ManifestEntry, index: usize) -> ResampleOutcome {
        let output_path = self.layout.output_path(self.output_dir, index, &entry.id);

        if already_done(&output_path) {
            debug!("'{}' already resampled at '{}'", entry.id, output_path.display());
            return ResampleOutcome::AlreadyDone {
                path: output_path,
                sample_rate: self.target_rate,
            };
        }

        match self.convert(entry, output_path) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    "cannot process '{}' from '{}': {err}; skipping it",
                    entry.id,
                    entry.path.display()
                );
                ResampleOutcome::Failed(entry.id.clone())
            }
        }
    }

    fn convert(
        &self,
        entry: &ManifestEntry,
        output_path: PathBuf,
    ) -> Result<ResampleOutcome, ResampleError> {
        let advertised_rate = audio::probe_sample_rate(&entry.path)?;
        // Pass-through entries are decoded too: only readable audio may be listed.
        let decoded = audio::decode(&entry.path)?;
        if decoded.sample_rate != advertised_rate {
            debug!(
                "'{}' advertises {} Hz but decodes at {} Hz",
                entry.id, advertised_rate, decoded.sample_rate
            );
        }

        match ResamplePlan::between(decoded.sample_rate, self.target_rate)? {
            ResamplePlan::PassThrough => {
                debug!("'{}' is already at {} Hz", entry.id, decoded.sample_rate);
                Ok(ResampleOutcome::PassThrough {
                    path: entry.path.clone(),
                    sample_rate: decoded.sample_rate,
                })
            }
            ResamplePlan::Convert(ratio) => {
                debug!(
                    "resampling '{}' from {} Hz by {}/{}",
                    entry.id, decoded.sample_rate, ratio.up, ratio.down
                );
                let resampled = self.resampler.resample(&decoded, ratio)?;
                audio::write_wav(&output_path, &resampled)?;
                Ok(ResampleOutcome::Resampled {
                    path: output_path,
                    sample_rate: self.target_rate,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcomes_are_not_resolved() {
        let failed = ResampleOutcome::Failed("x".to_owned());
        assert!(failed.is_failed());
        assert_eq!(failed.resolved(), None);

        let done = ResampleOutcome::AlreadyDone {
            path: PathBuf::from("/out/0/x.wav"),
            sample_rate: 16_000,
        };
        assert!(!done.is_failed());
        assert_eq!(done.resolved(), Some((Path::new("/out/0/x.wav"), 16_000)));
    }
}
