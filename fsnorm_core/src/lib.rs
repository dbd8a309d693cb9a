//! Sampling-rate normalization for audio manifests.
//!
//! Given a manifest of `<id> [<field>]* <path>` rows and a target rate, every
//! entry is either referenced in place (already at the target rate) or
//! resampled into `output_dir/<shard>/<id>.wav`, and a new manifest of
//! `<id> <rate> <path>` rows is written in the original order. Entries whose
//! artifact already exists are skipped, so an interrupted run can simply be
//! started again.

pub mod audio;
pub mod dispatch;
pub mod error;
pub mod idempotency;
pub mod manifest;
pub mod pipeline;
pub mod resample;
pub mod shard;
pub mod writer;

use std::fmt;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread;

use log::{info, warn};

pub use audio::AudioBuffer;
pub use dispatch::Dispatcher;
pub use error::ResampleError;
pub use manifest::{Catalog, LoadedManifest, MalformedLine, ManifestEntry};
pub use pipeline::{ItemPipeline, ResampleOutcome};
pub use resample::{PolyphaseResampler, RationalRatio, Resample, ResamplePlan};
pub use shard::ShardLayout;
pub use writer::WriteSummary;

/// Default upper bound of artifacts per shard directory.
pub const DEFAULT_MAX_ITEMS_PER_DIR: usize = 5_000;

/// Configuration of a normalization run.
#[derive(Clone, Debug)]
pub struct Config {
    /// Canonicalized path of the manifest to read.
    pub input_manifest: PathBuf,
    /// Where the resulting manifest is written.
    pub output_manifest: PathBuf,
    /// Root of the shard directories. Created on demand.
    pub output_dir: PathBuf,
    /// Sampling rate every output entry ends up at.
    pub target_rate: u32,
    pub max_items_per_dir: NonZeroUsize,
    /// Size of the worker pool.
    pub workers: NonZeroUsize,
    /// Entries handed to a worker at a time.
    pub batch_size: NonZeroUsize,
}

impl Config {
    /// Construct a new [`Config`] with default tuning parameters.
    pub fn new<I, O, D>(
        input_manifest: I,
        output_manifest: O,
        output_dir: D,
        target_rate: u32,
    ) -> Result<Self, ResampleError>
    where
        I: AsRef<Path>,
        O: AsRef<Path>,
        D: AsRef<Path>,
    {
        Self::builder(input_manifest, output_manifest, output_dir, target_rate).build()
    }

    /// Start building a [`Config`] with optional tuning parameters.
    pub fn builder<I, O, D>(
        input_manifest: I,
        output_manifest: O,
        output_dir: D,
        target_rate: u32,
    ) -> ConfigBuilder
    where
        I: AsRef<Path>,
        O: AsRef<Path>,
        D: AsRef<Path>,
    {
        ConfigBuilder {
            input_manifest: input_manifest.as_ref().to_path_buf(),
            output_manifest: output_manifest.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            target_rate,
            max_items_per_dir: None,
            workers: None,
            batch_size: None,
        }
    }
}

/// Builder for [`Config`].
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    input_manifest: PathBuf,
    output_manifest: PathBuf,
    output_dir: PathBuf,
    target_rate: u32,
    max_items_per_dir: Option<NonZeroUsize>,
    workers: Option<NonZeroUsize>,
    batch_size: Option<NonZeroUsize>,
}

impl ConfigBuilder {
    pub fn max_items_per_dir(mut self, max_items_per_dir: NonZeroUsize) -> Self {
        self.max_items_per_dir = Some(max_items_per_dir);
        self
    }

    pub fn workers(mut self, workers: NonZeroUsize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn batch_size(mut self, batch_size: NonZeroUsize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Validate the parameters and canonicalize the input manifest path.
    pub fn build(self) -> Result<Config, ResampleError> {
        if self.target_rate == 0 {
            return Err(ResampleError::InvalidSampleRate);
        }
        if !self.input_manifest.is_file() {
            return Err(ResampleError::MissingManifest(self.input_manifest));
        }
        let input_manifest = fs::canonicalize(&self.input_manifest)?;

        Ok(Config {
            input_manifest,
            output_manifest: self.output_manifest,
            output_dir: self.output_dir,
            target_rate: self.target_rate,
            max_items_per_dir: self
                .max_items_per_dir
                .unwrap_or(NonZeroUsize::MIN.saturating_add(DEFAULT_MAX_ITEMS_PER_DIR - 1)),
            workers: self.workers.unwrap_or_else(default_workers),
            batch_size: self.batch_size.unwrap_or(NonZeroUsize::MIN),
        })
    }
}

/// Number of workers used when none is configured.
pub fn default_workers() -> NonZeroUsize {
    thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// Progress notifications emitted by [`run_with_progress`].
///
/// `Advance` is delivered from worker threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Emitted once the manifest has been loaded.
    Start { total: usize },
    /// Emitted every time an entry is resolved.
    Advance { completed: usize },
    /// Emitted after the output manifest has been written.
    Finish,
}

/// Counts describing a finished run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Entries in the input catalog.
    pub total: usize,
    pub pass_through: usize,
    pub resampled: usize,
    pub already_done: usize,
    pub failed: usize,
    /// Input lines skipped because they held fewer than two tokens.
    pub malformed_lines: usize,
}

impl RunReport {
    fn from_outcomes(outcomes: &[ResampleOutcome], malformed_lines: usize) -> Self {
        let mut report = Self {
            total: outcomes.len(),
            malformed_lines,
            ..Self::default()
        };
        for outcome in outcomes {
            match outcome {
                ResampleOutcome::PassThrough { .. } => report.pass_through += 1,
                ResampleOutcome::Resampled { .. } => report.resampled += 1,
                ResampleOutcome::AlreadyDone { .. } => report.already_done += 1,
                ResampleOutcome::Failed(_) => report.failed += 1,
            }
        }
        report
    }

    /// Entries that made it into the output manifest.
    pub fn written(&self) -> usize {
        self.total - self.failed
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total, {} pass-through, {} resampled, {} already done, {} failed",
            self.total, self.pass_through, self.resampled, self.already_done, self.failed
        )?;
        if self.malformed_lines > 0 {
            write!(f, ", {} malformed line(s) skipped", self.malformed_lines)?;
        }
        Ok(())
    }
}

/// Where an entry would be written if it needs resampling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedEntry {
    pub id: String,
    pub source: PathBuf,
    pub output: PathBuf,
}

/// Compute the shard layout of `config` without touching the output directory.
pub fn plan_layout(config: &Config) -> Result<Vec<PlannedEntry>, ResampleError> {
    let loaded = manifest::load(&config.input_manifest)?;
    let layout = ShardLayout::for_catalog(loaded.catalog.len(), config.max_items_per_dir);
    let output_dir = absolute(&config.output_dir)?;

    Ok(loaded
        .catalog
        .entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| PlannedEntry {
            id: entry.id.clone(),
            source: entry.path.clone(),
            output: layout.output_path(&output_dir, index, &entry.id),
        })
        .collect())
}

/// Perform the normalization run described by `config`.
pub fn run(config: Config) -> Result<RunReport, ResampleError> {
    run_with_progress(config, |_| {})
}

/// Perform the normalization run, reporting progress to `progress`.
pub fn run_with_progress<F>(config: Config, progress: F) -> Result<RunReport, ResampleError>
where
    F: Fn(ProgressEvent) + Sync,
{
    run_with_resampler(config, &PolyphaseResampler::new(), progress)
}

/// Perform the normalization run with a caller-supplied resampler.
pub fn run_with_resampler<R, F>(
    config: Config,
    resampler: &R,
    progress: F,
) -> Result<RunReport, ResampleError>
where
    R: Resample + ?Sized,
    F: Fn(ProgressEvent) + Sync,
{
    let output_dir = prepare_output_dir(&config.output_dir)?;

    let loaded = manifest::load(&config.input_manifest)?;
    let catalog = loaded.catalog;
    info!(
        "loaded {} entries from '{}'",
        catalog.len(),
        config.input_manifest.display()
    );
    progress(ProgressEvent::Start {
        total: catalog.len(),
    });

    let layout = ShardLayout::for_catalog(catalog.len(), config.max_items_per_dir);
    let pipeline = ItemPipeline::new(layout, &output_dir, config.target_rate, resampler);
    let dispatcher = Dispatcher::new(config.workers, config.batch_size);
    info!(
        "normalizing to {} Hz with {} worker(s), {} entries per directory",
        config.target_rate, config.workers, config.max_items_per_dir
    );

    let outcomes = dispatcher.run_with_progress(
        catalog.entries(),
        |entry, index| pipeline.process(entry, index),
        |completed| progress(ProgressEvent::Advance { completed }),
    )?;

    let summary = writer::write_outcomes(&config.output_manifest, &catalog, &outcomes)?;
    let report = RunReport::from_outcomes(&outcomes, loaded.malformed.len());
    if summary.dropped > 0 {
        warn!(
            "{} of {} entries failed and were left out of '{}'",
            summary.dropped,
            report.total,
            config.output_manifest.display()
        );
    }
    info!(
        "wrote {} of {} entries to '{}' ({report})",
        summary.written,
        report.total,
        config.output_manifest.display()
    );
    progress(ProgressEvent::Finish);

    Ok(report)
}

fn absolute(path: &Path) -> Result<PathBuf, ResampleError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Create the output root if needed and return its canonical form.
fn prepare_output_dir(output_dir: &Path) -> Result<PathBuf, ResampleError> {
    if output_dir.exists() && !output_dir.is_dir() {
        return Err(ResampleError::InvalidOutputDirectory(
            output_dir.to_path_buf(),
        ));
    }
    fs::create_dir_all(output_dir)?;
    let canonical = fs::canonicalize(output_dir)?;
    if fs::metadata(&canonical)?.permissions().readonly() {
        return Err(ResampleError::InvalidOutputDirectory(canonical));
    }
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_each_outcome_kind() {
        let outcomes = vec![
            ResampleOutcome::PassThrough {
                path: PathBuf::from("/in/a.wav"),
                sample_rate: 16_000,
            },
            ResampleOutcome::Resampled {
                path: PathBuf::from("/out/0/b.wav"),
                sample_rate: 16_000,
            },
            ResampleOutcome::AlreadyDone {
                path: PathBuf::from("/out/0/c.wav"),
                sample_rate: 16_000,
            },
            ResampleOutcome::Failed("d".to_owned()),
        ];

        let report = RunReport::from_outcomes(&outcomes, 2);

        assert_eq!(
            report,
            RunReport {
                total: 4,
                pass_through: 1,
                resampled: 1,
                already_done: 1,
                failed: 1,
                malformed_lines: 2,
            }
        );
        assert_eq!(report.written(), 3);
        assert_eq!(
            report.to_string(),
            "4 total, 1 pass-through, 1 resampled, 1 already done, 1 failed, \
             2 malformed line(s) skipped"
        );
    }

    #[test]
    fn builder_rejects_zero_rate_and_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("in.scp");
        fs::write(&manifest, "a /in/a.wav\n").unwrap();

        let err = Config::new(&manifest, dir.path().join("out.scp"), dir.path(), 0).unwrap_err();
        assert!(matches!(err, ResampleError::InvalidSampleRate));

        let missing = dir.path().join("missing.scp");
        let err = Config::new(&missing, dir.path().join("out.scp"), dir.path(), 16_000)
            .unwrap_err();
        assert!(matches!(err, ResampleError::MissingManifest(path) if path == missing));
    }

    #[test]
    fn builder_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("in.scp");
        fs::write(&manifest, "").unwrap();

        let config = Config::new(&manifest, "out.scp", "resampled", 24_000).unwrap();

        assert_eq!(config.max_items_per_dir.get(), DEFAULT_MAX_ITEMS_PER_DIR);
        assert_eq!(config.batch_size.get(), 1);
        assert_eq!(config.workers, default_workers());
        assert!(config.input_manifest.is_absolute());
    }

    #[test]
    fn output_root_that_is_a_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not_a_dir");
        fs::write(&file, b"").unwrap();

        assert!(matches!(
            prepare_output_dir(&file),
            Err(ResampleError::InvalidOutputDirectory(_))
        ));
    }
}
