use std::path::PathBuf;

use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

/// Errors that can occur while normalizing the sampling rate of a manifest.
///
/// Only the variants raised during pre-flight (configuration, manifest I/O,
/// output directory creation, worker pool setup) ever leave [`crate::run`].
/// Everything raised while processing a single entry is logged and turned
/// into a [`crate::ResampleOutcome::Failed`] instead.
#[derive(Debug, Error)]
pub enum ResampleError {
    /// Wrapper around errors produced by the Symphonia decoding library.
    #[error(transparent)]
    Symphonia(#[from] SymphoniaError),

    /// Wrapper around errors produced while encoding WAV output.
    #[error(transparent)]
    Hound(#[from] hound::Error),

    /// Wrapper around IO errors encountered while reading or writing files.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The worker pool could not be started.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// A sampling rate of zero was requested or advertised.
    #[error("sampling rate must be greater than zero")]
    InvalidSampleRate,

    /// Error returned when the decoder track lacks a sample rate.
    #[error("input stream does not advertise a sample rate")]
    MissingSampleRate,

    /// Error returned when the container does not expose any default track.
    #[error("input stream does not provide a default track")]
    MissingDefaultTrack,

    /// Error returned when the codec of the track cannot be handled.
    #[error("unsupported codec")]
    UnsupportedCodec,

    /// The source decoded to zero frames.
    #[error("input stream contains no audio frames")]
    EmptyAudio,

    /// The input manifest does not exist or is not a regular file.
    #[error("input manifest does not exist: {0}")]
    MissingManifest(PathBuf),

    /// The output location cannot hold the produced artifacts.
    #[error("output directory is not usable: {0}")]
    InvalidOutputDirectory(PathBuf),
}
