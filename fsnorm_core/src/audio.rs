//! Decoding source audio and encoding resampled WAV artifacts.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tempfile::Builder as TempFileBuilder;

use crate::error::ResampleError;

/// Interleaved floating point audio.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: usize) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Number of samples per channel.
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    /// Split into one sample vector per channel.
    pub fn deinterleave(&self) -> Vec<Vec<f32>> {
        let frames = self.frames();
        let mut planes = vec![Vec::with_capacity(frames); self.channels];
        for frame in self.samples.chunks_exact(self.channels.max(1)) {
            for (plane, &sample) in planes.iter_mut().zip(frame) {
                plane.push(sample);
            }
        }
        planes
    }

    /// Inverse of [`AudioBuffer::deinterleave`]. All planes must share one length.
    pub fn interleave(planes: &[Vec<f32>], sample_rate: u32) -> Self {
        let channels = planes.len();
        let frames = planes.first().map_or(0, Vec::len);
        let mut samples = Vec::with_capacity(frames * channels);
        for frame in 0..frames {
            for plane in planes {
                samples.push(plane[frame]);
            }
        }
        Self::new(samples, sample_rate, channels)
    }
}

fn open_reader(path: &Path) -> Result<Box<dyn FormatReader>, ResampleError> {
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    Ok(probed.format)
}

/// Read the sampling rate advertised by the default track without decoding it.
pub fn probe_sample_rate<P: AsRef<Path>>(path: P) -> Result<u32, ResampleError> {
    let reader = open_reader(path.as_ref())?;
    let track = reader
        .default_track()
        .ok_or(ResampleError::MissingDefaultTrack)?;
    if track.codec_params.codec == CODEC_TYPE_NULL {
        return Err(ResampleError::UnsupportedCodec);
    }
    if track.codec_params.n_frames == Some(0) {
        return Err(ResampleError::EmptyAudio);
    }

    match track.codec_params.sample_rate {
        Some(0) => Err(ResampleError::InvalidSampleRate),
        Some(rate) => Ok(rate),
        None => Err(ResampleError::MissingSampleRate),
    }
}

/// Decode the default track of `path` into interleaved samples.
pub fn decode<P: AsRef<Path>>(path: P) -> Result<AudioBuffer, ResampleError> {
    let mut reader = open_reader(path.as_ref())?;

    let track = reader
        .default_track()
        .ok_or(ResampleError::MissingDefaultTrack)?;
    if track.codec_params.codec == CODEC_TYPE_NULL {
        return Err(ResampleError::UnsupportedCodec);
    }
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;
    let mut samples = Vec::new();

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(err.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = Some(spec.rate);
                channels = Some(spec.channels.count());

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(err) => return Err(err.into()),
        }
    }

    let sample_rate = sample_rate.ok_or(ResampleError::MissingSampleRate)?;
    if sample_rate == 0 {
        return Err(ResampleError::InvalidSampleRate);
    }
    let channels = channels.unwrap_or(1).max(1);
    if samples.len() < channels {
        return Err(ResampleError::EmptyAudio);
    }

    Ok(AudioBuffer::new(samples, sample_rate, channels))
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}

/// Write `audio` to `path` as 16-bit PCM WAV.
///
/// Samples go to a hidden temporary file in the destination directory which is
/// renamed over `path` only after the WAV header has been finalized, so `path`
/// either does not exist or holds a complete file.
pub fn write_wav<P: AsRef<Path>>(path: P, audio: &AudioBuffer) -> Result<(), ResampleError> {
    let path = path.as_ref();
    let parent = path
        .parent()
        .ok_or_else(|| ResampleError::InvalidOutputDirectory(path.to_path_buf()))?;
    fs::create_dir_all(parent)?;

    let channels =
        u16::try_from(audio.channels).map_err(|_| ResampleError::UnsupportedCodec)?;
    let spec = WavSpec {
        channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let temp = TempFileBuilder::new()
        .prefix(".")
        .suffix(".partial")
        .tempfile_in(parent)?;
    {
        let mut writer = WavWriter::new(BufWriter::new(temp.as_file()), spec)?;
        for &sample in &audio.samples {
            writer.write_sample(to_pcm16(sample))?;
        }
        writer.finalize()?;
    }
    temp.persist(path).map_err(|err| err.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deinterleave_and_interleave_are_inverse() {
        let stereo = AudioBuffer::new(vec![1.0, -1.0, 0.5, -0.5, 0.25, -0.25], 8_000, 2);
        let planes = stereo.deinterleave();

        assert_eq!(planes, vec![vec![1.0, 0.5, 0.25], vec![-1.0, -0.5, -0.25]]);
        assert_eq!(AudioBuffer::interleave(&planes, 8_000), stereo);
    }

    #[test]
    fn pcm16_conversion_clamps() {
        assert_eq!(to_pcm16(2.0), i16::MAX);
        assert_eq!(to_pcm16(-2.0), -i16::MAX);
        assert_eq!(to_pcm16(0.0), 0);
    }

    #[test]
    fn written_wav_decodes_back_with_rate_and_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shard").join("tone.wav");
        let samples: Vec<f32> = (0..200).map(|n| ((n % 20) as f32 - 10.0) / 20.0).collect();
        let audio = AudioBuffer::new(samples, 22_050, 2);

        write_wav(&path, &audio).unwrap();

        assert_eq!(probe_sample_rate(&path).unwrap(), 22_050);
        let decoded = decode(&path).unwrap();
        assert_eq!(decoded.sample_rate, 22_050);
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.frames(), 100);
        for (expected, actual) in audio.samples.iter().zip(&decoded.samples) {
            assert!((expected - actual).abs() < 1e-3);
        }
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn probe_reports_missing_file_as_io_error() {
        let err = probe_sample_rate("/definitely/not/here.wav").unwrap_err();
        assert!(matches!(err, ResampleError::Io(_)));
    }

    #[test]
    fn decode_rejects_non_audio_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        fs::write(&path, b"not an audio file at all").unwrap();

        assert!(decode(&path).is_err());
    }
}
